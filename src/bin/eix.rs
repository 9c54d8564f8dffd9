//! Query CLI: parses output modifiers with `clap`, hands the trailing
//! expression tokens to `eix::matchatom`'s own parser (clap can't
//! express "leaf tokens build a precedence tree"), runs the query and
//! prints results.

use clap::Parser;
use eix::config::EixRc;
use eix::format::{ColorTable, PrintFormat, Style};
use eix::matchatom::{AlgoToken, Matchatom, NullContext, Selector, Token};
use eix::query::run_query;
use eix::unused::report_unused;
use eix::xml::{PrintXml, XmlKeywordsMode};
use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

/// Search the index generated by update-eix.
#[derive(Parser, Debug)]
#[command(name = "eix", about = "Fast local search for the Gentoo Portage ebuild tree", long_about = None)]
struct Cli {
    /// Path to the binary index; defaults to /var/cache/eix/eix.db.
    #[arg(long, default_value = "/var/cache/eix/eix.db")]
    db: PathBuf,

    /// No output of any kind.
    #[arg(short, long)]
    quiet: bool,

    /// Do not use ANSI color codes.
    #[arg(short = 'n', long = "nocolor")]
    nocolor: bool,

    /// Force colorful output even when stdout isn't a tty.
    #[arg(short = 'F', long = "force-color")]
    force_color: bool,

    /// Compact search results.
    #[arg(short, long)]
    compact: bool,

    /// Verbose search results.
    #[arg(short, long)]
    verbose: bool,

    /// Print available versions line-by-line.
    #[arg(short = 'l', long = "versionlines")]
    versionlines: bool,

    /// Dump results as XML instead of the normal formatter.
    #[arg(long = "dump")]
    dump_xml: bool,

    /// Before other output, report non-matching entries of
    /// /etc/portage/package.*.
    #[arg(short = 't', long = "test-non-matching")]
    test_non_matching: bool,

    /// Enable debug logging.
    #[arg(short = 'd', long)]
    debug: bool,

    /// The expression: selector/algorithm flags and patterns, parsed by
    /// eix::matchatom's own state machine.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    expression: Vec<String>,
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}

/// Translate the raw expression argv into matchatom tokens. Only a
/// practical subset of the original's flags is recognized here; `-s`
/// (name, exact-or-regex depending on a following `-r`/`-e`) is the
/// common case exercised by the end-to-end scenarios.
fn tokenize(args: &[String]) -> eix::error::Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut pending_algo = AlgoToken::Exact;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-s" => tokens.push(Token::Selector(Selector::Name)),
            "-S" => tokens.push(Token::Selector(Selector::Description)),
            "-C" => tokens.push(Token::Selector(Selector::Category)),
            "-e" => pending_algo = AlgoToken::Exact,
            "-r" => pending_algo = AlgoToken::Regex,
            "-R" => pending_algo = AlgoToken::Wildcard,
            "-f" => {
                i += 1;
                let k = args
                    .get(i)
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| eix::error::EixError::bad_expression(i, "-f requires a numeric distance"))?;
                pending_algo = AlgoToken::Fuzzy(k);
            }
            "-a" => tokens.push(Token::And),
            "-o" => tokens.push(Token::Or),
            "-!" => tokens.push(Token::Invert),
            other => {
                tokens.push(Token::Algo(pending_algo));
                tokens.push(Token::Pattern(other.to_string()));
            }
        }
        i += 1;
    }
    Ok(tokens)
}

fn run() -> eix::error::Result<bool> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let rc = EixRc::load();

    let tokens = tokenize(&cli.expression)?;
    let atom: Matchatom = eix::matchatom::parse_tokens(&tokens)?;

    let file = File::open(&cli.db).map_err(|e| eix::error::EixError::missing_file(cli.db.display().to_string(), e.to_string()))?;
    let (header, hits) = run_query(file, &atom, &NullContext)?;

    if cli.test_non_matching {
        let packages: Vec<_> = hits.iter().map(|h| h.package.clone()).collect();
        for path in [
            "/etc/portage/package.keywords",
            "/etc/portage/package.mask",
            "/etc/portage/package.unmask",
            "/etc/portage/package.use",
        ] {
            for line in report_unused(std::path::Path::new(path), &packages) {
                println!("{line}");
            }
        }
    }

    if cli.quiet {
        return Ok(!hits.is_empty());
    }

    if cli.dump_xml {
        let mode = XmlKeywordsMode::from_rc_value(rc.get("XML_KEYWORDS"));
        let mut xml = PrintXml::new(rc.get_bool("XML_OVERLAY"), mode);
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        xml.start(&mut out).ok();
        for hit in &hits {
            xml.print_package(&mut out, &header, &hit.package).ok();
        }
        xml.finish(&mut out).ok();
    } else {
        let colors = if cli.nocolor {
            ColorTable::PLAIN
        } else if cli.force_color || rc.get_bool("FORCE_COLORS") {
            ColorTable::DEFAULT
        } else {
            ColorTable::PLAIN
        };
        let style = if cli.versionlines {
            Style::VersionLines
        } else if cli.verbose {
            Style::Verbose
        } else {
            Style::Compact
        };
        let fmt = PrintFormat::new(colors, style);
        let mut out = String::new();
        for hit in &hits {
            fmt.print_package(&mut out, &header, &hit.package);
        }
        print!("{out}");
        println!("Found {} matches", hits.len());
    }

    Ok(!hits.is_empty())
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("eix: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
