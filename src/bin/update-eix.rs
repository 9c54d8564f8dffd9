//! Offline indexer: drives the configured cache backends over the
//! configured overlays, builds a `PackageTree`, and writes it as a
//! binary index.

use clap::Parser;
use eix::cache::ebuild::EbuildTreeCache;
use eix::cache::flat::FlatCache;
use eix::cache::CacheBackend;
use eix::header::{DBHeader, OverlayIdent};
use eix::writer::{DbWriter, PackageTree};
use std::path::PathBuf;
use std::process::ExitCode;

/// Regenerate the binary package index from the configured overlays.
#[derive(Parser, Debug)]
#[command(name = "update-eix", about = "Build the eix binary index from the Portage tree", long_about = None)]
struct Cli {
    /// Overlay paths to scan, main tree first.
    #[arg(required = true)]
    overlays: Vec<PathBuf>,

    /// Which metadata backend to read each overlay through.
    #[arg(long, default_value = "flat")]
    cache_backend: String,

    /// Where to write the resulting index.
    #[arg(short, long, default_value = "/var/cache/eix/eix.db")]
    output: PathBuf,

    /// Enable debug logging.
    #[arg(short = 'd', long)]
    debug: bool,
}

fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}

fn backend_for(kind: &str, root: PathBuf) -> Box<dyn CacheBackend> {
    match kind {
        "ebuild" => Box::new(EbuildTreeCache::new(root)),
        _ => Box::new(FlatCache::new(root)),
    }
}

fn run() -> eix::error::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut header = DBHeader::new_current();
    let mut tree = PackageTree::new();

    for (i, overlay_path) in cli.overlays.iter().enumerate() {
        header.intern_overlay(OverlayIdent {
            path: overlay_path.display().to_string(),
            label: overlay_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("overlay{i}")),
        });

        let backend = backend_for(&cli.cache_backend, overlay_path.clone());
        tracing::info!(backend = backend.type_name(), path = %overlay_path.display(), "scanning overlay");

        let mut errors = Vec::new();
        backend.read_categories(&mut tree, None, None, &mut |e| errors.push(e))?;
        for e in errors {
            tracing::warn!("{e}");
        }
    }

    let package_count = tree.package_count();
    let file = std::fs::File::create(&cli.output)
        .map_err(|e| eix::error::EixError::missing_file(cli.output.display().to_string(), e.to_string()))?;
    DbWriter::new(file).write(header, tree)?;

    tracing::info!(packages = package_count, path = %cli.output.display(), "wrote index");
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("update-eix: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
