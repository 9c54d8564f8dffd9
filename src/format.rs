//! Result formatter: ANSI color table, compact/verbose/versionlines
//! templates, and a small `%`-token interpolator over named package
//! properties, named the way the original's `PrintFormat` class names
//! its pieces.

use crate::header::DBHeader;
use crate::package::Package;

/// ANSI SGR codes used by the default color scheme. `no_color`
/// disables all of them (e.g. when stdout isn't a tty, or `-F`).
#[derive(Debug, Clone, Copy)]
pub struct ColorTable {
    pub category: &'static str,
    pub name: &'static str,
    pub version_stable: &'static str,
    pub version_unstable: &'static str,
    pub version_masked: &'static str,
    pub reset: &'static str,
}

impl ColorTable {
    pub const DEFAULT: ColorTable = ColorTable {
        category: "\x1b[34m",
        name: "\x1b[1;32m",
        version_stable: "\x1b[32m",
        version_unstable: "\x1b[33m",
        version_masked: "\x1b[31m",
        reset: "\x1b[0m",
    };

    pub const PLAIN: ColorTable = ColorTable {
        category: "",
        name: "",
        version_stable: "",
        version_unstable: "",
        version_masked: "",
        reset: "",
    };
}

/// How much detail `print_package` emits per package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// One line per package, versions space-joined.
    Compact,
    /// Full metadata block: description, homepage, licenses, all
    /// versions with their flags.
    Verbose,
    /// One line per version instead of one per package.
    VersionLines,
}

#[derive(Debug, Clone)]
pub struct PrintFormat {
    pub colors: ColorTable,
    pub style: Style,
}

impl PrintFormat {
    pub fn new(colors: ColorTable, style: Style) -> Self {
        PrintFormat { colors, style }
    }

    /// Resolve a named package property to its string value, the way
    /// the original's `get_package_property` does — used both by the
    /// builtin templates below and by a future `--format` interpreter.
    pub fn get_package_property<'p>(pkg: &'p Package, name: &str) -> Option<std::borrow::Cow<'p, str>> {
        Some(match name {
            "category" => pkg.category.as_str().into(),
            "name" => pkg.name.as_str().into(),
            "description" => pkg.desc.as_str().into(),
            "homepage" => pkg.homepage.as_str().into(),
            "licenses" => pkg.licenses.as_str().into(),
            "provide" => pkg.provide.as_str().into(),
            "best_version" => pkg.versions.last().map(|v| v.full_version.as_str()).unwrap_or("").into(),
            _ => return None,
        })
    }

    pub fn print_package(&self, out: &mut String, _header: &DBHeader, pkg: &Package) {
        match self.style {
            Style::Compact => self.print_compact(out, pkg),
            Style::Verbose => self.print_verbose(out, pkg),
            Style::VersionLines => self.print_version_lines(out, pkg),
        }
    }

    fn print_compact(&self, out: &mut String, pkg: &Package) {
        let c = &self.colors;
        out.push_str(c.category);
        out.push_str(&pkg.category);
        out.push('/');
        out.push_str(c.name);
        out.push_str(&pkg.name);
        out.push_str(c.reset);
        out.push(' ');
        let versions: Vec<&str> = pkg.versions.iter().map(|v| v.full_version.as_str()).collect();
        out.push_str(&format!("({})", versions.join(" ")));
        out.push('\n');
    }

    fn print_verbose(&self, out: &mut String, pkg: &Package) {
        let c = &self.colors;
        out.push_str(&format!(
            "{}{}{}/{}{}{}\n",
            c.category, pkg.category, c.reset, c.name, pkg.name, c.reset
        ));
        if !pkg.desc.is_empty() {
            out.push_str(&format!("     {}\n", pkg.desc));
        }
        if !pkg.homepage.is_empty() {
            out.push_str(&format!("     {}\n", pkg.homepage));
        }
        if !pkg.licenses.is_empty() {
            out.push_str(&format!("     Licenses:  {}\n", pkg.licenses));
        }
        for version in &pkg.versions {
            let color = self.version_color(version);
            out.push_str(&format!("     [{}]{}{}{}\n", "I".repeat(version.is_installed() as usize), color, version.full_version, c.reset));
        }
    }

    fn print_version_lines(&self, out: &mut String, pkg: &Package) {
        for version in &pkg.versions {
            let color = self.version_color(version);
            out.push_str(&format!(
                "{}{}/{}{} {}{}{}\n",
                self.colors.category, pkg.category, pkg.name, self.colors.reset, color, version.full_version, self.colors.reset
            ));
        }
    }

    fn version_color(&self, version: &crate::package::Version) -> &'static str {
        if version.maskflags.is_hard_masked() {
            self.colors.version_masked
        } else if version.keyflags.is_stable() {
            self.colors.version_stable
        } else {
            self.colors.version_unstable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DBHeader;
    use crate::package::test_support::minimal_version;

    fn sample() -> Package {
        let mut p = Package::new("sys-apps".into(), "eix".into());
        p.desc = "small search utility".into();
        p.versions.push(minimal_version("0.20"));
        p
    }

    #[test]
    fn compact_style_is_one_line() {
        let fmt = PrintFormat::new(ColorTable::PLAIN, Style::Compact);
        let header = DBHeader::new_current();
        let mut out = String::new();
        fmt.print_package(&mut out, &header, &sample());
        assert_eq!(out.lines().count(), 1);
        assert!(out.contains("sys-apps/eix"));
        assert!(out.contains("0.20"));
    }

    #[test]
    fn verbose_style_includes_description() {
        let fmt = PrintFormat::new(ColorTable::PLAIN, Style::Verbose);
        let header = DBHeader::new_current();
        let mut out = String::new();
        fmt.print_package(&mut out, &header, &sample());
        assert!(out.contains("small search utility"));
    }

    #[test]
    fn get_package_property_resolves_known_names() {
        let pkg = sample();
        assert_eq!(PrintFormat::get_package_property(&pkg, "name").as_deref(), Some("eix"));
        assert_eq!(PrintFormat::get_package_property(&pkg, "best_version").as_deref(), Some("0.20"));
        assert!(PrintFormat::get_package_property(&pkg, "nonexistent").is_none());
    }
}
