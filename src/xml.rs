//! `<eixdump>` XML emitter, grounded in `output/print-xml.cc`.
//!
//! The original encodes `XML_KEYWORDS` as negative ints returned from a
//! text-list lookup (`-1` through `-6`). This replaces that with an
//! explicit [`XmlKeywordsMode`] — see the REDESIGN FLAGS entry this
//! implements.

use crate::header::DBHeader;
use crate::package::{IUseState, Package, Version};
use std::fmt::Write as _;
use std::io::{self, Write};

/// Replaces the original's negative-int `XML_KEYWORDS` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlKeywordsMode {
    None,
    Both,
    Effective,
    EffectiveIfDifferent,
    Full,
    FullIfDifferent,
}

impl XmlKeywordsMode {
    /// Parse the `XML_KEYWORDS` RC value (`none|both|effective|
    /// effective*|full|full*`), defaulting to `None` on anything else
    /// — matching the original's `default: KW_FULLS` only for the
    /// exact `"full*"`/unmatched case; everything unrecognized here is
    /// conservatively silent rather than guessing "full-star".
    pub fn from_rc_value(value: &str) -> Self {
        match value {
            "both" => XmlKeywordsMode::Both,
            "effective" => XmlKeywordsMode::Effective,
            "effective*" => XmlKeywordsMode::EffectiveIfDifferent,
            "full" => XmlKeywordsMode::Full,
            "full*" => XmlKeywordsMode::FullIfDifferent,
            _ => XmlKeywordsMode::None,
        }
    }
}

/// Replace the five XML special characters with their entity
/// references.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

pub struct PrintXml {
    print_overlay: bool,
    keywords_mode: XmlKeywordsMode,
    curcat: String,
    started: bool,
    count: u64,
}

impl Default for PrintXml {
    fn default() -> Self {
        PrintXml {
            print_overlay: false,
            keywords_mode: XmlKeywordsMode::None,
            curcat: String::new(),
            started: false,
            count: 0,
        }
    }
}

impl PrintXml {
    pub fn new(print_overlay: bool, keywords_mode: XmlKeywordsMode) -> Self {
        PrintXml {
            print_overlay,
            keywords_mode,
            ..PrintXml::default()
        }
    }

    pub fn start(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        writeln!(out, "<?xml version='1.0' encoding='UTF-8'?>")?;
        writeln!(out, "<eixdump version=\"0\">")
    }

    pub fn finish(&mut self, out: &mut impl Write) -> io::Result<()> {
        if !self.started {
            return Ok(());
        }
        if self.count > 0 {
            writeln!(out, "\t</category>")?;
        }
        writeln!(out, "</eixdump>")?;
        self.started = false;
        self.curcat.clear();
        self.count = 0;
        Ok(())
    }

    /// Emit one package, opening or closing `<category>` as needed.
    pub fn print_package(&mut self, out: &mut impl Write, header: &DBHeader, pkg: &Package) -> io::Result<()> {
        if pkg.category != self.curcat {
            if self.count > 0 {
                writeln!(out, "\t</category>")?;
            }
            writeln!(out, "\t<category name=\"{}\">", escape_string(&pkg.category))?;
            self.curcat = pkg.category.clone();
        }
        self.count += 1;

        writeln!(out, "\t\t<package name=\"{}\">", escape_string(&pkg.name))?;
        writeln!(out, "\t\t\t<description>{}</description>", escape_string(&pkg.desc))?;
        writeln!(out, "\t\t\t<homepage>{}</homepage>", escape_string(&pkg.homepage))?;
        if !pkg.licenses.is_empty() {
            writeln!(out, "\t\t\t<licenses>{}</licenses>", escape_string(&pkg.licenses))?;
        }
        if !pkg.provide.is_empty() {
            writeln!(out, "\t\t\t<provide>{}</provide>", escape_string(&pkg.provide))?;
        }

        for (id, version) in pkg.versions.iter().enumerate() {
            self.print_version(out, header, id, version)?;
        }

        writeln!(out, "\t\t</package>")
    }

    fn print_version(&self, out: &mut impl Write, header: &DBHeader, id: usize, version: &Version) -> io::Result<()> {
        let mut tag = String::new();
        let _ = write!(tag, "\t\t\t<version id=\"{}\"", escape_string(&version.full_version));
        let _ = write!(tag, " internal_id=\"{id}\"");
        if self.print_overlay {
            if let Ok(overlay) = header.get_overlay(version.overlay_key) {
                let _ = write!(tag, " repository=\"{}\"", escape_string(&overlay.label));
            }
        }
        if !version.slotname.is_empty() && version.slotname != "0" {
            let _ = write!(tag, " slot=\"{}\"", escape_string(&version.slotname));
        }
        if version.is_installed() {
            let _ = write!(tag, " installed=\"1\"");
        }
        tag.push('>');
        writeln!(out, "{tag}")?;

        if version.maskflags.is_hard_masked() {
            writeln!(out, "\t\t\t\t<mask type=\"hard\"/>")?;
        }

        self.print_iuse(out, version, IUseState::Plus, "1")?;
        self.print_iuse(out, version, IUseState::Minus, "-1")?;

        for (bit, name) in crate::package::restrict::NAMES {
            if version.restrict_flags & bit != 0 {
                writeln!(out, "\t\t\t\t<restrict flag=\"{name}\"/>")?;
            }
        }
        for (bit, name) in crate::package::properties::NAMES {
            if version.properties_flags & bit != 0 {
                writeln!(out, "\t\t\t\t<properties flag=\"{name}\"/>")?;
            }
        }

        match self.keywords_mode {
            XmlKeywordsMode::None => {}
            XmlKeywordsMode::Both => {
                writeln!(out, "\t\t\t\t<keywords>{}</keywords>", escape_string(&version.full_keywords))?;
                writeln!(
                    out,
                    "\t\t\t\t<effective_keywords>{}</effective_keywords>",
                    escape_string(&version.effective_keywords)
                )?;
            }
            XmlKeywordsMode::Effective => {
                writeln!(
                    out,
                    "\t\t\t\t<effective_keywords>{}</effective_keywords>",
                    escape_string(&version.effective_keywords)
                )?;
            }
            XmlKeywordsMode::EffectiveIfDifferent => {
                if version.effective_keywords != version.full_keywords {
                    writeln!(
                        out,
                        "\t\t\t\t<effective_keywords>{}</effective_keywords>",
                        escape_string(&version.effective_keywords)
                    )?;
                }
            }
            XmlKeywordsMode::Full => {
                writeln!(out, "\t\t\t\t<keywords>{}</keywords>", escape_string(&version.full_keywords))?;
            }
            XmlKeywordsMode::FullIfDifferent => {
                if version.effective_keywords != version.full_keywords {
                    writeln!(out, "\t\t\t\t<keywords>{}</keywords>", escape_string(&version.full_keywords))?;
                }
            }
        }

        writeln!(out, "\t\t\t</version>")
    }

    fn print_iuse(&self, out: &mut impl Write, version: &Version, wanted: IUseState, dflt: &str) -> io::Result<()> {
        let names: Vec<&str> = version
            .iuse
            .iter()
            .filter(|u| u.state == wanted)
            .map(|u| u.name.as_str())
            .collect();
        if names.is_empty() {
            return Ok(());
        }
        writeln!(
            out,
            "\t\t\t\t<iuse default=\"{dflt}\">{}</iuse>",
            escape_string(&names.join(" "))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{DBHeader, OverlayIdent};
    use crate::package::test_support::minimal_version;

    #[test]
    fn escapes_all_five_special_characters() {
        assert_eq!(escape_string("a & b < c > d ' e \" f"), "a &amp; b &lt; c &gt; d &apos; e &quot; f");
    }

    #[test]
    fn keywords_mode_parses_rc_values() {
        assert_eq!(XmlKeywordsMode::from_rc_value("both"), XmlKeywordsMode::Both);
        assert_eq!(XmlKeywordsMode::from_rc_value("effective*"), XmlKeywordsMode::EffectiveIfDifferent);
        assert_eq!(XmlKeywordsMode::from_rc_value("garbage"), XmlKeywordsMode::None);
    }

    #[test]
    fn well_formed_output_for_a_simple_package() {
        let mut header = DBHeader::new_current();
        header.intern_overlay(OverlayIdent {
            path: "/usr/portage".into(),
            label: "gentoo".into(),
        });

        let mut pkg = Package::new("sys-apps".into(), "eix".into());
        pkg.desc = "a <tricky> & \"quoted\" description".into();
        pkg.versions.push(minimal_version("0.20"));

        let mut xml = PrintXml::new(false, XmlKeywordsMode::Full);
        let mut buf = Vec::new();
        xml.start(&mut buf).unwrap();
        xml.print_package(&mut buf, &header, &pkg).unwrap();
        xml.finish(&mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("<tricky>"), "raw angle brackets must be escaped");
        assert!(text.contains("&lt;tricky&gt;"));
        assert_eq!(text.matches("<category").count(), text.matches("</category>").count());
        assert_eq!(text.matches("<package").count(), text.matches("</package>").count());
    }
}
