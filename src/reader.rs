//! Streaming, lazy, per-package decoder.
//!
//! [`PackageReader`] is a small state machine — `None → Name →
//! Description → Versions/All` — mirroring exactly how much of one
//! package record has been decoded. A matcher that only needs a
//! package's name never pays to allocate its description or decode any
//! version; whatever it skips is discarded field-by-field (not
//! byte-skipped via a length prefix) so the same skip functions the
//! writer's round-trip tests exercise are what drive the fast path.

use crate::codec::Reader;
use crate::error::{EixError, Result};
use crate::header::DBHeader;
use crate::package::Package;
use std::io::Read;
use std::rc::Rc;

/// How much of the current package record has been decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DecodeState {
    /// No record positioned (before the first `next()`, or after a
    /// `release()`/`skip()`).
    None,
    /// `category`/`name` valid.
    Name,
    /// + `desc`/`homepage`/`licenses`/`provide`.
    Description,
    /// + `versions` (and therefore everything else this format has).
    Versions,
}

/// Iterates the packages of one category-ordered index file, decoding
/// each one lazily.
pub struct PackageReader<R: Read> {
    db: Reader<R>,
    header: Rc<DBHeader>,
    frames: u64,
    cat_name: String,
    cat_size: u64,
    state: DecodeState,
    current: Package,
}

impl<R: Read> PackageReader<R> {
    pub fn new(db: Reader<R>, header: Rc<DBHeader>) -> Self {
        let frames = header.size;
        PackageReader {
            db,
            header,
            frames,
            cat_name: String::new(),
            cat_size: 0,
            state: DecodeState::None,
            current: Package::new(String::new(), String::new()),
        }
    }

    pub fn header(&self) -> &DBHeader {
        &self.header
    }

    pub fn current_category(&self) -> &str {
        &self.cat_name
    }

    fn advance_category(&mut self) -> Result<bool> {
        if self.frames == 0 {
            return Ok(false);
        }
        self.cat_name = self.db.get_string()?;
        self.cat_size = self.db.get_number()?;
        self.frames -= 1;
        Ok(true)
    }

    /// Advance to the next package record, auto-skipping whatever of
    /// the previous one was left undecoded. Returns `false` at EOF.
    pub fn next(&mut self) -> Result<bool> {
        if self.state != DecodeState::None {
            self.skip()?;
        }

        while self.cat_size == 0 {
            if !self.advance_category()? {
                return Ok(false);
            }
        }

        let name = Package::read_name(&mut self.db)?;
        self.current = Package::new(self.cat_name.clone(), name);
        self.cat_size -= 1;
        self.state = DecodeState::Name;
        Ok(true)
    }

    /// Ensure at least `Description`-level fields are decoded.
    pub fn ensure_description(&mut self) -> Result<()> {
        if self.state >= DecodeState::Description {
            return Ok(());
        }
        let (desc, homepage, licenses, provide) = Package::read_description_fields(&mut self.db, &self.header)?;
        self.current.desc = desc;
        self.current.homepage = homepage;
        self.current.licenses = licenses;
        self.current.provide = provide;
        self.state = DecodeState::Description;
        Ok(())
    }

    /// Ensure the package's versions are decoded. Implies
    /// `ensure_description`.
    pub fn ensure_versions(&mut self) -> Result<()> {
        if self.state >= DecodeState::Versions {
            return Ok(());
        }
        self.ensure_description()?;
        let (have_same_overlay_key, overlay_key, versions) =
            Package::read_versions_fields(&mut self.db, &self.header)?;
        self.current.have_same_overlay_key = have_same_overlay_key;
        self.current.overlay_key = overlay_key;
        self.current.versions = versions;
        if !have_same_overlay_key {
            self.current.recompute_overlay_key();
        }
        self.state = DecodeState::Versions;
        Ok(())
    }

    /// Ensure the package is fully decoded. An alias for
    /// `ensure_versions`: in this wire format nothing follows the
    /// version list, so `Versions` and `All` coincide.
    pub fn ensure_all(&mut self) -> Result<()> {
        self.ensure_versions()
    }

    /// The package decoded so far; fields beyond the current state are
    /// left at their defaults.
    pub fn package(&self) -> &Package {
        &self.current
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Discard the rest of the current record without fully decoding
    /// it. A no-op if there is no active record.
    pub fn skip(&mut self) -> Result<()> {
        match self.state {
            DecodeState::None => {}
            DecodeState::Name => {
                Package::skip_description_fields(&mut self.db)?;
                Package::skip_versions_fields(&mut self.db, &self.header)?;
            }
            DecodeState::Description => {
                Package::skip_versions_fields(&mut self.db, &self.header)?;
            }
            DecodeState::Versions => {}
        }
        self.state = DecodeState::None;
        Ok(())
    }

    /// Fully decode the current record (if not already) and hand
    /// ownership of it to the caller. Equivalent to `skip()` from the
    /// reader's point of view: the record is consumed either way.
    pub fn release(&mut self) -> Result<Package> {
        self.ensure_all()?;
        self.state = DecodeState::None;
        Ok(std::mem::replace(&mut self.current, Package::new(String::new(), String::new())))
    }

    /// Consume the reader, asserting the cursor ended exactly at
    /// `header.size` packages — any deviation means the framing was
    /// corrupt somewhere along the way.
    pub fn finish(mut self) -> Result<()> {
        if self.state != DecodeState::None {
            self.skip()?;
        }
        while self.cat_size == 0 {
            if !self.advance_category()? {
                return Ok(());
            }
        }
        Err(EixError::corrupt(
            "package reader finished with unread records remaining",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Writer;
    use crate::header::{DBHeader, OverlayIdent};
    use crate::package::Version;
    use std::io::Cursor;

    fn write_db(packages: &[(&str, Vec<Package>)]) -> (Vec<u8>, DBHeader) {
        let mut header = DBHeader::new_current();
        header.intern_overlay(OverlayIdent {
            path: "/usr/portage".into(),
            label: "gentoo".into(),
        });
        header.size = packages.len() as u64;

        let mut buf = Vec::new();
        {
            let mut w = Writer::new(&mut buf);
            header.write(&mut w).unwrap();
            for (cat, pkgs) in packages {
                w.put_string(cat).unwrap();
                w.put_number(pkgs.len() as u64).unwrap();
                for pkg in pkgs {
                    pkg.write(&mut w, &mut header).unwrap();
                }
            }
        }
        (buf, header)
    }

    fn minimal_version(full: &str) -> Version {
        crate::package::test_support::minimal_version(full)
    }

    #[test]
    fn iterates_categories_and_packages_in_order() {
        let mut eix = Package::new("sys-apps".into(), "eix".into());
        eix.versions.push(minimal_version("0.20"));
        let mut portage = Package::new("sys-apps".into(), "portage".into());
        portage.versions.push(minimal_version("3.0"));

        let (buf, _header) = write_db(&[("sys-apps", vec![eix, portage])]);
        let mut r = Reader::new(Cursor::new(buf));
        let header = Rc::new(DBHeader::read(&mut r, crate::header::CURRENT_VERSION).unwrap());
        let mut reader = PackageReader::new(r, header);

        assert!(reader.next().unwrap());
        assert_eq!(reader.package().name, "eix");
        let released = reader.release().unwrap();
        assert_eq!(released.name, "eix");

        assert!(reader.next().unwrap());
        assert_eq!(reader.package().name, "portage");
        assert!(!reader.next().unwrap());
    }

    #[test]
    fn name_only_match_skips_without_decoding_versions() {
        let mut eix = Package::new("sys-apps".into(), "eix".into());
        eix.desc = "should never be read".into();
        eix.versions.push(minimal_version("0.20"));

        let (buf, _header) = write_db(&[("sys-apps", vec![eix])]);
        let mut r = Reader::new(Cursor::new(buf));
        let header = Rc::new(DBHeader::read(&mut r, crate::header::CURRENT_VERSION).unwrap());
        let mut reader = PackageReader::new(r, header);

        assert!(reader.next().unwrap());
        assert_eq!(reader.state(), DecodeState::Name);
        assert_eq!(reader.package().desc, "", "description must not be decoded yet");
        reader.skip().unwrap();
        assert!(!reader.next().unwrap());
    }

    #[test]
    fn partial_and_full_decode_agree_on_match_set() {
        // Build 4 packages, two starting with 'a'.
        let names = ["alpha", "bravo", "apple", "charlie"];
        let pkgs: Vec<Package> = names
            .iter()
            .map(|n| {
                let mut p = Package::new("cat".into(), n.to_string());
                p.versions.push(minimal_version("1.0"));
                p
            })
            .collect();
        let (buf, _header) = write_db(&[("cat", pkgs)]);

        let name_only_matches = {
            let mut r = Reader::new(Cursor::new(buf.clone()));
            let header = Rc::new(DBHeader::read(&mut r, crate::header::CURRENT_VERSION).unwrap());
            let mut reader = PackageReader::new(r, header);
            let mut matched = Vec::new();
            while reader.next().unwrap() {
                if reader.package().name.starts_with('a') {
                    matched.push(reader.release().unwrap().name);
                } else {
                    reader.skip().unwrap();
                }
            }
            matched
        };

        let full_decode_matches = {
            let mut r = Reader::new(Cursor::new(buf));
            let header = Rc::new(DBHeader::read(&mut r, crate::header::CURRENT_VERSION).unwrap());
            let mut reader = PackageReader::new(r, header);
            let mut matched = Vec::new();
            while reader.next().unwrap() {
                reader.ensure_all().unwrap();
                if reader.package().name.starts_with('a') {
                    matched.push(reader.release().unwrap().name);
                } else {
                    reader.skip().unwrap();
                }
            }
            matched
        };

        assert_eq!(name_only_matches, full_decode_matches);
    }
}
