//! Orchestrates a single query run: open the index, validate its
//! version, drive the reader to exactly the decode depth the
//! expression tree needs, collect matches, and apply the optional
//! fuzzy-distance post-sort.

use crate::codec::Reader;
use crate::error::Result;
use crate::header::{DBHeader, CURRENT_VERSION};
use crate::matchatom::{Matchatom, MatchContext};
use crate::package::Package;
use crate::reader::{DecodeState, PackageReader};
use std::io::Read;
use std::rc::Rc;

/// A matched package plus the fuzzy distance it was found at, when the
/// expression used a fuzzy leaf.
#[derive(Debug, Clone)]
pub struct Hit {
    pub package: Package,
    pub distance: Option<usize>,
}

/// Run `atom` against every package in `db`, returning matches in
/// reader order unless the expression uses fuzzy matching, in which
/// case the result is stable-sorted by `(distance asc, category/name
/// asc)`.
pub fn run_query<R: Read>(db: R, atom: &Matchatom, ctx: &dyn MatchContext) -> Result<(Rc<DBHeader>, Vec<Hit>)> {
    let mut raw = Reader::new(db);
    let header = Rc::new(DBHeader::read(&mut raw, CURRENT_VERSION)?);
    let mut reader = PackageReader::new(raw, header.clone());

    let required = atom.required_state();
    let mut hits = Vec::new();

    while reader.next()? {
        match required {
            DecodeState::None | DecodeState::Name => {}
            DecodeState::Description => reader.ensure_description()?,
            DecodeState::Versions => reader.ensure_versions()?,
        }

        if atom.matches(reader.package(), ctx) {
            let distance = atom.best_distance();
            let package = reader.release()?;
            hits.push(Hit { package, distance });
        } else {
            reader.skip()?;
        }
    }

    if atom.uses_fuzzy() {
        hits.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.package.category.cmp(&b.package.category))
                .then_with(|| a.package.name.cmp(&b.package.name))
        });
    }

    Ok((header, hits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::OverlayIdent;
    use crate::matchatom::{Algorithm, Leaf, Modifiers, NullContext, Selector};
    use crate::package::test_support::minimal_version;
    use crate::writer::{DbWriter, PackageTree};
    use std::io::Cursor;

    fn sample_db() -> Vec<u8> {
        let mut header = DBHeader::new_current();
        header.intern_overlay(OverlayIdent {
            path: "/usr/portage".into(),
            label: "gentoo".into(),
        });
        let mut tree = PackageTree::new();
        for name in ["editor", "edutor", "editoz", "unrelated"] {
            let mut p = Package::new("app-editors".into(), name.into());
            p.versions.push(minimal_version("1.0"));
            tree.insert(p);
        }
        DbWriter::new(Vec::new()).write(header, tree).unwrap()
    }

    #[test]
    fn empty_db_yields_no_matches() {
        let header = DBHeader::new_current();
        let tree = PackageTree::new();
        let buf = DbWriter::new(Vec::new()).write(header, tree).unwrap();

        let atom = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::exact("anything"), Modifiers::default()));
        let (hdr, hits) = run_query(Cursor::new(buf), &atom, &NullContext).unwrap();
        assert_eq!(hdr.size, 0);
        assert!(hits.is_empty());
    }

    #[test]
    fn exact_match_finds_single_package() {
        let buf = sample_db();
        let atom = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::exact("editor"), Modifiers::default()));
        let (_header, hits) = run_query(Cursor::new(buf), &atom, &NullContext).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].package.name, "editor");
    }

    #[test]
    fn fuzzy_query_sorts_by_distance_then_name() {
        let buf = sample_db();
        let atom = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::fuzzy("editor", 2), Modifiers::default()));
        let (_header, hits) = run_query(Cursor::new(buf), &atom, &NullContext).unwrap();
        let names: Vec<&str> = hits.iter().map(|h| h.package.name.as_str()).collect();
        assert_eq!(names, vec!["editor", "editoz", "edutor"]);
    }

    #[test]
    fn name_only_predicate_does_not_decode_description() {
        let buf = sample_db();
        let atom = Matchatom::Leaf(Leaf::new(Selector::Name, Algorithm::exact("unrelated"), Modifiers::default()));
        assert_eq!(atom.required_state(), DecodeState::Name);
        let (_header, hits) = run_query(Cursor::new(buf), &atom, &NullContext).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
