//! SQLite-backed metadata cache. A single database file covers the
//! whole tree, so unlike the flat and ebuild backends this one can
//! read every category in one pass — `can_read_multiple_categories`
//! is `true`, matching `portage/cache/sqlite/sqlite.h`.
//!
//! No SQL is parsed by this crate: querying goes entirely through
//! `rusqlite`'s prepared-statement API, with the database treated as
//! an opaque row source.

use super::{category_allowed, CacheBackend, ErrorCallback};
use crate::error::EixError;
use crate::package::{IUse, Package, Version};
use crate::writer::PackageTree;
use rusqlite::Connection;
use std::path::PathBuf;

pub struct SqliteCache {
    db_path: PathBuf,
}

impl SqliteCache {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        SqliteCache { db_path: db_path.into() }
    }
}

impl CacheBackend for SqliteCache {
    fn can_read_multiple_categories(&self) -> bool {
        true
    }

    fn read_categories(
        &self,
        tree: &mut PackageTree,
        categories_filter: Option<&[String]>,
        single_category: Option<&str>,
        on_error: &mut ErrorCallback,
    ) -> Result<(), EixError> {
        let conn = Connection::open(&self.db_path)
            .map_err(|e| EixError::backend("sqlite", format!("can't open {}: {e}", self.db_path.display())))?;

        let mut stmt = conn
            .prepare(
                "SELECT category, name, version, slot, keywords, iuse, restrict, properties \
                 FROM portage_packages",
            )
            .map_err(|e| EixError::backend("sqlite", e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .map_err(|e| EixError::backend("sqlite", e.to_string()))?;

        for row in rows {
            let (category, name, version, slot, keywords, iuse, restrict, properties) = match row {
                Ok(r) => r,
                Err(e) => {
                    on_error(format!("sqlite row error: {e}"));
                    continue;
                }
            };
            if !category_allowed(&category, categories_filter, single_category) {
                continue;
            }

            let mut pkg = Package::new(category, name);
            pkg.versions.push(Version::from_cache_fields(
                version,
                slot,
                keywords,
                iuse.split_whitespace().map(IUse::parse).collect(),
                parse_bits(&restrict, crate::package::restrict::NAMES),
                parse_bits(&properties, crate::package::properties::NAMES),
                None,
            ));
            tree.insert(pkg);
        }

        Ok(())
    }

    fn type_name(&self) -> &'static str {
        "sqlite"
    }
}

fn parse_bits(s: &str, names: &[(u64, &str)]) -> u64 {
    s.split_whitespace().fold(0u64, |acc, tok| {
        acc | names.iter().find(|(_, name)| *name == tok).map(|(bit, _)| *bit).unwrap_or(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seed_db(path: &std::path::Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute(
            "CREATE TABLE portage_packages (
                category TEXT, name TEXT, version TEXT, slot TEXT,
                keywords TEXT, iuse TEXT, restrict TEXT, properties TEXT
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO portage_packages VALUES
                ('sys-apps', 'eix', '0.20', '0', 'amd64 ~x86', '+foo', '', '')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn reads_every_category_in_one_pass() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("portage.db");
        seed_db(&db_path);

        let mut tree = PackageTree::new();
        let backend = SqliteCache::new(&db_path);
        assert!(backend.can_read_multiple_categories());
        backend.read_categories(&mut tree, None, None, &mut |_| {}).unwrap();
        assert_eq!(tree.package_count(), 1);
    }
}
