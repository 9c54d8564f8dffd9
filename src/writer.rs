//! Symmetric serializer: the indexer's half of the codec. Guarantees
//! that whatever it emits, [`crate::reader::PackageReader`] recovers
//! byte-identical `Package` values.

use crate::codec::Writer as RawWriter;
use crate::error::Result;
use crate::header::DBHeader;
use crate::package::Package;
use std::io::Write;

/// Buckets packages by category while preserving the ability to emit
/// them in `(category, name)` order regardless of the order they were
/// collected in by the cache backends.
#[derive(Debug, Default)]
pub struct PackageTree {
    categories: std::collections::BTreeMap<String, Vec<Package>>,
}

impl PackageTree {
    pub fn new() -> Self {
        PackageTree::default()
    }

    /// Insert one package, keyed by its own `category` field.
    pub fn insert(&mut self, mut package: Package) {
        package.versions.sort();
        package.recompute_overlay_key();
        self.categories
            .entry(package.category.clone())
            .or_default()
            .push(package);
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn package_count(&self) -> usize {
        self.categories.values().map(|v| v.len()).sum()
    }
}

/// Serializes a whole index file: header, then each category's
/// packages in lexicographic `(category, name)` order.
pub struct DbWriter<W: Write> {
    inner: RawWriter<W>,
}

impl<W: Write> DbWriter<W> {
    pub fn new(inner: W) -> Self {
        DbWriter {
            inner: RawWriter::new(inner),
        }
    }

    /// Write `header` and `tree` as a complete index file. `header.size`
    /// is overwritten with `tree.category_count()` before it is written
    /// — it's the number of categories the reader's `frames` counter
    /// steps through, not the number of packages — since the writer,
    /// not the caller, owns that invariant.
    ///
    /// The header's string dictionaries must be on disk before any
    /// package references into them, but interning only happens as a
    /// side effect of `Package::write`. So this does a throwaway dry
    /// run first to populate every dictionary, then writes the header
    /// followed by the real package pass — `StringHash::add` dedups,
    /// so the second pass mints no new indices and lines up exactly
    /// with what the dry run produced.
    pub fn write(mut self, mut header: DBHeader, mut tree: PackageTree) -> Result<W> {
        header.size = tree.category_count() as u64;
        for packages in tree.categories.values() {
            let mut sink = RawWriter::new(std::io::sink());
            for package in packages {
                package.write(&mut sink, &mut header)?;
            }
        }

        header.write(&mut self.inner)?;

        for packages in tree.categories.values_mut() {
            packages.sort_by(|a, b| a.name.cmp(&b.name));
            self.inner.put_string(
                packages
                    .first()
                    .map(|p| p.category.as_str())
                    .unwrap_or(""),
            )?;
            self.inner.put_number(packages.len() as u64)?;
            for package in packages {
                package.write(&mut self.inner, &mut header)?;
            }
        }

        Ok(self.inner.into_inner())
    }
}
