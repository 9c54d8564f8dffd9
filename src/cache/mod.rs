//! Metadata-source adapters consumed by the offline indexer. Each
//! backend populates a [`crate::writer::PackageTree`] from its own
//! storage; the tree and the writer don't know or care which backend
//! produced the records.

pub mod ebuild;
pub mod flat;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::EixError;
use crate::writer::PackageTree;

/// Callback a backend uses to report a non-fatal per-record problem
/// (a malformed cache file, a row it couldn't parse) without aborting
/// the whole read.
pub type ErrorCallback<'a> = dyn FnMut(String) + 'a;

/// Capability set every metadata source implements, replacing the
/// original's inheritance hierarchy with one small trait dispatched
/// dynamically (`Box<dyn CacheBackend>`) so the indexer can mix
/// backends per overlay without generics leaking into its own code.
pub trait CacheBackend {
    /// Whether one call to `read_categories` can populate more than
    /// one category at a time (true for a single database file like
    /// sqlite; false for per-category directory layouts).
    fn can_read_multiple_categories(&self) -> bool;

    /// Populate `tree` with every package this backend can read,
    /// optionally restricted to `categories_filter` or a single
    /// `single_category`. Per-record failures go through
    /// `on_error` and do not abort the scan; a failure to open the
    /// backend at all is a hard error.
    fn read_categories(
        &self,
        tree: &mut PackageTree,
        categories_filter: Option<&[String]>,
        single_category: Option<&str>,
        on_error: &mut ErrorCallback,
    ) -> Result<(), EixError>;

    /// Short machine name (`"sqlite"`, `"flat"`, `"ebuild"`), used in
    /// diagnostics and by `update-eix --cache-backend`.
    fn type_name(&self) -> &'static str;
}

fn category_allowed(category: &str, categories_filter: Option<&[String]>, single_category: Option<&str>) -> bool {
    if let Some(single) = single_category {
        return category == single;
    }
    match categories_filter {
        Some(filter) => filter.iter().any(|c| c == category),
        None => true,
    }
}
