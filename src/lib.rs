//! A fast local search engine for the Gentoo Portage ebuild tree.
//!
//! An offline indexer (`update-eix`) walks package metadata backends
//! and writes a single compact binary index; the query tool (`eix`)
//! reads that index and evaluates structured expressions against each
//! package, emitting formatted or XML results.
//!
//! The core is the binary index format ([`codec`], [`header`],
//! [`package`]), the streaming lazy decoder ([`reader`]), the
//! symmetric encoder ([`writer`]), and the query expression language
//! ([`matchatom`], [`query`]). Everything else — cache backends,
//! output formatting, XML dump, RC-file configuration, the unused
//! user-config entry reporter — consumes what the core produces.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod header;
pub mod matchatom;
pub mod package;
pub mod query;
pub mod reader;
pub mod unused;
pub mod writer;
pub mod xml;

pub use error::{EixError, Result};
pub use header::{DBHeader, CURRENT_VERSION};
pub use package::{Package, Version};
pub use reader::PackageReader;
