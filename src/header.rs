//! The top-level index header: format version, record count, overlay
//! table, and the interned string dictionaries shared by every package
//! record that follows.

use crate::codec::{Reader, Writer};
use crate::error::{EixError, Result};
use std::collections::HashMap;
use std::io::{Read, Write};

/// The on-disk format version this crate reads and writes. A mismatch
/// is always fatal — see [`DBHeader::read`].
pub const CURRENT_VERSION: u32 = 39;

/// Magic bytes every index file starts with.
pub const DB_MAGIC: &[u8] = b"eix\n";

/// An interned-string dictionary: `add` de-duplicates by value and
/// hands back a stable index; `get` resolves an index back to the
/// string. Shared by every per-version field (keywords, use-flag names,
/// slot, license, eapi, depend atoms) to keep the index compact.
#[derive(Debug, Clone, Default)]
pub struct StringHash {
    index_to_string: Vec<String>,
    string_to_index: HashMap<String, usize>,
}

impl StringHash {
    pub fn new() -> Self {
        StringHash::default()
    }

    pub fn from_strings(strings: Vec<String>) -> Self {
        let mut hash = StringHash::new();
        for s in strings {
            hash.add(s);
        }
        hash
    }

    pub fn get_index(&self, s: &str) -> Option<usize> {
        self.string_to_index.get(s).copied()
    }

    pub fn get_string(&self, index: usize) -> Option<&str> {
        self.index_to_string.get(index).map(|s| s.as_str())
    }

    /// Intern `s`, returning its (possibly pre-existing) index.
    pub fn add(&mut self, s: String) -> usize {
        if let Some(&idx) = self.string_to_index.get(&s) {
            return idx;
        }
        let idx = self.index_to_string.len();
        self.string_to_index.insert(s.clone(), idx);
        self.index_to_string.push(s);
        idx
    }

    pub fn len(&self) -> usize {
        self.index_to_string.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_to_string.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.index_to_string.iter().map(|s| s.as_str())
    }

    fn read(r: &mut Reader<impl Read>) -> Result<Self> {
        let count = r.get_number()? as usize;
        let mut hash = StringHash::new();
        for _ in 0..count {
            hash.add(r.get_string()?);
        }
        Ok(hash)
    }

    fn write(&self, w: &mut Writer<impl Write>) -> Result<()> {
        w.put_number(self.index_to_string.len() as u64)?;
        for s in &self.index_to_string {
            w.put_string(s)?;
        }
        Ok(())
    }

    pub(crate) fn get_hash_string(&self, r: &mut Reader<impl Read>) -> Result<String> {
        let index = r.get_number()? as usize;
        self.get_string(index).map(|s| s.to_string()).ok_or_else(|| {
            EixError::corrupt(format!(
                "string-hash index {index} out of range (hash has {} entries)",
                self.len()
            ))
        })
    }

    pub(crate) fn put_hash_string(&mut self, w: &mut Writer<impl Write>, s: &str) -> Result<()> {
        let idx = self.add(s.to_string());
        w.put_number(idx as u64)
    }

    pub(crate) fn get_hash_words(&self, r: &mut Reader<impl Read>) -> Result<Vec<String>> {
        r.get_vector(|r| self.get_hash_string(r))
    }

    pub(crate) fn put_hash_words(&mut self, w: &mut Writer<impl Write>, words: &[String]) -> Result<()> {
        w.put_number(words.len() as u64)?;
        for word in words {
            self.put_hash_string(w, word)?;
        }
        Ok(())
    }
}

/// An overlay (a.k.a. repository): a supplementary ebuild tree layered
/// over the main one. Index 0 in [`DBHeader::overlays`] is always the
/// main tree. Equality is by path, per spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayIdent {
    pub path: String,
    pub label: String,
}

impl OverlayIdent {
    fn read(r: &mut Reader<impl Read>) -> Result<Self> {
        let path = r.get_string()?;
        let label = r.get_string()?;
        Ok(OverlayIdent { path, label })
    }

    fn write(&self, w: &mut Writer<impl Write>) -> Result<()> {
        w.put_string(&self.path)?;
        w.put_string(&self.label)?;
        Ok(())
    }
}

/// Feature bits controlling which optional per-version fields are
/// present on disk, stamped once in the header and consulted by every
/// package record (see `package::Version::read`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveFeatures {
    pub use_depend: bool,
    pub use_required_use: bool,
    pub use_src_uri: bool,
}

const SAVE_BITMASK_DEP: u64 = 0x01;
const SAVE_BITMASK_REQUIRED_USE: u64 = 0x02;
const SAVE_BITMASK_SRC_URI: u64 = 0x04;

impl SaveFeatures {
    fn from_bits(bits: u64) -> Self {
        SaveFeatures {
            use_depend: bits & SAVE_BITMASK_DEP != 0,
            use_required_use: bits & SAVE_BITMASK_REQUIRED_USE != 0,
            use_src_uri: bits & SAVE_BITMASK_SRC_URI != 0,
        }
    }

    fn to_bits(self) -> u64 {
        let mut bits = 0;
        if self.use_depend {
            bits |= SAVE_BITMASK_DEP;
        }
        if self.use_required_use {
            bits |= SAVE_BITMASK_REQUIRED_USE;
        }
        if self.use_src_uri {
            bits |= SAVE_BITMASK_SRC_URI;
        }
        bits
    }
}

/// Top-level index metadata, read once and owned by the driver for the
/// lifetime of the query/indexing run.
pub struct DBHeader {
    pub version: u32,
    pub size: u64,
    pub overlays: Vec<OverlayIdent>,
    pub world_sets: Vec<String>,
    pub features: SaveFeatures,

    pub eapi_hash: StringHash,
    pub license_hash: StringHash,
    pub keywords_hash: StringHash,
    pub iuse_hash: StringHash,
    pub slot_hash: StringHash,
    pub depend_hash: StringHash,
}

impl DBHeader {
    pub fn new_current() -> Self {
        DBHeader {
            version: CURRENT_VERSION,
            size: 0,
            overlays: Vec::new(),
            world_sets: Vec::new(),
            features: SaveFeatures::default(),
            eapi_hash: StringHash::new(),
            license_hash: StringHash::new(),
            keywords_hash: StringHash::new(),
            iuse_hash: StringHash::new(),
            slot_hash: StringHash::new(),
            depend_hash: StringHash::new(),
        }
    }

    pub fn count_overlays(&self) -> usize {
        self.overlays.len()
    }

    pub fn get_overlay(&self, i: u64) -> Result<&OverlayIdent> {
        self.overlays
            .get(i as usize)
            .ok_or_else(|| EixError::corrupt(format!("overlay index {i} out of range")))
    }

    /// Intern an overlay, de-duplicating by path — only the writer is
    /// allowed to mint overlay indices.
    pub fn intern_overlay(&mut self, ident: OverlayIdent) -> u64 {
        if let Some(pos) = self.overlays.iter().position(|o| o.path == ident.path) {
            return pos as u64;
        }
        self.overlays.push(ident);
        (self.overlays.len() - 1) as u64
    }

    /// Read the header. `expected_version` is the only version this
    /// call accepts — the format has no forward- or
    /// backward-compatible layout, so both older and newer stamps are
    /// rejected as obsolete. The CLI always passes [`CURRENT_VERSION`].
    pub fn read(source: &mut Reader<impl Read>, expected_version: u32) -> Result<Self> {
        let mut magic = vec![0u8; DB_MAGIC.len()];
        // Magic isn't length-prefixed, so read it as raw bytes directly.
        for byte in magic.iter_mut() {
            *byte = source.get_u8()?;
        }
        if magic != DB_MAGIC {
            return Err(EixError::corrupt(format!(
                "bad magic: expected {DB_MAGIC:?}, got {magic:?}"
            )));
        }

        let version = source.get_number()? as u32;
        if version != expected_version {
            return Err(EixError::ObsoleteFormat {
                found: version,
                expected: CURRENT_VERSION,
            });
        }

        let size = source.get_number()?;

        let overlay_count = source.get_number()? as usize;
        let mut overlays = Vec::with_capacity(overlay_count);
        for _ in 0..overlay_count {
            overlays.push(OverlayIdent::read(source)?);
        }

        let eapi_hash = StringHash::read(source)?;
        let license_hash = StringHash::read(source)?;
        let keywords_hash = StringHash::read(source)?;
        let iuse_hash = StringHash::read(source)?;
        let slot_hash = StringHash::read(source)?;

        let world_set_count = source.get_number()? as usize;
        let mut world_sets = Vec::with_capacity(world_set_count);
        for _ in 0..world_set_count {
            world_sets.push(source.get_string()?);
        }

        let bitmask = source.get_number()?;
        let features = SaveFeatures::from_bits(bitmask);

        let depend_hash = if features.use_depend {
            let _offset = source.get_number()?;
            StringHash::read(source)?
        } else {
            StringHash::new()
        };

        Ok(DBHeader {
            version,
            size,
            overlays,
            world_sets,
            features,
            eapi_hash,
            license_hash,
            keywords_hash,
            iuse_hash,
            slot_hash,
            depend_hash,
        })
    }

    pub fn write(&self, sink: &mut Writer<impl Write>) -> Result<()> {
        sink.inner_write_all(DB_MAGIC)?;
        sink.put_number(self.version as u64)?;
        sink.put_number(self.size)?;

        sink.put_number(self.overlays.len() as u64)?;
        for overlay in &self.overlays {
            overlay.write(sink)?;
        }

        self.eapi_hash.write(sink)?;
        self.license_hash.write(sink)?;
        self.keywords_hash.write(sink)?;
        self.iuse_hash.write(sink)?;
        self.slot_hash.write(sink)?;

        sink.put_number(self.world_sets.len() as u64)?;
        for s in &self.world_sets {
            sink.put_string(s)?;
        }

        sink.put_number(self.features.to_bits())?;

        if self.features.use_depend {
            sink.put_number(0)?; // offset placeholder, recomputed by a real indexer
            self.depend_hash.write(sink)?;
        }

        Ok(())
    }
}

// Small helper so `DBHeader::write` can emit the raw, non-length-prefixed
// magic through the same `Writer` the rest of the header uses.
impl<W: Write> Writer<W> {
    pub(crate) fn inner_write_all(&mut self, bytes: &[u8]) -> Result<()> {
        for b in bytes {
            self.put_u8(*b)?;
        }
        Ok(())
    }
}
