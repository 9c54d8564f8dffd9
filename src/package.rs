//! In-memory package and version model, plus the per-version wire
//! codec for everything the header doesn't own (mask/keyword flags,
//! iuse, restrict/properties bitmasks, optional dependency data).

use crate::codec::{Reader, Writer};
use crate::error::{EixError, Result};
use crate::header::{DBHeader, StringHash};
use std::cmp::Ordering;
use std::io::{Read, Write};

/// `isHardMasked` / `isProfileMask` / `isPackageMask`, plus the
/// installed-state bits the original encodes in the same byte
/// (`in_profile`, `marked`) used by [`Version::is_installed`].
pub mod mask {
    pub const NONE: u8 = 0x00;
    pub const PACKAGE: u8 = 0x01;
    pub const PROFILE: u8 = 0x02;
    pub const HARD: u8 = PACKAGE | PROFILE;
    pub const SYSTEM: u8 = 0x04;
    pub const WORLD: u8 = 0x08;
    pub const WORLD_SETS: u8 = 0x10;
    pub const IN_PROFILE: u8 = 0x20;
    pub const MARKED: u8 = 0x40;
}

/// Bitset wrapper over the raw mask byte, per spec's named predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaskFlags(pub u8);

impl MaskFlags {
    pub fn is_hard_masked(self) -> bool {
        self.0 & mask::HARD != 0
    }
    pub fn is_profile_mask(self) -> bool {
        self.0 & mask::PROFILE != 0
    }
    pub fn is_package_mask(self) -> bool {
        self.0 & mask::PACKAGE != 0
    }
    pub fn is_installed(self) -> bool {
        self.0 & (mask::IN_PROFILE | mask::MARKED) != 0
    }
}

/// Architecture-acceptance state of one version, a tagged
/// discrimination so that "stable" and "unstable" can never both hold
/// at once — the invariant falls out of the type rather than needing a
/// runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordsFlags {
    Stable,
    Unstable,
    MinusKeyword,
    AlienStable,
    AlienUnstable,
    MinusAsterisk,
    Missing,
}

impl KeywordsFlags {
    pub fn is_stable(self) -> bool {
        matches!(self, KeywordsFlags::Stable)
    }
    pub fn is_unstable(self) -> bool {
        matches!(self, KeywordsFlags::Unstable)
    }

    /// Classify `keyword` (a single token from a KEYWORDS string, e.g.
    /// `"amd64"`, `"~amd64"`, `"-amd64"`, `"-*"`) relative to `arch`.
    pub fn classify(keyword: &str, arch: &str) -> Self {
        if keyword == "-*" {
            return KeywordsFlags::MinusAsterisk;
        }
        if let Some(rest) = keyword.strip_prefix('-') {
            if rest == arch {
                return KeywordsFlags::MinusKeyword;
            }
            return KeywordsFlags::Missing;
        }
        if let Some(rest) = keyword.strip_prefix('~') {
            if rest == arch {
                return KeywordsFlags::Unstable;
            }
            return KeywordsFlags::AlienUnstable;
        }
        if keyword == arch {
            return KeywordsFlags::Stable;
        }
        KeywordsFlags::AlienStable
    }

    fn to_tag(self) -> u8 {
        match self {
            KeywordsFlags::Stable => 0,
            KeywordsFlags::Unstable => 1,
            KeywordsFlags::MinusKeyword => 2,
            KeywordsFlags::AlienStable => 3,
            KeywordsFlags::AlienUnstable => 4,
            KeywordsFlags::MinusAsterisk => 5,
            KeywordsFlags::Missing => 6,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => KeywordsFlags::Stable,
            1 => KeywordsFlags::Unstable,
            2 => KeywordsFlags::MinusKeyword,
            3 => KeywordsFlags::AlienStable,
            4 => KeywordsFlags::AlienUnstable,
            5 => KeywordsFlags::MinusAsterisk,
            6 => KeywordsFlags::Missing,
            other => return Err(EixError::corrupt(format!("bad keyword-flags tag {other}"))),
        })
    }
}

/// Named restrict bits. Stored as a plain `u64` bitmask on [`Version`];
/// this module just gives the bits names.
pub mod restrict {
    pub const NONE: u64 = 0;
    pub const BINCHECKS: u64 = 1 << 0;
    pub const STRIP: u64 = 1 << 1;
    pub const TEST: u64 = 1 << 2;
    pub const USERPRIV: u64 = 1 << 3;
    pub const INSTALLSOURCES: u64 = 1 << 4;
    pub const FETCH: u64 = 1 << 5;
    pub const MIRROR: u64 = 1 << 6;
    pub const PRIMARYURI: u64 = 1 << 7;
    pub const BINDIST: u64 = 1 << 8;
    pub const PARALLEL: u64 = 1 << 9;

    pub const NAMES: &[(u64, &str)] = &[
        (BINCHECKS, "binchecks"),
        (STRIP, "strip"),
        (TEST, "test"),
        (USERPRIV, "userpriv"),
        (INSTALLSOURCES, "installsources"),
        (FETCH, "fetch"),
        (MIRROR, "mirror"),
        (PRIMARYURI, "primaryuri"),
        (BINDIST, "bindist"),
        (PARALLEL, "parallel"),
    ];
}

/// Named properties bits.
pub mod properties {
    pub const NONE: u64 = 0;
    pub const INTERACTIVE: u64 = 1 << 0;
    pub const LIVE: u64 = 1 << 1;
    pub const VIRTUAL: u64 = 1 << 2;
    pub const SET: u64 = 1 << 3;

    pub const NAMES: &[(u64, &str)] = &[
        (INTERACTIVE, "interactive"),
        (LIVE, "live"),
        (VIRTUAL, "virtual"),
        (SET, "set"),
    ];
}

/// A use-flag declaration: plain, default-on (`+flag`) or default-off
/// (`-flag`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IUseState {
    Normal,
    Plus,
    Minus,
}

/// One entry in a version's `IUSE`. Ordered (and compared for
/// equality) by `name` alone — see spec §9 "Set<IUse> ordering" — so
/// that sorting a set of these reproduces on-disk order regardless of
/// how the default-state prefix is spelled.
#[derive(Debug, Clone, Eq)]
pub struct IUse {
    pub name: String,
    pub state: IUseState,
}

impl IUse {
    pub fn parse(token: &str) -> Self {
        if let Some(rest) = token.strip_prefix('+') {
            IUse {
                name: rest.to_string(),
                state: IUseState::Plus,
            }
        } else if let Some(rest) = token.strip_prefix('-') {
            IUse {
                name: rest.to_string(),
                state: IUseState::Minus,
            }
        } else {
            IUse {
                name: token.to_string(),
                state: IUseState::Normal,
            }
        }
    }
}

impl PartialEq for IUse {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl PartialOrd for IUse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for IUse {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

/// One piece of a parsed version string: either a dotted numeric
/// component, a trailing single-letter suffix, or one of the named
/// modifiers (`_alpha`, `_beta`, `_pre`, `_rc`, `_p`, `-r`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicPart {
    pub part_type: PartType,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartType {
    Garbage = 0,
    Alpha = 1,
    Beta = 2,
    Pre = 3,
    Rc = 4,
    Revision = 5,
    InterRev = 6,
    Patch = 7,
    Character = 8,
    Primary = 9,
    First = 10,
}

impl PartType {
    fn from_u64(v: u64) -> Self {
        match v {
            1 => PartType::Alpha,
            2 => PartType::Beta,
            3 => PartType::Pre,
            4 => PartType::Rc,
            5 => PartType::Revision,
            6 => PartType::InterRev,
            7 => PartType::Patch,
            8 => PartType::Character,
            9 => PartType::Primary,
            10 => PartType::First,
            _ => PartType::Garbage,
        }
    }

    /// Ordering rank among version *suffixes* only (ignored for the
    /// leading numeric run): alpha < beta < pre < rc < release < p.
    fn suffix_rank(self) -> i8 {
        match self {
            PartType::Alpha => 0,
            PartType::Beta => 1,
            PartType::Pre => 2,
            PartType::Rc => 3,
            PartType::Patch => 5,
            _ => 4,
        }
    }

    fn is_suffix(self) -> bool {
        matches!(
            self,
            PartType::Alpha | PartType::Beta | PartType::Pre | PartType::Rc | PartType::Patch
        )
    }
}

fn render_full_version(parts: &[BasicPart]) -> String {
    let mut s = String::new();
    for part in parts {
        match part.part_type {
            PartType::First | PartType::Character | PartType::Garbage => s.push_str(&part.content),
            PartType::Alpha => {
                s.push_str("_alpha");
                s.push_str(&part.content);
            }
            PartType::Beta => {
                s.push_str("_beta");
                s.push_str(&part.content);
            }
            PartType::Pre => {
                s.push_str("_pre");
                s.push_str(&part.content);
            }
            PartType::Rc => {
                s.push_str("_rc");
                s.push_str(&part.content);
            }
            PartType::Patch => {
                s.push_str("_p");
                s.push_str(&part.content);
            }
            PartType::Revision => {
                s.push_str("-r");
                s.push_str(&part.content);
            }
            PartType::InterRev | PartType::Primary => {
                s.push('.');
                s.push_str(&part.content);
            }
        }
    }
    s
}

/// Compare two versions the way Portage does: numeric dotted prefix
/// first, then the alpha/beta/pre/rc/release/p suffix rank (and its
/// attached number), then the revision, last.
fn compare_parts(a: &[BasicPart], b: &[BasicPart]) -> Ordering {
    let a_prefix_end = a.iter().position(|p| p.part_type.is_suffix() || p.part_type == PartType::Revision).unwrap_or(a.len());
    let b_prefix_end = b.iter().position(|p| p.part_type.is_suffix() || p.part_type == PartType::Revision).unwrap_or(b.len());

    for i in 0..a_prefix_end.max(b_prefix_end) {
        let av = a.get(i).map(|p| p.content.as_str()).unwrap_or("0");
        let bv = b.get(i).map(|p| p.content.as_str()).unwrap_or("0");
        let ord = match (av.parse::<u64>(), bv.parse::<u64>()) {
            (Ok(an), Ok(bn)) => an.cmp(&bn),
            _ => av.cmp(bv),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    let a_suffix = a.iter().find(|p| p.part_type.is_suffix());
    let b_suffix = b.iter().find(|p| p.part_type.is_suffix());
    let a_rank = a_suffix.map(|p| p.part_type.suffix_rank()).unwrap_or(4);
    let b_rank = b_suffix.map(|p| p.part_type.suffix_rank()).unwrap_or(4);
    if a_rank != b_rank {
        return a_rank.cmp(&b_rank);
    }
    let a_num: u64 = a_suffix.and_then(|p| p.content.parse().ok()).unwrap_or(0);
    let b_num: u64 = b_suffix.and_then(|p| p.content.parse().ok()).unwrap_or(0);
    if a_num != b_num {
        return a_num.cmp(&b_num);
    }

    let a_rev: u64 = a
        .iter()
        .find(|p| p.part_type == PartType::Revision)
        .and_then(|p| p.content.parse().ok())
        .unwrap_or(0);
    let b_rev: u64 = b
        .iter()
        .find(|p| p.part_type == PartType::Revision)
        .and_then(|p| p.content.parse().ok())
        .unwrap_or(0);
    a_rev.cmp(&b_rev)
}

/// Dependency word-vectors, present only when the header's
/// `use_depend` feature bit is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Depend {
    pub depend: Vec<String>,
    pub rdepend: Vec<String>,
    pub pdepend: Vec<String>,
    pub bdepend: Vec<String>,
    pub idepend: Vec<String>,
}

/// One release of a package: its own keyword/mask flags, use flags and
/// metadata. `full_version` and `parts` always agree —
/// `full_version == render_full_version(&parts)` — `parts` is kept
/// around only because it drives ordering and `full_version` is the
/// field spec.md names.
#[derive(Debug, Clone)]
pub struct Version {
    pub full_version: String,
    parts: Vec<BasicPart>,
    pub slotname: String,
    pub overlay_key: u64,
    pub maskflags: MaskFlags,
    pub keyflags: KeywordsFlags,
    pub iuse: Vec<IUse>,
    pub restrict_flags: u64,
    pub properties_flags: u64,
    pub full_keywords: String,
    pub effective_keywords: String,

    // eapi/required_use/depend/src_uri are version-gated the same way
    // upstream eix gates EAPI/REQUIRED_USE/BDEPEND/IDEPEND/SRC_URI.
    pub eapi: String,
    pub required_use: Vec<String>,
    pub depend: Option<Depend>,
    pub src_uri: Option<String>,
}

/// Split a Portage version string into the numeric prefix, one
/// optional `_alpha`/`_beta`/`_pre`/`_rc`/`_p` suffix, and a trailing
/// `-rN` revision. Inverse of [`render_full_version`] for every string
/// this crate itself produces; used by cache backends that only ever
/// see the string form and never the wire-encoded parts.
fn parse_version_parts(full_version: &str) -> Vec<BasicPart> {
    let mut s = full_version;
    let mut revision_part = None;
    if let Some(pos) = s.rfind("-r") {
        let digits = &s[pos + 2..];
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            revision_part = Some(BasicPart {
                part_type: PartType::Revision,
                content: digits.to_string(),
            });
            s = &s[..pos];
        }
    }

    let mut suffix_part = None;
    for (tag, part_type) in [
        ("_alpha", PartType::Alpha),
        ("_beta", PartType::Beta),
        ("_pre", PartType::Pre),
        ("_rc", PartType::Rc),
        ("_p", PartType::Patch),
    ] {
        if let Some(pos) = s.find(tag) {
            suffix_part = Some(BasicPart {
                part_type,
                content: s[pos + tag.len()..].to_string(),
            });
            s = &s[..pos];
            break;
        }
    }

    let mut parts: Vec<BasicPart> = s
        .split('.')
        .enumerate()
        .map(|(i, comp)| BasicPart {
            part_type: if i == 0 { PartType::First } else { PartType::Primary },
            content: comp.to_string(),
        })
        .collect();
    parts.extend(suffix_part);
    parts.extend(revision_part);
    parts
}

impl Version {
    pub fn is_installed(&self) -> bool {
        self.maskflags.is_installed()
    }

    /// Build a `Version` from the string-typed fields a cache backend
    /// reads directly off disk (no wire format involved). `keyflags`
    /// is left at `Missing` here — it's arch-dependent and gets
    /// classified from `full_keywords` before the index is written, so
    /// a freshly-scanned cache entry has no value for it yet. Once
    /// written to the index it round-trips through the wire like any
    /// other field.
    #[allow(clippy::too_many_arguments)]
    pub fn from_cache_fields(
        full_version: String,
        slotname: String,
        full_keywords: String,
        iuse: Vec<IUse>,
        restrict_flags: u64,
        properties_flags: u64,
        depend: Option<Depend>,
    ) -> Self {
        let parts = parse_version_parts(&full_version);
        let effective_keywords = full_keywords.clone();
        Version {
            full_version,
            parts,
            slotname,
            overlay_key: 0,
            maskflags: MaskFlags(0),
            keyflags: KeywordsFlags::Missing,
            iuse,
            restrict_flags,
            properties_flags,
            full_keywords,
            effective_keywords,
            eapi: String::new(),
            required_use: Vec::new(),
            depend,
            src_uri: None,
        }
    }

    fn read(r: &mut Reader<impl Read>, header: &DBHeader) -> Result<Self> {
        let eapi = if header.version >= 36 {
            header.eapi_hash.get_hash_string(r)?
        } else {
            String::new()
        };

        let mask_flags = MaskFlags(r.get_flags_u8()?);
        let key_flags = KeywordsFlags::from_tag(r.get_u8()?)?;
        let properties_flags = r.get_number()?;
        let restrict_flags = r.get_number()?;

        let full_keywords_words = header.keywords_hash.get_hash_words(r)?;
        let full_keywords = full_keywords_words.join(" ");

        let part_count = r.get_number()? as usize;
        let mut parts = Vec::with_capacity(part_count);
        for _ in 0..part_count {
            let val = r.get_number()?;
            let part_type = PartType::from_u64(val % 32);
            let len = (val / 32) as usize;
            let content = if len == 0 {
                String::new()
            } else {
                let mut buf = vec![0u8; len];
                // BasicPart content is raw bytes of known length, not a
                // separately length-prefixed string.
                for b in buf.iter_mut() {
                    *b = r.get_u8()?;
                }
                String::from_utf8(buf).map_err(|e| EixError::corrupt(format!("invalid UTF-8 in version part: {e}")))?
            };
            parts.push(BasicPart { part_type, content });
        }
        let full_version = render_full_version(&parts);

        let slotname = header.slot_hash.get_hash_string(r)?;

        let overlay_key = r.get_number()?;
        header.get_overlay(overlay_key)?;

        let iuse_words = header.iuse_hash.get_hash_words(r)?;
        let iuse = iuse_words.iter().map(|w| IUse::parse(w)).collect();

        let required_use = if header.features.use_required_use {
            header.iuse_hash.get_hash_words(r)?
        } else {
            Vec::new()
        };

        let depend = if header.features.use_depend {
            let _offset = r.get_number()?;
            let mut dep = Depend {
                depend: header.depend_hash.get_hash_words(r)?,
                rdepend: header.depend_hash.get_hash_words(r)?,
                pdepend: header.depend_hash.get_hash_words(r)?,
                bdepend: Vec::new(),
                idepend: Vec::new(),
            };
            if header.version > 31 {
                dep.bdepend = header.depend_hash.get_hash_words(r)?;
            }
            if header.version > 38 {
                dep.idepend = header.depend_hash.get_hash_words(r)?;
            }
            Some(dep)
        } else {
            None
        };

        let src_uri = if header.features.use_src_uri {
            Some(r.get_string()?)
        } else {
            None
        };

        let effective_keywords = full_keywords.clone();

        Ok(Version {
            full_version,
            parts,
            slotname,
            overlay_key,
            maskflags: mask_flags,
            keyflags: key_flags,
            iuse,
            restrict_flags,
            properties_flags,
            full_keywords,
            effective_keywords,
            eapi,
            required_use,
            depend,
            src_uri,
        })
    }

    fn write(&self, w: &mut Writer<impl Write>, header: &mut DBHeader) -> Result<()> {
        if header.version >= 36 {
            header.eapi_hash.put_hash_string(w, &self.eapi)?;
        }
        w.put_flags_u8(self.maskflags.0)?;
        w.put_u8(self.keyflags.to_tag())?;
        w.put_number(self.properties_flags)?;
        w.put_number(self.restrict_flags)?;

        let keyword_words: Vec<String> = self
            .full_keywords
            .split_whitespace()
            .map(|s| s.to_string())
            .collect();
        header.keywords_hash.put_hash_words(w, &keyword_words)?;

        w.put_number(self.parts.len() as u64)?;
        for part in &self.parts {
            let val = (part.content.len() as u64) * 32 + (part.part_type as u64);
            w.put_number(val)?;
            for b in part.content.as_bytes() {
                w.put_u8(*b)?;
            }
        }

        header.slot_hash.put_hash_string(w, &self.slotname)?;
        w.put_number(self.overlay_key)?;

        let iuse_words: Vec<String> = self
            .iuse
            .iter()
            .map(|u| match u.state {
                IUseState::Normal => u.name.clone(),
                IUseState::Plus => format!("+{}", u.name),
                IUseState::Minus => format!("-{}", u.name),
            })
            .collect();
        header.iuse_hash.put_hash_words(w, &iuse_words)?;

        if header.features.use_required_use {
            header.iuse_hash.put_hash_words(w, &self.required_use)?;
        }

        if header.features.use_depend {
            w.put_number(0)?;
            let dep = self.depend.clone().unwrap_or_default();
            header.depend_hash.put_hash_words(w, &dep.depend)?;
            header.depend_hash.put_hash_words(w, &dep.rdepend)?;
            header.depend_hash.put_hash_words(w, &dep.pdepend)?;
            if header.version > 31 {
                header.depend_hash.put_hash_words(w, &dep.bdepend)?;
            }
            if header.version > 38 {
                header.depend_hash.put_hash_words(w, &dep.idepend)?;
            }
        }

        if header.features.use_src_uri {
            w.put_string(self.src_uri.as_deref().unwrap_or(""))?;
        }

        Ok(())
    }

    fn skip(r: &mut Reader<impl Read>, header: &DBHeader) -> Result<()> {
        // Decoding and discarding is the simplest correct skip: every
        // field here is small, and this guarantees the cursor ends up
        // exactly where a full decode would leave it.
        Self::read(r, header).map(|_| ())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        compare_parts(&self.parts, &other.parts) == Ordering::Equal
    }
}
impl Eq for Version {}
impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_parts(&self.parts, &other.parts)
    }
}

/// A named distribution of software at category/name granularity,
/// containing its ordered versions.
#[derive(Debug, Clone)]
pub struct Package {
    pub category: String,
    pub name: String,
    pub desc: String,
    pub homepage: String,
    pub licenses: String,
    pub provide: String,
    pub versions: Vec<Version>,
    pub have_same_overlay_key: bool,
    pub overlay_key: u64,
    /// Filled late by the query driver from the installed-package
    /// database; empty until then.
    pub installed_versions: String,
}

impl Package {
    pub fn new(category: String, name: String) -> Self {
        Package {
            category,
            name,
            desc: String::new(),
            homepage: String::new(),
            licenses: String::new(),
            provide: String::new(),
            versions: Vec::new(),
            have_same_overlay_key: true,
            overlay_key: 0,
            installed_versions: String::new(),
        }
    }

    /// Recompute `have_same_overlay_key` / `overlay_key` from the
    /// current version list. Called by the writer before serializing
    /// and by anything that mutates `versions` directly.
    pub fn recompute_overlay_key(&mut self) {
        match self.versions.first() {
            None => {
                self.have_same_overlay_key = true;
                self.overlay_key = 0;
            }
            Some(first) => {
                let key = first.overlay_key;
                self.have_same_overlay_key = self.versions.iter().all(|v| v.overlay_key == key);
                self.overlay_key = key;
            }
        }
    }

    /// Decode just the package name — the cheapest possible progress,
    /// used by [`crate::reader::PackageReader`] to reach the `Name`
    /// state.
    pub(crate) fn read_name(r: &mut Reader<impl Read>) -> Result<String> {
        r.get_string()
    }

    /// Decode `desc, homepage, licenses, provide` — the fields between
    /// `Name` and `Versions`.
    pub(crate) fn read_description_fields(
        r: &mut Reader<impl Read>,
        header: &DBHeader,
    ) -> Result<(String, String, String, String)> {
        let desc = r.get_string()?;
        let homepage = r.get_string()?;
        let licenses = header.license_hash.get_hash_string(r)?;
        let provide = r.get_string()?;
        Ok((desc, homepage, licenses, provide))
    }

    /// Skip the same fields, without allocating their contents.
    pub(crate) fn skip_description_fields(r: &mut Reader<impl Read>) -> Result<()> {
        r.skip_string()?; // desc
        r.skip_string()?; // homepage
        r.skip_number()?; // licenses (hash index)
        r.skip_string()?; // provide
        Ok(())
    }

    /// Decode `have_same_overlay_key, overlay_key?, version_count,
    /// versions...` — the fields between `Description` and the fully
    /// decoded record.
    pub(crate) fn read_versions_fields(
        r: &mut Reader<impl Read>,
        header: &DBHeader,
    ) -> Result<(bool, u64, Vec<Version>)> {
        let have_same_overlay_key = r.get_u8()? != 0;
        let overlay_key = if have_same_overlay_key { r.get_number()? } else { 0 };

        let version_count = r.get_number()? as usize;
        let mut versions = Vec::with_capacity(version_count);
        for _ in 0..version_count {
            versions.push(Version::read(r, header)?);
        }
        Ok((have_same_overlay_key, overlay_key, versions))
    }

    /// Skip the same fields, without allocating any `Version` values.
    pub(crate) fn skip_versions_fields(r: &mut Reader<impl Read>, header: &DBHeader) -> Result<()> {
        let have_same_overlay_key = r.get_u8()? != 0;
        if have_same_overlay_key {
            r.skip_number()?;
        }
        let version_count = r.get_number()? as usize;
        for _ in 0..version_count {
            Version::skip(r, header)?;
        }
        Ok(())
    }

    pub(crate) fn read(r: &mut Reader<impl Read>, header: &DBHeader, category: &str) -> Result<Self> {
        let name = Self::read_name(r)?;
        let (desc, homepage, licenses, provide) = Self::read_description_fields(r, header)?;
        let (have_same_overlay_key, overlay_key, versions) = Self::read_versions_fields(r, header)?;

        let mut pkg = Package {
            category: category.to_string(),
            name,
            desc,
            homepage,
            licenses,
            provide,
            versions,
            have_same_overlay_key,
            overlay_key,
            installed_versions: String::new(),
        };
        if !have_same_overlay_key {
            pkg.recompute_overlay_key();
        }
        Ok(pkg)
    }

    pub(crate) fn write(&self, w: &mut Writer<impl Write>, header: &mut DBHeader) -> Result<()> {
        w.put_string(&self.name)?;
        w.put_string(&self.desc)?;
        w.put_string(&self.homepage)?;
        header.license_hash.put_hash_string(w, &self.licenses)?;
        w.put_string(&self.provide)?;

        w.put_u8(if self.have_same_overlay_key { 1 } else { 0 })?;
        if self.have_same_overlay_key {
            w.put_number(self.overlay_key)?;
        }

        w.put_number(self.versions.len() as u64)?;
        for v in &self.versions {
            v.write(w, header)?;
        }
        Ok(())
    }

    /// Advance `r` past a package record without constructing it.
    pub(crate) fn skip(r: &mut Reader<impl Read>, header: &DBHeader) -> Result<()> {
        r.skip_string()?; // name
        Self::skip_description_fields(r)?;
        Self::skip_versions_fields(r, header)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{DBHeader, OverlayIdent};
    use std::io::Cursor;

    fn header_with_overlay() -> DBHeader {
        let mut h = DBHeader::new_current();
        h.intern_overlay(OverlayIdent {
            path: "/usr/portage".into(),
            label: "gentoo".into(),
        });
        h
    }

    fn sample_version() -> Version {
        Version {
            full_version: "1.2.3_alpha1-r1".into(),
            parts: vec![
                BasicPart {
                    part_type: PartType::First,
                    content: "1".into(),
                },
                BasicPart {
                    part_type: PartType::Primary,
                    content: "2".into(),
                },
                BasicPart {
                    part_type: PartType::Primary,
                    content: "3".into(),
                },
                BasicPart {
                    part_type: PartType::Alpha,
                    content: "1".into(),
                },
                BasicPart {
                    part_type: PartType::Revision,
                    content: "1".into(),
                },
            ],
            slotname: "0".into(),
            overlay_key: 0,
            maskflags: MaskFlags(0),
            keyflags: KeywordsFlags::Stable,
            iuse: vec![],
            restrict_flags: 0,
            properties_flags: 0,
            full_keywords: "amd64 ~x86".into(),
            effective_keywords: "amd64 ~x86".into(),
            eapi: "8".into(),
            required_use: vec![],
            depend: None,
            src_uri: None,
        }
    }

    #[test]
    fn full_version_rendering_matches_parts() {
        let v = sample_version();
        assert_eq!(render_full_version(&v.parts), "1.2.3_alpha1-r1");
    }

    #[test]
    fn version_ordering_suffix_before_release_before_patch() {
        fn v(parts: Vec<(PartType, &str)>) -> Version {
            let mut vv = sample_version();
            vv.parts = parts
                .into_iter()
                .map(|(t, c)| BasicPart {
                    part_type: t,
                    content: c.to_string(),
                })
                .collect();
            vv
        }
        let alpha = v(vec![(PartType::First, "1"), (PartType::Alpha, "1")]);
        let release = v(vec![(PartType::First, "1")]);
        let patch = v(vec![(PartType::First, "1"), (PartType::Patch, "1")]);
        assert!(alpha < release);
        assert!(release < patch);

        let r0 = v(vec![(PartType::First, "1")]);
        let r1 = v(vec![(PartType::First, "1"), (PartType::Revision, "1")]);
        assert!(r0 < r1);

        let v1_1 = v(vec![(PartType::First, "1"), (PartType::Primary, "1")]);
        let v1_10 = v(vec![(PartType::First, "1"), (PartType::Primary, "10")]);
        assert!(v1_1 < v1_10, "numeric compare, not lexicographic");
    }

    #[test]
    fn iuse_orders_and_equals_by_name_only() {
        let a = IUse::parse("+foo");
        let b = IUse::parse("-foo");
        assert_eq!(a, b);
        let c = IUse::parse("bar");
        assert!(c < a);
    }

    #[test]
    fn keywords_flags_classify() {
        assert_eq!(KeywordsFlags::classify("amd64", "amd64"), KeywordsFlags::Stable);
        assert_eq!(KeywordsFlags::classify("~amd64", "amd64"), KeywordsFlags::Unstable);
        assert_eq!(KeywordsFlags::classify("-amd64", "amd64"), KeywordsFlags::MinusKeyword);
        assert_eq!(KeywordsFlags::classify("-*", "amd64"), KeywordsFlags::MinusAsterisk);
        assert_eq!(KeywordsFlags::classify("x86", "amd64"), KeywordsFlags::AlienStable);
        assert_eq!(KeywordsFlags::classify("~x86", "amd64"), KeywordsFlags::AlienUnstable);
    }

    #[test]
    fn version_roundtrip_through_wire() {
        let header = header_with_overlay();
        let v = sample_version();

        let mut buf = Vec::new();
        let mut header_mut = DBHeader::new_current();
        header_mut.intern_overlay(OverlayIdent {
            path: "/usr/portage".into(),
            label: "gentoo".into(),
        });
        {
            let mut w = Writer::new(&mut buf);
            v.write(&mut w, &mut header_mut).unwrap();
        }

        let mut r = Reader::new(Cursor::new(buf));
        let decoded = Version::read(&mut r, &header).unwrap();
        assert_eq!(decoded.full_version, v.full_version);
        assert_eq!(decoded.slotname, v.slotname);
        assert_eq!(decoded.eapi, v.eapi);
        assert_eq!(decoded.keyflags, v.keyflags);
    }

    #[test]
    fn package_skip_matches_full_decode_cursor() {
        let header = header_with_overlay();
        let mut pkg = Package::new("sys-apps".into(), "eix".into());
        pkg.desc = "small utility for searching ebuilds".into();
        pkg.versions.push(sample_version());

        let mut buf = Vec::new();
        let mut header_mut = DBHeader::new_current();
        header_mut.intern_overlay(OverlayIdent {
            path: "/usr/portage".into(),
            label: "gentoo".into(),
        });
        {
            let mut w = Writer::new(&mut buf);
            pkg.write(&mut w, &mut header_mut).unwrap();
        }
        // Trailing marker byte to prove skip() doesn't overrun into it.
        buf.push(0xAB);

        let mut full = Reader::new(Cursor::new(buf.clone()));
        Package::read(&mut full, &header, "sys-apps").unwrap();
        let pos_after_full = full.position();

        let mut skipped = Reader::new(Cursor::new(buf));
        Package::skip(&mut skipped, &header).unwrap();
        assert_eq!(skipped.position(), pos_after_full);
    }
}
