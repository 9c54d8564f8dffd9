//! Primitive wire encoding: variable-length integers, length-prefixed
//! strings, vectors, ordered sets and packed flag bytes.
//!
//! The integer encoding is the classic eix "compressed number": values
//! below the magic byte (`0xFF`) are stored as a single literal byte;
//! larger values are escaped with one `0xFF` per extra leading byte of
//! the minimal big-endian representation, with a special sentinel for a
//! leading byte that is itself `0xFF`. See [`Reader::get_number`] and
//! [`Writer::put_number`] for the exact algorithm; they must stay in
//! lock-step or the format stops round-tripping.

use crate::error::{EixError, Result};
use std::io::{Read, Write};

/// The escape byte: any lead byte equal to this means "value doesn't fit
/// in a single byte, keep reading".
pub const MAGICNUMCHAR: u8 = 0xFF;

/// Hard ceiling on any single length-prefixed field. A corrupt length
/// prefix must not be allowed to drive an unbounded allocation; this is
/// deliberately generous (64 MiB) since real ebuild metadata fields are
/// at most a few KiB.
pub const MAX_FIELD_LEN: u64 = 64 * 1024 * 1024;

/// Forward-only reader with a running byte offset, used by every
/// streaming decode path (header, package records, skip paths).
pub struct Reader<R: Read> {
    inner: R,
    pos: u64,
    /// Total stream length, when known (e.g. the file's size). Used to
    /// bound length-prefixed reads against "bytes actually remaining"
    /// rather than just the hard ceiling.
    len: Option<u64>,
}

impl<R: Read> Reader<R> {
    pub fn new(inner: R) -> Self {
        Reader {
            inner,
            pos: 0,
            len: None,
        }
    }

    pub fn with_len(inner: R, len: u64) -> Self {
        Reader {
            inner,
            pos: 0,
            len: Some(len),
        }
    }

    /// Current byte offset into the stream.
    pub fn position(&self) -> u64 {
        self.pos
    }

    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    /// Decode a variable-length integer. See the module docs for the
    /// wire format.
    pub fn get_number(&mut self) -> Result<u64> {
        let ch = self.get_u8()?;
        if ch != MAGICNUMCHAR {
            return Ok(ch as u64);
        }

        let mut to_get: usize = 1;
        let mut result: u64;
        loop {
            let c = self.get_u8()?;
            if c == MAGICNUMCHAR {
                to_get += 1;
                continue;
            }
            if c != 0 {
                result = c as u64;
            } else {
                result = MAGICNUMCHAR as u64;
                to_get -= 1;
            }
            break;
        }

        if to_get > 7 {
            return Err(EixError::corrupt(format!(
                "number encoding overflow: {to_get} trailing bytes"
            )));
        }

        for _ in 0..to_get {
            let byte = self.get_u8()?;
            result = (result << 8) | (byte as u64);
        }

        Ok(result)
    }

    /// Advance the cursor past a number without constructing it.
    pub fn skip_number(&mut self) -> Result<()> {
        self.get_number().map(|_| ())
    }

    fn check_len(&self, len: u64) -> Result<()> {
        if len > MAX_FIELD_LEN {
            return Err(EixError::corrupt(format!(
                "field length {len} exceeds the {MAX_FIELD_LEN} byte ceiling"
            )));
        }
        if let Some(total) = self.len {
            if self.pos + len > total {
                return Err(EixError::corrupt(format!(
                    "field of length {len} at offset {} overruns the {total} byte stream",
                    self.pos
                )));
            }
        }
        Ok(())
    }

    /// Decode a length-prefixed, opaque byte string as UTF-8.
    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_number()?;
        self.check_len(len)?;
        if len == 0 {
            return Ok(String::new());
        }
        let mut buf = vec![0u8; len as usize];
        self.fill(&mut buf)?;
        String::from_utf8(buf).map_err(|e| EixError::corrupt(format!("invalid UTF-8 string: {e}")))
    }

    /// Advance the cursor past a string without constructing it.
    pub fn skip_string(&mut self) -> Result<()> {
        let len = self.get_number()?;
        self.check_len(len)?;
        let mut remaining = len;
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let chunk = remaining.min(scratch.len() as u64) as usize;
            self.fill(&mut scratch[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(())
    }

    /// Decode a count-prefixed vector of `T`, via `elem`.
    pub fn get_vector<T>(&mut self, mut elem: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.get_number()? as usize;
        let mut out = Vec::with_capacity(count.min(1 << 16));
        for _ in 0..count {
            out.push(elem(self)?);
        }
        Ok(out)
    }

    /// Advance the cursor past a vector without constructing its
    /// elements, via a per-element skipper.
    pub fn skip_vector(&mut self, mut skip_elem: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        let count = self.get_number()? as usize;
        for _ in 0..count {
            skip_elem(self)?;
        }
        Ok(())
    }

    /// Decode a fixed-width flag byte (used for `mask_flags`,
    /// `properties_flags`).
    pub fn get_flags_u8(&mut self) -> Result<u8> {
        self.get_u8()
    }
}

/// Forward-only writer mirroring [`Reader`]. Every `put_*` here must
/// produce exactly what the matching `get_*` expects.
pub struct Writer<W: Write> {
    inner: W,
}

impl<W: Write> Writer<W> {
    pub fn new(inner: W) -> Self {
        Writer { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn put_u8(&mut self, b: u8) -> Result<()> {
        self.inner.write_all(&[b])?;
        Ok(())
    }

    /// Minimal big-endian byte representation of `n` (no leading zero
    /// byte), used to derive the escape sequence below.
    fn minimal_be_bytes(n: u64) -> Vec<u8> {
        if n == 0 {
            return vec![0];
        }
        let all = n.to_be_bytes();
        let first_nonzero = all.iter().position(|&b| b != 0).unwrap();
        all[first_nonzero..].to_vec()
    }

    /// Encode a variable-length integer. See the module docs for the
    /// wire format; this must stay the exact inverse of
    /// [`Reader::get_number`].
    pub fn put_number(&mut self, n: u64) -> Result<()> {
        if n < MAGICNUMCHAR as u64 {
            return self.put_u8(n as u8);
        }

        let bytes = Self::minimal_be_bytes(n);
        let leading_ff = if bytes[0] == MAGICNUMCHAR {
            bytes.len()
        } else {
            bytes.len() - 1
        };

        for _ in 0..leading_ff {
            self.put_u8(MAGICNUMCHAR)?;
        }

        if bytes[0] == MAGICNUMCHAR {
            self.put_u8(0)?;
            self.inner.write_all(&bytes[1..])?;
        } else {
            self.put_u8(bytes[0])?;
            self.inner.write_all(&bytes[1..])?;
        }
        Ok(())
    }

    /// Encode a length-prefixed, opaque byte string.
    pub fn put_string(&mut self, s: &str) -> Result<()> {
        self.put_number(s.len() as u64)?;
        self.inner.write_all(s.as_bytes())?;
        Ok(())
    }

    /// Encode a count-prefixed vector of `T`, via `elem`.
    pub fn put_vector<T>(&mut self, items: &[T], mut elem: impl FnMut(&mut Self, &T) -> Result<()>) -> Result<()> {
        self.put_number(items.len() as u64)?;
        for item in items {
            elem(self, item)?;
        }
        Ok(())
    }

    /// Encode a count-prefixed, sorted set of `T`. `T` must be
    /// orderable; duplicates are not de-duplicated here (callers decide
    /// set semantics before serializing).
    pub fn put_set<T: Ord + Clone>(&mut self, items: &[T], mut elem: impl FnMut(&mut Self, &T) -> Result<()>) -> Result<()> {
        let mut sorted: Vec<T> = items.to_vec();
        sorted.sort();
        self.put_vector(&sorted, |w, t| elem(w, t))
    }

    pub fn put_flags_u8(&mut self, flags: u8) -> Result<()> {
        self.put_u8(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn roundtrip_number(n: u64) -> u64 {
        let mut buf = Vec::new();
        Writer::new(&mut buf).put_number(n).unwrap();
        Reader::new(Cursor::new(buf)).get_number().unwrap()
    }

    #[test]
    fn number_roundtrip_boundaries() {
        for n in [
            0u64,
            1,
            0x7F,
            0x80,
            0xFE,
            0xFF,
            0x100,
            0xFFFF,
            0xFFFFFF,
            0xFFFFFFFF,
            0xFFFFFFFFFFFF,
            u64::MAX >> 8,
        ] {
            assert_eq!(roundtrip_number(n), n, "failed for {n:#x}");
        }
    }

    #[test]
    fn number_matches_known_wire_bytes() {
        let cases: &[(u64, &[u8])] = &[
            (0x00, &[0x00]),
            (0xFE, &[0xFE]),
            (0xFF, &[0xFF, 0x00]),
            (0x0100, &[0xFF, 0x01, 0x00]),
            (0x01FF, &[0xFF, 0x01, 0xFF]),
            (0xFEFF, &[0xFF, 0xFE, 0xFF]),
            (0xFF00, &[0xFF, 0xFF, 0x00, 0x00]),
            (0xFF01, &[0xFF, 0xFF, 0x00, 0x01]),
            (0x010000, &[0xFF, 0xFF, 0x01, 0x00, 0x00]),
            (0xABCDEF, &[0xFF, 0xFF, 0xAB, 0xCD, 0xEF]),
            (0xFFABCD, &[0xFF, 0xFF, 0xFF, 0x00, 0xAB, 0xCD]),
            (0x01ABCDEF, &[0xFF, 0xFF, 0xFF, 0x01, 0xAB, 0xCD, 0xEF]),
        ];
        for (n, expected) in cases {
            let mut buf = Vec::new();
            Writer::new(&mut buf).put_number(*n).unwrap();
            assert_eq!(&buf, expected, "encoding mismatch for {n:#x}");

            let mut reader = Reader::new(Cursor::new(expected.to_vec()));
            assert_eq!(reader.get_number().unwrap(), *n);
            assert_eq!(reader.position(), expected.len() as u64);
        }
    }

    #[test]
    fn string_roundtrip_including_empty() {
        for s in ["", "hello", "sys-apps/eix", "unicode: héllo wörld"] {
            let mut buf = Vec::new();
            Writer::new(&mut buf).put_string(s).unwrap();
            let mut reader = Reader::new(Cursor::new(buf));
            assert_eq!(reader.get_string().unwrap(), s);
        }
    }

    #[test]
    fn skip_string_advances_like_full_decode() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf);
        w.put_string("first").unwrap();
        w.put_string("second").unwrap();

        let mut full = Reader::new(Cursor::new(buf.clone()));
        full.get_string().unwrap();
        let pos_after_full = full.position();

        let mut skipped = Reader::new(Cursor::new(buf));
        skipped.skip_string().unwrap();
        assert_eq!(skipped.position(), pos_after_full);
    }

    #[test]
    fn vector_roundtrip() {
        let items = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf);
        w.put_vector(&items, |w, s| w.put_string(s)).unwrap();

        let mut reader = Reader::new(Cursor::new(buf));
        let decoded = reader.get_vector(|r| r.get_string()).unwrap();
        assert_eq!(decoded, items);
    }

    #[test]
    fn oversize_length_prefix_is_corrupt_index() {
        let mut buf = Vec::new();
        Writer::new(&mut buf).put_number(MAX_FIELD_LEN + 1).unwrap();
        let mut reader = Reader::new(Cursor::new(buf));
        let err = reader.get_string().unwrap_err();
        assert!(matches!(err, EixError::CorruptIndex(_)));
    }

    #[test]
    fn length_exceeding_known_stream_size_is_corrupt_index() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf);
        w.put_number(100).unwrap();
        w.inner.write_all(b"short").unwrap();
        let total_len = buf.len() as u64;
        let mut reader = Reader::with_len(Cursor::new(buf), total_len);
        let err = reader.get_string().unwrap_err();
        assert!(matches!(err, EixError::CorruptIndex(_)));
    }
}
