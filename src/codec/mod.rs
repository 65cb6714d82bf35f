//! Little-endian binary codec for the archive snapshot.
//!
//! Composite values are written as `field_count: u32` followed by that many fields. A field is
//! `len: u32` and `len` payload bytes; `len == NIL_LEN` marks an absent optional. Decoders walk
//! fields by index, skip indexes they do not know, and default the ones that are missing, so a
//! newer writer's extra trailing fields never abort an older reader.

pub mod artwork;
pub mod snapshot;
pub mod user;

use chrono::{DateTime, Utc};

use crate::constants::NIL_LEN;
use crate::error::{ArchiveError, Result};

pub use snapshot::{DecodedSnapshot, decode_snapshot, encode_snapshot};

/// Append-only byte sink with field framing helpers.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Overwrites a `u32` written earlier at byte offset `at`.
    pub(crate) fn patch_u32(&mut self, at: usize, value: u32) {
        self.buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// `len: u32` + UTF-8 bytes.
    pub(crate) fn put_str(&mut self, text: &str) -> Result<()> {
        self.put_u32(checked_len(text.len())?);
        self.put_bytes(text.as_bytes());
        Ok(())
    }

    /// Writes one length-prefixed field whose payload is produced by `body`.
    pub(crate) fn field<F>(&mut self, body: F) -> Result<()>
    where
        F: FnOnce(&mut Writer) -> Result<()>,
    {
        let at = self.buf.len();
        self.put_u32(0);
        body(self)?;
        let len = checked_len(self.buf.len() - at - 4)?;
        self.patch_u32(at, len);
        Ok(())
    }

    /// Writes `Some` through `body`, `None` as the nil marker.
    pub(crate) fn opt_field<T, F>(&mut self, value: Option<&T>, body: F) -> Result<()>
    where
        T: ?Sized,
        F: FnOnce(&mut Writer, &T) -> Result<()>,
    {
        match value {
            Some(value) => self.field(|w| body(w, value)),
            None => {
                self.put_u32(NIL_LEN);
                Ok(())
            }
        }
    }

    pub(crate) fn put_timestamp(&mut self, time: &DateTime<Utc>) {
        self.put_i64(time.timestamp());
        self.put_u32(time.timestamp_subsec_nanos());
    }

    pub(crate) fn put_u32_slice(&mut self, values: &[u32]) {
        for value in values {
            self.put_u32(*value);
        }
    }
}

fn checked_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .ok()
        .filter(|&len| len != NIL_LEN)
        .ok_or_else(|| ArchiveError::snapshot("section exceeds 4 GiB"))
}

/// Bounds-checked cursor over an encoded slice.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(ArchiveError::snapshot(format!(
                "truncated: wanted {len} bytes at offset {}, {} left",
                self.pos,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub(crate) fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let slice = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take_array::<1>()?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        utf8(self.take(len)?)
    }

    /// Next field as a sub-reader, or `None` for the nil marker.
    pub(crate) fn field(&mut self) -> Result<Option<Reader<'a>>> {
        let len = self.u32()?;
        if len == NIL_LEN {
            return Ok(None);
        }
        Ok(Some(Reader::new(self.take(len as usize)?)))
    }

    /// Next field, treating nil as an error for required values.
    pub(crate) fn required_field(&mut self, what: &'static str) -> Result<Reader<'a>> {
        self.field()?
            .ok_or_else(|| ArchiveError::snapshot(format!("{what} is unexpectedly nil")))
    }

    /// Rest of this reader as UTF-8.
    pub(crate) fn rest_utf8(&mut self) -> Result<String> {
        let rest = self.take(self.remaining())?;
        utf8(rest)
    }

    pub(crate) fn timestamp(&mut self) -> Result<DateTime<Utc>> {
        let secs = self.i64()?;
        let nanos = self.u32()?;
        DateTime::from_timestamp(secs, nanos)
            .ok_or_else(|| ArchiveError::snapshot(format!("timestamp {secs}.{nanos} out of range")))
    }

    /// Rest of this reader as a packed `u32` array.
    pub(crate) fn u32_array(&mut self) -> Result<Vec<u32>> {
        if self.remaining() % 4 != 0 {
            return Err(ArchiveError::snapshot("u32 array length is not a multiple of 4"));
        }
        let mut values = Vec::with_capacity(self.remaining() / 4);
        while self.remaining() > 0 {
            values.push(self.u32()?);
        }
        Ok(values)
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| ArchiveError::snapshot("string is not UTF-8"))
}
