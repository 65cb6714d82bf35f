//! Artwork record layout.
//!
//! | index | field                | payload                                         |
//! |-------|----------------------|-------------------------------------------------|
//! | 0     | fixed blob           | 48 bytes, see [`encode_blob`]                   |
//! | 1     | created              | `i64` seconds + `u32` nanoseconds               |
//! | 2     | file date            | same as created                                 |
//! | 3     | tags                 | packed `u32`                                    |
//! | 4     | extra tags           | packed `u32` or nil                             |
//! | 5     | fake tags            | packed `u32` or nil                             |
//! | 6     | tools                | packed `u32`                                    |
//! | 7     | title                | UTF-8                                           |
//! | 8     | caption              | UTF-8                                           |
//! | 9     | memo                 | UTF-8 or nil                                    |
//! | 10    | page hide map        | 5-byte `(u32 page, u8 reason)` entries or nil   |
//! | 11    | frame delays         | mode byte, then raw `u16`s or `(u32, u16)`      |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{Reader, Writer};
use crate::constants::{ARTWORK_BLOB_LEN, MAX_FRAMES, PAGE_HIDE_ENTRY_LEN};
use crate::error::{ArchiveError, Result};
use crate::types::{Artwork, ArtworkFlags, ArtworkKind, FileKind, HideReason};

const FIELD_COUNT: u32 = 12;

const FRAMES_RAW: u8 = 0;
const FRAMES_UNIFORM: u8 = 1;

const USER_ID_POS: usize = 8;
const VIEW_POS: usize = 16;
const BOOKMARKS_POS: usize = 24;
const PAGE_COUNT_POS: usize = 32;
const WIDTH_POS: usize = 36;
const HEIGHT_POS: usize = 40;
const KIND_POS: usize = 44;
const EXTENSION_POS: usize = 45;
const HIDE_POS: usize = 46;
const FLAGS_POS: usize = 47;

/// Four `u64` counters, three `u32` dimensions, three enum bytes, one flag byte.
#[must_use]
pub fn encode_blob(artwork: &Artwork) -> [u8; ARTWORK_BLOB_LEN] {
    let mut buf = [0u8; ARTWORK_BLOB_LEN];
    buf[..USER_ID_POS].copy_from_slice(&artwork.id.to_le_bytes());
    buf[USER_ID_POS..VIEW_POS].copy_from_slice(&artwork.user_id.to_le_bytes());
    buf[VIEW_POS..BOOKMARKS_POS].copy_from_slice(&artwork.total_view.to_le_bytes());
    buf[BOOKMARKS_POS..PAGE_COUNT_POS].copy_from_slice(&artwork.total_bookmarks.to_le_bytes());
    buf[PAGE_COUNT_POS..WIDTH_POS].copy_from_slice(&artwork.page_count.to_le_bytes());
    buf[WIDTH_POS..HEIGHT_POS].copy_from_slice(&artwork.width.to_le_bytes());
    buf[HEIGHT_POS..KIND_POS].copy_from_slice(&artwork.height.to_le_bytes());
    buf[KIND_POS] = artwork.kind as u8;
    buf[EXTENSION_POS] = artwork.extension as u8;
    buf[HIDE_POS] = artwork.hide_reason as u8;
    buf[FLAGS_POS] = artwork.flags.bits();
    buf
}

fn decode_blob(buf: &[u8]) -> Result<Artwork> {
    if buf.len() != ARTWORK_BLOB_LEN {
        return Err(ArchiveError::snapshot(format!(
            "artwork blob is {} bytes, expected {ARTWORK_BLOB_LEN}",
            buf.len()
        )));
    }
    let mut r = Reader::new(buf);
    let mut artwork = Artwork::new(r.u64()?);
    artwork.user_id = r.u64()?;
    artwork.total_view = r.u64()?;
    artwork.total_bookmarks = r.u64()?;
    artwork.page_count = r.u32()?;
    artwork.width = r.u32()?;
    artwork.height = r.u32()?;
    let kind = r.u8()?;
    artwork.kind = ArtworkKind::from_u8(kind)
        .ok_or_else(|| ArchiveError::snapshot(format!("unknown artwork kind {kind}")))?;
    let extension = r.u8()?;
    artwork.extension = FileKind::from_u8(extension)
        .ok_or_else(|| ArchiveError::snapshot(format!("unknown file kind {extension}")))?;
    artwork.hide_reason = hide_reason(r.u8()?)?;
    artwork.flags = ArtworkFlags::from_bits(r.u8()?);
    Ok(artwork)
}

pub(crate) fn hide_reason(value: u8) -> Result<HideReason> {
    HideReason::from_u8(value)
        .ok_or_else(|| ArchiveError::snapshot(format!("unknown hide reason {value}")))
}

fn put_page_hide(w: &mut Writer, map: &BTreeMap<u32, HideReason>) -> Result<()> {
    for (&page, &reason) in map {
        w.put_u32(page);
        w.put_u8(reason as u8);
    }
    Ok(())
}

fn read_page_hide(r: &mut Reader<'_>) -> Result<BTreeMap<u32, HideReason>> {
    if r.remaining() % PAGE_HIDE_ENTRY_LEN != 0 {
        return Err(ArchiveError::snapshot("page hide map has a partial entry"));
    }
    let mut map = BTreeMap::new();
    while r.remaining() > 0 {
        let page = r.u32()?;
        map.insert(page, hide_reason(r.u8()?)?);
    }
    Ok(map)
}

/// Uniform arrays of two or more elements collapse to `(count, value)`.
fn put_frames(w: &mut Writer, frames: &[u16]) -> Result<()> {
    if frames.len() > MAX_FRAMES {
        return Err(ArchiveError::snapshot(format!("{} frames exceed the limit of {MAX_FRAMES}", frames.len())));
    }
    match frames.split_first() {
        Some((&first, rest)) if !rest.is_empty() && rest.iter().all(|&f| f == first) => {
            let count = u32::try_from(frames.len())
                .map_err(|_| ArchiveError::snapshot("frame array too long"))?;
            w.put_u8(FRAMES_UNIFORM);
            w.put_u32(count);
            w.put_u16(first);
        }
        _ => {
            w.put_u8(FRAMES_RAW);
            for &frame in frames {
                w.put_u16(frame);
            }
        }
    }
    Ok(())
}

fn read_frames(r: &mut Reader<'_>) -> Result<Vec<u16>> {
    match r.u8()? {
        FRAMES_RAW => {
            if r.remaining() % 2 != 0 {
                return Err(ArchiveError::snapshot("frame array has a partial element"));
            }
            if r.remaining() / 2 > MAX_FRAMES {
                return Err(ArchiveError::snapshot("frame array exceeds the frame limit"));
            }
            let mut frames = Vec::with_capacity(r.remaining() / 2);
            while r.remaining() > 0 {
                frames.push(r.u16()?);
            }
            Ok(frames)
        }
        FRAMES_UNIFORM => {
            let count = r.u32()? as usize;
            let value = r.u16()?;
            if count > MAX_FRAMES {
                return Err(ArchiveError::snapshot(format!("uniform frame count {count} exceeds {MAX_FRAMES}")));
            }
            if r.remaining() != 0 {
                return Err(ArchiveError::snapshot("uniform frame field has trailing bytes"));
            }
            Ok(vec![value; count])
        }
        mode => Err(ArchiveError::snapshot(format!("unknown frame encoding {mode}"))),
    }
}

fn put_ids(w: &mut Writer, ids: &[u32]) -> Result<()> {
    w.put_u32_slice(ids);
    Ok(())
}

pub(crate) fn encode_artwork(w: &mut Writer, artwork: &Artwork) -> Result<()> {
    w.put_u32(FIELD_COUNT);
    w.field(|w| {
        w.put_bytes(&encode_blob(artwork));
        Ok(())
    })?;
    w.field(|w| {
        w.put_timestamp(&artwork.created);
        Ok(())
    })?;
    w.field(|w| {
        w.put_timestamp(&artwork.file_date);
        Ok(())
    })?;
    w.field(|w| put_ids(w, &artwork.tags))?;
    w.opt_field(artwork.extra_tags.as_deref(), put_ids)?;
    w.opt_field(artwork.fake_tags.as_deref(), put_ids)?;
    w.field(|w| put_ids(w, &artwork.tools))?;
    w.field(|w| {
        w.put_bytes(artwork.title.as_bytes());
        Ok(())
    })?;
    w.field(|w| {
        w.put_bytes(artwork.caption.as_bytes());
        Ok(())
    })?;
    w.opt_field(artwork.memo.as_deref(), |w, memo: &str| {
        w.put_bytes(memo.as_bytes());
        Ok(())
    })?;
    w.opt_field(artwork.page_hide.as_ref(), put_page_hide)?;
    w.opt_field(artwork.frames.as_deref(), put_frames)?;
    Ok(())
}

pub(crate) fn decode_artwork(r: &mut Reader<'_>) -> Result<Artwork> {
    let count = r.u32()?;
    if count == 0 {
        return Err(ArchiveError::snapshot("artwork record has no fields"));
    }
    let mut artwork = decode_blob(r.required_field("artwork blob")?.take(ARTWORK_BLOB_LEN)?)?;
    let mut created: Option<DateTime<Utc>> = None;
    let mut file_date: Option<DateTime<Utc>> = None;
    for index in 1..count {
        let Some(mut field) = r.field()? else {
            continue;
        };
        match index {
            1 => created = Some(field.timestamp()?),
            2 => file_date = Some(field.timestamp()?),
            3 => artwork.tags = field.u32_array()?,
            4 => artwork.extra_tags = Some(field.u32_array()?),
            5 => artwork.fake_tags = Some(field.u32_array()?),
            6 => artwork.tools = field.u32_array()?,
            7 => artwork.title = field.rest_utf8()?,
            8 => artwork.caption = field.rest_utf8()?,
            9 => artwork.memo = Some(field.rest_utf8()?),
            10 => artwork.page_hide = Some(read_page_hide(&mut field)?),
            11 => artwork.frames = Some(read_frames(&mut field)?),
            _ => {}
        }
    }
    if let Some(created) = created {
        artwork.created = created;
    }
    artwork.file_date = file_date.unwrap_or(artwork.created);
    Ok(artwork)
}
