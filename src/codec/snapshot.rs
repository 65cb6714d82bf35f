//! Top-level snapshot container.
//!
//! Field order: 0 major, 1 minor, 2 artworks, 3 authors, 4 tag table, 5 tool table,
//! 6 ranking table, 7 blake3 digest of every byte before field 7. Each section is one framed
//! field so a reader can skip it whole.

use chrono::{Datelike, NaiveDate};

use super::artwork::{decode_artwork, encode_artwork};
use super::user::{decode_user, encode_user};
use super::{Reader, Writer};
use crate::constants::{SNAPSHOT_MAJOR, SNAPSHOT_MINOR};
use crate::error::{ArchiveError, Result};
use crate::intern::StringTable;
use crate::store::Store;
use crate::types::{Artwork, RankingKind, RankingTable, User};

const FIELD_CHECKSUM: u32 = 7;

/// Everything a snapshot holds, decoded and ready to seed a [`Store`].
#[derive(Debug)]
pub struct DecodedSnapshot {
    pub major: u32,
    pub minor: u32,
    pub artworks: Vec<Artwork>,
    pub users: Vec<User>,
    pub tags: StringTable,
    pub tools: StringTable,
    pub rankings: RankingTable,
    pub verified: bool,
}

fn put_table(w: &mut Writer, table: &StringTable) -> Result<()> {
    let entries = table.entries();
    w.put_u32(count(entries.len())?);
    for (id, text) in entries {
        w.put_u32(id);
        w.put_str(&text)?;
    }
    Ok(())
}

fn read_table(r: &mut Reader<'_>) -> Result<StringTable> {
    let len = r.u32()?;
    let mut entries = Vec::with_capacity(len.min(1 << 16) as usize);
    for _ in 0..len {
        let id = r.u32()?;
        entries.push((id, r.string()?));
    }
    StringTable::from_entries(entries)
}

fn put_rankings(w: &mut Writer, rankings: &RankingTable) -> Result<()> {
    w.put_u32(count(rankings.len())?);
    for (date, kind, ids) in rankings.iter() {
        w.put_i32(date.num_days_from_ce());
        w.put_u8(kind as u8);
        w.put_u32(count(ids.len())?);
        for &id in ids {
            w.put_u64(id);
        }
    }
    Ok(())
}

fn read_rankings(r: &mut Reader<'_>) -> Result<RankingTable> {
    let len = r.u32()?;
    let mut table = RankingTable::new();
    for _ in 0..len {
        let days = r.i32()?;
        let date = NaiveDate::from_num_days_from_ce_opt(days)
            .ok_or_else(|| ArchiveError::snapshot(format!("ranking date {days} out of range")))?;
        let raw_kind = r.u8()?;
        let kind = RankingKind::from_u8(raw_kind)
            .ok_or_else(|| ArchiveError::snapshot(format!("unknown ranking kind {raw_kind}")))?;
        let ids_len = r.u32()? as usize;
        if r.remaining() / 8 < ids_len {
            return Err(ArchiveError::snapshot("ranking id list is truncated"));
        }
        let mut ids = Vec::with_capacity(ids_len);
        for _ in 0..ids_len {
            ids.push(r.u64()?);
        }
        table.set(date, kind, ids);
    }
    Ok(table)
}

fn count(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ArchiveError::snapshot("too many entries for one section"))
}

/// Encodes the whole store. Records are written in id order so equal stores produce equal
/// bytes.
pub fn encode_snapshot(store: &Store, checksum: bool) -> Result<Vec<u8>> {
    let mut w = Writer::with_capacity(64 + store.artwork_count() * 160);
    w.put_u32(if checksum { FIELD_CHECKSUM + 1 } else { FIELD_CHECKSUM });
    w.field(|w| {
        w.put_u32(SNAPSHOT_MAJOR);
        Ok(())
    })?;
    w.field(|w| {
        w.put_u32(SNAPSHOT_MINOR);
        Ok(())
    })?;

    w.field(|w| {
        let at = w.len();
        w.put_u32(0);
        let mut written = 0u32;
        for id in store.artwork_ids() {
            if let Some(artwork) = store.artworks.get(&id) {
                encode_artwork(w, &artwork)?;
                written += 1;
            }
        }
        w.patch_u32(at, written);
        Ok(())
    })?;
    w.field(|w| {
        let at = w.len();
        w.put_u32(0);
        let mut written = 0u32;
        for id in store.user_ids() {
            if let Some(user) = store.users.get(&id) {
                encode_user(w, &user)?;
                written += 1;
            }
        }
        w.patch_u32(at, written);
        Ok(())
    })?;
    w.field(|w| put_table(w, store.tags()))?;
    w.field(|w| put_table(w, store.tools()))?;
    {
        let rankings = store.rankings();
        w.field(|w| put_rankings(w, &rankings))?;
    }
    if checksum {
        let digest = blake3::hash(w.as_slice());
        w.field(|w| {
            w.put_bytes(digest.as_bytes());
            Ok(())
        })?;
    }
    Ok(w.into_inner())
}

/// Decodes a snapshot. A different major version, a digest mismatch, or any malformed section
/// fails the whole load.
pub fn decode_snapshot(bytes: &[u8]) -> Result<DecodedSnapshot> {
    let mut r = Reader::new(bytes);
    let field_count = r.u32()?;
    if field_count < 2 {
        return Err(ArchiveError::snapshot("snapshot has no version header"));
    }
    let major = r.required_field("major version")?.u32()?;
    let minor = r.required_field("minor version")?.u32()?;
    if major != SNAPSHOT_MAJOR {
        return Err(ArchiveError::UnsupportedVersion { major, minor });
    }

    let mut snapshot = DecodedSnapshot {
        major,
        minor,
        artworks: Vec::new(),
        users: Vec::new(),
        tags: StringTable::new(),
        tools: StringTable::new(),
        rankings: RankingTable::new(),
        verified: false,
    };

    for index in 2..field_count {
        let field_start = r.position();
        let Some(mut field) = r.field()? else {
            continue;
        };
        match index {
            2 => {
                let len = field.u32()?;
                snapshot.artworks.reserve(len.min(1 << 20) as usize);
                for _ in 0..len {
                    snapshot.artworks.push(decode_artwork(&mut field)?);
                }
            }
            3 => {
                let len = field.u32()?;
                snapshot.users.reserve(len.min(1 << 20) as usize);
                for _ in 0..len {
                    snapshot.users.push(decode_user(&mut field)?);
                }
            }
            4 => snapshot.tags = read_table(&mut field)?,
            5 => snapshot.tools = read_table(&mut field)?,
            6 => snapshot.rankings = read_rankings(&mut field)?,
            FIELD_CHECKSUM => {
                let expected = blake3::hash(&bytes[..field_start]);
                if field.take(field.remaining())? != expected.as_bytes().as_slice() {
                    return Err(ArchiveError::ChecksumMismatch { context: "snapshot" });
                }
                snapshot.verified = true;
            }
            _ => {}
        }
    }
    Ok(snapshot)
}
