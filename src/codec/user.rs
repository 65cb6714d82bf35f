//! Author record layout. Nested profile blocks are bincode blobs inside their own fields; a
//! reader decodes the prefix it knows and ignores trailing bytes.

use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::artwork::hide_reason;
use super::{Reader, Writer};
use crate::error::{ArchiveError, Result};
use crate::types::User;

const FIELD_COUNT: u32 = 12;

const FOLLOWED: u8 = 1;
const MUTED: u8 = 1 << 1;

fn put_text(w: &mut Writer, text: &str) -> Result<()> {
    w.put_bytes(text.as_bytes());
    Ok(())
}

fn put_block<T: Serialize>(w: &mut Writer, block: &T) -> Result<()> {
    w.put_bytes(&encode_to_vec(block, standard())?);
    Ok(())
}

fn read_block<T: DeserializeOwned>(r: &mut Reader<'_>) -> Result<T> {
    let bytes = r.take(r.remaining())?;
    let (block, _) = decode_from_slice(bytes, standard())?;
    Ok(block)
}

pub(crate) fn encode_user(w: &mut Writer, user: &User) -> Result<()> {
    w.put_u32(FIELD_COUNT);
    w.field(|w| {
        w.put_u64(user.id);
        Ok(())
    })?;
    w.opt_field(user.name.as_deref(), put_text)?;
    w.opt_field(user.account.as_deref(), put_text)?;
    w.field(|w| {
        let mut bits = 0;
        if user.is_followed {
            bits |= FOLLOWED;
        }
        if user.is_muted {
            bits |= MUTED;
        }
        w.put_u8(bits);
        Ok(())
    })?;
    w.field(|w| {
        w.put_u8(user.hide_reason as u8);
        Ok(())
    })?;
    w.opt_field(user.image_url.as_deref(), put_text)?;
    w.opt_field(user.comment.as_deref(), put_text)?;
    w.opt_field(user.memo.as_deref(), put_text)?;
    w.opt_field(user.extra_tags.as_deref(), |w, ids: &[u32]| {
        w.put_u32_slice(ids);
        Ok(())
    })?;
    w.opt_field(user.profile.as_ref(), put_block)?;
    w.opt_field(user.profile_publicity.as_ref(), put_block)?;
    w.opt_field(user.workspace.as_ref(), put_block)?;
    Ok(())
}

pub(crate) fn decode_user(r: &mut Reader<'_>) -> Result<User> {
    let count = r.u32()?;
    if count == 0 {
        return Err(ArchiveError::snapshot("author record has no fields"));
    }
    let mut user = User::new(r.required_field("author id")?.u64()?);
    for index in 1..count {
        let Some(mut field) = r.field()? else {
            continue;
        };
        match index {
            1 => user.name = Some(field.rest_utf8()?),
            2 => user.account = Some(field.rest_utf8()?),
            3 => {
                let bits = field.u8()?;
                user.is_followed = bits & FOLLOWED != 0;
                user.is_muted = bits & MUTED != 0;
            }
            4 => user.hide_reason = hide_reason(field.u8()?)?,
            5 => user.image_url = Some(field.rest_utf8()?),
            6 => user.comment = Some(field.rest_utf8()?),
            7 => user.memo = Some(field.rest_utf8()?),
            8 => user.extra_tags = Some(field.u32_array()?),
            9 => user.profile = Some(read_block(&mut field)?),
            10 => user.profile_publicity = Some(read_block(&mut field)?),
            11 => user.workspace = Some(read_block(&mut field)?),
            _ => {}
        }
    }
    Ok(user)
}
