//! File names, media URLs and on-disk locations of downloaded artwork files.
//!
//! The media host encodes the upload time in the URL path as `YYYY/MM/DD/hh/mm/ss`. That wall
//! clock is kept verbatim in [`Artwork::file_date`] (no offset conversion) so URLs can be
//! rebuilt byte for byte.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::constants::IMAGE_HOST;
use crate::types::{Artwork, ArtworkKind};

/// Two-level directory bucket: `{id & 0xFF:02X}/{(id >> 8) & 0xFF:02X}`.
#[must_use]
pub fn hash_dir(id: u64) -> PathBuf {
    let mut path = PathBuf::from(format!("{:02X}", id & 0xFF));
    path.push(format!("{:02X}", (id >> 8) & 0xFF));
    path
}

const FILE_DATE_FORMAT: &str = "%Y/%m/%d/%H/%M/%S";

fn date_path(date: &DateTime<Utc>) -> String {
    date.format(FILE_DATE_FORMAT).to_string()
}

/// Parses the upload time out of a media URL. `None` when the path has no
/// `.../YYYY/MM/DD/hh/mm/ss/<file>` run.
#[must_use]
pub fn parse_file_date(url: &str) -> Option<DateTime<Utc>> {
    let path = url.split(['?', '#']).next()?;
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 7 {
        return None;
    }
    // Segments directly before the file name.
    let parts = &segments[segments.len() - 7..segments.len() - 1];
    if parts.iter().any(|part| part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }
    NaiveDateTime::parse_from_str(&parts.join("/"), FILE_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[must_use]
pub fn original_file_name(artwork: &Artwork, page: u32) -> String {
    match artwork.kind {
        ArtworkKind::Ugoira => format!("{}_ugoira0{}", artwork.id, artwork.extension.as_extension()),
        _ => format!("{}_p{page}{}", artwork.id, artwork.extension.as_extension()),
    }
}

#[must_use]
pub fn thumbnail_file_name(artwork: &Artwork, page: u32) -> String {
    match artwork.kind {
        ArtworkKind::Ugoira => format!("{}_square1200.jpg", artwork.id),
        _ => format!("{}_p{page}_square1200.jpg", artwork.id),
    }
}

#[must_use]
pub fn ugoira_zip_file_name(artwork: &Artwork) -> String {
    format!("{}_ugoira600x600.zip", artwork.id)
}

#[must_use]
pub fn original_url(artwork: &Artwork, page: u32) -> String {
    format!(
        "https://{IMAGE_HOST}/img-original/img/{}/{}",
        date_path(&artwork.file_date),
        original_file_name(artwork, page)
    )
}

#[must_use]
pub fn thumbnail_url(artwork: &Artwork, page: u32) -> String {
    format!(
        "https://{IMAGE_HOST}/c/360x360_70/img-master/img/{}/{}",
        date_path(&artwork.file_date),
        thumbnail_file_name(artwork, page)
    )
}

#[must_use]
pub fn ugoira_zip_url(artwork: &Artwork) -> String {
    format!(
        "https://{IMAGE_HOST}/img-zip-ugoira/img/{}/{}",
        date_path(&artwork.file_date),
        ugoira_zip_file_name(artwork)
    )
}
