//! Listing cursors: the `next_url` values handed back by the API, and the URLs the pipeline
//! builds itself when it re-queries with a date bound.

use chrono::NaiveDate;
use url::Url;

use crate::constants::{API_HOST, END_DATE_PARAM, OFFSET_PARAM};
use crate::error::Result;
use crate::types::RankingKind;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse(cursor: &str) -> Result<Url> {
    Ok(Url::parse(cursor)?)
}

fn param<'a>(url: &'a Url, name: &str) -> Option<std::borrow::Cow<'a, str>> {
    url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value)
}

/// The `offset` query parameter, if present and numeric.
#[must_use]
pub fn offset(url: &Url) -> Option<u64> {
    param(url, OFFSET_PARAM)?.parse().ok()
}

/// Parses `YYYY-M-D`, with or without zero padding.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// The `end_date` query parameter.
#[must_use]
pub fn end_date(url: &Url) -> Option<NaiveDate> {
    parse_date(&param(url, END_DATE_PARAM)?)
}

/// `url` without its offset, bounded to records created on or before `date`.
#[must_use]
pub fn with_end_date(url: &Url, date: NaiveDate) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != OFFSET_PARAM && key != END_DATE_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut next = url.clone();
    next.query_pairs_mut()
        .clear()
        .extend_pairs(&kept)
        .append_pair(END_DATE_PARAM, &date.format(DATE_FORMAT).to_string());
    next
}

/// Index where the trailing run of `newest_first`'s last date begins. `0` when the whole slice
/// shares one date.
#[must_use]
pub fn tail_group_start(newest_first: &[NaiveDate]) -> usize {
    let Some(&tail) = newest_first.last() else {
        return 0;
    };
    newest_first
        .iter()
        .rposition(|&date| date != tail)
        .map_or(0, |index| index + 1)
}

fn api_url(path: &str) -> Result<Url> {
    Ok(Url::parse(&format!("https://{API_HOST}{path}"))?)
}

/// Newest-first tag search over `words`, optionally bounded by `end_date`.
pub fn search_url(words: &[&str], end_date: Option<NaiveDate>) -> Result<Url> {
    let mut url = api_url("/v1/search/illust")?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("word", &words.join(" "))
            .append_pair("search_target", "partial_match_for_tags")
            .append_pair("sort", "date_desc");
        if let Some(date) = end_date {
            query.append_pair(END_DATE_PARAM, &date.format(DATE_FORMAT).to_string());
        }
    }
    Ok(url)
}

/// Ranking of `kind`, for `date` or the latest one.
pub fn ranking_url(kind: RankingKind, date: Option<NaiveDate>) -> Result<Url> {
    let mut url = api_url("/v1/illust/ranking")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("mode", kind.as_mode());
        if let Some(date) = date {
            query.append_pair("date", &date.format(DATE_FORMAT).to_string());
        }
    }
    Ok(url)
}

/// Works published by `user_id`.
pub fn user_illusts_url(user_id: u64) -> Result<Url> {
    let mut url = api_url("/v1/user/illusts")?;
    url.query_pairs_mut().append_pair("user_id", &user_id.to_string());
    Ok(url)
}

/// Authors followed by `user_id`.
pub fn following_url(user_id: u64) -> Result<Url> {
    let mut url = api_url("/v1/user/following")?;
    url.query_pairs_mut().append_pair("user_id", &user_id.to_string());
    Ok(url)
}

/// Profile, publicity and workspace blocks of `user_id`.
pub fn user_detail_url(user_id: u64) -> Result<Url> {
    let mut url = api_url("/v1/user/detail")?;
    url.query_pairs_mut().append_pair("user_id", &user_id.to_string());
    Ok(url)
}

/// Frame list of an animated work.
pub fn ugoira_metadata_url(artwork_id: u64) -> Result<Url> {
    let mut url = api_url("/v1/ugoira/metadata")?;
    url.query_pairs_mut().append_pair("illust_id", &artwork_id.to_string());
    Ok(url)
}

/// Public or private bookmarks of `user_id`.
pub fn bookmarks_url(user_id: u64, public: bool) -> Result<Url> {
    let mut url = api_url("/v1/user/bookmarks/illust")?;
    url.query_pairs_mut()
        .append_pair("user_id", &user_id.to_string())
        .append_pair("restrict", if public { "public" } else { "private" });
    Ok(url)
}
