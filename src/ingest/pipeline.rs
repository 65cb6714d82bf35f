//! Paginated ingestion with the offset-cap workaround.
//!
//! The listing endpoint pages newest-first and refuses offsets at or past a fixed cap. When the
//! next cursor would cross it, the current page is cut at the start of its oldest same-day run
//! and the listing restarts with `end_date` set to that day, so the cut records are fetched again
//! from offset zero. If the query already ended on that day, the whole page is kept and the
//! restart steps one day back instead, so a day larger than the cap cannot loop forever. Records
//! from that day past the cap are unreachable through this endpoint and are skipped.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use url::Url;

use super::convert::{artwork_from_response, frames_from_metadata, user_from_detail, user_from_response};
use super::cursor;
use super::response::{
    ArtworkResponse, IllustsResponse, UgoiraMetadataResponse, UserDetailResponse, UserPreviewsResponse,
};
use super::transport::{CredentialProvider, FetchError, Transport};
use crate::cancel::CancellationToken;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::store::{Store, Upsert};
use crate::types::RankingKind;

const PAUSE_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Stop at the first page that adds nothing new.
    #[default]
    Incremental,
    /// Walk the listing to its end.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub pages: usize,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub requeries: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: Upsert) {
        match outcome {
            Upsert::Inserted => self.inserted += 1,
            Upsert::Updated => self.updated += 1,
            Upsert::Skipped => self.skipped += 1,
        }
    }
}

/// Outcome of a following-listing sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowReport {
    pub pages: usize,
    pub users_inserted: usize,
    pub users_updated: usize,
    /// Preview works merged alongside their authors.
    pub artworks: SyncReport,
}

/// Split-aware page stream over one listing.
///
/// Yields the records of each page in listing order, already trimmed by any date split. Ends
/// on an empty or malformed page, or when the listing has no next cursor. A fetch error is
/// yielded once and ends the stream.
pub struct ArtworkListing<F> {
    fetch: F,
    next: Option<Url>,
    offset_cap: u64,
    requeries: usize,
    last_split: bool,
    done: bool,
}

impl<F> ArtworkListing<F>
where
    F: FnMut(&Url) -> Result<Vec<u8>>,
{
    #[must_use]
    pub fn new(start: Url, offset_cap: u64, fetch: F) -> Self {
        Self {
            fetch,
            next: Some(start),
            offset_cap,
            requeries: 0,
            last_split: false,
            done: false,
        }
    }

    /// Date-bounded restarts issued so far.
    #[must_use]
    pub fn requeries(&self) -> usize {
        self.requeries
    }

    /// Whether the page most recently yielded ended at the offset cap.
    #[must_use]
    pub fn last_split(&self) -> bool {
        self.last_split
    }

    fn finish(&mut self) -> Option<Result<Vec<ArtworkResponse>>> {
        self.done = true;
        self.next = None;
        None
    }

    /// Trims `artworks` at the split point and returns the restart cursor, if any.
    fn split(&self, current: &Url, artworks: &mut Vec<ArtworkResponse>) -> Option<Url> {
        let dates: Vec<NaiveDate> = artworks
            .iter()
            .map(|artwork| artwork.create_date.date_naive())
            .collect();
        let &tail = dates.last()?;
        if cursor::end_date(current) == Some(tail) {
            let Some(before) = tail.pred_opt() else {
                tracing::debug!(%tail, "no earlier date to restart from");
                return None;
            };
            tracing::debug!(%tail, end_date = %before, kept = artworks.len(), "day exceeds the offset cap; stepping back");
            return Some(cursor::with_end_date(current, before));
        }
        let boundary = cursor::tail_group_start(&dates);
        tracing::debug!(%tail, kept = boundary, deferred = artworks.len() - boundary, "splitting at date boundary");
        artworks.truncate(boundary);
        Some(cursor::with_end_date(current, tail))
    }
}

impl<F> Iterator for ArtworkListing<F>
where
    F: FnMut(&Url) -> Result<Vec<u8>>,
{
    type Item = Result<Vec<ArtworkResponse>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(url) = self.next.take() else {
                return self.finish();
            };
            let body = match (self.fetch)(&url) {
                Ok(body) => body,
                Err(err) => {
                    self.finish();
                    return Some(Err(err));
                }
            };
            if body.is_empty() {
                tracing::debug!(url = %url, "empty body; listing finished");
                return self.finish();
            }
            let page: IllustsResponse = match serde_json::from_slice(&body) {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "malformed page; treating as end of listing");
                    return self.finish();
                }
            };
            if page.illusts.is_empty() {
                return self.finish();
            }
            let next = page.next_url.as_deref().and_then(|text| match cursor::parse(text) {
                Ok(next) => Some(next),
                Err(err) => {
                    tracing::warn!(cursor = text, error = %err, "unparseable next cursor; listing finished");
                    None
                }
            });

            match next {
                Some(next) if cursor::offset(&next).is_some_and(|offset| offset >= self.offset_cap) => {
                    let mut artworks = page.illusts;
                    self.next = self.split(&url, &mut artworks);
                    if self.next.is_some() {
                        self.requeries += 1;
                    }
                    self.last_split = true;
                    if artworks.is_empty() {
                        continue;
                    }
                    return Some(Ok(artworks));
                }
                next => {
                    self.next = next;
                    self.last_split = false;
                    return Some(Ok(page.illusts));
                }
            }
        }
    }
}

/// Drives listings from the upstream API into a [`Store`].
///
/// One pipeline walks one cursor chain at a time; several pipelines may share a store.
pub struct Pipeline<'a, T, C> {
    store: &'a Store,
    transport: T,
    credentials: C,
    config: ArchiveConfig,
}

impl<'a, T, C> Pipeline<'a, T, C>
where
    T: Transport,
    C: CredentialProvider,
{
    #[must_use]
    pub fn new(store: &'a Store, transport: T, credentials: C, config: ArchiveConfig) -> Self {
        Self {
            store,
            transport,
            credentials,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &'a Store {
        self.store
    }

    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Body of `url`, retrying the same request until it succeeds, fails fatally or `cancel`
    /// fires.
    pub fn fetch(&self, url: &Url, cancel: &CancellationToken) -> Result<Vec<u8>> {
        loop {
            cancel.check()?;
            let token = self.credentials.get_token()?;
            match self.transport.fetch_page(url.as_str(), &token) {
                Ok(body) => return Ok(body),
                Err(err @ (FetchError::AuthRejected | FetchError::ConnectionReset)) => {
                    tracing::warn!(url = %url, error = %err, "reconnecting");
                    self.credentials.invalidate();
                }
                Err(FetchError::RateLimited) => {
                    tracing::warn!(url = %url, delay_secs = self.config.retry_delay_secs, "rate limited; pausing");
                    pause(self.config.retry_delay(), cancel)?;
                }
                Err(FetchError::Fatal(reason)) => {
                    return Err(ArchiveError::Transport { reason: reason.into() });
                }
            }
        }
    }

    /// The split-aware page stream starting at `start`.
    #[must_use]
    pub fn listing<'p>(
        &'p self,
        start: Url,
        cancel: &'p CancellationToken,
    ) -> ArtworkListing<impl FnMut(&Url) -> Result<Vec<u8>> + 'p> {
        ArtworkListing::new(start, u64::from(self.config.offset_cap), move |url: &Url| {
            self.fetch(url, cancel)
        })
    }

    /// Folds one response into the store: its author first, then the artwork. A work whose
    /// author id is zero is never inserted, only merged into an existing record.
    pub fn merge_response(&self, response: &ArtworkResponse) -> Result<Upsert> {
        if response.user.id != 0 {
            self.store.merge_user(user_from_response(&response.user));
        }
        self.merge_artwork_response(response)
    }

    /// The artwork half of [`Self::merge_response`]; the embedded author is left alone.
    fn merge_artwork_response(&self, response: &ArtworkResponse) -> Result<Upsert> {
        let fresh = artwork_from_response(response, self.store.tags(), self.store.tools())?;
        Ok(self.store.upsert_artwork(
            fresh.id,
            || (fresh.user_id != 0).then(|| fresh.clone()),
            |stored| stored.overwrite(&fresh),
        ))
    }

    /// Walks the listing at `start_url` into the store.
    pub fn run(&self, start_url: &str, mode: SyncMode, cancel: &CancellationToken) -> Result<SyncReport> {
        let start = cursor::parse(start_url)?;
        self.walk(start, mode, cancel, |_| {})
    }

    /// Fetches the ranking of `kind` on `date`, merges its works and records their order.
    pub fn sync_ranking(&self, kind: RankingKind, date: NaiveDate, cancel: &CancellationToken) -> Result<SyncReport> {
        let start = cursor::ranking_url(kind, Some(date))?;
        let mut ids = Vec::new();
        let report = self.walk(start, SyncMode::Full, cancel, |response| ids.push(response.id))?;
        tracing::info!(%date, mode = kind.as_mode(), entries = ids.len(), "ranking stored");
        self.store.set_ranking(date, kind, ids);
        Ok(report)
    }

    /// Fetches the full profile of `user_id` and merges it.
    pub fn sync_user(&self, user_id: u64, cancel: &CancellationToken) -> Result<Upsert> {
        let body = self.fetch(&cursor::user_detail_url(user_id)?, cancel)?;
        let detail: UserDetailResponse = serde_json::from_slice(&body)?;
        Ok(self.store.merge_user(user_from_detail(&detail)))
    }

    /// Fetches and stores the frame delays of an animated work already in the store.
    pub fn sync_frames(&self, artwork_id: u64, cancel: &CancellationToken) -> Result<()> {
        if !self.store.contains_artwork(artwork_id) {
            return Err(ArchiveError::NotFound { id: artwork_id });
        }
        let body = self.fetch(&cursor::ugoira_metadata_url(artwork_id)?, cancel)?;
        let metadata: UgoiraMetadataResponse = serde_json::from_slice(&body)?;
        self.store.set_frames(artwork_id, Some(frames_from_metadata(&metadata)))
    }

    /// Walks the authors followed by `user_id`, merging each author and their preview works.
    ///
    /// The listing has no dates to split on, so it ends at the offset cap. An incremental sync
    /// stops at the first page that adds no author.
    pub fn sync_following(&self, user_id: u64, mode: SyncMode, cancel: &CancellationToken) -> Result<FollowReport> {
        self.config.validate()?;
        let stop_on_known = mode == SyncMode::Incremental && self.config.stop_on_known_page;
        let offset_cap = u64::from(self.config.offset_cap);
        let mut report = FollowReport::default();
        let mut next = Some(cursor::following_url(user_id)?);
        tracing::info!(user.id = user_id, ?mode, "following sync started");

        while let Some(url) = next.take() {
            let body = self.fetch(&url, cancel)?;
            if body.is_empty() {
                break;
            }
            let page: UserPreviewsResponse = match serde_json::from_slice(&body) {
                Ok(page) => page,
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "malformed page; treating as end of listing");
                    break;
                }
            };
            if page.user_previews.is_empty() {
                break;
            }
            cancel.check()?;
            report.pages += 1;
            let mut added = 0usize;
            for preview in &page.user_previews {
                if preview.user.id == 0 {
                    continue;
                }
                let mut user = user_from_response(&preview.user);
                user.is_muted = preview.is_muted;
                if self.store.merge_user(user).is_inserted() {
                    report.users_inserted += 1;
                    added += 1;
                } else {
                    report.users_updated += 1;
                }
                for artwork in &preview.illusts {
                    report.artworks.record(self.merge_artwork_response(artwork)?);
                }
            }
            tracing::debug!(page = report.pages, authors = page.user_previews.len(), added, "following page merged");
            if stop_on_known && added == 0 {
                tracing::info!(page = report.pages, "no new authors; stopping");
                break;
            }

            next = page.next_url.as_deref().and_then(|text| cursor::parse(text).ok());
            if next
                .as_ref()
                .and_then(cursor::offset)
                .is_some_and(|offset| offset >= offset_cap)
            {
                tracing::warn!(user.id = user_id, offset_cap, "following listing reached the offset cap");
                next = None;
            }
        }

        tracing::info!(
            pages = report.pages,
            users_inserted = report.users_inserted,
            users_updated = report.users_updated,
            artworks_inserted = report.artworks.inserted,
            "following sync finished"
        );
        Ok(report)
    }

    fn walk<V>(&self, start: Url, mode: SyncMode, cancel: &CancellationToken, mut visit: V) -> Result<SyncReport>
    where
        V: FnMut(&ArtworkResponse),
    {
        self.config.validate()?;
        tracing::info!(url = %start, ?mode, "sync started");
        let page_size = self.config.page_size as usize;
        let stop_on_known = mode == SyncMode::Incremental && self.config.stop_on_known_page;
        let mut report = SyncReport::default();
        // Records first inserted by this walk. A restart re-fetches them, which must not look
        // like reaching already-archived history.
        let mut inserted_here = HashSet::new();
        let mut listing = self.listing(start, cancel);

        while let Some(page) = listing.next() {
            let page = page?;
            cancel.check()?;
            report.pages += 1;
            if page.len() > page_size {
                tracing::warn!(records = page.len(), page_size, "page larger than the configured page size");
            }
            let mut fresh = 0usize;
            for response in &page {
                visit(response);
                let outcome = self.merge_response(response)?;
                if outcome.is_inserted() {
                    inserted_here.insert(response.id);
                }
                if outcome.is_inserted() || inserted_here.contains(&response.id) {
                    fresh += 1;
                }
                report.record(outcome);
            }
            tracing::debug!(page = report.pages, records = page.len(), fresh, split = listing.last_split(), "page merged");
            if stop_on_known && fresh == 0 && !listing.last_split() {
                tracing::info!(page = report.pages, "page already archived; stopping");
                break;
            }
        }

        report.requeries = listing.requeries();
        tracing::info!(
            pages = report.pages,
            inserted = report.inserted,
            updated = report.updated,
            skipped = report.skipped,
            requeries = report.requeries,
            "sync finished"
        );
        Ok(report)
    }
}

/// Sleeps for `delay` in short slices so cancellation is noticed promptly.
fn pause(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    let deadline = Instant::now() + delay;
    loop {
        cancel.check()?;
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep(PAUSE_SLICE.min(deadline - now));
    }
}
