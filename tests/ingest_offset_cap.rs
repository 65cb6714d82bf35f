//! Walking a listing larger than the offset cap.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::NaiveDate;
use url::Url;

use pixvault_core::ingest::cursor;
use pixvault_core::{
    ArchiveConfig, CancellationToken, CredentialProvider, FetchError, Pipeline, Store, SyncMode,
    Transport,
};

const CAP: u64 = 5010;
const PAGE: usize = 30;
const START: &str = "https://app-api.pixiv.net/v1/search/illust?word=sea&sort=date_desc";

/// A newest-first feed that honours `end_date` and refuses offsets at or past the cap.
struct Feed {
    records: Vec<(u64, NaiveDate)>,
    max_offset: AtomicU64,
    requests: AtomicUsize,
    /// Every `reject_every`th request is answered with an auth rejection.
    reject_every: usize,
    cancel_after: Option<(usize, CancellationToken)>,
    seen_end_dates: Mutex<Vec<Option<NaiveDate>>>,
}

impl Feed {
    /// 12,000 records over five days, 2,400 per day, newest first.
    fn new() -> Self {
        let first = NaiveDate::from_ymd_opt(2023, 3, 1).expect("date");
        let mut records = Vec::with_capacity(12_000);
        for day in (0..5u64).rev() {
            let date = first + chrono::Days::new(day);
            for n in (0..2_400u64).rev() {
                records.push((day * 2_400 + n + 1, date));
            }
        }
        Self {
            records,
            max_offset: AtomicU64::new(0),
            requests: AtomicUsize::new(0),
            reject_every: 0,
            cancel_after: None,
            seen_end_dates: Mutex::default(),
        }
    }

    fn body(&self, url: &Url) -> String {
        let offset = cursor::offset(url).unwrap_or(0);
        let end = cursor::end_date(url);
        self.seen_end_dates.lock().expect("lock").push(end);
        let visible: Vec<&(u64, NaiveDate)> = self
            .records
            .iter()
            .filter(|(_, date)| end.is_none_or(|end| *date <= end))
            .collect();
        let start = offset as usize;
        let illusts: Vec<String> = visible
            .iter()
            .skip(start)
            .take(PAGE)
            .map(|(id, date)| {
                format!(
                    r#"{{ "id": {id}, "user": {{ "id": {author} }}, "create_date": "{date}T12:00:00+09:00",
                         "meta_single_page": {{ "original_image_url": "https://i.pximg.net/img-original/img/2023/03/01/12/00/00/{id}_p0.jpg" }} }}"#,
                    author = id % 50 + 1
                )
            })
            .collect();
        let next = if start + PAGE < visible.len() {
            let mut next = url.clone();
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != "offset")
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            next.query_pairs_mut()
                .clear()
                .extend_pairs(&kept)
                .append_pair("offset", &(start + PAGE).to_string());
            format!("\"{next}\"")
        } else {
            "null".to_owned()
        };
        format!(r#"{{ "illusts": [{}], "next_url": {next} }}"#, illusts.join(","))
    }
}

impl Transport for Feed {
    fn fetch_page(&self, url: &str, _token: &str) -> Result<Vec<u8>, FetchError> {
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if request >= *limit {
                token.cancel();
            }
        }
        if self.reject_every > 0 && request % self.reject_every == 0 {
            return Err(FetchError::AuthRejected);
        }
        let url = Url::parse(url).map_err(|err| FetchError::Fatal(err.to_string()))?;
        let offset = cursor::offset(&url).unwrap_or(0);
        self.max_offset.fetch_max(offset, Ordering::SeqCst);
        if offset >= CAP {
            return Err(FetchError::Fatal(format!("offset {offset} is past the cap")));
        }
        Ok(self.body(&url).into_bytes())
    }
}

#[derive(Default)]
struct Refreshing {
    refreshes: AtomicUsize,
}

impl CredentialProvider for Refreshing {
    fn get_token(&self) -> pixvault_core::Result<String> {
        Ok(format!("token-{}", self.refreshes.load(Ordering::SeqCst)))
    }

    fn invalidate(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

fn config() -> ArchiveConfig {
    ArchiveConfig {
        offset_cap: CAP as u32,
        page_size: PAGE as u32,
        retry_delay_secs: 0,
        ..ArchiveConfig::default()
    }
}

fn assert_complete(store: &Store, feed: &Feed) {
    assert_eq!(store.artwork_count(), 12_000);
    let expected: HashSet<u64> = feed.records.iter().map(|(id, _)| *id).collect();
    let stored: HashSet<u64> = store.artwork_ids().into_iter().collect();
    assert_eq!(stored, expected);
    assert!(feed.max_offset.load(Ordering::SeqCst) < CAP, "a capped cursor was requested");
}

#[test]
fn full_sync_visits_every_record_once() {
    let store = Store::new();
    let feed = Feed::new();
    let credentials = Refreshing::default();
    let pipeline = Pipeline::new(&store, &feed, &credentials, config());
    let report = pipeline
        .run(START, SyncMode::Full, &CancellationToken::new())
        .expect("sync");

    assert_complete(&store, &feed);
    assert_eq!(report.inserted, 12_000);
    // Earlier pages of the split day are fetched again after each restart.
    assert_eq!(report.updated, 2 * 180);
    assert_eq!(report.requeries, 2);
    assert_eq!(store.user_count(), 50);
    let ends = feed.seen_end_dates.lock().expect("lock");
    assert_eq!(ends.first(), Some(&None));
    assert_eq!(ends.last().copied().flatten(), NaiveDate::from_ymd_opt(2023, 3, 1));
}

#[test]
fn incremental_sync_is_not_stopped_by_restarts() {
    let store = Store::new();
    let feed = Feed::new();
    let credentials = Refreshing::default();
    let pipeline = Pipeline::new(&store, &feed, &credentials, config());
    let report = pipeline
        .run(START, SyncMode::Incremental, &CancellationToken::new())
        .expect("sync");
    assert_complete(&store, &feed);
    assert_eq!(report.inserted, 12_000);

    let again = Pipeline::new(&store, Feed::new(), &credentials, config());
    let report = again
        .run(START, SyncMode::Incremental, &CancellationToken::new())
        .expect("resync");
    assert_eq!(report.pages, 1, "an archived listing stops at its first page");
    assert_eq!(report.inserted, 0);
}

#[test]
fn auth_rejections_are_retried_transparently() {
    let store = Store::new();
    let feed = Feed {
        reject_every: 7,
        ..Feed::new()
    };
    let credentials = Refreshing::default();
    let pipeline = Pipeline::new(&store, &feed, &credentials, config());
    pipeline
        .run(START, SyncMode::Full, &CancellationToken::new())
        .expect("sync");
    assert_complete(&store, &feed);
    let refreshes = credentials.refreshes.load(Ordering::SeqCst);
    assert!(refreshes > 0);
    assert_eq!(refreshes, feed.requests.load(Ordering::SeqCst) / 7);
}

#[test]
fn cancellation_ends_the_run_early() {
    let store = Store::new();
    let token = CancellationToken::new();
    let feed = Feed {
        cancel_after: Some((10, token.clone())),
        ..Feed::new()
    };
    let credentials = Refreshing::default();
    let pipeline = Pipeline::new(&store, &feed, &credentials, config());
    let err = pipeline.run(START, SyncMode::Full, &token).expect_err("cancelled");
    assert!(err.is_cancelled());
    assert!(store.artwork_count() <= 10 * PAGE);
    assert!(feed.requests.load(Ordering::SeqCst) <= 10);
}
