use once_cell::sync::OnceCell;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use super::{ArtworkFilter, PreparedFilter};
use crate::cancel::CancellationToken;
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::finder::FinderSet;
use crate::store::Store;
use crate::types::Artwork;

/// Runs [`ArtworkFilter`]s against a [`Store`].
///
/// The fast phase fans out over rayon's global pool. The slow phase runs on a dedicated pool
/// of `slow_threads` workers, built on first use, so finder I/O stays bounded.
pub struct Query<'a> {
    store: &'a Store,
    finders: &'a FinderSet,
    slow_threads: usize,
    pool: OnceCell<ThreadPool>,
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("slow_threads", &self.slow_threads)
            .finish_non_exhaustive()
    }
}

impl<'a> Query<'a> {
    #[must_use]
    pub fn new(store: &'a Store, finders: &'a FinderSet) -> Self {
        Self::with_config(store, finders, &ArchiveConfig::default())
    }

    #[must_use]
    pub fn with_config(store: &'a Store, finders: &'a FinderSet, config: &ArchiveConfig) -> Self {
        Self {
            store,
            finders,
            slow_threads: config.slow_filter_threads.max(1),
            pool: OnceCell::new(),
        }
    }

    fn pool(&self) -> Result<&ThreadPool> {
        self.pool.get_or_try_init(|| {
            ThreadPoolBuilder::new()
                .num_threads(self.slow_threads)
                .thread_name(|index| format!("slow-filter-{index}"))
                .build()
                .map_err(|err| ArchiveError::InvalidConfig {
                    reason: format!("slow filter pool: {err}").into(),
                })
        })
    }

    /// Matching artworks, ordered, after `offset` and `count`.
    pub fn run(&self, filter: &ArtworkFilter, cancel: &CancellationToken) -> Result<Vec<Artwork>> {
        if filter.count == Some(0) {
            return Ok(Vec::new());
        }
        cancel.check()?;
        let prepared = filter.prepare(self.store);

        let candidates = self.fast_phase(&prepared, cancel);
        cancel.check()?;
        let fast = candidates.len();

        let mut matched = if filter.has_slow_filter() {
            self.slow_phase(&prepared, candidates, cancel)?
        } else {
            candidates
        };
        cancel.check()?;
        let slow = matched.len();

        filter.order.sort(&mut matched);
        let page: Vec<Artwork> = matched
            .into_iter()
            .skip(filter.offset)
            .take(filter.count.unwrap_or(usize::MAX))
            .collect();
        tracing::debug!(fast, slow, returned = page.len(), order = ?filter.order, "query finished");
        Ok(page)
    }

    /// Like [`Query::run`], returning only ids.
    pub fn run_ids(&self, filter: &ArtworkFilter, cancel: &CancellationToken) -> Result<Vec<u64>> {
        Ok(self.run(filter, cancel)?.into_iter().map(|artwork| artwork.id).collect())
    }

    /// Number of artworks passing both phases, ignoring `offset` and `count`.
    pub fn count(&self, filter: &ArtworkFilter, cancel: &CancellationToken) -> Result<usize> {
        let unpaged = ArtworkFilter {
            offset: 0,
            count: None,
            ..filter.clone()
        };
        Ok(self.run(&unpaged, cancel)?.len())
    }

    fn fast_phase(&self, prepared: &PreparedFilter<'_>, cancel: &CancellationToken) -> Vec<Artwork> {
        // An allow list names every possible match; look those up instead of scanning.
        if let Some(ids) = prepared.filter().id_filter.as_ref().and_then(|ids| ids.allow_list()) {
            let mut ids = ids.to_vec();
            ids.sort_unstable();
            ids.dedup();
            return ids
                .par_iter()
                .filter(|_| !cancel.is_cancelled())
                .filter_map(|&id| self.store.get_artwork(id))
                .filter(|artwork| prepared.matches_fast(artwork))
                .collect();
        }
        self.store
            .artworks
            .par_iter()
            .filter(|_| !cancel.is_cancelled())
            .filter(|entry| prepared.matches_fast(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn slow_phase(
        &self,
        prepared: &PreparedFilter<'_>,
        candidates: Vec<Artwork>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Artwork>> {
        let pool = self.pool()?;
        let (store, finders) = (self.store, self.finders);
        Ok(pool.install(|| {
            candidates
                .into_par_iter()
                .with_max_len(1)
                .filter(|artwork| !cancel.is_cancelled() && prepared.matches_slow(artwork, store, finders))
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::finder::FinderWithIndex;
    use crate::types::{ArtworkKind, User};

    fn store() -> Store {
        let store = Store::new();
        for id in 1..=20u64 {
            let mut artwork = Artwork::new(id);
            artwork.user_id = 100 + id % 2;
            artwork.total_view = id * 10;
            artwork.page_count = 1;
            store.merge_artwork(artwork);
        }
        let mut followed = User::new(101);
        followed.is_followed = true;
        store.merge_user(followed);
        store
    }

    #[test]
    fn count_zero_is_empty() {
        let store = store();
        let finders = FinderSet::null();
        let filter = ArtworkFilter {
            count: Some(0),
            ..ArtworkFilter::default()
        };
        let query = Query::new(&store, &finders);
        assert!(query.run(&filter, &CancellationToken::new()).unwrap().is_empty());
    }

    #[test]
    fn order_offset_count() {
        let store = store();
        let finders = FinderSet::null();
        let filter = ArtworkFilter::from_json(r#"{ "order": "reverse-view", "offset": 2, "count": 3 }"#).unwrap();
        let ids = Query::new(&store, &finders)
            .run_ids(&filter, &CancellationToken::new())
            .unwrap();
        assert_eq!(ids, vec![18, 17, 16]);
    }

    #[test]
    fn allow_list_skips_the_scan() {
        let store = store();
        let finders = FinderSet::null();
        let filter = ArtworkFilter::from_json(r#"{ "id-filter": { "id": [3, 99, 3, 5], "ignore-id": [5] } }"#).unwrap();
        let ids = Query::new(&store, &finders)
            .run_ids(&filter, &CancellationToken::new())
            .unwrap();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn user_filter_runs_in_slow_phase() {
        let store = store();
        let finders = FinderSet::null();
        let filter = ArtworkFilter::from_json(r#"{ "user-filter": { "follow": true, "only-registered": true } }"#).unwrap();
        let ids = Query::new(&store, &finders)
            .run_ids(&filter, &CancellationToken::new())
            .unwrap();
        assert_eq!(ids, (1..=20).filter(|id| id % 2 == 1).collect::<Vec<u64>>());
    }

    struct CancelAfter {
        calls: AtomicUsize,
        limit: usize,
        token: CancellationToken,
    }

    impl FinderWithIndex for CancelAfter {
        fn exists(&self, _artwork: &Artwork, _page: u32) -> bool {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
                self.token.cancel();
            }
            true
        }
    }

    #[test]
    fn cancellation_stops_the_slow_phase() {
        let store = store();
        // Records default to illust, so the illust finder answers.
        assert_eq!(Artwork::new(1).kind, ArtworkKind::Illust);
        let token = CancellationToken::new();
        let finder = Arc::new(CancelAfter {
            calls: AtomicUsize::new(0),
            limit: 3,
            token: token.clone(),
        });
        let mut finders = FinderSet::null();
        finders.illust_original = finder.clone();
        let filter = ArtworkFilter::from_json(r#"{ "file-filter": { "original": { "min": 1 } } }"#).unwrap();
        let config = ArchiveConfig {
            slow_filter_threads: 1,
            ..ArchiveConfig::default()
        };
        let err = Query::with_config(&store, &finders, &config)
            .run(&filter, &token)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(finder.calls.load(Ordering::SeqCst) < 20);
    }
}
