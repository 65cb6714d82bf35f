//! In-memory archive store and its snapshot lifecycle.
//!
//! The store is loaded once from a snapshot, mutated concurrently while the process runs, and
//! written back as one atomic file replace. Artwork and author collections are sharded maps:
//! readers only ever touch the shard of the id they look up, and an upsert holds that shard's
//! entry lock for the whole construct-or-merge step, so other callers observe either the record
//! before the merge or after it.

use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use chrono::NaiveDate;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rayon::prelude::*;

use crate::codec::{DecodedSnapshot, decode_snapshot, encode_snapshot};
use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::intern::StringTable;
use crate::io::{read_file, write_atomic};
use crate::types::{Artwork, HideReason, InternId, RankingKind, RankingTable, User};

fn snapshot_path(config: &ArchiveConfig) -> Result<&Path> {
    config.snapshot_path.as_deref().ok_or_else(|| ArchiveError::InvalidConfig {
        reason: "snapshot-path is not set".into(),
    })
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// No record existed; the constructor ran and its value was stored.
    Inserted,
    /// An existing record was merged in place.
    Updated,
    /// No record existed and the constructor declined to create one.
    Skipped,
}

impl Upsert {
    #[must_use]
    pub fn is_inserted(self) -> bool {
        self == Self::Inserted
    }
}

/// Counts from folding another archive into a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotMerge {
    pub inserted: usize,
    pub updated: usize,
    /// Authorless artworks and copies with no more views than the stored record.
    pub skipped: usize,
    pub users: usize,
    pub rankings: usize,
}

/// Maps ids of `from` onto `to` through their text. Ids unknown to `from` are dropped.
fn translate(ids: &[InternId], from: &StringTable, to: &StringTable) -> Result<Vec<InternId>> {
    let mut translated = Vec::with_capacity(ids.len());
    for &id in ids {
        match from.get_text(id) {
            Some(text) => translated.push(to.register(&text)?),
            None => tracing::warn!(intern.id = id, "intern id missing from merged archive; dropping"),
        }
    }
    Ok(translated)
}

fn translate_opt(ids: &mut Option<Vec<InternId>>, from: &StringTable, to: &StringTable) -> Result<()> {
    if let Some(list) = ids.as_mut() {
        *list = translate(list, from, to)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct Store {
    pub(crate) artworks: DashMap<u64, Artwork>,
    pub(crate) users: DashMap<u64, User>,
    tags: StringTable,
    tools: StringTable,
    rankings: RwLock<RankingTable>,
    dirty: AtomicBool,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self {
            artworks: DashMap::new(),
            users: DashMap::new(),
            tags: StringTable::new(),
            tools: StringTable::new(),
            rankings: RwLock::new(RankingTable::new()),
            dirty: AtomicBool::new(false),
        }
    }

    /// Seeds a store from a decoded snapshot. The result starts clean.
    #[must_use]
    pub fn from_snapshot(snapshot: DecodedSnapshot) -> Self {
        let artworks = DashMap::with_capacity(snapshot.artworks.len());
        for artwork in snapshot.artworks {
            if let Some(previous) = artworks.insert(artwork.id, artwork) {
                tracing::warn!(artwork.id = previous.id, "duplicate artwork in snapshot; keeping the later copy");
            }
        }
        let users = DashMap::with_capacity(snapshot.users.len());
        for user in snapshot.users {
            if let Some(previous) = users.insert(user.id, user) {
                tracing::warn!(user.id = previous.id, "duplicate author in snapshot; keeping the later copy");
            }
        }
        Self {
            artworks,
            users,
            tags: snapshot.tags,
            tools: snapshot.tools,
            rankings: RwLock::new(snapshot.rankings),
            dirty: AtomicBool::new(false),
        }
    }

    /// Loads `path`. A missing file yields an empty store; anything unreadable is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(bytes) = read_file(path)? else {
            tracing::info!(path = %path.display(), "no snapshot found; starting empty");
            return Ok(Self::new());
        };
        let snapshot = decode_snapshot(&bytes)?;
        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            version.major = snapshot.major,
            version.minor = snapshot.minor,
            artworks = snapshot.artworks.len(),
            users = snapshot.users.len(),
            tags = snapshot.tags.len(),
            tools = snapshot.tools.len(),
            verified = snapshot.verified,
            "snapshot loaded"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Loads the snapshot named by `config`.
    pub fn open(config: &ArchiveConfig) -> Result<Self> {
        Self::load(snapshot_path(config)?)
    }

    /// Saves to the snapshot named by `config` when dirty, honouring its checksum setting.
    pub fn commit(&self, config: &ArchiveConfig) -> Result<bool> {
        self.save_if_dirty(snapshot_path(config)?, config.checksum)
    }

    /// Writes a checksummed snapshot to `path` and clears the dirty flag.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.save_with_checksum(path, true)
    }

    pub fn save_with_checksum(&self, path: &Path, checksum: bool) -> Result<()> {
        // Clear first so a mutation racing with the encode re-marks the store.
        self.dirty.store(false, Ordering::SeqCst);
        let bytes = match encode_snapshot(self, checksum) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.mark_dirty();
                return Err(err);
            }
        };
        if let Err(err) = write_atomic(path, |file| {
            file.write_all(&bytes)?;
            Ok(())
        }) {
            self.mark_dirty();
            return Err(err);
        }
        tracing::info!(
            path = %path.display(),
            bytes = bytes.len(),
            artworks = self.artwork_count(),
            users = self.user_count(),
            checksum,
            "snapshot saved"
        );
        Ok(())
    }

    /// Saves only when something changed since load or the last save.
    pub fn save_if_dirty(&self, path: &Path, checksum: bool) -> Result<bool> {
        if !self.is_dirty() {
            tracing::debug!(path = %path.display(), "snapshot clean; skipping save");
            return Ok(false);
        }
        self.save_with_checksum(path, checksum)?;
        Ok(true)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn tags(&self) -> &StringTable {
        &self.tags
    }

    #[must_use]
    pub fn tools(&self) -> &StringTable {
        &self.tools
    }

    /// Read access to the ranking table.
    pub fn rankings(&self) -> RwLockReadGuard<'_, RankingTable> {
        self.rankings.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_ranking(&self, date: NaiveDate, kind: RankingKind, ids: Vec<u64>) {
        let mut rankings = self.rankings.write().unwrap_or_else(PoisonError::into_inner);
        if rankings.get(date, kind) != Some(ids.as_slice()) {
            rankings.set(date, kind, ids);
            self.mark_dirty();
        }
    }

    #[must_use]
    pub fn artwork_count(&self) -> usize {
        self.artworks.len()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn contains_artwork(&self, id: u64) -> bool {
        self.artworks.contains_key(&id)
    }

    #[must_use]
    pub fn get_artwork(&self, id: u64) -> Option<Artwork> {
        self.artworks.get(&id).map(|artwork| artwork.clone())
    }

    #[must_use]
    pub fn get_user(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|user| user.clone())
    }

    /// Artwork ids in ascending order.
    #[must_use]
    pub fn artwork_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.artworks.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    #[must_use]
    pub fn user_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.users.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Runs `f` over every artwork on the rayon pool. Visit order is unspecified.
    pub fn for_each_artwork<F>(&self, f: F)
    where
        F: Fn(&Artwork) + Sync + Send,
    {
        self.artworks.par_iter().for_each(|entry| f(entry.value()));
    }

    /// Inserts or updates artwork `id`.
    ///
    /// `construct` runs at most once, and only when no record exists; returning `None` skips the
    /// insert. `update` runs against the stored record otherwise. Both run under the entry lock
    /// for `id`, so they must not call back into this store's artwork map.
    pub fn upsert_artwork<C, U>(&self, id: u64, construct: C, update: U) -> Upsert
    where
        C: FnOnce() -> Option<Artwork>,
        U: FnOnce(&mut Artwork),
    {
        let outcome = match self.artworks.entry(id) {
            Entry::Occupied(mut entry) => {
                update(entry.get_mut());
                Upsert::Updated
            }
            Entry::Vacant(entry) => match construct() {
                Some(artwork) if artwork.id == id => {
                    entry.insert(artwork);
                    Upsert::Inserted
                }
                Some(artwork) => {
                    tracing::warn!(artwork.id = id, constructed = artwork.id, "constructed artwork has a different id; skipping");
                    Upsert::Skipped
                }
                None => Upsert::Skipped,
            },
        };
        if outcome != Upsert::Skipped {
            self.mark_dirty();
        }
        outcome
    }

    /// Inserts or updates author `id` with the same guarantees as [`Self::upsert_artwork`].
    pub fn upsert_user<C, U>(&self, id: u64, construct: C, update: U) -> Upsert
    where
        C: FnOnce() -> Option<User>,
        U: FnOnce(&mut User),
    {
        let outcome = match self.users.entry(id) {
            Entry::Occupied(mut entry) => {
                update(entry.get_mut());
                Upsert::Updated
            }
            Entry::Vacant(entry) => match construct() {
                Some(user) if user.id == id => {
                    entry.insert(user);
                    Upsert::Inserted
                }
                _ => Upsert::Skipped,
            },
        };
        if outcome != Upsert::Skipped {
            self.mark_dirty();
        }
        outcome
    }

    /// Folds a freshly fetched artwork into the store using the overwrite rules.
    pub fn merge_artwork(&self, fresh: Artwork) -> Upsert {
        let outcome = match self.artworks.entry(fresh.id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().overwrite(&fresh);
                Upsert::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh);
                Upsert::Inserted
            }
        };
        self.mark_dirty();
        outcome
    }

    /// Folds a freshly fetched author into the store using the overwrite rules.
    pub fn merge_user(&self, fresh: User) -> Upsert {
        let outcome = match self.users.entry(fresh.id) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().overwrite(&fresh);
                Upsert::Updated
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh);
                Upsert::Inserted
            }
        };
        self.mark_dirty();
        outcome
    }

    /// Folds another archive into this one.
    ///
    /// Tag and tool ids are translated through the other archive's tables. Artworks without an
    /// author are dropped; a stored artwork only takes the incoming copy when that copy has
    /// more views. Authors merge with the usual overwrite rules, and rankings fill in the dates
    /// and kinds this store lacks.
    pub fn merge_snapshot(&self, other: DecodedSnapshot) -> Result<SnapshotMerge> {
        let mut summary = SnapshotMerge::default();
        for mut artwork in other.artworks {
            if artwork.user_id == 0 {
                summary.skipped += 1;
                continue;
            }
            artwork.tags = translate(&artwork.tags, &other.tags, &self.tags)?;
            artwork.tools = translate(&artwork.tools, &other.tools, &self.tools)?;
            translate_opt(&mut artwork.extra_tags, &other.tags, &self.tags)?;
            translate_opt(&mut artwork.fake_tags, &other.tags, &self.tags)?;
            match self.artworks.entry(artwork.id) {
                Entry::Occupied(mut entry) if entry.get().total_view < artwork.total_view => {
                    entry.get_mut().overwrite(&artwork);
                    summary.updated += 1;
                }
                Entry::Occupied(_) => summary.skipped += 1,
                Entry::Vacant(entry) => {
                    entry.insert(artwork);
                    summary.inserted += 1;
                }
            }
        }
        for mut user in other.users {
            translate_opt(&mut user.extra_tags, &other.tags, &self.tags)?;
            self.merge_user(user);
            summary.users += 1;
        }
        {
            let mut rankings = self.rankings.write().unwrap_or_else(PoisonError::into_inner);
            for (date, kind, ids) in other.rankings.iter() {
                if rankings.get(date, kind).is_none() {
                    rankings.set(date, kind, ids.to_vec());
                    summary.rankings += 1;
                }
            }
        }
        if summary.inserted + summary.updated + summary.users + summary.rankings > 0 {
            self.mark_dirty();
        }
        tracing::info!(
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            users = summary.users,
            rankings = summary.rankings,
            "archive merged"
        );
        Ok(summary)
    }

    fn edit_artwork<F>(&self, id: u64, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Artwork),
    {
        let mut artwork = self.artworks.get_mut(&id).ok_or(ArchiveError::NotFound { id })?;
        edit(artwork.value_mut());
        drop(artwork);
        self.mark_dirty();
        Ok(())
    }

    pub fn set_hide_reason(&self, id: u64, reason: HideReason) -> Result<()> {
        self.edit_artwork(id, |artwork| artwork.hide_reason = reason)
    }

    /// Hides (or unhides, with `NotHidden`) a single page.
    pub fn set_page_hide(&self, id: u64, page: u32, reason: HideReason) -> Result<()> {
        self.edit_artwork(id, |artwork| {
            let map = artwork.page_hide.get_or_insert_with(Default::default);
            if reason.is_hidden() {
                map.insert(page, reason);
            } else {
                map.remove(&page);
            }
            if map.is_empty() {
                artwork.page_hide = None;
            }
        })
    }

    pub fn set_memo(&self, id: u64, memo: Option<String>) -> Result<()> {
        self.edit_artwork(id, |artwork| artwork.memo = memo)
    }

    pub fn set_extra_tags(&self, id: u64, tags: Option<Vec<InternId>>) -> Result<()> {
        self.edit_artwork(id, |artwork| artwork.extra_tags = tags)
    }

    pub fn set_fake_tags(&self, id: u64, tags: Option<Vec<InternId>>) -> Result<()> {
        self.edit_artwork(id, |artwork| artwork.fake_tags = tags)
    }

    /// Replaces the animation frame delays.
    pub fn set_frames(&self, id: u64, frames: Option<Vec<u16>>) -> Result<()> {
        self.edit_artwork(id, |artwork| artwork.frames = frames)
    }

    pub fn set_user_hide_reason(&self, id: u64, reason: HideReason) -> Result<()> {
        let mut user = self.users.get_mut(&id).ok_or(ArchiveError::NotFound { id })?;
        user.hide_reason = reason;
        drop(user);
        self.mark_dirty();
        Ok(())
    }

    pub fn remove_artwork(&self, id: u64) -> Option<Artwork> {
        let removed = self.artworks.remove(&id).map(|(_, artwork)| artwork);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    #[test]
    fn construct_runs_once_under_contention() {
        let store = Arc::new(Store::new());
        let constructed = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let constructed = Arc::clone(&constructed);
                std::thread::spawn(move || {
                    store.upsert_artwork(
                        9,
                        || {
                            constructed.fetch_add(1, Ordering::SeqCst);
                            Some(Artwork::new(9))
                        },
                        |artwork| artwork.total_view += 1,
                    )
                })
            })
            .collect();
        let outcomes: Vec<Upsert> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(constructed.load(Ordering::SeqCst), 1);
        assert_eq!(outcomes.iter().filter(|o| o.is_inserted()).count(), 1);
        assert_eq!(store.get_artwork(9).unwrap().total_view, 7);
    }

    #[test]
    fn skipped_construct_leaves_store_clean() {
        let store = Store::new();
        assert_eq!(store.upsert_artwork(1, || None, |_| {}), Upsert::Skipped);
        assert!(!store.is_dirty());
        assert!(!store.contains_artwork(1));
    }

    #[test]
    fn page_hide_edits_collapse_empty_map() {
        let store = Store::new();
        store.merge_artwork(Artwork::new(3));
        store.set_page_hide(3, 1, HideReason::Crop).unwrap();
        assert_eq!(store.get_artwork(3).unwrap().page_hide.unwrap().len(), 1);
        store.set_page_hide(3, 1, HideReason::NotHidden).unwrap();
        assert_eq!(store.get_artwork(3).unwrap().page_hide, None);
        assert!(matches!(
            store.set_memo(99, None),
            Err(ArchiveError::NotFound { id: 99 })
        ));
    }

    #[test]
    fn save_if_dirty_round_trips() {
        let dir = tempdir().expect("tmp");
        let path = dir.path().join("archive.pxv");
        let store = Store::new();
        assert!(!store.save_if_dirty(&path, true).unwrap());
        assert!(!path.exists());

        let tag = store.tags().register("sky").unwrap();
        let mut artwork = Artwork::new(5);
        artwork.tags = vec![tag];
        store.merge_artwork(artwork.clone());
        store.set_ranking(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), RankingKind::Day, vec![5]);
        assert!(store.save_if_dirty(&path, true).unwrap());
        assert!(!store.is_dirty());

        let loaded = Store::load(&path).unwrap();
        assert_eq!(loaded.get_artwork(5), Some(artwork));
        assert_eq!(loaded.tags().get_text(tag).as_deref(), Some("sky"));
        assert_eq!(
            loaded
                .rankings()
                .get(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), RankingKind::Day),
            Some(&[5u64][..])
        );
        assert!(!loaded.is_dirty());
    }

    #[test]
    fn for_each_visits_every_artwork() {
        let store = Store::new();
        for id in 1..=64 {
            let mut artwork = Artwork::new(id);
            artwork.total_view = id;
            store.merge_artwork(artwork);
        }
        let total = AtomicUsize::new(0);
        store.for_each_artwork(|artwork| {
            total.fetch_add(artwork.total_view as usize, Ordering::Relaxed);
        });
        assert_eq!(total.into_inner(), 64 * 65 / 2);
    }

    #[test]
    fn config_names_the_snapshot_and_its_checksum() {
        let dir = tempdir().expect("tmp");
        assert!(matches!(
            Store::open(&ArchiveConfig::default()),
            Err(ArchiveError::InvalidConfig { .. })
        ));

        let config = ArchiveConfig {
            snapshot_path: Some(dir.path().join("archive.pxv")),
            checksum: false,
            ..ArchiveConfig::default()
        };
        let store = Store::open(&config).unwrap();
        assert!(!store.commit(&config).unwrap(), "clean store is not written");
        store.merge_artwork(Artwork::new(8));
        assert!(store.commit(&config).unwrap());

        let bytes = std::fs::read(dir.path().join("archive.pxv")).unwrap();
        let snapshot = decode_snapshot(&bytes).unwrap();
        assert!(!snapshot.verified);
        assert!(Store::open(&config).unwrap().contains_artwork(8));
    }

    fn authored(id: u64, view: u64, tags: Vec<InternId>) -> Artwork {
        let mut artwork = Artwork::new(id);
        artwork.user_id = 3;
        artwork.total_view = view;
        artwork.tags = tags;
        artwork
    }

    #[test]
    fn merging_an_archive_keeps_the_higher_view_count() {
        let store = Store::new();
        let sky = store.tags().register("sky").unwrap();
        store.merge_artwork(authored(1, 100, vec![sky]));
        store.merge_artwork(authored(2, 10, vec![sky]));

        let other = Store::new();
        let (sea, cloud, other_sky) = (
            other.tags().register("sea").unwrap(),
            other.tags().register("cloud").unwrap(),
            other.tags().register("sky").unwrap(),
        );
        let brush = other.tools().register("brush").unwrap();
        other.merge_artwork(authored(1, 50, vec![sea]));
        let mut newer = authored(2, 200, vec![cloud]);
        newer.memo = Some("kept".into());
        other.merge_artwork(newer);
        let mut fresh = authored(3, 1, vec![other_sky, cloud]);
        fresh.tools = vec![brush];
        fresh.fake_tags = Some(vec![sea]);
        other.merge_artwork(fresh);
        other.merge_artwork(Artwork::new(4));
        let mut author = User::new(3);
        author.extra_tags = Some(vec![cloud]);
        other.merge_user(author);
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        other.set_ranking(date, RankingKind::Week, vec![3]);

        let decoded = decode_snapshot(&encode_snapshot(&other, true).unwrap()).unwrap();
        let summary = store.merge_snapshot(decoded).unwrap();
        assert_eq!(
            summary,
            SnapshotMerge {
                inserted: 1,
                updated: 1,
                skipped: 2,
                users: 1,
                rankings: 1,
            }
        );

        let tag = |name: &str| store.tags().get_id(name).unwrap();
        assert_eq!(store.get_artwork(1).unwrap().total_view, 100);
        assert_eq!(store.get_artwork(1).unwrap().tags, vec![sky]);
        let updated = store.get_artwork(2).unwrap();
        assert_eq!((updated.total_view, updated.tags.clone()), (200, vec![tag("cloud")]));
        assert_eq!(updated.memo.as_deref(), Some("kept"));
        let inserted = store.get_artwork(3).unwrap();
        assert_eq!(inserted.tags, vec![sky, tag("cloud")]);
        assert_eq!(inserted.fake_tags, Some(vec![tag("sea")]));
        assert_eq!(store.tools().get_text(inserted.tools[0]).as_deref(), Some("brush"));
        assert!(!store.contains_artwork(4), "authorless works are not merged");
        assert_eq!(store.get_user(3).unwrap().extra_tags, Some(vec![tag("cloud")]));
        assert_eq!(store.rankings().get(date, RankingKind::Week), Some(&[3u64][..]));
        assert!(store.is_dirty());
    }

    #[test]
    fn missing_snapshot_loads_empty() {
        let dir = tempdir().expect("tmp");
        let store = Store::load(&dir.path().join("absent.pxv")).unwrap();
        assert_eq!(store.artwork_count(), 0);
    }
}
