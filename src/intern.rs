//! Bidirectional string ↔ id registry for tag and tool names.
//!
//! Ids start at 1 and grow strictly; `0` is reserved for "absent". Entries are never removed or
//! reassigned, so an id handed out once stays valid for the life of the archive.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{ArchiveError, Result};
use crate::types::InternId;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Concurrent intern table. Lookups in either direction are O(1) average and never take a
/// table-wide lock.
#[derive(Debug)]
pub struct StringTable {
    instance: u64,
    by_text: DashMap<Arc<str>, InternId>,
    by_id: DashMap<InternId, Arc<str>>,
    next: AtomicU32,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            by_text: DashMap::new(),
            by_id: DashMap::new(),
            next: AtomicU32::new(1),
        }
    }

    /// Rebuilds a table from persisted `(id, text)` pairs. Id 0 and empty text are skipped; a
    /// repeated id or text is a corrupt snapshot.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (InternId, String)>,
    {
        let table = Self::new();
        let mut max_id = 0;
        for (id, text) in entries {
            if id == 0 || text.is_empty() {
                continue;
            }
            let text: Arc<str> = Arc::from(text);
            if table.by_id.insert(id, Arc::clone(&text)).is_some() {
                return Err(ArchiveError::snapshot(format!("intern id {id} appears twice")));
            }
            if table.by_text.insert(text, id).is_some() {
                return Err(ArchiveError::snapshot(format!(
                    "intern text for id {id} appears twice"
                )));
            }
            max_id = max_id.max(id);
        }
        let next = max_id
            .checked_add(1)
            .ok_or_else(|| ArchiveError::snapshot("intern id space exhausted"))?;
        table.next.store(next, Ordering::SeqCst);
        Ok(table)
    }

    /// Identity of this table instance; caches keyed on it go stale only when the table is
    /// replaced.
    #[must_use]
    pub fn instance_id(&self) -> u64 {
        self.instance
    }

    /// Returns the id for `text`, assigning the next one if it is new. Empty text is `0` and is
    /// never stored. Fails once every id up to `u32::MAX - 1` is taken.
    pub fn register(&self, text: &str) -> Result<InternId> {
        if text.is_empty() {
            return Ok(0);
        }
        if let Some(id) = self.by_text.get(text) {
            return Ok(*id);
        }
        // The entry guard holds the shard lock, so only one caller can assign an id per text.
        match self.by_text.entry(Arc::from(text)) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => {
                let id = self
                    .next
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| next.checked_add(1))
                    .map_err(|_| ArchiveError::InternExhausted)?;
                self.by_id.insert(id, Arc::clone(entry.key()));
                entry.insert(id);
                Ok(id)
            }
        }
    }

    /// Registers every non-empty text, keeping input order and dropping empties.
    pub fn register_all<'a, I>(&self, texts: I) -> Result<Vec<InternId>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ids = Vec::new();
        for text in texts {
            let id = self.register(text)?;
            if id != 0 {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    #[must_use]
    pub fn get_id(&self, text: &str) -> Option<InternId> {
        if text.is_empty() {
            return None;
        }
        self.by_text.get(text).map(|id| *id)
    }

    #[must_use]
    pub fn get_text(&self, id: InternId) -> Option<Arc<str>> {
        self.by_id.get(&id).map(|text| Arc::clone(&text))
    }

    /// Number of entries readable through [`Self::get_text`] and [`Self::find_partial`]. Never
    /// shrinks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Highest id handed out so far (`0` when empty). An id may be handed out slightly before
    /// its text becomes scannable.
    #[must_use]
    pub fn max_id(&self) -> InternId {
        self.next.load(Ordering::SeqCst).saturating_sub(1)
    }

    /// Ids whose text contains `needle` as a substring. Linear over the table.
    #[must_use]
    pub fn find_partial(&self, needle: &str) -> Vec<InternId> {
        let mut ids: Vec<InternId> = self
            .by_id
            .iter()
            .filter(|entry| entry.value().contains(needle))
            .map(|entry| *entry.key())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Every `(id, text)` pair sorted by id, for serialization.
    #[must_use]
    pub fn entries(&self) -> Vec<(InternId, Arc<str>)> {
        let mut entries: Vec<_> = self
            .by_id
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_zero_and_not_stored() {
        let table = StringTable::new();
        assert_eq!(table.register("").unwrap(), 0);
        assert!(table.is_empty());
        assert_eq!(table.get_id(""), None);
    }

    #[test]
    fn ids_are_sequential_and_stable() {
        let table = StringTable::new();
        let a = table.register("landscape").unwrap();
        let b = table.register("portrait").unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(table.register("landscape").unwrap(), a);
        assert_eq!(table.get_text(b).as_deref(), Some("portrait"));
        assert_eq!(table.max_id(), 2);
    }

    #[test]
    fn from_entries_continues_after_max_id() {
        let table =
            StringTable::from_entries([(0, "zero".to_string()), (7, "seven".to_string()), (3, String::new())])
                .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.register("next").unwrap(), 8);
    }

    #[test]
    fn last_id_in_snapshot_is_rejected() {
        let err = StringTable::from_entries([(u32::MAX, "x".to_string())]).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidSnapshot { .. }));
    }

    #[test]
    fn registration_stops_at_the_end_of_the_id_space() {
        let table = StringTable::from_entries([(u32::MAX - 1, "last".to_string())]).unwrap();
        assert!(matches!(table.register("one more"), Err(ArchiveError::InternExhausted)));
        assert_eq!(table.get_id("one more"), None);
        assert_eq!(table.register("last").unwrap(), u32::MAX - 1);
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let err = StringTable::from_entries([(1, "a".to_string()), (2, "a".to_string())]).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidSnapshot { .. }));
    }

    #[test]
    fn partial_search_scans_all_texts() {
        let table = StringTable::new();
        table.register_all(["blue sky", "sky", "sea"]).unwrap();
        assert_eq!(table.find_partial("sky"), vec![1, 2]);
        assert!(table.find_partial("forest").is_empty());
    }

    #[test]
    fn instances_have_distinct_identity() {
        assert_ne!(StringTable::new().instance_id(), StringTable::new().instance_id());
    }
}
