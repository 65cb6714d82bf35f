//! Tag clauses evaluated over interned tag ids.
//!
//! Patterns are resolved against a [`StringTable`] once: exact patterns to a single id, partial
//! patterns to the sorted set of ids whose text contains them. The resolution is cached per table
//! and rebuilt when a different table (or a table that has since grown) is seen.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::text::{TextFilter, combine, patterns};
use crate::intern::StringTable;
use crate::types::InternId;

/// Same clause shape as [`TextFilter`], matched against tag names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(flatten)]
    pub clauses: TextFilter,
    #[serde(skip)]
    cache: ResolveCache,
}

impl PartialEq for TagFilter {
    fn eq(&self, other: &Self) -> bool {
        self.clauses == other.clauses
    }
}

impl From<TextFilter> for TagFilter {
    fn from(clauses: TextFilter) -> Self {
        Self {
            clauses,
            cache: ResolveCache::default(),
        }
    }
}

/// Key of a resolution: table instance and how many entries were readable before it started.
type CacheKey = (u64, usize);

#[derive(Debug, Default)]
struct ResolveCache(Mutex<Option<(CacheKey, Arc<ResolvedTags>)>>);

impl Clone for ResolveCache {
    fn clone(&self) -> Self {
        Self::default()
    }
}

/// Tag clauses with every pattern turned into ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTags {
    exact: Option<Vec<Option<InternId>>>,
    exact_or: bool,
    partial: Option<Vec<Vec<InternId>>>,
    partial_or: bool,
    ignore_exact: Option<Vec<Option<InternId>>>,
    ignore_exact_or: bool,
    ignore_partial: Option<Vec<Vec<InternId>>>,
    ignore_partial_or: bool,
}

fn resolve_exact(table: &StringTable, list: Option<&Vec<String>>) -> Option<Vec<Option<InternId>>> {
    patterns(list).map(|list| list.iter().map(|name| table.get_id(name)).collect())
}

fn resolve_partial(table: &StringTable, list: Option<&Vec<String>>) -> Option<Vec<Vec<InternId>>> {
    patterns(list).map(|list| list.iter().map(|needle| table.find_partial(needle)).collect())
}

fn has_exact(tags: &[InternId], id: Option<InternId>) -> bool {
    id.is_some_and(|id| tags.contains(&id))
}

/// `ids` is sorted.
fn has_partial(tags: &[InternId], ids: &[InternId]) -> bool {
    tags.iter().any(|tag| ids.binary_search(tag).is_ok())
}

impl ResolvedTags {
    #[must_use]
    pub fn resolve(clauses: &TextFilter, table: &StringTable) -> Self {
        Self {
            exact: resolve_exact(table, clauses.exact.as_ref()),
            exact_or: clauses.exact_or,
            partial: resolve_partial(table, clauses.partial.as_ref()),
            partial_or: clauses.partial_or,
            ignore_exact: resolve_exact(table, clauses.ignore_exact.as_ref()),
            ignore_exact_or: clauses.ignore_exact_or,
            ignore_partial: resolve_partial(table, clauses.ignore_partial.as_ref()),
            ignore_partial_or: clauses.ignore_partial_or,
        }
    }

    /// Evaluates the clauses against an effective tag-id set.
    #[must_use]
    pub fn matches(&self, tags: &[InternId]) -> bool {
        if let Some(ids) = &self.exact {
            if !combine(ids, self.exact_or, |&id| has_exact(tags, id)) {
                return false;
            }
        }
        if let Some(sets) = &self.partial {
            if !combine(sets, self.partial_or, |ids| has_partial(tags, ids)) {
                return false;
            }
        }
        if let Some(ids) = &self.ignore_exact {
            if combine(ids, self.ignore_exact_or, |&id| has_exact(tags, id)) {
                return false;
            }
        }
        if let Some(sets) = &self.ignore_partial {
            if combine(sets, self.ignore_partial_or, |ids| has_partial(tags, ids)) {
                return false;
            }
        }
        true
    }
}

impl TagFilter {
    /// Resolved clauses for `table`, reusing the cached resolution when the table is unchanged.
    ///
    /// The key is read before resolving. An entry that lands mid-resolution raises the count
    /// past the key, so the next call resolves again instead of reusing a partial result.
    pub fn resolve(&self, table: &StringTable) -> Arc<ResolvedTags> {
        let key = (table.instance_id(), table.len());
        let mut slot = self.cache.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some((cached, resolved)) = slot.as_ref() {
            if *cached == key {
                return Arc::clone(resolved);
            }
        }
        let resolved = Arc::new(ResolvedTags::resolve(&self.clauses, table));
        tracing::trace!(table = key.0, entries = key.1, "resolved tag filter");
        *slot = Some((key, Arc::clone(&resolved)));
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> StringTable {
        let table = StringTable::new();
        for name in ["landscape", "sky", "night sky", "cat", "black cat"] {
            table.register(name).unwrap();
        }
        table
    }

    fn tag_filter(json: &str) -> TagFilter {
        serde_json::from_str(json).unwrap()
    }

    fn ids(table: &StringTable, names: &[&str]) -> Vec<InternId> {
        names.iter().map(|name| table.get_id(name).unwrap()).collect()
    }

    #[test]
    fn unknown_exact_tag_never_matches() {
        let table = table();
        let filter = tag_filter(r#"{ "exact": "dog" }"#);
        let resolved = filter.resolve(&table);
        assert!(!resolved.matches(&ids(&table, &["cat", "sky"])));
        assert!(!resolved.matches(&[]));
    }

    #[test]
    fn exact_and_requires_every_tag() {
        let table = table();
        let filter = tag_filter(r#"{ "exact": ["cat", "sky"], "exact-or": false }"#);
        let resolved = filter.resolve(&table);
        assert!(resolved.matches(&ids(&table, &["cat", "sky", "landscape"])));
        assert!(!resolved.matches(&ids(&table, &["cat"])));
    }

    #[test]
    fn partial_clauses_use_substring_sets() {
        let table = table();
        let filter = tag_filter(r#"{ "partial": "sky", "ignore-partial": "black" }"#);
        let resolved = filter.resolve(&table);
        assert!(resolved.matches(&ids(&table, &["night sky"])));
        assert!(!resolved.matches(&ids(&table, &["night sky", "black cat"])));
        assert!(!resolved.matches(&ids(&table, &["cat"])));
    }

    #[test]
    fn ignore_exact_and_rejects_only_full_set() {
        let table = table();
        let filter = tag_filter(r#"{ "ignore-exact": ["cat", "sky"], "ignore-exact-or": false }"#);
        let resolved = filter.resolve(&table);
        assert!(resolved.matches(&ids(&table, &["cat"])));
        assert!(!resolved.matches(&ids(&table, &["cat", "sky"])));
    }

    #[test]
    fn cache_follows_table_growth() {
        let table = table();
        let filter = tag_filter(r#"{ "exact": "dog" }"#);
        let first = filter.resolve(&table);
        assert!(Arc::ptr_eq(&first, &filter.resolve(&table)));

        let dog = table.register("dog").unwrap();
        let second = filter.resolve(&table);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.matches(&[dog]));

        let other = StringTable::new();
        other.register("dog").unwrap();
        assert!(!Arc::ptr_eq(&second, &filter.resolve(&other)));
    }

    #[test]
    fn resolution_racing_registration_is_not_kept() {
        let table = StringTable::new();
        let filter = tag_filter(r#"{ "partial": "sky" }"#);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for n in 0..2_000 {
                    table.register(&format!("sky {n}")).unwrap();
                }
            });
            for _ in 0..200 {
                filter.resolve(&table);
            }
        });
        let resolved = filter.resolve(&table);
        let last = table.get_id("sky 1999").unwrap();
        assert!(resolved.matches(&[last]));
        assert_eq!(resolved.partial.as_ref().unwrap()[0].len(), 2_000);
    }
}
