//! Artwork filter configuration and the two-phase query engine.
//!
//! [`ArtworkFilter`] is plain JSON config. Predicates that only read the record itself form the
//! fast phase; the author sub-filter and the file-existence sub-filter need a store lookup or a
//! [`FinderSet`] call and form the slow phase. [`Query`] runs both, then orders and paginates.

mod file;
mod order;
mod query;
mod range;
mod tag;
mod text;
mod user;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use file::{AllKeyword, FileFilter, MinPages, PageThreshold, Relation};
pub use order::OrderKind;
pub use query::Query;
pub use range::{DateFilter, HideFilter, IdFilter, MinMax};
pub use tag::{ResolvedTags, TagFilter};
pub use text::TextFilter;
pub use user::UserFilter;

use crate::error::Result;
use crate::finder::FinderSet;
use crate::intern::StringTable;
use crate::store::Store;
use crate::types::{Artwork, ArtworkKind};
use range::hide_allows;
use user::PreparedUserFilter;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArtworkFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<bool>,
    /// Maximum number of results. `0` yields nothing; absent is unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_filter: Option<FileFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<MinMax>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_filter: Option<IdFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub officially_removed: Option<bool>,
    #[serde(default)]
    pub order: OrderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<MinMax>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r18: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter: Option<TagFilter>,
    /// Matched against title and caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_filter: Option<TextFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bookmarks: Option<MinMax>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_view: Option<MinMax>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ArtworkKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_filter: Option<UserFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<MinMax>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_filter: Option<HideFilter>,
}

fn flag_matches(wanted: Option<bool>, actual: bool) -> bool {
    wanted.is_none_or(|wanted| wanted == actual)
}

fn range_matches(range: Option<&MinMax>, value: u64) -> bool {
    range.is_none_or(|range| range.contains(value))
}

impl ArtworkFilter {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs_err::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Whether any predicate needs the slow phase.
    #[must_use]
    pub fn has_slow_filter(&self) -> bool {
        self.user_filter.is_some() || self.file_filter.is_some()
    }

    /// Binds tag clauses to `store`'s tables. Resolutions are cached on the filter.
    #[must_use]
    pub fn prepare(&self, store: &Store) -> PreparedFilter<'_> {
        PreparedFilter {
            filter: self,
            tags: self.tag_filter.as_ref().map(|filter| filter.resolve(store.tags())),
            user: self.user_filter.as_ref().map(|filter| filter.prepare(store.tags())),
        }
    }

    /// Fast-phase predicates only, for callers outside a [`Query`] such as ingest-time dedup.
    #[must_use]
    pub fn matches_fast(&self, artwork: &Artwork, tags: &StringTable) -> bool {
        let resolved = self.tag_filter.as_ref().map(|filter| filter.resolve(tags));
        fast_matches(self, resolved.as_deref(), artwork)
    }
}

fn fast_matches(filter: &ArtworkFilter, tags: Option<&ResolvedTags>, artwork: &Artwork) -> bool {
    let flags = artwork.flags;
    hide_allows(filter.hide_filter.as_ref(), artwork.hide_reason)
        && flag_matches(filter.officially_removed, flags.officially_removed())
        && flag_matches(filter.visible, flags.visible())
        && flag_matches(filter.mute, flags.muted())
        && flag_matches(filter.bookmark, flags.bookmarked())
        && flag_matches(filter.r18, flags.restricted())
        && range_matches(filter.total_view.as_ref(), artwork.total_view)
        && range_matches(filter.total_bookmarks.as_ref(), artwork.total_bookmarks)
        && range_matches(filter.page_count.as_ref(), u64::from(artwork.page_count))
        && range_matches(filter.width.as_ref(), u64::from(artwork.width))
        && range_matches(filter.height.as_ref(), u64::from(artwork.height))
        && filter.kind.is_none_or(|kind| kind == artwork.kind)
        && filter.date.is_none_or(|date| date.contains(artwork.created))
        && filter.id_filter.as_ref().is_none_or(|ids| ids.contains(artwork.id))
        && tags.is_none_or(|tags| tags.matches(&artwork.effective_tags()))
        && filter
            .title_filter
            .as_ref()
            .is_none_or(|text| text.matches(&[artwork.title.as_str(), artwork.caption.as_str()]))
}

/// An [`ArtworkFilter`] with its tag clauses resolved.
#[derive(Debug)]
pub struct PreparedFilter<'a> {
    filter: &'a ArtworkFilter,
    tags: Option<Arc<ResolvedTags>>,
    user: Option<PreparedUserFilter<'a>>,
}

impl PreparedFilter<'_> {
    #[must_use]
    pub fn filter(&self) -> &ArtworkFilter {
        self.filter
    }

    #[must_use]
    pub fn matches_fast(&self, artwork: &Artwork) -> bool {
        fast_matches(self.filter, self.tags.as_deref(), artwork)
    }

    /// Author and file-existence predicates.
    #[must_use]
    pub fn matches_slow(&self, artwork: &Artwork, store: &Store, finders: &FinderSet) -> bool {
        if let Some(user) = &self.user {
            let author = store.get_user(artwork.user_id);
            if !user.matches(author.as_ref()) {
                return false;
            }
        }
        self.filter
            .file_filter
            .as_ref()
            .is_none_or(|files| files.matches(artwork, finders))
    }
}
