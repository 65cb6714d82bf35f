//! Author sub-filter. Needs a store lookup, so it runs in the slow phase.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::range::IdFilter;
use super::tag::{ResolvedTags, TagFilter};
use super::text::TextFilter;
use crate::intern::StringTable;
use crate::types::User;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow: Option<bool>,
    /// Reject artworks whose author has no stored record.
    #[serde(default)]
    pub only_registered: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_filter: Option<IdFilter>,
    /// Matched against name and account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<TextFilter>,
    /// Matched against the author's extra tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_filter: Option<TagFilter>,
    #[serde(default)]
    pub show_hidden: bool,
}

/// A [`UserFilter`] bound to a tag table.
#[derive(Debug)]
pub(crate) struct PreparedUserFilter<'a> {
    filter: &'a UserFilter,
    tags: Option<Arc<ResolvedTags>>,
}

impl UserFilter {
    pub(crate) fn prepare(&self, table: &StringTable) -> PreparedUserFilter<'_> {
        PreparedUserFilter {
            filter: self,
            tags: self.tag_filter.as_ref().map(|filter| filter.resolve(table)),
        }
    }
}

impl PreparedUserFilter<'_> {
    /// `None` is an author with no stored record.
    pub(crate) fn matches(&self, user: Option<&User>) -> bool {
        let filter = self.filter;
        let Some(user) = user else {
            return !filter.only_registered;
        };
        if !filter.show_hidden && user.is_hidden() {
            return false;
        }
        if filter.follow.is_some_and(|follow| follow != user.is_followed) {
            return false;
        }
        if filter.id_filter.as_ref().is_some_and(|ids| !ids.contains(user.id)) {
            return false;
        }
        if let Some(names) = &filter.name_filter {
            let texts = [
                user.name.as_deref().unwrap_or_default(),
                user.account.as_deref().unwrap_or_default(),
            ];
            if !names.matches(&texts) {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.matches(user.extra_tags.as_deref().unwrap_or_default()) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HideReason;

    fn user(id: u64, name: &str) -> User {
        let mut user = User::new(id);
        user.name = Some(name.to_string());
        user
    }

    #[test]
    fn unknown_author_depends_on_only_registered() {
        let table = StringTable::new();
        let open = UserFilter::default();
        assert!(open.prepare(&table).matches(None));
        let strict = UserFilter {
            only_registered: true,
            ..UserFilter::default()
        };
        assert!(!strict.prepare(&table).matches(None));
    }

    #[test]
    fn hidden_authors_need_show_hidden() {
        let table = StringTable::new();
        let mut hidden = user(1, "a");
        hidden.hide_reason = HideReason::Dislike;
        assert!(!UserFilter::default().prepare(&table).matches(Some(&hidden)));
        let show = UserFilter {
            show_hidden: true,
            ..UserFilter::default()
        };
        assert!(show.prepare(&table).matches(Some(&hidden)));
    }

    #[test]
    fn follow_name_and_tags() {
        let table = StringTable::new();
        let favourite = table.register("favourite").unwrap();
        let filter: UserFilter = serde_json::from_str(
            r#"{ "follow": true, "name-filter": { "partial": "ink" }, "tag-filter": { "exact": "favourite" } }"#,
        )
        .unwrap();
        let prepared = filter.prepare(&table);

        let mut candidate = user(5, "inkwell");
        candidate.is_followed = true;
        assert!(!prepared.matches(Some(&candidate)), "missing extra tag");
        candidate.extra_tags = Some(vec![favourite]);
        assert!(prepared.matches(Some(&candidate)));
        candidate.is_followed = false;
        assert!(!prepared.matches(Some(&candidate)));
    }
}
