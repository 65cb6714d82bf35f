//! Scalar predicates: numeric ranges, id lists, creation dates and hide reasons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::HideReason;

/// Inclusive range; an absent bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMax {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u64>,
}

impl MinMax {
    #[must_use]
    pub fn contains(&self, value: u64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.min.is_none_or(|min| min == 0) && self.max.is_none_or(|max| max == u64::MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IdFilter {
    /// Allow list. When non-empty, only these ids pass.
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<u64>>,
    #[serde(default, rename = "ignore-id", skip_serializing_if = "Option::is_none")]
    pub ignore_ids: Option<Vec<u64>>,
}

impl IdFilter {
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        if let Some(ids) = self.ids.as_deref().filter(|ids| !ids.is_empty()) {
            if !ids.contains(&id) {
                return false;
            }
        }
        !self.ignore_ids.as_deref().is_some_and(|ids| ids.contains(&id))
    }

    /// The allow list, when it is the only place matching ids can come from.
    #[must_use]
    pub fn allow_list(&self) -> Option<&[u64]> {
        self.ids.as_deref().filter(|ids| !ids.is_empty())
    }
}

/// Inclusive creation-time window, RFC 3339 in config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl DateFilter {
    #[must_use]
    pub fn contains(&self, date: DateTime<Utc>) -> bool {
        self.since.is_none_or(|since| date >= since) && self.until.is_none_or(|until| date <= until)
    }
}

/// `allow` wins over `disallow`. With neither list, only visible records pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HideFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<HideReason>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disallow: Option<Vec<HideReason>>,
}

impl HideFilter {
    #[must_use]
    pub fn allows(&self, reason: HideReason) -> bool {
        if let Some(allow) = self.allow.as_deref().filter(|list| !list.is_empty()) {
            allow.contains(&reason)
        } else if let Some(disallow) = self.disallow.as_deref().filter(|list| !list.is_empty()) {
            !disallow.contains(&reason)
        } else {
            !reason.is_hidden()
        }
    }
}

/// Absent hide filter: hidden records never pass.
pub(crate) fn hide_allows(filter: Option<&HideFilter>, reason: HideReason) -> bool {
    filter.map_or(!reason.is_hidden(), |filter| filter.allows(reason))
}
