//! File-existence sub-filter, answered by the [`FinderSet`] collaborators.

use serde::{Deserialize, Serialize};

use crate::finder::FinderSet;
use crate::types::{Artwork, ArtworkKind};

/// `"min": "all"` in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllKeyword {
    All,
}

/// Lower page threshold: a count, or every visible page. "Every page" of a work with no
/// visible pages is never satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MinPages {
    Count(i64),
    All(AllKeyword),
}

impl Default for MinPages {
    fn default() -> Self {
        Self::Count(0)
    }
}

/// Thresholds on the number of present files. Negative values count back from the number of
/// visible pages, so `{ "min": -1 }` means "all but one".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageThreshold {
    #[serde(default)]
    pub min: MinPages,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
}

fn relative(bound: i64, pages: u32) -> i64 {
    if bound < 0 { i64::from(pages) + bound } else { bound }
}

impl PageThreshold {
    #[must_use]
    pub fn accepts(&self, present: u32, pages: u32) -> bool {
        let count = i64::from(present);
        match self.min {
            MinPages::All(_) => return pages > 0 && present == pages,
            MinPages::Count(min) if count < relative(min, pages) => return false,
            MinPages::Count(_) => {}
        }
        self.max.is_none_or(|max| count <= relative(max, pages))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    And,
    #[default]
    Or,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<PageThreshold>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<PageThreshold>,
    /// Required (`true`) or forbidden (`false`) animation archive. Applies to ugoira only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ugoira: Option<bool>,
    #[serde(default)]
    pub relation: Relation,
}

impl FileFilter {
    /// Combines every configured clause with [`Relation`]. No applicable clause passes.
    #[must_use]
    pub fn matches(&self, artwork: &Artwork, finders: &FinderSet) -> bool {
        let mut results = Vec::with_capacity(3);
        if let Some(threshold) = &self.original {
            let (present, pages) = finders.count_originals(artwork);
            results.push(threshold.accepts(present, pages));
        }
        if let Some(threshold) = &self.thumbnail {
            let (present, pages) = finders.count_thumbnails(artwork);
            results.push(threshold.accepts(present, pages));
        }
        if let Some(wanted) = self.ugoira {
            if artwork.kind == ArtworkKind::Ugoira {
                results.push(finders.ugoira_zip.exists(artwork) == wanted);
            }
        }
        if results.is_empty() {
            return true;
        }
        match self.relation {
            Relation::And => results.iter().all(|&ok| ok),
            Relation::Or => results.iter().any(|&ok| ok),
        }
    }
}
