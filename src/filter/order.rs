use serde::{Deserialize, Serialize};

use crate::types::Artwork;

/// Result ordering. Reverse modes map the forward key through `u64::MAX - key`, so one
/// ascending sort covers every mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderKind {
    #[default]
    None,
    Id,
    ReverseId,
    View,
    ReverseView,
    Bookmarks,
    ReverseBookmarks,
    #[serde(alias = "user")]
    Author,
    #[serde(alias = "reverse-user")]
    ReverseAuthor,
}

impl OrderKind {
    #[must_use]
    pub fn key(self, artwork: &Artwork) -> u64 {
        match self {
            Self::None | Self::Id => artwork.id,
            Self::ReverseId => u64::MAX - artwork.id,
            Self::View => artwork.total_view,
            Self::ReverseView => u64::MAX - artwork.total_view,
            Self::Bookmarks => artwork.total_bookmarks,
            Self::ReverseBookmarks => u64::MAX - artwork.total_bookmarks,
            Self::Author => artwork.user_id,
            Self::ReverseAuthor => u64::MAX - artwork.user_id,
        }
    }

    /// Ascending by [`OrderKind::key`], ties broken on id. `None` is plain id order since the
    /// store keeps no insertion order.
    pub fn sort(self, artworks: &mut [Artwork]) {
        artworks.sort_unstable_by_key(|artwork| (self.key(artwork), artwork.id));
    }
}
