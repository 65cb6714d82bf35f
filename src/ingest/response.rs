//! JSON shapes returned by the listing API.
//!
//! Only the fields the archive keeps are modelled; everything else is ignored. Missing arrays and
//! strings deserialize to their empty values so a sparse record never fails a whole page.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_THUMBNAIL_SUFFIX;
use crate::types::{ArtworkKind, DetailProfile, ProfilePublicity, Workspace};

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IllustsResponse {
    #[serde(default)]
    pub illusts: Vec<ArtworkResponse>,
    #[serde(default)]
    pub next_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrls {
    #[serde(default)]
    pub square_medium: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub original: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaSinglePage {
    #[serde(default)]
    pub original_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaPage {
    #[serde(default)]
    pub image_urls: ImageUrls,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    pub name: String,
    #[serde(default)]
    pub translated_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub is_followed: bool,
    #[serde(default)]
    pub profile_image_urls: ImageUrls,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkResponse {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: ArtworkKind,
    #[serde(default)]
    pub image_urls: ImageUrls,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub user: UserResponse,
    #[serde(default)]
    pub tags: Vec<TagResponse>,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Local time of the service, with its offset.
    pub create_date: DateTime<FixedOffset>,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub sanity_level: u32,
    #[serde(default)]
    pub x_restrict: u32,
    #[serde(default)]
    pub meta_single_page: MetaSinglePage,
    #[serde(default)]
    pub meta_pages: Vec<MetaPage>,
    #[serde(default)]
    pub total_view: u64,
    #[serde(default)]
    pub total_bookmarks: u64,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub is_muted: bool,
}

impl ArtworkResponse {
    /// Original image URL of the first page.
    #[must_use]
    pub fn first_original_url(&self) -> Option<&str> {
        self.meta_single_page
            .original_image_url
            .as_deref()
            .or_else(|| self.meta_pages.first()?.image_urls.original.as_deref())
    }

    /// The service replaces thumbnails of works it no longer shows with a placeholder.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.image_urls
            .square_medium
            .as_deref()
            .is_some_and(|url| url.ends_with(UNKNOWN_THUMBNAIL_SUFFIX))
    }
}

/// One followed author with a few of their recent works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreview {
    pub user: UserResponse,
    #[serde(default)]
    pub illusts: Vec<ArtworkResponse>,
    #[serde(default)]
    pub is_muted: bool,
}

/// One page of the `user/following` listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreviewsResponse {
    #[serde(default)]
    pub user_previews: Vec<UserPreview>,
    #[serde(default)]
    pub next_url: Option<String>,
}

/// `user/detail` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDetailResponse {
    pub user: UserResponse,
    #[serde(default)]
    pub profile: Option<DetailProfile>,
    #[serde(default)]
    pub profile_publicity: Option<ProfilePublicity>,
    #[serde(default)]
    pub workspace: Option<Workspace>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UgoiraFrame {
    #[serde(default)]
    pub file: String,
    pub delay: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UgoiraMetadata {
    #[serde(default)]
    pub zip_urls: ImageUrls,
    #[serde(default)]
    pub frames: Vec<UgoiraFrame>,
}

/// `ugoira/metadata` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UgoiraMetadataResponse {
    pub ugoira_metadata: UgoiraMetadata,
}
