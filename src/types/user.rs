//! Author records and their optional nested profile blocks.

use serde::{Deserialize, Serialize};

use super::artwork::{HideReason, InternId};

/// Extended profile published by an author. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailProfile {
    pub webpage: Option<String>,
    pub gender: Option<String>,
    pub birth: Option<String>,
    pub birth_day: Option<String>,
    pub birth_year: Option<u32>,
    pub region: Option<String>,
    pub address_id: Option<i64>,
    pub country_code: Option<String>,
    pub job: Option<String>,
    pub job_id: Option<i64>,
    pub total_follow_users: Option<u64>,
    pub total_mypixiv_users: Option<u64>,
    pub total_illusts: Option<u64>,
    pub total_manga: Option<u64>,
    pub total_novels: Option<u64>,
    pub total_illust_bookmarks_public: Option<u64>,
    pub total_illust_series: Option<u64>,
    pub total_novel_series: Option<u64>,
    pub background_image_url: Option<String>,
    pub twitter_account: Option<String>,
    pub twitter_url: Option<String>,
    pub pawoo_url: Option<String>,
    pub is_premium: Option<bool>,
    pub is_using_custom_profile_image: Option<bool>,
}

/// Which profile fields the author has made public.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePublicity {
    pub gender: Option<String>,
    pub region: Option<String>,
    pub birth_day: Option<String>,
    pub birth_year: Option<String>,
    pub job: Option<String>,
    pub pawoo: Option<bool>,
}

/// Self-described working environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub pc: Option<String>,
    pub monitor: Option<String>,
    pub tool: Option<String>,
    pub scanner: Option<String>,
    pub tablet: Option<String>,
    pub mouse: Option<String>,
    pub printer: Option<String>,
    pub desktop: Option<String>,
    pub music: Option<String>,
    pub desk: Option<String>,
    pub chair: Option<String>,
    pub comment: Option<String>,
    pub workspace_image_url: Option<String>,
}

/// An author record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: Option<String>,
    pub account: Option<String>,
    pub is_followed: bool,
    pub is_muted: bool,
    pub hide_reason: HideReason,
    pub image_url: Option<String>,
    pub comment: Option<String>,
    pub memo: Option<String>,
    pub extra_tags: Option<Vec<InternId>>,
    pub profile: Option<DetailProfile>,
    pub profile_publicity: Option<ProfilePublicity>,
    pub workspace: Option<Workspace>,
}

impl User {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hide_reason.is_hidden()
    }
}
