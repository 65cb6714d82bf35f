//! Artwork records: the content entries of the archive.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Interned tag or tool identifier. `0` means absent.
pub type InternId = u32;

/// Effective tag set small enough to stay inline for typical records.
pub type TagSet = SmallVec<[InternId; 16]>;

/// Content kind reported by the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum ArtworkKind {
    #[default]
    Illust = 0,
    Manga = 1,
    Ugoira = 2,
}

impl ArtworkKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Illust),
            1 => Some(Self::Manga),
            2 => Some(Self::Ugoira),
            _ => None,
        }
    }
}

/// Media file kind of the original pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum FileKind {
    #[default]
    None = 0,
    Jpg = 1,
    Png = 2,
    Gif = 3,
    Zip = 4,
    Bmp = 5,
}

impl FileKind {
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Jpg),
            2 => Some(Self::Png),
            3 => Some(Self::Gif),
            4 => Some(Self::Zip),
            5 => Some(Self::Bmp),
            _ => None,
        }
    }

    /// Parses the extension at the end of a file name or URL (`.jpeg` maps to `Jpg`).
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let Some(dot) = path.rfind('.') else {
            return Self::None;
        };
        match path[dot..].to_ascii_lowercase().as_str() {
            ".jpg" | ".jpeg" => Self::Jpg,
            ".png" => Self::Png,
            ".gif" => Self::Gif,
            ".zip" => Self::Zip,
            ".bmp" => Self::Bmp,
            _ => Self::None,
        }
    }

    #[must_use]
    pub fn as_extension(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Jpg => ".jpg",
            Self::Png => ".png",
            Self::Gif => ".gif",
            Self::Zip => ".zip",
            Self::Bmp => ".bmp",
        }
    }
}

/// Locally curated reason for hiding an artwork, a page, or an author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum HideReason {
    #[default]
    NotHidden = 0,
    LowQuality = 1,
    NotMuch = 2,
    Irrelevant = 3,
    ExternalLink = 4,
    Dislike = 5,
    Unfollow = 6,
    Crop = 7,
}

impl HideReason {
    pub const ALL: [Self; 8] = [
        Self::NotHidden,
        Self::LowQuality,
        Self::NotMuch,
        Self::Irrelevant,
        Self::ExternalLink,
        Self::Dislike,
        Self::Unfollow,
        Self::Crop,
    ];

    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(usize::from(value)).copied()
    }

    #[must_use]
    pub fn is_hidden(self) -> bool {
        self != Self::NotHidden
    }
}

/// Boolean flags of an artwork packed into one byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArtworkFlags(u8);

impl ArtworkFlags {
    pub const OFFICIALLY_REMOVED: u8 = 1 << 5;
    pub const RESTRICTED: u8 = 1 << 4;
    pub const BOOKMARKED: u8 = 1 << 3;
    pub const VISIBLE: u8 = 1 << 2;
    pub const MUTED: u8 = 1 << 1;
    pub const HIDE_LAST: u8 = 1;

    const KNOWN: u8 = 0b0011_1111;

    /// Builds flags from a stored byte; reserved high bits are dropped.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::KNOWN)
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    fn get(self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    fn set(&mut self, mask: u8, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    #[must_use]
    pub fn officially_removed(self) -> bool {
        self.get(Self::OFFICIALLY_REMOVED)
    }

    pub fn set_officially_removed(&mut self, value: bool) {
        self.set(Self::OFFICIALLY_REMOVED, value);
    }

    #[must_use]
    pub fn restricted(self) -> bool {
        self.get(Self::RESTRICTED)
    }

    pub fn set_restricted(&mut self, value: bool) {
        self.set(Self::RESTRICTED, value);
    }

    #[must_use]
    pub fn bookmarked(self) -> bool {
        self.get(Self::BOOKMARKED)
    }

    pub fn set_bookmarked(&mut self, value: bool) {
        self.set(Self::BOOKMARKED, value);
    }

    #[must_use]
    pub fn visible(self) -> bool {
        self.get(Self::VISIBLE)
    }

    pub fn set_visible(&mut self, value: bool) {
        self.set(Self::VISIBLE, value);
    }

    #[must_use]
    pub fn muted(self) -> bool {
        self.get(Self::MUTED)
    }

    pub fn set_muted(&mut self, value: bool) {
        self.set(Self::MUTED, value);
    }

    #[must_use]
    pub fn hide_last(self) -> bool {
        self.get(Self::HIDE_LAST)
    }

    pub fn set_hide_last(&mut self, value: bool) {
        self.set(Self::HIDE_LAST, value);
    }
}

impl fmt::Debug for ArtworkFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtworkFlags")
            .field("officially_removed", &self.officially_removed())
            .field("restricted", &self.restricted())
            .field("bookmarked", &self.bookmarked())
            .field("visible", &self.visible())
            .field("muted", &self.muted())
            .field("hide_last", &self.hide_last())
            .finish()
    }
}

/// A content record. Identity (`id`) never changes once stored; the author is referenced by id
/// only and resolved through the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artwork {
    pub id: u64,
    pub user_id: u64,
    pub total_view: u64,
    pub total_bookmarks: u64,
    pub page_count: u32,
    pub width: u32,
    pub height: u32,
    pub kind: ArtworkKind,
    pub extension: FileKind,
    pub hide_reason: HideReason,
    pub flags: ArtworkFlags,
    pub created: DateTime<Utc>,
    /// Upload time encoded in the media URL path; drives download paths.
    pub file_date: DateTime<Utc>,
    pub tags: Vec<InternId>,
    pub extra_tags: Option<Vec<InternId>>,
    pub fake_tags: Option<Vec<InternId>>,
    pub tools: Vec<InternId>,
    pub title: String,
    pub caption: String,
    pub memo: Option<String>,
    pub page_hide: Option<BTreeMap<u32, HideReason>>,
    /// Animation frame delays in milliseconds (ugoira only).
    pub frames: Option<Vec<u16>>,
}

impl Artwork {
    /// Empty record with the given identity; every other field takes its neutral value.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self {
            id,
            user_id: 0,
            total_view: 0,
            total_bookmarks: 0,
            page_count: 0,
            width: 0,
            height: 0,
            kind: ArtworkKind::Illust,
            extension: FileKind::None,
            hide_reason: HideReason::NotHidden,
            flags: ArtworkFlags::default(),
            created: DateTime::<Utc>::UNIX_EPOCH,
            file_date: DateTime::<Utc>::UNIX_EPOCH,
            tags: Vec::new(),
            extra_tags: None,
            fake_tags: None,
            tools: Vec::new(),
            title: String::new(),
            caption: String::new(),
            memo: None,
            page_hide: None,
            frames: None,
        }
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hide_reason.is_hidden()
    }

    /// `(base ∪ extra) \ fake`, without duplicates, base order first.
    #[must_use]
    pub fn effective_tags(&self) -> TagSet {
        let fake = self.fake_tags.as_deref().unwrap_or_default();
        let mut set = TagSet::new();
        let extra = self.extra_tags.as_deref().unwrap_or_default();
        for &tag in self.tags.iter().chain(extra) {
            if tag != 0 && !fake.contains(&tag) && !set.contains(&tag) {
                set.push(tag);
            }
        }
        set
    }

    #[must_use]
    pub fn has_effective_tag(&self, tag: InternId) -> bool {
        if tag == 0 {
            return false;
        }
        let in_overlay = |list: &Option<Vec<InternId>>| list.as_ref().is_some_and(|l| l.contains(&tag));
        if in_overlay(&self.fake_tags) {
            return false;
        }
        self.tags.contains(&tag) || in_overlay(&self.extra_tags)
    }

    /// Page indexes not hidden by the per-page map or the hide-last flag. Empty when the whole
    /// artwork is hidden.
    #[must_use]
    pub fn visible_pages(&self) -> Vec<u32> {
        if self.is_hidden() {
            return Vec::new();
        }
        let mut last = self.page_count;
        if self.flags.hide_last() && last > 1 {
            last -= 1;
        }
        (0..last)
            .filter(|page| {
                self.page_hide
                    .as_ref()
                    .and_then(|map| map.get(page))
                    .is_none_or(|reason| !reason.is_hidden())
            })
            .collect()
    }
}
