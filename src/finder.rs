//! Collaborators that answer "is this media file on disk?" and convert downloaded files.
//!
//! Collaborators are chosen at startup: either the built-in filesystem finders configured from
//! [`ArchiveConfig`](crate::config::ArchiveConfig), or caller-supplied implementations installed
//! into a [`FinderSet`] slot. A slot that is unconfigured answers `false` instead of failing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, Result};
use crate::naming::{hash_dir, original_file_name, thumbnail_file_name, ugoira_zip_file_name};
use crate::types::{Artwork, ArtworkKind};

/// Roles a collaborator can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// One file per artwork.
    Finder,
    /// One file per page.
    FinderWithIndex,
    /// Post-download conversion.
    Converter,
}

pub trait Finder: Send + Sync {
    fn exists(&self, artwork: &Artwork) -> bool;
}

pub trait FinderWithIndex: Send + Sync {
    fn exists(&self, artwork: &Artwork, page: u32) -> bool;
}

pub trait Converter: Send + Sync {
    /// Converts the file at `source`; `Ok(false)` means nothing needed doing.
    fn convert(&self, artwork: &Artwork, source: &Path) -> Result<bool>;
}

/// A collaborator tagged with the capability it provides.
#[derive(Clone)]
pub enum Collaborator {
    Finder(Arc<dyn Finder>),
    FinderWithIndex(Arc<dyn FinderWithIndex>),
    Converter(Arc<dyn Converter>),
}

impl Collaborator {
    #[must_use]
    pub fn capability(&self) -> Capability {
        match self {
            Self::Finder(_) => Capability::Finder,
            Self::FinderWithIndex(_) => Capability::FinderWithIndex,
            Self::Converter(_) => Capability::Converter,
        }
    }
}

impl fmt::Debug for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Collaborator({:?})", self.capability())
    }
}

/// Named positions in a [`FinderSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    IllustOriginal,
    MangaOriginal,
    UgoiraOriginal,
    IllustThumbnail,
    MangaThumbnail,
    UgoiraThumbnail,
    UgoiraZip,
    UgoiraConverter,
}

impl Slot {
    #[must_use]
    pub fn capability(self) -> Capability {
        match self {
            Self::IllustOriginal | Self::MangaOriginal | Self::IllustThumbnail | Self::MangaThumbnail => {
                Capability::FinderWithIndex
            }
            Self::UgoiraOriginal | Self::UgoiraThumbnail | Self::UgoiraZip => Capability::Finder,
            Self::UgoiraConverter => Capability::Converter,
        }
    }
}

/// Which implementation backs a media role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinderChoice {
    /// Look under the configured folder; falls back to `null` when no folder is set.
    #[default]
    Filesystem,
    /// Always answer "missing".
    Null,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FinderConfig {
    pub original: FinderChoice,
    pub thumbnail: FinderChoice,
    pub ugoira_zip: FinderChoice,
}

/// Answers `false` for everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFinder;

impl Finder for NullFinder {
    fn exists(&self, _artwork: &Artwork) -> bool {
        false
    }
}

impl FinderWithIndex for NullFinder {
    fn exists(&self, _artwork: &Artwork, _page: u32) -> bool {
        false
    }
}

/// Which file name a [`FsFinder`] probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFile {
    Original,
    Thumbnail,
    UgoiraZip,
}

/// Filesystem finder over `root/{hash dir}/{file name}`.
#[derive(Debug, Clone)]
pub struct FsFinder {
    root: PathBuf,
    media: MediaFile,
}

impl FsFinder {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, media: MediaFile) -> Self {
        Self {
            root: root.into(),
            media,
        }
    }

    #[must_use]
    pub fn path(&self, artwork: &Artwork, page: u32) -> PathBuf {
        let name = match self.media {
            MediaFile::Original => original_file_name(artwork, page),
            MediaFile::Thumbnail => thumbnail_file_name(artwork, page),
            MediaFile::UgoiraZip => ugoira_zip_file_name(artwork),
        };
        let mut path = self.root.join(hash_dir(artwork.id));
        path.push(name);
        path
    }
}

impl Finder for FsFinder {
    fn exists(&self, artwork: &Artwork) -> bool {
        self.path(artwork, 0).is_file()
    }
}

impl FinderWithIndex for FsFinder {
    fn exists(&self, artwork: &Artwork, page: u32) -> bool {
        self.path(artwork, page).is_file()
    }
}

/// The full set of collaborators the query engine and downloaders consult.
#[derive(Clone)]
pub struct FinderSet {
    pub illust_original: Arc<dyn FinderWithIndex>,
    pub manga_original: Arc<dyn FinderWithIndex>,
    pub ugoira_original: Arc<dyn Finder>,
    pub illust_thumbnail: Arc<dyn FinderWithIndex>,
    pub manga_thumbnail: Arc<dyn FinderWithIndex>,
    pub ugoira_thumbnail: Arc<dyn Finder>,
    pub ugoira_zip: Arc<dyn Finder>,
    pub ugoira_converter: Option<Arc<dyn Converter>>,
}

impl fmt::Debug for FinderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinderSet")
            .field("ugoira_converter", &self.ugoira_converter.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for FinderSet {
    fn default() -> Self {
        Self::null()
    }
}

impl FinderSet {
    /// Every finder answers `false`; no converter.
    #[must_use]
    pub fn null() -> Self {
        Self {
            illust_original: Arc::new(NullFinder),
            manga_original: Arc::new(NullFinder),
            ugoira_original: Arc::new(NullFinder),
            illust_thumbnail: Arc::new(NullFinder),
            manga_thumbnail: Arc::new(NullFinder),
            ugoira_thumbnail: Arc::new(NullFinder),
            ugoira_zip: Arc::new(NullFinder),
            ugoira_converter: None,
        }
    }

    /// Builds filesystem finders for every configured folder and null finders elsewhere.
    #[must_use]
    pub fn from_config(config: &ArchiveConfig) -> Self {
        let mut set = Self::null();
        let choice = &config.finders;
        if let Some(root) = pick(choice.original, config.original_folder.as_deref(), "original") {
            let finder = Arc::new(FsFinder::new(root, MediaFile::Original));
            set.illust_original = finder.clone();
            set.manga_original = finder.clone();
            set.ugoira_original = finder;
        }
        if let Some(root) = pick(choice.thumbnail, config.thumbnail_folder.as_deref(), "thumbnail") {
            let finder = Arc::new(FsFinder::new(root, MediaFile::Thumbnail));
            set.illust_thumbnail = finder.clone();
            set.manga_thumbnail = finder.clone();
            set.ugoira_thumbnail = finder;
        }
        if let Some(root) = pick(choice.ugoira_zip, config.ugoira_folder.as_deref(), "ugoira-zip") {
            set.ugoira_zip = Arc::new(FsFinder::new(root, MediaFile::UgoiraZip));
        }
        set
    }

    /// Replaces the collaborator in `slot`. The collaborator must provide the slot's capability.
    pub fn install(&mut self, slot: Slot, collaborator: Collaborator) -> Result<()> {
        match (slot, collaborator) {
            (Slot::IllustOriginal, Collaborator::FinderWithIndex(f)) => self.illust_original = f,
            (Slot::MangaOriginal, Collaborator::FinderWithIndex(f)) => self.manga_original = f,
            (Slot::IllustThumbnail, Collaborator::FinderWithIndex(f)) => self.illust_thumbnail = f,
            (Slot::MangaThumbnail, Collaborator::FinderWithIndex(f)) => self.manga_thumbnail = f,
            (Slot::UgoiraOriginal, Collaborator::Finder(f)) => self.ugoira_original = f,
            (Slot::UgoiraThumbnail, Collaborator::Finder(f)) => self.ugoira_thumbnail = f,
            (Slot::UgoiraZip, Collaborator::Finder(f)) => self.ugoira_zip = f,
            (Slot::UgoiraConverter, Collaborator::Converter(c)) => self.ugoira_converter = Some(c),
            (slot, collaborator) => {
                return Err(ArchiveError::InvalidConfig {
                    reason: format!(
                        "slot {slot:?} needs {:?}, got {:?}",
                        slot.capability(),
                        collaborator.capability()
                    )
                    .into(),
                });
            }
        }
        tracing::debug!(?slot, "collaborator installed");
        Ok(())
    }

    /// Number of visible pages whose original file exists (ugoira counts as one page).
    #[must_use]
    pub fn count_originals(&self, artwork: &Artwork) -> (u32, u32) {
        count_pages(
            artwork,
            self.illust_original.as_ref(),
            self.manga_original.as_ref(),
            self.ugoira_original.as_ref(),
        )
    }

    /// Number of visible pages whose thumbnail exists (ugoira counts as one page).
    #[must_use]
    pub fn count_thumbnails(&self, artwork: &Artwork) -> (u32, u32) {
        count_pages(
            artwork,
            self.illust_thumbnail.as_ref(),
            self.manga_thumbnail.as_ref(),
            self.ugoira_thumbnail.as_ref(),
        )
    }
}

fn pick<'a>(choice: FinderChoice, folder: Option<&'a Path>, role: &'static str) -> Option<&'a Path> {
    match (choice, folder) {
        (FinderChoice::Filesystem, Some(folder)) => Some(folder),
        (FinderChoice::Filesystem, None) => {
            tracing::debug!(role, "no folder configured; using null finder");
            None
        }
        (FinderChoice::Null, _) => None,
    }
}

/// `(present, visible)` page counts.
fn count_pages(
    artwork: &Artwork,
    illust: &dyn FinderWithIndex,
    manga: &dyn FinderWithIndex,
    ugoira: &dyn Finder,
) -> (u32, u32) {
    let pages = artwork.visible_pages();
    if pages.is_empty() {
        return (0, 0);
    }
    let indexed = match artwork.kind {
        ArtworkKind::Ugoira => return (u32::from(ugoira.exists(artwork)), 1),
        ArtworkKind::Illust => illust,
        ArtworkKind::Manga => manga,
    };
    let present = pages.iter().filter(|&&page| indexed.exists(artwork, page)).count();
    (present as u32, pages.len() as u32)
}
