//! On-disk archive configuration.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_OFFSET_CAP, DEFAULT_PAGE_SIZE, DEFAULT_RETRY_DELAY_SECS};
use crate::error::{ArchiveError, Result};
use crate::finder::FinderConfig;
use crate::io::{read_file, write_atomic};

static DEFAULT_THREADS: Lazy<usize> = Lazy::new(|| num_cpus::get().max(1));

fn default_offset_cap() -> u32 {
    DEFAULT_OFFSET_CAP
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_threads() -> usize {
    *DEFAULT_THREADS
}

fn default_true() -> bool {
    true
}

/// Archive-wide settings, read from a JSON file. Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ArchiveConfig {
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    #[serde(default)]
    pub original_folder: Option<PathBuf>,
    #[serde(default)]
    pub thumbnail_folder: Option<PathBuf>,
    #[serde(default)]
    pub ugoira_folder: Option<PathBuf>,
    /// Offset at which the listing endpoint stops paginating.
    #[serde(default = "default_offset_cap")]
    pub offset_cap: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Seconds to wait before retrying a rate-limited request.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Worker threads for the slow filter phase.
    #[serde(default = "default_threads")]
    pub slow_filter_threads: usize,
    /// Stop an incremental sync at the first page that adds nothing new.
    #[serde(default = "default_true")]
    pub stop_on_known_page: bool,
    /// Append a blake3 digest when saving snapshots.
    #[serde(default = "default_true")]
    pub checksum: bool,
    #[serde(default)]
    pub finders: FinderConfig,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            original_folder: None,
            thumbnail_folder: None,
            ugoira_folder: None,
            offset_cap: DEFAULT_OFFSET_CAP,
            page_size: DEFAULT_PAGE_SIZE,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            slow_filter_threads: default_threads(),
            stop_on_known_page: true,
            checksum: true,
            finders: FinderConfig::default(),
        }
    }
}

impl ArchiveConfig {
    /// Reads `path`; a missing file gives the defaults. The result is validated.
    pub fn load(path: &Path) -> Result<Self> {
        let config = match read_file(path)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => {
                tracing::debug!(path = %path.display(), "config file missing; using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes pretty JSON atomically, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path, |file| {
            file.write_all(&json)?;
            Ok(())
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(ArchiveError::InvalidConfig {
                reason: "page-size must be non-zero".into(),
            });
        }
        if self.offset_cap < self.page_size {
            return Err(ArchiveError::InvalidConfig {
                reason: format!(
                    "offset-cap {} is smaller than one page ({})",
                    self.offset_cap, self.page_size
                )
                .into(),
            });
        }
        if self.slow_filter_threads == 0 {
            return Err(ArchiveError::InvalidConfig {
                reason: "slow-filter-threads must be non-zero".into(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}
