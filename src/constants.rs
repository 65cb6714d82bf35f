//! Format and protocol constants shared across the crate.

/// Major snapshot version. Readers refuse any other major.
pub const SNAPSHOT_MAJOR: u32 = 1;
/// Minor snapshot version. Newer minors decode with skip-on-unknown.
pub const SNAPSHOT_MINOR: u32 = 2;

/// Length marker for an absent optional field.
pub const NIL_LEN: u32 = u32::MAX;

/// Fixed blob at field 0 of every artwork record.
pub const ARTWORK_BLOB_LEN: usize = 48;
/// Size of one page-hide entry (`u32` page + `u8` reason).
pub const PAGE_HIDE_ENTRY_LEN: usize = 5;
/// Longest frame-delay array a record may carry.
pub const MAX_FRAMES: usize = 65_535;

/// Offset at which the upstream listing endpoint refuses further pagination.
pub const DEFAULT_OFFSET_CAP: u32 = 5010;
/// Records per upstream page.
pub const DEFAULT_PAGE_SIZE: u32 = 30;
/// Pause before retrying a rate-limited request.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;

pub const OFFSET_PARAM: &str = "offset";
pub const END_DATE_PARAM: &str = "end_date";

pub const API_HOST: &str = "app-api.pixiv.net";
pub const IMAGE_HOST: &str = "i.pximg.net";
pub const UNKNOWN_THUMBNAIL_SUFFIX: &str = "limit_unknown_360.png";
