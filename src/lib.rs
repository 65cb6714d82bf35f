#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(
    test,
    allow(
        clippy::useless_vec,
        clippy::uninlined_format_args,
        clippy::float_cmp,
        clippy::cast_precision_loss
    )
)]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions - these are allowed project-wide for pragmatic reasons:
//
// Documentation lints: Many internal/self-documenting functions don't need extensive docs.
// Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: lengths and counts in the snapshot format are u32 on disk. Every narrowing cast
// is bounded by a length check at the encode site, so try_into() everywhere would add noise.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
//
// Style/complexity: the codec and the filter predicates are long flat sequences of fields.
// Breaking them up would hurt readability.
#![allow(clippy::too_many_lines)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::similar_names)]
// e.g., user_id, tag_id, tool_id are intentionally similar
//
// Pattern matching: These pedantic lints often suggest changes that reduce clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::needless_pass_by_value)] // Many builders take owned values intentionally
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::assigning_clones)] // clone_from() often less readable
//
// Low-value pedantic lints that add noise:
#![allow(clippy::struct_excessive_bools)] // Filter and config structs naturally have many flags
#![allow(clippy::needless_continue)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::map_unwrap_or)]
//
// Return value wrapping: Many functions use Result for consistency even when they
// currently can't fail, allowing future error conditions to be added without breaking API.
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::unused_self)]

/// The pixvault-core crate version (matches `Cargo.toml`).
pub const PIXVAULT_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cancel;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod finder;
pub mod ingest;
pub mod intern;
pub mod io;
mod merge;
pub mod naming;
pub mod store;
pub mod types;

pub use cancel::CancellationToken;
pub use codec::{DecodedSnapshot, decode_snapshot, encode_snapshot};
pub use config::ArchiveConfig;
pub use constants::*;
pub use error::{ArchiveError, Result};
pub use filter::{
    ArtworkFilter, DateFilter, FileFilter, HideFilter, IdFilter, MinMax, OrderKind, Query,
    TagFilter, TextFilter, UserFilter,
};
pub use finder::{
    Capability, Collaborator, Converter, Finder, FinderChoice, FinderConfig, FinderSet,
    FinderWithIndex, FsFinder, MediaFile, NullFinder, Slot,
};
// Ingestion: the pipeline and the collaborators it consumes
pub use ingest::{
    ArtworkListing, CredentialProvider, FetchError, FollowReport, Pipeline, StaticToken, SyncMode,
    SyncReport, Transport,
};
#[cfg(feature = "http")]
pub use ingest::HttpTransport;
pub use intern::StringTable;
pub use store::{SnapshotMerge, Store, Upsert};
pub use types::{
    Artwork, ArtworkFlags, ArtworkKind, DetailProfile, FileKind, HideReason, InternId,
    ProfilePublicity, RankingKind, RankingTable, TagSet, User, Workspace,
};
