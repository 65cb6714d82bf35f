//! Public record types exposed by the `pixvault-core` crate.

pub mod artwork;
pub mod ranking;
pub mod user;

pub use artwork::{Artwork, ArtworkFlags, ArtworkKind, FileKind, HideReason, InternId, TagSet};
pub use ranking::{RankingKind, RankingTable};
pub use user::{DetailProfile, ProfilePublicity, User, Workspace};
