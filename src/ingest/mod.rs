//! Ingestion from the upstream listing API.
//!
//! [`Pipeline`] pulls pages through a [`Transport`], converts each record, and folds it into the
//! [`crate::store::Store`] with the overwrite rules. Everything network-shaped lives here; the
//! store and filter engine never see response types.

pub mod convert;
pub mod cursor;
pub mod pipeline;
pub mod response;
pub mod transport;

pub use convert::{artwork_from_response, frames_from_metadata, user_from_detail, user_from_response};
pub use pipeline::{ArtworkListing, FollowReport, Pipeline, SyncMode, SyncReport};
pub use response::{
    ArtworkResponse, IllustsResponse, UserDetailResponse, UserPreview, UserPreviewsResponse, UserResponse,
};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{CredentialProvider, FetchError, StaticToken, Transport};
