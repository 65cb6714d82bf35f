//! Page fetching and credentials, as consumed by the pipeline.
//!
//! The pipeline never talks HTTP itself. It hands a URL and a bearer token to a [`Transport`]
//! and classifies the failure: credential problems and connection resets are retried after
//! reacquiring a token, rate limiting after a pause, anything else ends the run.

use std::sync::Arc;

use thiserror::Error;

use crate::error::Result;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("credentials rejected")]
    AuthRejected,
    #[error("connection reset")]
    ConnectionReset,
    #[error("rate limited")]
    RateLimited,
    #[error("{0}")]
    Fatal(String),
}

pub trait Transport: Send + Sync {
    /// Raw response body of `url`. An empty body ends the listing.
    fn fetch_page(&self, url: &str, token: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

pub trait CredentialProvider: Send + Sync {
    fn get_token(&self) -> Result<String>;
    /// Drops any cached token so the next [`Self::get_token`] reacquires one.
    fn invalidate(&self);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn fetch_page(&self, url: &str, token: &str) -> std::result::Result<Vec<u8>, FetchError> {
        (**self).fetch_page(url, token)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch_page(&self, url: &str, token: &str) -> std::result::Result<Vec<u8>, FetchError> {
        (**self).fetch_page(url, token)
    }
}

impl<C: CredentialProvider + ?Sized> CredentialProvider for Arc<C> {
    fn get_token(&self) -> Result<String> {
        (**self).get_token()
    }

    fn invalidate(&self) {
        (**self).invalidate();
    }
}

impl<C: CredentialProvider + ?Sized> CredentialProvider for &C {
    fn get_token(&self) -> Result<String> {
        (**self).get_token()
    }

    fn invalidate(&self) {
        (**self).invalidate();
    }
}

/// A fixed token that never expires. Invalidation is a no-op.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn get_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn invalidate(&self) {
        tracing::debug!("static token cannot be refreshed");
    }
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::StatusCode;
    use reqwest::blocking::Client;
    use reqwest::header::{AUTHORIZATION, HeaderValue, USER_AGENT};

    use super::{FetchError, Transport};
    use crate::error::{ArchiveError, Result};

    const AGENT: &str = "PixivAndroidApp/5.0.234 (Android 11; Pixel 5)";

    /// Blocking reqwest client for the listing API.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|err| ArchiveError::Transport {
                    reason: err.to_string().into(),
                })?;
            Ok(Self { client })
        }
    }

    impl Transport for HttpTransport {
        fn fetch_page(&self, url: &str, token: &str) -> std::result::Result<Vec<u8>, FetchError> {
            let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| FetchError::Fatal("token is not a valid header value".into()))?;
            let response = self
                .client
                .get(url)
                .header(AUTHORIZATION, bearer)
                .header(USER_AGENT, AGENT)
                .send()
                .map_err(|err| {
                    if err.is_timeout() || err.is_connect() {
                        FetchError::ConnectionReset
                    } else {
                        FetchError::Fatal(err.to_string())
                    }
                })?;
            match response.status() {
                status if status.is_success() => response
                    .bytes()
                    .map(|body| body.to_vec())
                    .map_err(|_| FetchError::ConnectionReset),
                StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => Err(FetchError::AuthRejected),
                StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
                status => Err(FetchError::Fatal(format!("{url}: HTTP {status}"))),
            }
        }
    }
}
