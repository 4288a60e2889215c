//! Error types for the session, transport and API client layers.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised while talking to the backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Network or HTTP layer failure (no response, TLS, body read).
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body is not valid JSON or does not match the expected shape.
    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope reported `success: false` or carried no `data`.
    #[error("protocol failure: {0}")]
    Protocol(String),

    /// A request URL could not be built.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// A session value cannot be sent as an HTTP header.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// An API call was attempted without an authenticated session.
    #[error("not logged in")]
    NotLoggedIn,

    /// The scrape-based login handshake failed.
    #[error("login failed: {0}")]
    Login(#[from] LoginError),
}

/// Reasons the login handshake can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoginError {
    /// The authenticated portal fetch returned no content.
    #[error("portal returned an empty body")]
    EmptyPortalBody,
    /// No `tvapiKey:` marker (or no opening quote close to it).
    #[error("no api key found")]
    ApiKeyMarkerMissing,
    /// The quoted api key is unterminated or too long.
    #[error("received api key is invalid")]
    ApiKeyInvalid,
    /// No `setId(` marker.
    #[error("no user settings found")]
    UserIdMarkerMissing,
    /// The user id is empty, unterminated or too long.
    #[error("received user id is invalid")]
    UserIdInvalid,
}
