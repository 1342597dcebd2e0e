//! The error taxonomy for `kubefluent-client` (S7).
//!
//! `NotFound` is not a distinct variant: it is a predicate, [`Error::is_not_found`], over
//! [`Error::Api`] -- matching how a 404 is just a normal, recognizable [`ErrorResponse`] rather
//! than a type of its own.

pub use kubefluent_core::ErrorResponse;
use thiserror::Error;

use crate::{client::auth, client::upgrade::UpgradeError, exec::ExecError};

/// Possible errors from `kubefluent-client`.
#[derive(Error, Debug)]
pub enum Error {
    /// HttpStatusError / `Api`: a non-success response the server decoded into a `Status`.
    ///
    /// It's quite common to get a `410 Gone` when the `resourceVersion` is too old; see
    /// [`Error::is_gone`].
    #[error("ApiError: {0} ({0:?})")]
    Api(#[source] ErrorResponse),

    /// TransportError: propagated from the underlying `tower`/HTTP layer.
    #[error("transport error: {0}")]
    Transport(#[source] tower::BoxError),

    /// TransportError, raised directly constructing or polling a service.
    #[error("service error: {0}")]
    Service(#[source] tower::BoxError),

    /// UTF-8 error decoding a response body.
    #[error("UTF-8 error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),

    /// Returned when `Client::request_events` fails to find a newline within the max line
    /// length. Should never happen in practice since the max is `usize::MAX`.
    #[error("error finding newline character")]
    LinesCodecMaxLineLengthExceeded,

    /// `std::io::Error` from reading a watch event stream.
    #[error("error reading events stream: {0}")]
    ReadEvents(std::io::Error),

    /// ConfigError: failure building an `http::Request`.
    #[error("http error: {0}")]
    Http(#[from] http::Error),

    /// ConfigError: the configured base URI (or a raw URI override) did not parse.
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] http::uri::InvalidUri),

    /// DecodeError: JSON deserialization failed.
    #[error("error deserializing response")]
    Decode(#[from] serde_json::Error),

    /// ConfigError: an illegal combination of request fields was set (e.g. both a raw URI and
    /// piecemeal URL components, or a reserved header name).
    #[error("request validation failed: {0}")]
    RequestValidation(String),

    /// Wraps a [`kubefluent_core::Error`] (scheme/codec/URL-construction failure).
    #[error(transparent)]
    Core(#[from] kubefluent_core::Error),

    /// ConfigError: a credential provider failed to attach authorization to a request.
    #[error("credential error: {0}")]
    Auth(#[from] auth::Error),

    /// UpgradeError: the SPDY upgrade handshake failed (S4.I).
    #[error("upgrade error: {0}")]
    Upgrade(#[from] UpgradeError),

    /// ExecFailure: the remote command exited non-zero or the server reported a failure status.
    #[error("exec error: {0}")]
    Exec(#[from] ExecError),

    /// Cancelled: the operation's cancellation signal fired.
    #[error("operation cancelled")]
    Cancelled,

    /// TimedOut: the operation's deadline elapsed.
    #[error("operation timed out")]
    TimedOut,
}

impl Error {
    /// True for a decoded `Status` response carrying HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api(e) if e.code == 404)
    }

    /// True for a decoded `Status` response carrying HTTP 409 (conflict).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Api(e) if e.code == 409)
    }

    /// True for a decoded `Status` response carrying HTTP 410 (the watch's resourceVersion is
    /// too old and the server cannot resume from it), or an `Error` watch event with reason
    /// `Expired`/`Gone`.
    pub fn is_gone(&self) -> bool {
        matches!(self, Error::Api(e) if e.code == 410 || e.reason == "Expired" || e.reason == "Gone")
    }
}
