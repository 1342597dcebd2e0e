//! The lazy [`Response`] wrapper (component D): status, headers, body stream, and typed/`Status`
//! decoding over a single HTTP response.

use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, StatusCode};
use kubefluent_core::response::Status;
use serde::de::DeserializeOwned;

use crate::{
    client::{Body, IntoBodyDataStream},
    Error, Result,
};

/// A lazy wrapper over a single HTTP response, decoded at most once.
///
/// Disposal of the underlying transport response happens when the last accessor (`into_*`)
/// consumes `self`; if the request set `stream_response`/`watch_version`, the caller is expected
/// to consume [`Response::into_body_stream`] to completion (or drop it) to release the
/// connection.
pub struct Response {
    inner: http::Response<Body>,
}

impl Response {
    pub(crate) fn new(inner: http::Response<Body>) -> Self {
        Self { inner }
    }

    /// The HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        self.inner.status()
    }

    /// `true` for any 4xx/5xx status.
    pub fn is_error(&self) -> bool {
        self.status_code().is_client_error() || self.status_code().is_server_error()
    }

    /// `true` for a 404 status specifically.
    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Consume the response into a stream of body chunks, for streaming/watch completions.
    /// Consumable at most once.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes>> {
        self.inner.into_body().into_stream()
    }

    /// Buffer the entire body into a single [`Bytes`].
    pub async fn into_bytes(self) -> Result<Bytes> {
        Ok(http_body_util::BodyExt::collect(self.inner.into_body()).await?.to_bytes())
    }

    /// Buffer the entire body and JSON-decode it as `T`.
    pub async fn into_body<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.into_bytes().await?;
        kubefluent_core::codec::decode(&bytes).map_err(Error::Decode)
    }

    /// Buffer the entire body and decode a [`Status`] from it, synthesizing one from the HTTP
    /// status line if the body did not parse as one.
    pub async fn into_status(self) -> Result<Status> {
        let status_code = self.status_code();
        let bytes = http_body_util::BodyExt::collect(self.inner.into_body()).await?.to_bytes();
        if let Ok(status) = kubefluent_core::codec::decode::<Status>(&bytes) {
            return Ok(status);
        }
        Ok(Status {
            code: status_code.as_u16(),
            status: status_code.to_string(),
            message: String::from_utf8_lossy(&bytes).into_owned(),
            reason: "Unknown".into(),
            details: None,
        })
    }
}
