//! HTTP/1.1 upgrade to the SPDY/3.1 remote-command channel used by `exec`, `attach` and `port-forward`.
use http::{HeaderValue, Response, StatusCode};
use thiserror::Error;

use crate::client::Body;

/// A negotiated exec/attach/port-forward subprotocol.
///
/// Kubernetes names these after the WebSocket-era channel protocols even though the
/// transport is a SPDY/3.1 upgrade, not WebSocket. `V4` is the only version that
/// carries exit-status information in the error stream as a JSON `Status` object; callers
/// that need exit codes should require it rather than falling back to `V2`/`V3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProtocol {
    /// `v2.channel.k8s.io` - legacy, no `Status` object on the error stream.
    V2,
    /// `v3.channel.k8s.io` - adds support for a resize stream.
    V3,
    /// `v4.channel.k8s.io` - adds a JSON `Status` object on the error stream, used to
    /// recover the process exit code.
    V4,
}

impl StreamProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2 => "v2.channel.k8s.io",
            Self::V3 => "v3.channel.k8s.io",
            Self::V4 => "v4.channel.k8s.io",
        }
    }

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"v4.channel.k8s.io" => Some(Self::V4),
            b"v3.channel.k8s.io" => Some(Self::V3),
            b"v2.channel.k8s.io" => Some(Self::V2),
            _ => None,
        }
    }

    /// Whether the error stream carries a JSON `Status` with an `ExitCode` cause.
    pub fn carries_exit_status(&self) -> bool {
        matches!(self, Self::V4)
    }

    /// Add the request headers that advertise our supported subprotocols, most preferred
    /// first. The apiserver is expected to echo exactly one of them back in
    /// `X-Stream-Protocol-Version`.
    pub fn add_to_headers(headers: &mut http::HeaderMap) {
        headers.insert(
            http::header::CONNECTION,
            HeaderValue::from_static("Upgrade"),
        );
        headers.insert(http::header::UPGRADE, HeaderValue::from_static("SPDY/3.1"));
        for protocol in [Self::V4, Self::V3, Self::V2] {
            headers.append(
                "X-Stream-Protocol-Version",
                HeaderValue::from_static(protocol.as_str()),
            );
        }
    }

    fn get_from_response<B>(res: &Response<B>) -> Option<Self> {
        res.headers()
            .get("X-Stream-Protocol-Version")
            .map(|h| h.as_bytes())
            .and_then(Self::from_bytes)
    }
}

/// Errors raised while negotiating the SPDY/3.1 upgrade for a remote-command channel.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// The server did not respond with `101 Switching Protocols`.
    #[error("server did not switch protocols: {0}")]
    ProtocolSwitch(StatusCode),

    /// `Upgrade` header was not set to `SPDY/3.1` (case insensitive).
    #[error("upgrade header was not set to SPDY/3.1")]
    MissingUpgradeHeader,

    /// `Connection` header was not set to `Upgrade` (case insensitive).
    #[error("connection header was not set to Upgrade")]
    MissingConnectionUpgradeHeader,

    /// `X-Stream-Protocol-Version` was absent or named a subprotocol we did not advertise.
    #[error("X-Stream-Protocol-Version was missing or unsupported")]
    UnsupportedStreamProtocol,

    /// Failed to take ownership of the pending HTTP upgrade.
    #[error("failed to get pending HTTP upgrade: {0}")]
    GetPendingUpgrade(#[source] hyper::Error),
}

/// Verify a `101 Switching Protocols` response to a SPDY/3.1 channel request and return
/// the subprotocol the server agreed to speak.
pub fn verify_upgrade_response(res: &Response<Body>) -> Result<StreamProtocol, UpgradeError> {
    if res.status() != StatusCode::SWITCHING_PROTOCOLS {
        return Err(UpgradeError::ProtocolSwitch(res.status()));
    }

    let headers = res.headers();
    if !headers
        .get(http::header::UPGRADE)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.eq_ignore_ascii_case("SPDY/3.1"))
        .unwrap_or(false)
    {
        return Err(UpgradeError::MissingUpgradeHeader);
    }

    if !headers
        .get(http::header::CONNECTION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.eq_ignore_ascii_case("Upgrade"))
        .unwrap_or(false)
    {
        return Err(UpgradeError::MissingConnectionUpgradeHeader);
    }

    StreamProtocol::get_from_response(res).ok_or(UpgradeError::UnsupportedStreamProtocol)
}
