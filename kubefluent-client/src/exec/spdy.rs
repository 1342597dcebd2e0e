//! The SPDY multiplexing boundary.
//!
//! Per S1's Non-goals, this crate does not implement SPDY/3.1 wire framing itself -- that is an
//! external collaborator with a contract specified here. A concrete multiplexer owns the raw
//! duplex byte stream handed over by a 101 Switching Protocols upgrade ([`crate::client::connect`])
//! and exposes it as a set of independently readable/writable sub-streams, each tagged with a
//! `streamtype` header and gated on the server's acknowledgement before [`SpdyMultiplexer::create_stream`]
//! resolves.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// The four Kubernetes exec sub-streams (S4.I). `Error` always exists; the others are created
/// only when the corresponding user stream was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Read-only. Carries the command's exit status, buffered until EOF.
    Error,
    /// Write-only, if the caller attached stdin.
    Stdin,
    /// Read-only, if the caller attached stdout.
    Stdout,
    /// Read-only, if the caller attached stderr.
    Stderr,
}

impl StreamType {
    /// The `streamtype` header value identifying this stream to the server.
    pub fn header_value(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Stdin => "stdin",
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Errors from the SPDY multiplexing boundary.
#[derive(Debug, Error)]
pub enum SpdyError {
    /// The server never acknowledged a created stream (or the multiplexer surfaced some other
    /// failure while creating one).
    #[error("failed to create {0:?} stream: {1}")]
    CreateStream(StreamType, #[source] Box<dyn std::error::Error + Send + Sync>),

    /// The underlying connection closed before the exchange completed.
    #[error("multiplexer connection closed")]
    Closed,

    /// Sending the graceful shutdown (GOAWAY) frame failed.
    #[error("goaway failed: {0}")]
    GoAway(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A single full-duplex SPDY data stream.
pub trait SpdyStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> SpdyStream for T {}

/// A SPDY/3.1 connection multiplexer, as handed to [`super::run`].
///
/// `create_stream`'s returned future is expected to resolve only once the server has
/// acknowledged the new stream (the spec's "stream-accepted event") -- [`super::run`] relies on
/// this to satisfy the "no stdin bytes before every stream is acknowledged" ordering requirement
/// simply by awaiting each `create_stream` call in turn before starting any copy task.
#[async_trait::async_trait]
pub trait SpdyMultiplexer: Send {
    /// The concrete per-stream duplex byte channel type.
    type Stream: SpdyStream;

    /// Open a new stream tagged `streamtype: {stream_type.header_value()}` and await its
    /// acknowledgement.
    async fn create_stream(&mut self, stream_type: StreamType) -> Result<Self::Stream, SpdyError>;

    /// Send a graceful GOAWAY and await multiplexer shutdown, releasing the underlying
    /// connection.
    async fn go_away(&mut self) -> Result<(), SpdyError>;
}
