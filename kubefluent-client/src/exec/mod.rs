//! The SPDY-based exec channel (component I): upgrade negotiation, stream creation ordering, and
//! exit-status extraction.
//!
//! Wire-level SPDY/3.1 framing is an external collaborator (S1 Non-goals): [`spdy::SpdyMultiplexer`]
//! is the contract a concrete implementation must satisfy, built on the raw duplex byte stream
//! [`crate::client::Client::connect`] hands back after a successful upgrade. Everything in this
//! module above that trait -- stream creation ordering, copy tasks, exit-status decoding -- is
//! ours.

pub mod spdy;

use kubefluent_core::response::Status;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    client::{verify_upgrade_response, Client, StreamProtocol, UpgradeError},
    request::Request,
    Result,
};
use spdy::{SpdyError, SpdyMultiplexer, StreamType};

/// Errors from running an exec session.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The SPDY upgrade handshake failed.
    #[error("upgrade error: {0}")]
    Upgrade(#[from] UpgradeError),

    /// The SPDY multiplexing boundary failed.
    #[error(transparent)]
    Spdy(#[from] SpdyError),

    /// The error stream's buffered payload did not decode as a `Status`.
    #[error("failed to decode error stream as a status: {0}")]
    DecodeStatus(#[from] serde_json::Error),

    /// Copying bytes to/from one of the user-supplied stdio handles failed.
    #[error("i/o error copying {0} stream: {1}")]
    Copy(&'static str, #[source] std::io::Error),

    /// The remote command exited non-zero (or the server reported a failure status) and the
    /// caller asked to raise on failure.
    #[error("command failed: {} ({})", .0.message, .0.reason)]
    CommandFailed(Status),
}

/// Which user-facing stdio streams to attach, and whether to raise [`ExecError::CommandFailed`]
/// on a non-zero exit.
pub struct ExecOptions {
    /// Attach stdin.
    pub stdin: bool,
    /// Attach stdout.
    pub stdout: bool,
    /// Attach stderr.
    pub stderr: bool,
    /// Raise [`ExecError::CommandFailed`] instead of returning a non-zero [`ExecOutcome`].
    pub throw_on_failure: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            stdin: false,
            stdout: true,
            stderr: true,
            throw_on_failure: false,
        }
    }
}

/// The decoded result of an exec session: the server's raw [`Status`] plus the extracted integer
/// exit code (S4.I's exit-status extraction rules).
#[derive(Debug)]
pub struct ExecOutcome {
    /// The decoded (or synthesized) status.
    pub status: Status,
    /// The process exit code, or `-1` if it could not be determined.
    pub code: i32,
}

/// Issue `request` (already scoped to a pod's `exec` subresource, with `command`/`container`
/// query params set by the caller) with the SPDY upgrade headers, and negotiate the exec
/// subprotocol. On success, returns the raw duplex byte stream for a [`spdy::SpdyMultiplexer`]
/// implementation to take ownership of, plus the negotiated [`StreamProtocol`].
pub async fn negotiate(client: &Client, request: Request) -> Result<(hyper::upgrade::Upgraded, StreamProtocol)> {
    let mut http_req = request.accept("*/*").build()?;
    StreamProtocol::add_to_headers(http_req.headers_mut());
    let (response, on_upgrade) = client.connect(http_req).await?;
    let protocol = verify_upgrade_response(&response).map_err(crate::Error::Upgrade)?;
    let upgraded = on_upgrade.await.map_err(UpgradeError::GetPendingUpgrade).map_err(crate::Error::Upgrade)?;
    Ok((upgraded, protocol))
}

/// Drive one exec session over an already-negotiated SPDY multiplexer (component I, minus the
/// upgrade handshake -- see [`spdy::SpdyMultiplexer`]'s docs for why `create_stream` already
/// encodes the "don't write to stdin before every stream is acknowledged" ordering rule).
///
/// `stdin`/`stdout`/`stderr` are only consulted if present; `options` must agree with which of
/// them are `Some`.
pub async fn run<M, In, Out, Errw>(
    multiplexer: &mut M,
    protocol: StreamProtocol,
    options: &ExecOptions,
    stdin: Option<In>,
    stdout: Option<Out>,
    stderr: Option<Errw>,
) -> Result<ExecOutcome, ExecError>
where
    M: SpdyMultiplexer,
    In: AsyncRead + Unpin + Send + 'static,
    Out: AsyncWrite + Unpin + Send + 'static,
    Errw: AsyncWrite + Unpin + Send + 'static,
{
    let mut error_stream = multiplexer.create_stream(StreamType::Error).await?;
    let stdin_stream = if options.stdin {
        Some(multiplexer.create_stream(StreamType::Stdin).await?)
    } else {
        None
    };
    let stdout_stream = if options.stdout {
        Some(multiplexer.create_stream(StreamType::Stdout).await?)
    } else {
        None
    };
    let stderr_stream = if options.stderr {
        Some(multiplexer.create_stream(StreamType::Stderr).await?)
    } else {
        None
    };

    let mut copies = tokio::task::JoinSet::new();
    if let (Some(mut user_in), Some(mut stream)) = (stdin, stdin_stream) {
        copies.spawn(async move {
            tokio::io::copy(&mut user_in, &mut stream).await.map_err(|e| ExecError::Copy("stdin", e))?;
            stream.shutdown().await.map_err(|e| ExecError::Copy("stdin", e))
        });
    }
    if let (Some(mut user_out), Some(mut stream)) = (stdout, stdout_stream) {
        copies.spawn(async move {
            tokio::io::copy(&mut stream, &mut user_out).await.map_err(|e| ExecError::Copy("stdout", e))?;
            Ok(())
        });
    }
    if let (Some(mut user_err), Some(mut stream)) = (stderr, stderr_stream) {
        copies.spawn(async move {
            tokio::io::copy(&mut stream, &mut user_err).await.map_err(|e| ExecError::Copy("stderr", e))?;
            Ok(())
        });
    }

    let mut error_buf = Vec::new();
    error_stream
        .read_to_end(&mut error_buf)
        .await
        .map_err(|e| ExecError::Copy("error", e))?;

    while let Some(joined) = copies.join_next().await {
        joined.map_err(|_| ExecError::Spdy(SpdyError::Closed))??;
    }

    multiplexer.go_away().await?;

    let outcome = decode_outcome(&error_buf, protocol)?;
    if options.throw_on_failure && outcome.status.status == "Failure" {
        return Err(ExecError::CommandFailed(outcome.status));
    }
    Ok(outcome)
}

/// Exit-status extraction, per S4.I: empty error buffer means success; `v4`+ decodes a `Status`
/// and scans `details.causes` for an `ExitCode` reason; earlier protocol versions carry no
/// structured exit code at all, so failure is reported with `code = -1`.
fn decode_outcome(error_buf: &[u8], protocol: StreamProtocol) -> Result<ExecOutcome, ExecError> {
    if error_buf.is_empty() {
        return Ok(ExecOutcome {
            status: Status {
                code: 0,
                status: "Success".into(),
                message: String::new(),
                reason: String::new(),
                details: None,
            },
            code: 0,
        });
    }

    if protocol.carries_exit_status() {
        let status: Status = serde_json::from_slice(error_buf)?;
        let code = if status.status == "Success" {
            0
        } else {
            status
                .details
                .as_ref()
                .and_then(|d| d.causes.iter().find(|c| c.reason == "ExitCode"))
                .and_then(|c| c.message.parse::<i32>().ok())
                .unwrap_or(-1)
        };
        Ok(ExecOutcome { status, code })
    } else {
        let message = String::from_utf8_lossy(error_buf).into_owned();
        Ok(ExecOutcome {
            status: Status {
                code: 0,
                status: "Failure".into(),
                message,
                reason: "CommandFailed".into(),
                details: None,
            },
            code: -1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::VecDeque,
        pin::Pin,
        task::{Context, Poll},
    };
    use tokio::io::ReadBuf;

    struct MockStream {
        read_data: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl MockStream {
        fn new(read_data: &[u8]) -> Self {
            Self {
                read_data: read_data.iter().copied().collect(),
                written: Vec::new(),
            }
        }
    }

    impl AsyncRead for MockStream {
        fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
            let n = buf.remaining().min(self.read_data.len());
            for _ in 0..n {
                buf.put_slice(&[self.read_data.pop_front().unwrap()]);
            }
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockStream {
        fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
            self.written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct MockMultiplexer {
        order: Vec<StreamType>,
        error_payload: Vec<u8>,
        went_away: bool,
    }

    #[async_trait::async_trait]
    impl SpdyMultiplexer for MockMultiplexer {
        type Stream = MockStream;

        async fn create_stream(&mut self, stream_type: StreamType) -> Result<Self::Stream, SpdyError> {
            self.order.push(stream_type);
            let data = if stream_type == StreamType::Error {
                self.error_payload.clone()
            } else {
                Vec::new()
            };
            Ok(MockStream::new(&data))
        }

        async fn go_away(&mut self) -> Result<(), SpdyError> {
            self.went_away = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn creates_streams_in_order_and_tears_down() {
        let mut mux = MockMultiplexer {
            order: Vec::new(),
            error_payload: Vec::new(),
            went_away: false,
        };
        let options = ExecOptions {
            stdin: true,
            stdout: true,
            stderr: true,
            throw_on_failure: false,
        };
        let outcome = run(
            &mut mux,
            StreamProtocol::V4,
            &options,
            Some(MockStream::new(b"hello")),
            Some(MockStream::new(b"")),
            Some(MockStream::new(b"")),
        )
        .await
        .unwrap();

        assert_eq!(
            mux.order,
            vec![StreamType::Error, StreamType::Stdin, StreamType::Stdout, StreamType::Stderr]
        );
        assert!(mux.went_away);
        assert_eq!(outcome.code, 0);
        assert_eq!(outcome.status.status, "Success");
    }

    #[tokio::test]
    async fn extracts_exit_code_from_v4_status() {
        let status = serde_json::json!({
            "status": "Failure",
            "reason": "NonZeroExitCode",
            "details": { "causes": [{ "reason": "ExitCode", "message": "2" }] },
        });
        let mut mux = MockMultiplexer {
            order: Vec::new(),
            error_payload: serde_json::to_vec(&status).unwrap(),
            went_away: false,
        };
        let options = ExecOptions {
            stdin: false,
            stdout: true,
            stderr: false,
            throw_on_failure: false,
        };
        let outcome = run::<_, MockStream, _, MockStream>(&mut mux, StreamProtocol::V4, &options, None, Some(MockStream::new(b"")), None)
            .await
            .unwrap();
        assert_eq!(outcome.code, 2);
    }

    #[tokio::test]
    async fn throw_on_failure_raises_command_failed() {
        let status = serde_json::json!({ "status": "Failure", "reason": "NonZeroExitCode" });
        let mut mux = MockMultiplexer {
            order: Vec::new(),
            error_payload: serde_json::to_vec(&status).unwrap(),
            went_away: false,
        };
        let options = ExecOptions {
            stdin: false,
            stdout: false,
            stderr: false,
            throw_on_failure: true,
        };
        let err = run::<_, MockStream, MockStream, MockStream>(&mut mux, StreamProtocol::V4, &options, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::CommandFailed(_)));
    }

    #[tokio::test]
    async fn pre_v4_protocol_synthesizes_command_failed_status() {
        let mut mux = MockMultiplexer {
            order: Vec::new(),
            error_payload: b"boom".to_vec(),
            went_away: false,
        };
        let options = ExecOptions {
            stdin: false,
            stdout: false,
            stderr: false,
            throw_on_failure: false,
        };
        let outcome = run::<_, MockStream, MockStream, MockStream>(&mut mux, StreamProtocol::V3, &options, None, None, None)
            .await
            .unwrap();
        assert_eq!(outcome.code, -1);
        assert_eq!(outcome.status.reason, "CommandFailed");
    }
}
