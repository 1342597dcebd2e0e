//! Exec channel scenarios (S8 properties 8-9 / E5-E6), driven entirely through the public
//! `kubefluent::exec` surface against a hand-written [`SpdyMultiplexer`] -- wire-level SPDY
//! framing is an explicit external collaborator (S1 Non-goals), so these tests stand in for the
//! server side of the upgrade the same way the crate's own unit tests do.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use kubefluent::client::StreamProtocol;
use kubefluent::exec::spdy::{SpdyError, SpdyMultiplexer, StreamType};
use kubefluent::exec::{run, ExecOptions};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

struct MockStream {
    read_data: VecDeque<u8>,
    written: Option<Arc<Mutex<Vec<u8>>>>,
}

impl MockStream {
    fn new(data: &[u8]) -> Self {
        Self { read_data: data.iter().copied().collect(), written: None }
    }

    fn captured(data: &[u8], sink: Arc<Mutex<Vec<u8>>>) -> Self {
        Self { read_data: data.iter().copied().collect(), written: Some(sink) }
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
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        if let Some(sink) = &self.written {
            sink.lock().unwrap().extend_from_slice(buf);
        }
        Poll::Ready(Ok(buf.len()))
    }
    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

struct ScriptedMultiplexer {
    error_payload: Vec<u8>,
    stdout_payload: Vec<u8>,
}

#[async_trait::async_trait]
impl SpdyMultiplexer for ScriptedMultiplexer {
    type Stream = MockStream;

    async fn create_stream(&mut self, stream_type: StreamType) -> Result<Self::Stream, SpdyError> {
        let data = match stream_type {
            StreamType::Error => self.error_payload.clone(),
            StreamType::Stdout => self.stdout_payload.clone(),
            _ => Vec::new(),
        };
        Ok(MockStream::new(&data))
    }

    async fn go_away(&mut self) -> Result<(), SpdyError> {
        Ok(())
    }
}

/// E5: an empty error stream on the v4 protocol yields a success outcome with `code == 0`, and
/// the server's stdout bytes reach the caller's stdout sink.
#[tokio::test]
async fn e5_empty_error_stream_is_success() {
    let mut mux = ScriptedMultiplexer { error_payload: Vec::new(), stdout_payload: b"hi\n".to_vec() };
    let options = ExecOptions { stdin: false, stdout: true, stderr: false, throw_on_failure: false };
    let captured = Arc::new(Mutex::new(Vec::new()));
    let outcome = run::<_, MockStream, _, MockStream>(
        &mut mux,
        StreamProtocol::V4,
        &options,
        None,
        Some(MockStream::captured(b"", captured.clone())),
        None,
    )
    .await
    .unwrap();
    assert_eq!(outcome.code, 0);
    assert_eq!(outcome.status.status, "Success");
    assert_eq!(captured.lock().unwrap().as_slice(), b"hi\n");
}

/// E6: a v4 error-stream payload reporting a non-zero exit extracts the numeric exit code and
/// status from `details.causes`.
#[tokio::test]
async fn e6_nonzero_exit_code_is_extracted() {
    let payload = serde_json::json!({
        "status": "Failure",
        "reason": "NonZeroExitCode",
        "details": { "causes": [{ "reason": "ExitCode", "message": "2" }] },
    });
    let mut mux = ScriptedMultiplexer { error_payload: serde_json::to_vec(&payload).unwrap(), stdout_payload: Vec::new() };
    let options = ExecOptions { stdin: false, stdout: true, stderr: false, throw_on_failure: false };
    let outcome = run::<_, MockStream, _, MockStream>(&mut mux, StreamProtocol::V4, &options, None, Some(MockStream::new(b"")), None)
        .await
        .unwrap();
    assert_eq!(outcome.code, 2);
    assert_eq!(outcome.status.status, "Failure");
}
