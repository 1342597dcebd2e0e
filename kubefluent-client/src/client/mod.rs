//! The transport-aware [`Client`]: a cheaply-cloneable handle wrapping a `tower` `Service` stack.
//!
//! [`Client`] is deliberately low-level: it knows how to send an already-built [`http::Request`]
//! and decode the response, and how to turn a streaming response into a [`WatchEvent`] stream. The
//! fluent request construction (component C) lives in [`crate::request`]; this module is the
//! Executor's (component E) transport handle.

use bytes::Bytes;
use either::{Either, Left, Right};
use futures::{Stream, StreamExt, TryStream, TryStreamExt};
use http::{Request, Response, StatusCode};
use kubefluent_core::response::Status;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    io::StreamReader,
};
use tower::{buffer::Buffer, util::BoxService, BoxError, Layer, Service, ServiceExt};
use tower_http::map_response_body::MapResponseBodyLayer;

use crate::{error::ErrorResponse, Error, Result};
use kubefluent_core::watch::WatchEvent;

pub mod auth;
mod body;
pub mod builder;
mod retry;
pub(crate) mod upgrade;

pub use auth::{Auth, CredentialProvider};
pub(crate) use body::IntoBodyDataStream;
pub use body::Body;
pub use builder::{ClientBuilder, DynBody};
pub use retry::RetryPolicy;
pub use upgrade::{verify_upgrade_response, StreamProtocol, UpgradeError};

/// Client for connecting to a Kubernetes API server.
///
/// The easiest way to instantiate one is [`ClientBuilder::build`] with an explicit `base_uri` and
/// [`Auth`] (no kubeconfig or in-cluster inference is attempted: see S9.1 Configuration). For a
/// fully custom transport stack, use [`Client::new`] directly.
#[derive(Clone)]
pub struct Client {
    inner: Buffer<BoxService<Request<Body>, Response<Body>, BoxError>, Request<Body>>,
    default_ns: String,
}

impl Client {
    /// Create a [`Client`] from a custom `Service` stack.
    pub fn new<S, B, T>(service: S, default_namespace: T) -> Self
    where
        S: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<BoxError>,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
        T: Into<String>,
    {
        let service = MapResponseBodyLayer::new(|b: B| Body::wrap_body(b))
            .layer(service)
            .map_err(Into::into);
        Self {
            inner: Buffer::new(BoxService::new(service), 1024),
            default_ns: default_namespace.into(),
        }
    }

    pub(crate) fn default_ns(&self) -> &str {
        &self.default_ns
    }

    /// Perform a raw HTTP request and return the raw response.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        let mut svc = self.inner.clone();
        svc.ready().await.map_err(Error::Service)?.call(request).await.map_err(|err| {
            err.downcast::<Error>()
                .map(|e| *e)
                .unwrap_or_else(|err| Error::Service(err))
        })
    }

    /// Perform a raw HTTP request and deserialize the body as JSON.
    pub async fn request<T>(&self, request: Request<Vec<u8>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let text = self.request_text(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!("{}, {:?}", text, e);
            Error::Decode(e)
        })
    }

    /// Perform a raw HTTP request and get the response body as a string, translating non-2xx
    /// responses into [`Error::Api`].
    pub async fn request_text(&self, request: Request<Vec<u8>>) -> Result<String> {
        let res = self.send(request.map(Body::from)).await?;
        let status = res.status();
        let body_bytes = http_body_util::BodyExt::collect(res.into_body()).await?.to_bytes();
        let text = String::from_utf8(body_bytes.to_vec()).map_err(Error::FromUtf8)?;
        handle_api_errors(&text, status)?;
        Ok(text)
    }

    /// Perform a raw HTTP request and get the response body as a stream of bytes.
    pub async fn request_text_stream(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<impl Stream<Item = Result<Bytes>>> {
        let res = self.send(request.map(Body::from)).await?;
        Ok(res.into_body().into_stream())
    }

    /// Perform a raw request and decode the body as either `T` or a [`Status`] (used when an
    /// endpoint may synthesize a `Status` response on a 2xx, e.g. some delete responses).
    pub async fn request_status<T>(&self, request: Request<Vec<u8>>) -> Result<Either<T, Status>>
    where
        T: DeserializeOwned,
    {
        let text = self.request_text(request).await?;
        let v: Value = serde_json::from_str(&text).map_err(Error::Decode)?;
        if v["kind"] == "Status" {
            tracing::trace!("Status from {}", text);
            Ok(Right(serde_json::from_str::<Status>(&text).map_err(Error::Decode)?))
        } else {
            Ok(Left(serde_json::from_str::<T>(&text).map_err(Error::Decode)?))
        }
    }

    /// Send `request` and, if the server answers with a protocol upgrade, hand back the raw
    /// duplex byte stream alongside the response headers (component I's entry point into the
    /// transport: see [`crate::exec`]).
    pub async fn connect(&self, request: Request<Body>) -> Result<(Response<Body>, hyper::upgrade::OnUpgrade)> {
        let mut resp = self.send(request).await?;
        let on_upgrade = hyper::upgrade::on(&mut resp);
        Ok((resp, on_upgrade))
    }

    /// Perform a raw request and get back a stream of [`WatchEvent`]s: the transport half of the
    /// Watch Reader (component G). Wire framing is newline-delimited JSON per S4.G.
    pub async fn request_events<T>(
        &self,
        request: Request<Vec<u8>>,
    ) -> Result<impl TryStream<Item = Result<WatchEvent<T>>>>
    where
        T: Clone + DeserializeOwned,
    {
        let res = self.send(request.map(Body::from)).await?;
        tracing::trace!("headers: {:?}", res.headers());

        let frames = FramedRead::new(
            StreamReader::new(res.into_body().into_stream().map_err(|e| {
                // The underlying transport is fully boxed by this point, so we classify by
                // message rather than by downcasting to e.g. `hyper::Error::is_timeout`.
                let msg = e.to_string();
                // Client timeout. This will be ignored.
                if msg.contains("timed out") || msg.contains("timeout") {
                    return std::io::Error::new(std::io::ErrorKind::TimedOut, e);
                }
                // Unexpected EOF from chunked decoder; tends to happen when watching for 300+s.
                if msg.contains("unexpected EOF during chunk") {
                    return std::io::Error::new(std::io::ErrorKind::UnexpectedEof, e);
                }
                std::io::Error::other(e)
            })),
            LinesCodec::new(),
        );

        Ok(frames.filter_map(|res| async {
            match res {
                Ok(line) => match serde_json::from_str::<WatchEvent<T>>(&line) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        if e.is_eof() {
                            return None;
                        }
                        if let Ok(e_resp) = serde_json::from_str::<ErrorResponse>(&line) {
                            return Some(Err(Error::Api(e_resp)));
                        }
                        Some(Err(Error::Decode(e)))
                    }
                },
                Err(LinesCodecError::Io(e)) => match e.kind() {
                    std::io::ErrorKind::TimedOut => {
                        tracing::warn!("timeout in poll: {}", e);
                        None
                    }
                    std::io::ErrorKind::UnexpectedEof => {
                        tracing::warn!("eof in poll: {}", e);
                        None
                    }
                    _ => Some(Err(Error::ReadEvents(e))),
                },
                Err(LinesCodecError::MaxLineLengthExceeded) => Some(Err(Error::LinesCodecMaxLineLengthExceeded)),
            }
        }))
    }
}

/// Decode an error body, falling back to a synthesized [`ErrorResponse`] when the server's error
/// payload didn't parse as one (should not happen against a conformant API server).
fn handle_api_errors(text: &str, s: StatusCode) -> Result<()> {
    if s.is_client_error() || s.is_server_error() {
        if let Ok(errdata) = serde_json::from_str::<ErrorResponse>(text) {
            tracing::debug!("Unsuccessful: {:?}", errdata);
            Err(Error::Api(errdata))
        } else {
            tracing::warn!("Unsuccessful data error parse: {}", text);
            let ae = ErrorResponse {
                status: s.to_string(),
                code: s.as_u16(),
                message: format!("{:?}", text),
                reason: "Failed to parse error data".into(),
            };
            tracing::debug!("Unsuccessful: {:?} (reconstruct)", ae);
            Err(Error::Api(ae))
        }
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request as FluentRequest;
    use futures::pin_mut;
    use http::Response as HttpResponse;
    use k8s_openapi::api::core::v1::Pod;
    use tower_test::mock;

    #[tokio::test]
    async fn test_mock() {
        let (mock_service, handle) = mock::pair::<Request<Body>, HttpResponse<Body>>();
        let spawned = tokio::spawn(async move {
            pin_mut!(handle);
            let (request, send) = handle.next_request().await.expect("service not called");
            assert_eq!(request.method(), http::Method::GET);
            assert_eq!(request.uri().to_string(), "/api/v1/namespaces/default/pods/test");
            let pod: Pod = serde_json::from_value(serde_json::json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": { "name": "test" },
                "spec": { "containers": [{ "name": "test", "image": "test-image" }] }
            }))
            .unwrap();
            send.send_response(
                HttpResponse::builder()
                    .body(Body::from(serde_json::to_vec(&pod).unwrap()))
                    .unwrap(),
            );
        });

        let client = Client::new(mock_service, "default");
        let pod: Pod = FluentRequest::new(client)
            .namespace("default")
            .kind("v1", "Pod")
            .name("test")
            .execute()
            .await
            .unwrap();
        assert_eq!(pod.metadata.name.unwrap(), "test");
        spawned.await.unwrap();
    }
}
