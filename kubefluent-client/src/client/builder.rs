//! Assembles the default `tower` service stack: base-URI rewriting, credential attachment,
//! retries, and structured request/response tracing, terminating in a `hyper-util` HTTPS
//! transport.
//!
//! There is no `Config`/kubeconfig/in-cluster inference here (S9.1 Configuration): callers
//! supply the cluster's `base_uri`, an [`Auth`] credential provider, and a ready-to-use HTTPS
//! connector (built however they like -- `hyper-rustls` with their own root store and client
//! certificates). [`ClientBuilder::new`] remains available for a fully custom `Service` stack.

use std::{
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use http::{header::HeaderMap, Request, Response};
use hyper_rustls::HttpsConnector;
use hyper_util::{client::legacy::connect::HttpConnector, rt::TokioExecutor};
use tower::{retry::RetryLayer, util::BoxService, BoxError, Layer, Service, ServiceBuilder};
use tower_http::{
    classify::ServerErrorsFailureClass, map_response_body::MapResponseBodyLayer, trace::TraceLayer,
};
use tracing::Span;

use crate::{
    client::{auth::CredentialProvider, Auth, Body, Client, RetryPolicy},
    Error, Result,
};

/// HTTP body of a dynamic backing type, used to erase the concrete transport's response body.
pub type DynBody = dyn http_body::Body<Data = Bytes, Error = BoxError> + Send + Unpin;

/// Builder for [`Client`] instances with customized [tower](`Service`) middleware.
pub struct ClientBuilder<Svc> {
    service: Svc,
    default_ns: String,
}

impl<Svc> ClientBuilder<Svc> {
    /// Construct a [`ClientBuilder`] from scratch with a fully custom [`Service`] stack.
    ///
    /// Most callers want [`ClientBuilder::try_new`] instead, which wires up the default stack
    /// (base URI, auth, retries, tracing) over an HTTPS connector.
    pub fn new(service: Svc, default_namespace: impl Into<String>) -> Self
    where
        Svc: Service<Request<Body>>,
    {
        Self {
            service,
            default_ns: default_namespace.into(),
        }
    }

    /// Add a [`Layer`] to the current [`Service`] stack.
    pub fn with_layer<L: Layer<Svc>>(self, layer: &L) -> ClientBuilder<L::Service> {
        let Self { service: stack, default_ns } = self;
        ClientBuilder {
            service: layer.layer(stack),
            default_ns,
        }
    }

    /// Build a [`Client`] instance with the current [`Service`] stack.
    pub fn build<B>(self) -> Client
    where
        Svc: Service<Request<Body>, Response = Response<B>> + Send + 'static,
        Svc::Future: Send + 'static,
        Svc::Error: Into<BoxError>,
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Client::new(self.service, self.default_ns)
    }
}

impl ClientBuilder<BoxService<Request<Body>, Response<Box<DynBody>>, BoxError>> {
    /// Build the default [`ClientBuilder`] stack: base-URI rewriting, [`Auth`] attachment,
    /// retries on 429/503/504, and request/response tracing, over the given HTTPS connector.
    pub fn try_new(
        https: HttpsConnector<HttpConnector>,
        base_uri: http::Uri,
        auth: Auth,
        default_namespace: impl Into<String>,
    ) -> Result<Self> {
        let default_ns = default_namespace.into();
        let transport = hyper_util::client::legacy::Client::builder(TokioExecutor::new()).build(https);

        let service = ServiceBuilder::new()
            .layer(BaseUriLayer::new(base_uri))
            .layer(AuthLayer::new(auth))
            .layer(RetryLayer::new(RetryPolicy::default()))
            .layer(
                // Attribute names follow OpenTelemetry semantic conventions for HTTP clients.
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request<Body>| {
                        tracing::debug_span!(
                            "HTTP",
                            http.method = %req.method(),
                            http.url = %req.uri(),
                            http.status_code = tracing::field::Empty,
                            otel.kind = "client",
                            otel.status_code = tracing::field::Empty,
                        )
                    })
                    .on_request(|_req: &Request<Body>, _span: &Span| {
                        tracing::debug!("requesting");
                    })
                    .on_response(|res: &Response<hyper::body::Incoming>, _latency: Duration, span: &Span| {
                        let status = res.status();
                        span.record("http.status_code", status.as_u16());
                        if status.is_client_error() || status.is_server_error() {
                            span.record("otel.status_code", "ERROR");
                        }
                    })
                    .on_body_chunk(())
                    .on_eos(|_: Option<&HeaderMap>, _duration: Duration, _span: &Span| {
                        tracing::debug!("stream closed");
                    })
                    .on_failure(|ec: ServerErrorsFailureClass, _latency: Duration, span: &Span| {
                        span.record("otel.status_code", "ERROR");
                        match ec {
                            ServerErrorsFailureClass::StatusCode(status) => {
                                span.record("http.status_code", status.as_u16());
                                tracing::error!("failed with status {}", status);
                            }
                            ServerErrorsFailureClass::Error(err) => {
                                tracing::error!("failed with error {}", err);
                            }
                        }
                    }),
            )
            .map_err(BoxError::from)
            .service(transport);

        Ok(Self::new(
            BoxService::new(
                MapResponseBodyLayer::new(|body| {
                    Box::new(http_body::Body::map_err(body, BoxError::from)) as Box<DynBody>
                })
                .layer(service),
            ),
            default_ns,
        ))
    }
}

/// Rewrites an outbound request's scheme and authority to the configured cluster base URI.
///
/// The fluent [`crate::request::Request`] builder only ever constructs a path-and-query; this
/// layer is what turns that into an absolute URI before it reaches the transport.
#[derive(Clone)]
struct BaseUriLayer {
    base_uri: http::Uri,
}

impl BaseUriLayer {
    fn new(base_uri: http::Uri) -> Self {
        Self { base_uri }
    }
}

impl<S> Layer<S> for BaseUriLayer {
    type Service = BaseUriService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BaseUriService {
            inner,
            base_uri: self.base_uri.clone(),
        }
    }
}

#[derive(Clone)]
struct BaseUriService<S> {
    inner: S,
    base_uri: http::Uri,
}

impl<S, B> Service<Request<B>> for BaseUriService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let mut parts = req.uri().clone().into_parts();
        parts.scheme = self.base_uri.scheme().cloned();
        parts.authority = self.base_uri.authority().cloned();
        if let Ok(uri) = http::Uri::from_parts(parts) {
            *req.uri_mut() = uri;
        }
        self.inner.call(req)
    }
}

/// Attaches the configured [`Auth`] (or any other [`CredentialProvider`]) to every outbound
/// request.
#[derive(Clone)]
struct AuthLayer<A> {
    auth: A,
}

impl<A> AuthLayer<A> {
    fn new(auth: A) -> Self {
        Self { auth }
    }
}

impl<S, A: Clone> Layer<S> for AuthLayer<A> {
    type Service = AuthService<S, A>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            auth: self.auth.clone(),
        }
    }
}

#[derive(Clone)]
struct AuthService<S, A> {
    inner: S,
    auth: A,
}

impl<S, A, B> Service<Request<B>> for AuthService<S, A>
where
    S: Service<Request<B>, Error = BoxError>,
    A: CredentialProvider,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = futures::future::Either<std::future::Ready<Result<Self::Response, Self::Error>>, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        if let Err(e) = self.auth.authorize(&mut req) {
            return futures::future::Either::Left(std::future::ready(Err(Error::Auth(e).into())));
        }
        futures::future::Either::Right(self.inner.call(req))
    }
}
