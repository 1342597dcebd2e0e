//! The fluent [`Request`] builder (component C), its [`Executor`](Request::execute) (component
//! E), and the atomic get-modify-put loop (component F, [`Request::replace`]).
//!
//! `Request` is a value type: every setter consumes `self` and returns `Self`, so a base request
//! can be cloned and specialized per call site without any of the clones observing each other's
//! mutations (S3's "immutable under execution" invariant, and testable property 3).

use std::future::Future;

use bytes::Bytes;
use futures::Stream;
use http::Method;
use kubefluent_core::{multimap::OrderedMultimap, scheme::Scheme, Resource};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::{client::Body, response::Response, Client, Error, Result};

const RESERVED_HEADERS: [&str; 2] = ["accept", "content-type"];

/// The request body, deferred until [`Request::execute`] renders it.
pub enum RequestBody {
    /// No body.
    None,
    /// Pre-encoded bytes, sent as-is.
    Bytes(Bytes),
    /// UTF-8 text, sent as-is.
    Text(String),
    /// A value to be JSON-encoded at render time via the shared codec (component B).
    Json(serde_json::Value),
    /// An opaque byte stream; not retryable and not deeply cloneable (see [`Request::clone`]).
    Stream(std::pin::Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "RequestBody::None"),
            Self::Bytes(b) => write!(f, "RequestBody::Bytes({} bytes)", b.len()),
            Self::Text(t) => write!(f, "RequestBody::Text({} chars)", t.len()),
            Self::Json(_) => write!(f, "RequestBody::Json(..)"),
            Self::Stream(_) => write!(f, "RequestBody::Stream(..)"),
        }
    }
}

/// A fluent, deeply-cloneable accumulator of HTTP method, URL components, headers, query
/// parameters, body, and transport options, per S3.
///
/// Construct with [`Request::new`], specialize with the chainable setters, and dispatch with
/// [`Request::execute`] (or [`Request::send`] for the raw [`Response`]).
#[derive(Debug)]
pub struct Request {
    client: Client,
    scheme: Arc<Scheme>,
    method: Method,
    raw_uri: Option<String>,
    group: Option<String>,
    version: Option<String>,
    namespace: Option<String>,
    plural: Option<String>,
    name: Option<String>,
    subresource: Option<String>,
    accept: String,
    media_type: String,
    headers: OrderedMultimap,
    query: OrderedMultimap,
    body: RequestBody,
    stream_response: bool,
    watch_version: Option<String>,
    old_style_watch: bool,
    pending_error: Option<String>,
}

impl Clone for Request {
    /// Deep-copies the header/query multimaps; shares the `client` handle and `scheme` registry.
    ///
    /// A [`RequestBody::Stream`] body cannot be safely duplicated (it may already be partially
    /// consumed), so it clones to [`RequestBody::None`] -- callers that need to re-execute a
    /// streaming-body request must re-attach the body to each clone.
    fn clone(&self) -> Self {
        let body = match &self.body {
            RequestBody::None => RequestBody::None,
            RequestBody::Bytes(b) => RequestBody::Bytes(b.clone()),
            RequestBody::Text(t) => RequestBody::Text(t.clone()),
            RequestBody::Json(v) => RequestBody::Json(
                kubefluent_core::codec::clone_via_codec(v).expect("re-encoding an already-valid JSON value round-trips"),
            ),
            RequestBody::Stream(_) => RequestBody::None,
        };
        Self {
            client: self.client.clone(),
            scheme: Arc::clone(&self.scheme),
            method: self.method.clone(),
            raw_uri: self.raw_uri.clone(),
            group: self.group.clone(),
            version: self.version.clone(),
            namespace: self.namespace.clone(),
            plural: self.plural.clone(),
            name: self.name.clone(),
            subresource: self.subresource.clone(),
            accept: self.accept.clone(),
            media_type: self.media_type.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body,
            stream_response: self.stream_response,
            watch_version: self.watch_version.clone(),
            old_style_watch: self.old_style_watch,
            pending_error: self.pending_error.clone(),
        }
    }
}

fn normalize(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl Request {
    /// Start a new request against `client`, defaulting to `GET` with no resource type set.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            scheme: Arc::new(Scheme::new()),
            method: Method::GET,
            raw_uri: None,
            group: None,
            version: None,
            namespace: None,
            plural: None,
            name: None,
            subresource: None,
            accept: "application/json".to_string(),
            media_type: "application/json".to_string(),
            headers: OrderedMultimap::new(),
            query: OrderedMultimap::new(),
            body: RequestBody::None,
            stream_response: false,
            watch_version: None,
            old_style_watch: false,
            pending_error: None,
        }
    }

    /// Use a non-default [`Scheme`] to resolve dynamic/custom kinds passed to [`Request::gvk`].
    pub fn with_scheme(mut self, scheme: Arc<Scheme>) -> Self {
        self.scheme = scheme;
        self
    }

    /// Scope the request to a typed, statically-known resource (its GVK and URL path segment
    /// come straight from the [`Resource`] trait, with no scheme lookup needed).
    pub fn for_resource<K: Resource>(mut self, dt: &K::DynamicType) -> Self {
        self.group = normalize(K::group(dt).into_owned());
        self.version = normalize(K::version(dt).into_owned());
        self.plural = normalize(K::plural(dt).into_owned());
        self
    }

    /// Set an absolute-path raw URI, overriding piecemeal URL construction. Piecemeal
    /// components must otherwise be left unset: combining both is a validation error surfaced
    /// at [`Request::execute`].
    pub fn raw_uri(mut self, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        if !uri.starts_with('/') {
            self.pending_error = Some(format!("rawUri must begin with '/': {uri:?}"));
        }
        self.raw_uri = Some(uri);
        self
    }

    /// `apiVersion/kind` shorthand: splits `group/version` on the first `/` and resolves the URL
    /// path segment via the scheme, falling back to [`kubefluent_core::resource::to_plural`].
    pub fn gvk(mut self, api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        let api_version = api_version.into();
        let kind = kind.into();
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g.to_string(), v.to_string()),
            None => (String::new(), api_version),
        };
        let gvk = kubefluent_core::GroupVersionKind::gvk(&group, &version, &kind);
        let plural = self
            .scheme
            .lookup(&gvk)
            .map(str::to_string)
            .unwrap_or_else(|| kubefluent_core::scheme::guess_path(&kind));
        self.group = normalize(group);
        self.version = normalize(version);
        self.plural = Some(plural);
        self
    }

    /// Alias for [`Request::gvk`], read as "`<version>` resources of `<kind>`".
    pub fn kind(self, api_version: impl Into<String>, kind: impl Into<String>) -> Self {
        self.gvk(api_version, kind)
    }

    /// Set the URL path segment (the resource's plural name) directly.
    pub fn plural(mut self, plural: impl Into<String>) -> Self {
        self.plural = normalize(plural);
        self
    }

    /// Scope to a namespace; an empty string clears it (cluster-scoped request).
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = normalize(namespace);
        self
    }

    /// Target a single named resource; an empty string clears it (collection request).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = normalize(name);
        self
    }

    /// Append subresource path segments, each percent-encoded and joined with `/`
    /// (e.g. `.subresources(&["status"])` or `.subresources(&["log"])`).
    pub fn subresources(mut self, parts: &[&str]) -> Self {
        let joined = parts
            .iter()
            .map(|p| form_urlencoded::byte_serialize(p.as_bytes()).collect::<String>())
            .collect::<Vec<_>>()
            .join("/");
        self.subresource = normalize(joined);
        self
    }

    /// Set the HTTP method directly.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// `GET`.
    pub fn get(self) -> Self {
        self.method(Method::GET)
    }

    /// `POST`.
    pub fn post(self) -> Self {
        self.method(Method::POST)
    }

    /// `PUT`.
    pub fn put(self) -> Self {
        self.method(Method::PUT)
    }

    /// `DELETE`.
    pub fn delete(self) -> Self {
        self.method(Method::DELETE)
    }

    /// `PATCH`. Callers are responsible for setting the correct patch `media_type` (this library
    /// does not compose patches, per S1's Non-goals).
    pub fn patch(self) -> Self {
        self.method(Method::PATCH)
    }

    /// Override the `Accept` header (default `application/json`).
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = accept.into();
        self
    }

    /// Override the request body's media type (default `application/json`).
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    /// Append a custom header. `Accept` and `Content-Type` are reserved and rejected (surfaced
    /// as a validation error at execution time); use [`Request::accept`]/[`Request::media_type`]
    /// instead.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            self.pending_error = Some(format!("header name {name:?} is reserved"));
            return self;
        }
        self.headers.append(name, value.into());
        self
    }

    /// Append a query parameter; repeated keys preserve insertion order.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.append(key.into(), value.into());
        self
    }

    /// Toggle `dryRun=All`.
    pub fn dry_run(self, enabled: bool) -> Self {
        if enabled {
            self.query("dryRun", "All")
        } else {
            self
        }
    }

    /// Thin wrapper over `query("fieldManager", ...)`.
    pub fn field_manager(self, manager: impl Into<String>) -> Self {
        self.query("fieldManager", manager)
    }

    /// Thin wrapper over `query("fieldSelector", ...)`.
    pub fn field_selector(self, selector: impl Into<String>) -> Self {
        self.query("fieldSelector", selector)
    }

    /// Thin wrapper over `query("labelSelector", ...)`.
    pub fn label_selector(self, selector: impl Into<String>) -> Self {
        self.query("labelSelector", selector)
    }

    /// Request apiserver-side watch bookmarks (the durable watcher relies on these to advance
    /// its tracked `resourceVersion` without forwarding a data event).
    pub fn allow_watch_bookmarks(self, enabled: bool) -> Self {
        if enabled {
            self.query("allowWatchBookmarks", "true")
        } else {
            self
        }
    }

    /// Set raw bytes as the body.
    pub fn body_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(bytes.into());
        self
    }

    /// Set UTF-8 text as the body, sent as-is (no JSON encoding).
    pub fn body_text(mut self, text: impl Into<String>) -> Self {
        self.body = RequestBody::Text(text.into());
        self
    }

    /// Set an opaque byte stream as the body. Stream bodies are not retried and do not survive
    /// [`Request::clone`] (see its docs).
    pub fn body_stream<S>(mut self, stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + 'static,
    {
        self.body = RequestBody::Stream(Box::pin(stream));
        self
    }

    /// Set an arbitrary value to be JSON-encoded at render time (component B: null-valued
    /// fields are omitted, enums render in string form).
    pub fn body<T: Serialize>(mut self, value: &T) -> Self {
        match kubefluent_core::codec::encode_value(value) {
            Ok(v) => self.body = RequestBody::Json(v),
            Err(e) => self.pending_error = Some(format!("failed to encode request body: {e}")),
        }
        self
    }

    /// Fill GVK, namespace and (if the object has a non-empty `uid`) name from `object`'s own
    /// declared type and metadata, then optionally set it as the body.
    ///
    /// An empty `uid` is treated as "this object does not exist on the server yet", so the name
    /// is left unset and the request targets the collection URL (a create).
    pub fn set<K>(mut self, object: &K, set_body: bool) -> Self
    where
        K: Resource + Serialize,
        K::DynamicType: Default,
    {
        let dt = K::DynamicType::default();
        let api_version = K::api_version(&dt).into_owned();
        let kind = K::kind(&dt).into_owned();
        self = self.gvk(api_version, kind);
        if let Some(ns) = object.meta().namespace.clone() {
            self = self.namespace(ns);
        }
        if object.meta().uid.as_deref().is_some_and(|uid| !uid.is_empty()) {
            if let Some(name) = object.meta().name.clone() {
                self = self.name(name);
            }
        }
        if set_body {
            self = self.body(object);
        }
        self
    }

    /// Force headers-only completion (return as soon as the response headers arrive, leaving
    /// the body as a stream for the caller to consume). Implied by a non-`None` watch version.
    pub fn stream_response(mut self, enabled: bool) -> Self {
        self.stream_response = enabled;
        self
    }

    /// Mark this as a watch request. `None` clears it; `Some("")` watches from the current
    /// resource version; `Some(rv)` resumes from a tracked resource version. Implies forced
    /// streaming completion.
    pub fn watch_version(mut self, version: Option<impl Into<String>>) -> Self {
        self.watch_version = version.map(Into::into);
        self
    }

    /// Select the legacy `/api/v1/watch/...` path layout instead of the `?watch=1` query form.
    pub fn old_style_watch(mut self, enabled: bool) -> Self {
        self.old_style_watch = enabled;
        self
    }

    /// Whether this request targets a single named resource rather than a collection. The
    /// durable watcher uses this to default its list-watch-vs-single-item disambiguation
    /// (S4.H) when the caller doesn't override it.
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }

    fn render_path(&self) -> Result<String> {
        if let Some(raw) = &self.raw_uri {
            if self.group.is_some()
                || self.version.is_some()
                || self.namespace.is_some()
                || self.plural.is_some()
                || self.name.is_some()
                || self.subresource.is_some()
            {
                return Err(Error::RequestValidation(
                    "rawUri cannot be combined with piecemeal URL components".into(),
                ));
            }
            return Ok(raw.clone());
        }

        let mut path = String::new();
        match self.group.as_deref() {
            None | Some("") => path.push_str("/api"),
            Some(group) => {
                path.push_str("/apis/");
                path.push_str(group);
            }
        }
        path.push('/');
        path.push_str(self.version.as_deref().unwrap_or("v1"));
        if self.old_style_watch && self.watch_version.is_some() {
            path.push_str("/watch");
        }
        if let Some(ns) = &self.namespace {
            path.push_str("/namespaces/");
            path.push_str(ns);
        }
        let plural = self
            .plural
            .as_deref()
            .ok_or_else(|| Error::RequestValidation("resource type not set".into()))?;
        path.push('/');
        path.push_str(plural);
        if let Some(name) = &self.name {
            path.push('/');
            path.push_str(name);
        }
        if let Some(sub) = &self.subresource {
            path.push('/');
            path.push_str(sub);
        }
        Ok(path)
    }

    fn render_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in self.query.iter() {
            serializer.append_pair(key, value);
        }
        if let Some(watch_version) = &self.watch_version {
            if !self.old_style_watch {
                serializer.append_pair("watch", "1");
            }
            if !watch_version.is_empty() {
                serializer.append_pair("resourceVersion", watch_version);
            }
        }
        serializer.finish()
    }

    fn render_body(&self) -> Result<Vec<u8>> {
        match &self.body {
            RequestBody::None => Ok(Vec::new()),
            RequestBody::Bytes(b) => Ok(b.to_vec()),
            RequestBody::Text(t) => Ok(t.clone().into_bytes()),
            RequestBody::Json(v) => kubefluent_core::codec::encode(v).map_err(Error::Decode),
            RequestBody::Stream(_) => Err(Error::RequestValidation(
                "stream bodies must be sent via body_stream-aware paths, not buffered execution".into(),
            )),
        }
    }

    fn render_headers(&self, builder: http::request::Builder, has_body: bool) -> Result<http::request::Builder> {
        if let Some(err) = &self.pending_error {
            return Err(Error::RequestValidation(err.clone()));
        }
        let mut builder = builder.header(http::header::ACCEPT, &self.accept);
        if has_body {
            builder = builder.header(http::header::CONTENT_TYPE, format!("{}; charset=UTF-8", self.media_type));
        }
        for (name, value) in self.headers.iter() {
            builder = builder.header(name.as_str(), value);
        }
        Ok(builder)
    }

    fn builder_with_path(&self) -> Result<http::request::Builder> {
        let mut path = self.render_path()?;
        let query = self.render_query();
        if !query.is_empty() {
            path.push('?');
            path.push_str(&query);
        }
        Ok(http::Request::builder().method(self.method.clone()).uri(path))
    }

    /// Render this request as a buffered `http::Request<Vec<u8>>` together with a clone of its
    /// client handle, for callers (the watch reader, [`crate::watch::reader`]) that need
    /// [`Client`]'s raw request/response methods directly instead of going through
    /// [`Request::send`].
    pub(crate) fn into_raw_parts(self) -> Result<(Client, http::Request<Vec<u8>>)> {
        let has_body = !matches!(self.body, RequestBody::None);
        let builder = self.render_headers(self.builder_with_path()?, has_body)?;
        let body = self.render_body()?;
        let raw = builder.body(body).map_err(Error::Http)?;
        Ok((self.client.clone(), raw))
    }

    /// Render this request into an `http::Request`, applying every setting except credentials
    /// (those are attached by the client's service stack). Exposed for callers (e.g. the exec
    /// channel) that need the raw request to add protocol-specific headers before sending.
    ///
    /// A [`RequestBody::Stream`] body cannot be rendered here (streams are single-consumption
    /// and `build` only borrows `self`); use [`Request::send`] for requests with a stream body.
    pub fn build(&self) -> Result<http::Request<Body>> {
        let has_body = !matches!(self.body, RequestBody::None);
        let builder = self.render_headers(self.builder_with_path()?, has_body)?;
        let body = Body::from(self.render_body()?);
        builder.body(body).map_err(Error::Http)
    }

    /// Dispatch the request and return the raw [`Response`], without inspecting its status
    /// (`throwIfFailed=false` per S4.E). Credentials are attached by the client's service stack.
    pub async fn send(mut self) -> Result<Response> {
        let has_body = !matches!(self.body, RequestBody::None);
        let builder = self.render_headers(self.builder_with_path()?, has_body)?;

        let body = match std::mem::replace(&mut self.body, RequestBody::None) {
            RequestBody::None => Body::empty(),
            RequestBody::Bytes(b) => Body::from(b),
            RequestBody::Text(t) => Body::from(t.into_bytes()),
            RequestBody::Json(v) => Body::from(kubefluent_core::codec::encode(&v).map_err(Error::Decode)?),
            RequestBody::Stream(s) => Body::wrap_body(http_body_util::StreamBody::new(futures::StreamExt::map(
                s,
                |chunk| chunk.map(http_body::Frame::data),
            ))),
        };

        let http_req = builder.body(body).map_err(Error::Http)?;
        let resp = self.client.send(http_req).await?;
        Ok(Response::new(resp))
    }

    /// Like [`Request::send`], but raises [`Error::Api`] when the response is an error other
    /// than 404 (`throwIfFailed=true`).
    pub async fn send_checked(self) -> Result<Response> {
        let resp = self.send().await?;
        if resp.is_error() && !resp.is_not_found() {
            let status = resp.into_status().await?;
            return Err(Error::Api(crate::error::ErrorResponse {
                status: status.status,
                message: status.message,
                reason: status.reason,
                code: status.code,
            }));
        }
        Ok(resp)
    }

    async fn buffered_optional<T: DeserializeOwned>(self) -> Result<Option<T>> {
        let resp = self.send().await?;
        if resp.is_not_found() {
            return Ok(None);
        }
        if resp.is_error() {
            let status = resp.into_status().await?;
            return Err(Error::Api(crate::error::ErrorResponse {
                status: status.status,
                message: status.message,
                reason: status.reason,
                code: status.code,
            }));
        }
        Ok(Some(resp.into_body().await?))
    }

    /// Buffered decode: on 404, returns `T::default()` rather than raising. For strict
    /// not-found handling use [`Request::execute_required`].
    pub async fn execute<T>(self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.buffered_optional().await?.unwrap_or_default())
    }

    /// Buffered decode: on 404, raises [`Error::Api`] instead of returning a default value
    /// (`throwIfMissing=true`).
    pub async fn execute_required<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.buffered_optional().await?.ok_or_else(|| {
            Error::Api(crate::error::ErrorResponse {
                status: "Failure".into(),
                message: "the server could not find the requested resource".into(),
                reason: "NotFound".into(),
                code: 404,
            })
        })
    }

    /// Get-modify-put loop with conflict retry (component F).
    ///
    /// `modify` takes ownership of the current value and returns `Ok(new)` if it changed
    /// (triggering a PUT) or `Err(unchanged)` to leave the resource as-is. On `409 Conflict`
    /// the loop re-GETs and retries; on `404` it returns `Ok(None)` unless `throw_if_missing`.
    pub async fn replace<T, F, Fut>(&self, mut obj: Option<T>, mut modify: F, throw_if_missing: bool) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut(T) -> Fut,
        Fut: Future<Output = std::result::Result<T, T>>,
    {
        loop {
            let current = match obj.take() {
                Some(o) => o,
                None => match self.clone().get().execute_required::<T>().await {
                    Ok(o) => o,
                    Err(e) if e.is_not_found() && !throw_if_missing => return Ok(None),
                    Err(e) => return Err(e),
                },
            };

            match modify(current).await {
                Err(unchanged) => return Ok(Some(unchanged)),
                Ok(changed) => match self.clone().put().body(&changed).execute_required::<T>().await {
                    Ok(updated) => return Ok(Some(updated)),
                    Err(e) if e.is_conflict() => {
                        obj = None;
                        continue;
                    }
                    Err(e) if e.is_not_found() && !throw_if_missing => return Ok(None),
                    Err(e) => return Err(e),
                },
            }
        }
    }
}
