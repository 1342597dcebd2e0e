//! The durable watcher (component H): a single long-lived, self-resuming watch built on top of
//! [`kubefluent_client::watch::reader::watch`]'s single-connection stream.
//!
//! [`watcher`] drives a `Created -> Opening -> Streaming -> Reconnecting` state machine
//! (S4.H) and exposes it as a single [`Stream`] of [`Event`]s, rather than a callback-registration
//! API: one task drives the stream, and per-object ordering is preserved by construction.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use futures::{Stream, StreamExt};
use kubefluent_client::request::Request;
use kubefluent_core::{watch::WatchEvent, ObjectList, Resource};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::backoff::{ResettableBackoff, ResettableBackoffWrapper};

/// Errors from the durable watcher.
///
/// Only request-construction failures (an invalid raw URI, an illegal combination of request
/// fields) are terminal: every other transport/decode failure is retried indefinitely per the
/// Resume Protocol, so it never reaches the consumer as an `Err` -- see this module's docs.
#[derive(Debug, Error)]
pub enum Error {
    /// The request template could not be rendered into an HTTP request.
    #[error("watch request is invalid: {0}")]
    InvalidRequest(#[source] kubefluent_client::Error),
}

/// A `Result` alias defaulting to this module's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Events emitted by [`watcher`] to its consumer (S4.H).
#[derive(Debug, Clone)]
pub enum Event<K> {
    /// The watch HTTP stream opened successfully.
    Opened,
    /// For a list-watch, raised exactly once per successful open following a [`Event::Reset`]:
    /// the events delivered since the preceding `Opened`/`Reset` now form a consistent snapshot.
    InitialListSent,
    /// An `Added` or `Modified` event (S4.H's `EventReceived`, restricted to upserts).
    Applied(K),
    /// A `Deleted` event (S4.H's `EventReceived`, restricted to removals).
    Deleted(K),
    /// The watcher reconnected but could not resume from its tracked `resourceVersion` (the
    /// server returned 410 Gone, or an `Error` event with reason `Expired`/`Gone`). Consumers
    /// using the event stream as cache fuel must discard their state; a [`Event::InitialListSent`]
    /// rebuilding that state follows.
    Reset,
    /// The watcher stopped, either because its cancellation signal fired or because it hit an
    /// unrecoverable [`Error`]. Emitted exactly once, always last.
    Closed,
}

/// Run a durable, auto-resuming watch over `request` (S4.H).
///
/// `initial_version` is the starting `resourceVersion` (empty watches from "now"). `is_list_watch`
/// overrides the list-watch-vs-single-item disambiguation that otherwise defaults to
/// `!request.is_named()` (watching a named resource is a single-item watch; anything else is a
/// collection watch, which also gets `allowWatchBookmarks=true` and synthesizes
/// [`Event::InitialListSent`]). Firing `cancel` emits a final [`Event::Closed`] and ends the
/// stream; dropping the stream without firing it simply aborts the in-flight request.
pub fn watcher<K>(
    request: Request,
    initial_version: impl Into<String>,
    is_list_watch: Option<bool>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Event<K>>>
where
    K: Resource + Clone + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Send + Sync + 'static,
{
    let is_list_watch = is_list_watch.unwrap_or_else(|| !request.is_named());
    let request = if is_list_watch {
        request.allow_watch_bookmarks(true)
    } else {
        request
    };
    let tracked = initial_version.into();
    let state = State {
        request,
        is_list_watch,
        tracked,
        version_at_open: String::new(),
        awaiting_initial_list: true,
        backoff: ResettableBackoffWrapper::new(default_backoff_builder()),
        phase: Phase::Open,
        pending: VecDeque::new(),
        cancel,
    };
    futures::stream::unfold(state, step)
}

fn default_backoff_builder() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(200))
        .with_max_delay(Duration::from_secs(30))
        .with_jitter()
        .without_max_times()
}

type EventStream<K> = Pin<Box<dyn Stream<Item = kubefluent_client::Result<WatchEvent<K>>> + Send>>;

enum Phase<K> {
    Open,
    Streaming(EventStream<K>),
    Relisting,
    Stopped,
}

struct State<K> {
    request: Request,
    is_list_watch: bool,
    tracked: String,
    version_at_open: String,
    awaiting_initial_list: bool,
    backoff: ResettableBackoffWrapper<ExponentialBuilder>,
    phase: Phase<K>,
    pending: VecDeque<Result<Event<K>>>,
    cancel: CancellationToken,
}

async fn step<K>(mut state: State<K>) -> Option<(Result<Event<K>>, State<K>)>
where
    K: Resource + Clone + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Send + Sync + 'static,
{
    loop {
        if let Some(event) = state.pending.pop_front() {
            return Some((event, state));
        }
        if matches!(state.phase, Phase::Stopped) {
            return None;
        }
        advance(&mut state).await;
    }
}

/// Terminal request-construction failures can't succeed on retry (S7's `ConfigError` kind); every
/// other failure is retried per the Resume Protocol.
fn is_request_construction_error(err: &kubefluent_client::Error) -> bool {
    matches!(
        err,
        kubefluent_client::Error::RequestValidation(_)
            | kubefluent_client::Error::Http(_)
            | kubefluent_client::Error::InvalidUri(_)
    )
}

async fn advance<K>(state: &mut State<K>)
where
    K: Resource + Clone + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Send + Sync + 'static,
{
    if state.cancel.is_cancelled() {
        state.phase = Phase::Stopped;
        state.pending.push_back(Ok(Event::Closed));
        return;
    }

    match std::mem::replace(&mut state.phase, Phase::Stopped) {
        Phase::Stopped => {}
        Phase::Open => open(state).await,
        Phase::Streaming(stream) => stream_next(state, stream).await,
        Phase::Relisting => relist(state).await,
    }
}

async fn open<K>(state: &mut State<K>)
where
    K: Resource + Clone + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Send + Sync + 'static,
{
    state.version_at_open = state.tracked.clone();
    let req = state.request.clone();
    match kubefluent_client::watch::reader::watch::<K>(req, &state.tracked).await {
        Ok(stream) => {
            state.backoff.reset();
            state.pending.push_back(Ok(Event::Opened));
            state.phase = Phase::Streaming(Box::pin(stream));
        }
        Err(e) if e.is_gone() => {
            state.phase = Phase::Relisting;
        }
        Err(e) if is_request_construction_error(&e) => {
            state.pending.push_back(Err(Error::InvalidRequest(e)));
            state.pending.push_back(Ok(Event::Closed));
            state.phase = Phase::Stopped;
        }
        Err(e) => {
            tracing::warn!("watch open failed, retrying: {e}");
            back_off(state).await;
            state.phase = Phase::Open;
        }
    }
}

async fn stream_next<K>(state: &mut State<K>, mut stream: EventStream<K>)
where
    K: Resource + Clone + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Send + Sync + 'static,
{
    match stream.next().await {
        Some(Ok(WatchEvent::Added(obj))) | Some(Ok(WatchEvent::Modified(obj))) => {
            track(state, obj.meta().resource_version.as_deref());
            maybe_send_initial_list(state);
            state.pending.push_back(Ok(Event::Applied(obj)));
            state.phase = Phase::Streaming(stream);
        }
        Some(Ok(WatchEvent::Deleted(obj))) => {
            track(state, obj.meta().resource_version.as_deref());
            state.pending.push_back(Ok(Event::Deleted(obj)));
            state.phase = Phase::Streaming(stream);
        }
        Some(Ok(WatchEvent::Bookmark(bm))) => {
            state.tracked = bm.metadata.resource_version.clone();
            if state.is_list_watch && state.awaiting_initial_list {
                state.awaiting_initial_list = false;
                state.pending.push_back(Ok(Event::InitialListSent));
            }
            state.phase = Phase::Streaming(stream);
        }
        Some(Ok(WatchEvent::Error(err))) => {
            let err = kubefluent_client::Error::Api(err);
            if err.is_gone() {
                state.phase = Phase::Relisting;
            } else {
                tracing::warn!("watch stream error event, reconnecting: {err}");
                back_off(state).await;
                state.phase = Phase::Open;
            }
        }
        Some(Err(e)) if e.is_gone() => {
            state.phase = Phase::Relisting;
        }
        Some(Err(e)) => {
            tracing::warn!("watch stream error, reconnecting: {e}");
            back_off(state).await;
            state.phase = Phase::Open;
        }
        None => {
            // EOF: reopen from the last tracked resourceVersion (Resume Protocol step 3).
            state.phase = Phase::Open;
        }
    }
}

fn track<K>(state: &mut State<K>, resource_version: Option<&str>) {
    if let Some(rv) = resource_version {
        state.tracked = rv.to_string();
    }
}

fn maybe_send_initial_list<K>(state: &mut State<K>) {
    if state.is_list_watch && state.awaiting_initial_list && state.tracked != state.version_at_open {
        state.awaiting_initial_list = false;
        state.pending.push_back(Ok(Event::InitialListSent));
    }
}

async fn relist<K>(state: &mut State<K>)
where
    K: Resource + Clone + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Send + Sync + 'static,
{
    state.pending.push_back(Ok(Event::Reset));
    state.awaiting_initial_list = false;

    if state.is_list_watch {
        let req = state.request.clone().watch_version(None::<String>).get();
        match req.execute_required::<ObjectList<K>>().await {
            Ok(list) => {
                state.tracked = list.metadata.resource_version.clone().unwrap_or_default();
                for item in list.items {
                    state.pending.push_back(Ok(Event::Applied(item)));
                }
                state.pending.push_back(Ok(Event::InitialListSent));
                state.phase = Phase::Open;
            }
            Err(e) => {
                tracing::warn!("relist after reset failed, retrying: {e}");
                back_off(state).await;
                state.phase = Phase::Relisting;
            }
        }
    } else {
        let req = state.request.clone().get();
        match req.execute_required::<K>().await {
            Ok(obj) => {
                if let Some(rv) = obj.meta().resource_version.clone() {
                    state.tracked = rv;
                }
                state.pending.push_back(Ok(Event::Applied(obj)));
                state.phase = Phase::Open;
            }
            Err(e) if e.is_not_found() => {
                // The single item no longer exists: nothing to re-add, resume watching so a
                // future re-creation is observed.
                state.phase = Phase::Open;
            }
            Err(e) => {
                tracing::warn!("re-get after reset failed, retrying: {e}");
                back_off(state).await;
                state.phase = Phase::Relisting;
            }
        }
    }
}

async fn back_off<K>(state: &mut State<K>) {
    let delay = state.backoff.next().unwrap_or(Duration::from_secs(30));
    tokio::select! {
        () = tokio::time::sleep(delay) => {}
        () = state.cancel.cancelled() => {}
    }
}
