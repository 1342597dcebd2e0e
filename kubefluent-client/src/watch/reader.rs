//! Dispatches a single watch request and decodes its newline-delimited-JSON response into typed
//! [`WatchEvent`]s.

use futures::TryStream;
use kubefluent_core::watch::WatchEvent;
use serde::de::DeserializeOwned;

use crate::{request::Request, Result};

/// Dispatch `request` as a watch starting from `resource_version` (empty string watches from the
/// current version) and return the pull-based stream of decoded events.
///
/// The returned stream is bound to a single underlying connection: it ends at EOF or on the
/// first transport/decode error and cannot be resumed. Reconnection, resourceVersion tracking
/// across reconnects, and 410-Gone relisting are the durable watcher's job, one layer up.
pub async fn watch<T>(
    request: Request,
    resource_version: &str,
) -> Result<impl TryStream<Item = Result<WatchEvent<T>>>>
where
    T: Clone + DeserializeOwned,
{
    let request = request.watch_version(Some(resource_version.to_string()));
    let (client, raw) = request.into_raw_parts()?;
    client.request_events(raw).await
}
