//! A durable-watcher smoke test (S8 property 6) driven through the public `kubefluent` facade:
//! confirms `kubefluent::watcher` wires the fluent `Request` builder, the `Client` transport,
//! and the resumable watch engine together end-to-end.

use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::Pod;
use kubefluent::client::{Body, Client};
use kubefluent::request::Request;
use kubefluent::runtime::Event;
use tokio_util::sync::CancellationToken;

fn ndjson_body() -> Body {
    let line = serde_json::json!({
        "type": "ADDED",
        "object": { "apiVersion": "v1", "kind": "Pod", "metadata": { "name": "a", "resourceVersion": "2" } },
    })
    .to_string();
    Body::from(format!("{line}\n").into_bytes())
}

#[tokio::test]
async fn opens_streams_one_event_then_closes_on_cancel() {
    let client = Client::new(
        tower::service_fn(|_req: http::Request<Body>| async { Ok::<_, tower::BoxError>(http::Response::new(ndjson_body())) }),
        "default",
    );
    let request = Request::new(client).namespace("default").kind("v1", "Pod").name("a");
    let cancel = CancellationToken::new();

    let stream = kubefluent::watcher::<Pod>(request, "1", Some(false), cancel.clone());
    pin_mut!(stream);

    assert!(matches!(stream.next().await.unwrap().unwrap(), Event::Opened));
    match stream.next().await.unwrap().unwrap() {
        Event::Applied(pod) => assert_eq!(pod.metadata.name.as_deref(), Some("a")),
        other => panic!("expected Applied, got {other:?}"),
    }

    cancel.cancel();
    assert!(matches!(stream.next().await.unwrap().unwrap(), Event::Closed));
    assert!(stream.next().await.is_none());
}
