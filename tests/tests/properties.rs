//! Executor and atomic-replace properties (S8 properties 3 and 5) exercised end-to-end through
//! the public `kubefluent` facade against a mocked transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::pin_mut;
use k8s_openapi::api::core::v1::Pod;
use kubefluent::client::{Body, Client};
use kubefluent::request::Request;
use tower_test::mock;

fn pod_json(resource_version: &str) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": { "name": "p", "namespace": "ns", "uid": "u", "resourceVersion": resource_version },
    })
}

fn conflict_response() -> http::Response<Body> {
    let body = serde_json::json!({ "status": "Failure", "message": "conflict", "reason": "Conflict", "code": 409 });
    http::Response::builder().status(409).body(Body::from(serde_json::to_vec(&body).unwrap())).unwrap()
}

fn ok_response(pod: &serde_json::Value) -> http::Response<Body> {
    http::Response::builder().body(Body::from(serde_json::to_vec(pod).unwrap())).unwrap()
}

/// Property 3: executing a cloned `Request` twice issues two independent calls whose outbound
/// representations are identical.
#[tokio::test]
async fn execution_is_idempotent_across_clones() {
    let (mock_service, handle) = mock::pair::<http::Request<Body>, http::Response<Body>>();
    let recorded = tokio::spawn(async move {
        pin_mut!(handle);
        let mut seen = Vec::new();
        for _ in 0..2 {
            let (request, send) = handle.next_request().await.expect("service not called");
            let method = request.method().clone();
            let uri = request.uri().to_string();
            let body = http_body_util::BodyExt::collect(request.into_body()).await.unwrap().to_bytes();
            seen.push((method, uri, body));
            send.send_response(ok_response(&pod_json("1")));
        }
        seen
    });

    let client = Client::new(mock_service, "ns");
    let req = Request::new(client).namespace("ns").kind("v1", "Pod").name("p");

    let first: Pod = req.clone().get().execute_required().await.unwrap();
    let second: Pod = req.clone().get().execute_required().await.unwrap();
    assert_eq!(first.metadata.name, second.metadata.name);

    let seen = recorded.await.unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, seen[1].0);
    assert_eq!(seen[0].1, seen[1].1);
    assert_eq!(seen[0].2, seen[1].2);
}

/// Property 5: `replace` retries exactly once on a `409 Conflict` and never issues the second
/// PUT until it has re-fetched and re-applied `modify`.
#[tokio::test]
async fn replace_retries_once_on_conflict() {
    let (mock_service, handle) = mock::pair::<http::Request<Body>, http::Response<Body>>();
    let calls = Arc::new(AtomicUsize::new(0));
    let server = tokio::spawn({
        let calls = calls.clone();
        async move {
            pin_mut!(handle);
            loop {
                let Some((request, send)) = handle.next_request().await else { break };
                let n = calls.fetch_add(1, Ordering::SeqCst);
                match n {
                    0 => {
                        assert_eq!(request.method(), http::Method::PUT);
                        send.send_response(conflict_response());
                    }
                    1 => {
                        assert_eq!(request.method(), http::Method::GET);
                        send.send_response(ok_response(&pod_json("2")));
                    }
                    2 => {
                        assert_eq!(request.method(), http::Method::PUT);
                        send.send_response(ok_response(&pod_json("3")));
                    }
                    _ => panic!("unexpected extra call {n}"),
                }
            }
        }
    });

    let client = Client::new(mock_service, "ns");
    let req = Request::new(client).namespace("ns").kind("v1", "Pod").name("p");

    let seed: Pod = serde_json::from_value(pod_json("1")).unwrap();
    let result = req
        .replace(
            Some(seed),
            |mut pod: Pod| async move {
                pod.metadata.resource_version = Some("bumped".into());
                Ok(pod)
            },
            true,
        )
        .await
        .unwrap();

    assert_eq!(result.unwrap().metadata.resource_version.as_deref(), Some("3"));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    server.abort();
}

/// Property 5: a 404 on replace returns `None` rather than raising, when `throw_if_missing` is
/// false.
#[tokio::test]
async fn replace_returns_none_on_missing_when_not_required() {
    let (mock_service, handle) = mock::pair::<http::Request<Body>, http::Response<Body>>();
    let server = tokio::spawn(async move {
        pin_mut!(handle);
        let (_request, send) = handle.next_request().await.expect("service not called");
        let body = serde_json::json!({ "status": "Failure", "message": "not found", "reason": "NotFound", "code": 404 });
        send.send_response(http::Response::builder().status(404).body(Body::from(serde_json::to_vec(&body).unwrap())).unwrap());
    });

    let client = Client::new(mock_service, "ns");
    let req = Request::new(client).namespace("ns").kind("v1", "Pod").name("gone");

    let result: Option<Pod> = req.replace(None, |pod| async move { Ok(pod) }, false).await.unwrap();
    assert!(result.is_none());
    server.await.unwrap();
}

/// Property 5: when `modify` reports the object is unchanged, no PUT is issued at all.
#[tokio::test]
async fn replace_skips_put_when_unchanged() {
    let (mock_service, handle) = mock::pair::<http::Request<Body>, http::Response<Body>>();
    let server = tokio::spawn(async move {
        pin_mut!(handle);
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(50), handle.next_request()).await.is_err(),
            "no request should have been sent"
        );
    });

    let client = Client::new(mock_service, "ns");
    let req = Request::new(client).namespace("ns").kind("v1", "Pod").name("p");
    let seed: Pod = serde_json::from_value(pod_json("1")).unwrap();

    let result = req.replace(Some(seed.clone()), |pod: Pod| async move { Err(pod) }, true).await.unwrap();
    assert_eq!(result.unwrap().metadata.resource_version, seed.metadata.resource_version);
    server.await.unwrap();
}
