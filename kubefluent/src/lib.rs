//! A fluent, value-oriented client for the Kubernetes HTTP API.
//!
//! This crate is a thin facade over three independently usable layers:
//!
//! - [`kubefluent_core`] -- transport-independent types: the GVK/[`Scheme`](kubefluent_core::Scheme)
//!   mapping, the JSON codec, watch wire types, and the `Status`/`ErrorResponse` error payloads.
//! - [`kubefluent_client`] -- the transport-aware fluent [`Request`](kubefluent_client::Request)
//!   builder, its executor and atomic get-modify-put loop, the single-connection watch reader,
//!   and the SPDY-based exec channel.
//! - [`kubefluent_runtime`] -- the durable, auto-resuming [`watcher`](kubefluent_runtime::watcher)
//!   built on top of the watch reader.
//!
//! # Example
//!
//! ```rust,no_run
//! use k8s_openapi::api::core::v1::Pod;
//! use kubefluent::client::{Auth, Client, ClientBuilder};
//! use kubefluent::request::Request;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let https = hyper_rustls::HttpsConnectorBuilder::new()
//!     .with_native_roots()?
//!     .https_only()
//!     .enable_http1()
//!     .build();
//! let client: Client = ClientBuilder::try_new(
//!     https,
//!     "https://kubernetes.example:6443".parse()?,
//!     Auth::bearer("my-token"),
//!     "default",
//! )?
//! .build();
//!
//! let pod: Pod = Request::new(client)
//!     .namespace("default")
//!     .kind("v1", "Pod")
//!     .name("my-pod")
//!     .execute()
//!     .await?;
//! println!("found pod {:?}", pod.metadata.name);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

/// Transport-independent types (components A/B/D/G's data model): the GVK
/// [`Scheme`](kubefluent_core::Scheme), the ordered multimap, the JSON codec, watch wire types,
/// and the `Status`/`ErrorResponse` error payloads.
#[doc(inline)]
pub use kubefluent_core as core;

/// The durable, auto-resuming watcher (component H).
#[doc(inline)]
pub use kubefluent_runtime as runtime;

/// The [`Client`]'s construction and middleware (`Auth`, `ClientBuilder`, `RetryPolicy`).
#[doc(inline)]
pub use kubefluent_client::client;
/// The `kubefluent-client` error taxonomy (S7).
#[doc(inline)]
pub use kubefluent_client::error;
/// The SPDY-based exec channel (component I).
#[doc(inline)]
pub use kubefluent_client::exec;
/// The fluent request builder, executor, and atomic replace loop (components C/E/F).
#[doc(inline)]
pub use kubefluent_client::request;
/// The buffered response wrapper (component D).
#[doc(inline)]
pub use kubefluent_client::response;
/// The single-connection watch reader (component G).
#[doc(inline)]
pub use kubefluent_client::watch;

#[doc(inline)]
pub use kubefluent_client::Client;
#[doc(inline)]
pub use kubefluent_client::Error;
#[doc(inline)]
pub use kubefluent_client::Request;
#[doc(inline)]
pub use kubefluent_client::Response;
#[doc(inline)]
pub use kubefluent_client::Result;
#[doc(inline)]
pub use kubefluent_runtime::watcher;
