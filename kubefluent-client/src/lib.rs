//! Transport-aware Kubernetes API client.
//!
//! This crate wires the transport-independent types in [`kubefluent_core`] to an actual HTTP
//! connection: a fluent request builder and executor (components C/E/F), a pull-based watch
//! reader (component G), and a SPDY-based exec channel (component I). The durable,
//! auto-resuming watcher (component H) lives one layer up in `kubefluent-runtime`, built on top
//! of this crate's [`watch::reader`].
//!
//! # Example
//!
//! ```no_run
//! use k8s_openapi::api::core::v1::Pod;
//! use kubefluent_client::{client::{Auth, Client, ClientBuilder}, request::Request};
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
//! let pod: Pod = Request::new(client).namespace("default").kind("v1", "Pod").name("my-pod").execute().await?;
//! println!("found pod {:?}", pod.metadata.name);
//! # Ok(())
//! # }
//! ```
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod exec;
pub mod request;
pub mod response;
pub mod watch;

#[doc(inline)]
pub use client::Client;
#[doc(inline)]
pub use error::Error;
#[doc(inline)]
pub use request::Request;
#[doc(inline)]
pub use response::Response;

/// Convenient alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Re-exports of the transport-independent types from `kubefluent-core`.
pub use kubefluent_core as core;
