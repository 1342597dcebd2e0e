//! The durable, resumable watch engine (component H) built on top of `kubefluent-client`'s
//! single-connection watch reader.
//!
//! Informer caches and a controller reconciliation runtime are explicit Non-goals (S1): this
//! crate stops at a resumable `Stream` of watch events, not a local object store or a work
//! queue. See [`watcher::watcher`].

#![deny(missing_docs)]
#![deny(unsafe_code)]

mod backoff;
pub mod watcher;

pub use watcher::{watcher, Error, Event, Result};
