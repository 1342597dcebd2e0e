//! Transport-independent data types and mapping logic for the Kubernetes HTTP API.
//!
//! This crate owns the pieces that do not need a network connection to be useful: the
//! [`Resource`]/[`Scheme`](scheme::Scheme) type mapping, the ordered [`OrderedMultimap`], the
//! shared JSON [`codec`], watch wire types, and the `Status`/`ErrorResponse` error payloads. The
//! transport-aware request builder, executor, and watch engine live in `kubefluent-client`.

pub mod api_resource;
pub use api_resource::ApiResource;

pub mod dynamic;
pub use dynamic::DynamicObject;

pub mod gvk;
pub use gvk::{GroupVersionKind, GroupVersionResource};

pub mod metadata;
pub use metadata::TypeMeta;

pub mod multimap;
pub use multimap::OrderedMultimap;

pub mod codec;

pub mod object;
pub use object::ObjectList;

pub mod resource;
pub use resource::Resource;

pub mod response;
pub use response::{Status, StatusCause, StatusDetails};

pub mod scheme;
pub use scheme::Scheme;

pub mod scope;
pub use scope::Scope;

pub mod watch;
pub use watch::{Bookmark, WatchEvent};

mod error;
pub use error::{Error, ErrorResponse};

/// A `Result` alias defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
