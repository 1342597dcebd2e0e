//! The pull-based Watch Reader (component G): a finite, non-restartable, single-connection
//! stream of typed watch events.
//!
//! The auto-resuming, reconnecting watcher (component H) is layered on top of this in
//! `kubefluent-runtime`; this module only knows how to read one stream to completion.

pub mod reader;

pub use reader::watch;
