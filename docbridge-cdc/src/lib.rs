//! the CDC conveyor: binlog bytes in, document-store plans out
//!
//! four pull-based stages share one thread:
//! `ByteSource` frames raw event windows, `EventSource` types them,
//! `TableDiffSource` correlates row events with their table maps, and
//! `DocumentSink` turns each diff into insert/delete/update plans against
//! a document store.
pub mod conn;
pub mod diff;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod plan;
pub mod sink;
pub mod source;
pub mod store;
pub mod transport;

pub use crate::diff::{DiffKind, TableDiff, TableDiffSource};
pub use crate::error::{Error, Result};
pub use crate::events::EventSource;
pub use crate::pipeline::{Pipeline, Sink, Source};
pub use crate::plan::{Match, Params, Plan};
pub use crate::sink::DocumentSink;
pub use crate::source::ByteSource;
pub use crate::store::{DocStore, MemoryStore};
pub use crate::transport::{ByteTransport, FileTransport};
