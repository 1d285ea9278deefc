//! # folio-core: revision log primitives for posts and pages
//!
//! A document body is stored as a chain of immutable patch records anchored by a
//! movable head pointer. This crate holds the pure parts of that log: the data
//! model, text deltas, chain resolution and content materialization. Storage and
//! orchestration live in `folio-revlog`.
//!
//! ```text
//!   resolve_chain(head) ──► [Snapshot, Delta, Delta] ──► materialize ──► Renderer
//!        │                                                   │
//!        └── PatchSource (store)                             └── raw + rendered
//! ```
//!
//! ## Modules
//!
//! - [`model`]: identifiers, `PatchRecord`, `MaterializedContent`
//! - [`delta`]: span edits computed with `similar`, bounds-checked application
//! - [`resolve`]: bounded backward walk to the nearest snapshot
//! - [`materialize`]: snapshot + ordered delta replay
//! - [`render`]: renderer collaborator (plain, Markdown)
//! - [`error`]: `RevisionError` taxonomy

pub mod delta;
pub mod error;
pub mod materialize;
pub mod model;
pub mod render;
pub mod resolve;

pub use delta::{apply_delta, compute_delta, ApplyError, DeltaOp, DiffGranularity};
pub use error::{ErrorKind, RevisionError};
pub use materialize::{materialize, reconstruct};
pub use model::{
    now_millis, DocumentId, DocumentMetadata, MaterializedContent, PatchId, PatchKind,
    PatchPayload, PatchRecord,
};
pub use render::{MarkdownRenderer, PlainRenderer, Renderer};
pub use resolve::{resolve_chain, PatchSource};
