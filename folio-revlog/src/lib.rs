//! # folio-revlog: durable revision log for posts and pages
//!
//! Stores each document body as an append-only chain of patch records with
//! movable head and published pointers, and reconstructs content at any point.
//!
//! ```text
//!   RevisionService
//!     ├── PatchStore ─────┐
//!     ├── HeadPointers ───┼──► RevisionBackend (MemoryBackend | RocksBackend)
//!     ├── ContentCache    │
//!     └── Renderer        │
//! ```
//!
//! ## Modules
//!
//! - [`storage`]: backend trait, in-memory and RocksDB backends, record codec
//! - [`store`]: Patch Record Store (append, get, list_chain)
//! - [`head`]: Head Pointer Manager (CAS advance, rollback, publish)
//! - [`service`]: Revision Service
//! - [`cache`]: LRU of materialized revisions
//! - [`config`]: `RevisionConfig`

pub mod cache;
pub mod config;
pub mod head;
pub mod service;
pub mod storage;
pub mod store;

pub use cache::{CacheStats, ContentCache};
pub use config::RevisionConfig;
pub use head::HeadPointers;
pub use service::{RevisionService, RevisionSummary};
pub use storage::{
    CommitOutcome, MemoryBackend, PointerUpdate, RevisionBackend, RocksBackend, StoreConfig,
    StoreError,
};
pub use store::{ChainWalk, PatchStore};
