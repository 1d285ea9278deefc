//! Identifiers, patch records and materialized content.
//!
//! ```text
//!   Document ── head ──► PatchRecord(D3) ─parent─► PatchRecord(D2) ─parent─► PatchRecord(S1)
//!                          Delta                     Delta                     Snapshot (root)
//! ```
//!
//! Records are immutable once appended. The only mutable per-document state is the
//! pointer pair kept in [`DocumentMetadata`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use uuid::Uuid;

use crate::delta::DeltaOp;

/// Identifier of a post or page whose body carries revision history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Raw 16-byte form, used as a storage key prefix.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for DocumentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of a single patch record.
///
/// Assigned from a store-wide monotonic counter, so comparing two ids compares
/// their creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatchId(u64);

impl PatchId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }

    /// The id assigned right after this one.
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PatchId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

/// Payload discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchKind {
    Snapshot,
    Delta,
}

impl fmt::Display for PatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchKind::Snapshot => f.write_str("snapshot"),
            PatchKind::Delta => f.write_str("delta"),
        }
    }
}

/// Body of a patch record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchPayload {
    /// Complete raw content.
    Snapshot(String),
    /// Edit operations relative to the parent's materialized content.
    Delta(Vec<DeltaOp>),
}

impl PatchPayload {
    pub fn kind(&self) -> PatchKind {
        match self {
            PatchPayload::Snapshot(_) => PatchKind::Snapshot,
            PatchPayload::Delta(_) => PatchKind::Delta,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self, PatchPayload::Snapshot(_))
    }
}

/// One immutable history entry of a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub id: PatchId,
    pub document: DocumentId,
    /// `None` only for a chain root, which always carries a snapshot.
    pub parent: Option<PatchId>,
    /// 1 for a root, parent version + 1 otherwise.
    pub version: u32,
    pub payload: PatchPayload,
    /// Milliseconds since the UNIX epoch.
    pub created_at: u64,
    pub author: String,
}

impl PatchRecord {
    pub fn kind(&self) -> PatchKind {
        self.payload.kind()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Content reconstructed at a specific patch. Derived, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterializedContent {
    pub document: DocumentId,
    pub patch: PatchId,
    pub version: u32,
    /// Reconstructed source exactly as committed.
    pub raw: String,
    /// Output of the renderer for `raw`.
    pub rendered: String,
}

/// Per-document pointers and counters kept by the storage layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document: DocumentId,
    /// Working (latest) revision; `None` until the first commit.
    pub head: Option<PatchId>,
    /// Revision shown to readers; moved only by an explicit publish.
    pub published: Option<PatchId>,
    /// Number of patch records owned by the document.
    pub patch_count: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl DocumentMetadata {
    pub fn new(document: DocumentId) -> Self {
        let now = now_millis();
        Self {
            document,
            head: None,
            published: None,
            patch_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }
}

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
