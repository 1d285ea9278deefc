//! Storage backends for the revision log.
//!
//! Architecture:
//! ```text
//! ┌──────────────┐  prepare/append   ┌──────────────────┐
//! │  PatchStore  │ ────────────────► │ RevisionBackend  │
//! └──────────────┘                   │                  │
//! ┌──────────────┐  commit (CAS)     │  MemoryBackend   │  RwLock over maps
//! │ HeadPointers │ ────────────────► │  RocksBackend    │  CF "patches"
//! └──────────────┘                   │                  │  CF "chains"
//!                                    │                  │  CF "documents"
//!                                    └──────────────────┘
//! ```
//!
//! A backend owns three things: immutable records keyed by patch id, a
//! per-document index of record ids, and one [`DocumentMetadata`] row per document
//! holding the head/published pointers. `commit` is the single place where a
//! record write and a head move happen together, and it must be atomic.

pub mod codec;
pub mod memory;
pub mod rocks;

pub use memory::MemoryBackend;
pub use rocks::{RocksBackend, StoreConfig};

use folio_core::{DocumentId, DocumentMetadata, PatchId, PatchRecord, RevisionError};

/// Storage errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Checksum mismatch for patch {0}")]
    ChecksumMismatch(PatchId),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<StoreError> for RevisionError {
    fn from(e: StoreError) -> Self {
        RevisionError::Storage(e.to_string())
    }
}

/// Result of a conditional head update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Head moved; carries the metadata as written.
    Committed(DocumentMetadata),
    /// Head was not the expected value; nothing was written.
    Conflict { actual: Option<PatchId> },
    /// No record was given and `new_head` is not a stored record of the
    /// document; nothing was written.
    UnknownTarget,
}

/// Unconditional pointer move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerUpdate {
    Head(PatchId),
    Published(PatchId),
}

impl PointerUpdate {
    pub fn target(&self) -> PatchId {
        match *self {
            PointerUpdate::Head(id) | PointerUpdate::Published(id) => id,
        }
    }
}

/// Durable storage contract for patch records and document pointers.
pub trait RevisionBackend: Send + Sync {
    fn load_record(&self, id: PatchId) -> Result<Option<PatchRecord>, StoreError>;

    /// Store a record without moving any pointer. Bumps the document's patch count.
    fn insert_record(&self, record: &PatchRecord) -> Result<(), StoreError>;

    fn load_metadata(&self, document: DocumentId) -> Result<Option<DocumentMetadata>, StoreError>;

    /// If the document's head equals `expected`, write `record` (when given) and
    /// set the head to `new_head` as one atomic unit. Otherwise write nothing.
    /// Without a record, `new_head` must already be stored under `document`.
    fn commit(
        &self,
        document: DocumentId,
        expected: Option<PatchId>,
        new_head: PatchId,
        record: Option<&PatchRecord>,
    ) -> Result<CommitOutcome, StoreError>;

    /// Move a pointer to a record stored under `document`. Ownership is checked
    /// under the same lock as the write; `None` means the target is missing or
    /// foreign and nothing was written.
    fn store_pointer(
        &self,
        document: DocumentId,
        update: PointerUpdate,
    ) -> Result<Option<DocumentMetadata>, StoreError>;

    /// Every record of the document in id (creation) order.
    fn document_records(&self, document: DocumentId) -> Result<Vec<PatchRecord>, StoreError>;

    /// Remove the document's records, index entries and metadata. Returns the
    /// number of records removed.
    fn delete_document(&self, document: DocumentId) -> Result<u64, StoreError>;

    /// Highest patch id ever stored, used to resume id assignment on open.
    /// Survives `delete_document`, so ids are never handed out twice.
    fn last_patch_id(&self) -> Result<Option<PatchId>, StoreError>;
}

impl<B: RevisionBackend + ?Sized> RevisionBackend for std::sync::Arc<B> {
    fn load_record(&self, id: PatchId) -> Result<Option<PatchRecord>, StoreError> {
        (**self).load_record(id)
    }

    fn insert_record(&self, record: &PatchRecord) -> Result<(), StoreError> {
        (**self).insert_record(record)
    }

    fn load_metadata(&self, document: DocumentId) -> Result<Option<DocumentMetadata>, StoreError> {
        (**self).load_metadata(document)
    }

    fn commit(
        &self,
        document: DocumentId,
        expected: Option<PatchId>,
        new_head: PatchId,
        record: Option<&PatchRecord>,
    ) -> Result<CommitOutcome, StoreError> {
        (**self).commit(document, expected, new_head, record)
    }

    fn store_pointer(
        &self,
        document: DocumentId,
        update: PointerUpdate,
    ) -> Result<Option<DocumentMetadata>, StoreError> {
        (**self).store_pointer(document, update)
    }

    fn document_records(&self, document: DocumentId) -> Result<Vec<PatchRecord>, StoreError> {
        (**self).document_records(document)
    }

    fn delete_document(&self, document: DocumentId) -> Result<u64, StoreError> {
        (**self).delete_document(document)
    }

    fn last_patch_id(&self) -> Result<Option<PatchId>, StoreError> {
        (**self).last_patch_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::ChecksumMismatch(PatchId::new(7));
        assert!(err.to_string().contains("patch 7"));

        let err = StoreError::Database("test".into());
        assert!(err.to_string().contains("Database error"));
    }

    #[test]
    fn test_store_error_becomes_storage_revision_error() {
        let err: RevisionError = StoreError::Poisoned.into();
        assert!(matches!(err, RevisionError::Storage(ref msg) if msg.contains("poisoned")));
    }
}
