//! Head Pointer Manager.
//!
//! Each document has two pointers into its patch chain:
//!
//! ```text
//!   S1 ◄── D2 ◄── D3 ◄── D4
//!          ▲             ▲
//!      published        head
//! ```
//!
//! `head` is the working revision and only moves through a compare-and-swap
//! (`advance_head`, `commit`) or an explicit rollback (`set_head`).
//! `published` is what readers see and only moves through `publish`.
//! Every successful move drops the document's cached content.

use std::sync::Arc;

use folio_core::{DocumentId, DocumentMetadata, PatchId, PatchRecord, RevisionError};

use crate::cache::ContentCache;
use crate::storage::{CommitOutcome, PointerUpdate, RevisionBackend};

pub struct HeadPointers<B> {
    backend: Arc<B>,
    cache: Option<Arc<ContentCache>>,
}

impl<B: RevisionBackend> HeadPointers<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            cache: None,
        }
    }

    /// Invalidate `cache` on every pointer move.
    pub fn with_cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// `None` means the document has no revisions yet.
    pub fn get_head(&self, document: DocumentId) -> Result<Option<PatchId>, RevisionError> {
        Ok(self.metadata(document)?.and_then(|meta| meta.head))
    }

    pub fn get_published(&self, document: DocumentId) -> Result<Option<PatchId>, RevisionError> {
        Ok(self.metadata(document)?.and_then(|meta| meta.published))
    }

    pub fn metadata(&self, document: DocumentId) -> Result<Option<DocumentMetadata>, RevisionError> {
        Ok(self.backend.load_metadata(document)?)
    }

    /// Move the head from `expected` to an already stored record.
    pub fn advance_head(
        &self,
        document: DocumentId,
        expected: Option<PatchId>,
        new_head: PatchId,
    ) -> Result<DocumentMetadata, RevisionError> {
        self.owned_record(document, new_head)?;
        self.compare_and_swap(document, expected, new_head, None)
    }

    /// Store `record` and make it the head in one atomic step, provided the
    /// head still equals `expected`. On conflict nothing is written.
    pub fn commit(
        &self,
        record: &PatchRecord,
        expected: Option<PatchId>,
    ) -> Result<DocumentMetadata, RevisionError> {
        self.compare_and_swap(record.document, expected, record.id, Some(record))
    }

    /// Unconditional head move used by rollback.
    pub fn set_head(
        &self,
        document: DocumentId,
        patch: PatchId,
    ) -> Result<DocumentMetadata, RevisionError> {
        let meta = self.move_pointer(document, PointerUpdate::Head(patch))?;
        log::info!("Head of document {document} set to patch {patch}");
        Ok(meta)
    }

    /// Point readers at `patch`. The head is left alone.
    pub fn publish(
        &self,
        document: DocumentId,
        patch: PatchId,
    ) -> Result<DocumentMetadata, RevisionError> {
        let meta = self.move_pointer(document, PointerUpdate::Published(patch))?;
        log::info!("Published patch {patch} of document {document}");
        Ok(meta)
    }

    fn move_pointer(
        &self,
        document: DocumentId,
        update: PointerUpdate,
    ) -> Result<DocumentMetadata, RevisionError> {
        let patch = update.target();
        self.owned_record(document, patch)?;
        // Ownership is re-checked by the backend; a concurrent delete lands here.
        let Some(meta) = self.backend.store_pointer(document, update)? else {
            return Err(Self::vanished(document, patch));
        };
        self.invalidate(document);
        Ok(meta)
    }

    fn compare_and_swap(
        &self,
        document: DocumentId,
        expected: Option<PatchId>,
        new_head: PatchId,
        record: Option<&PatchRecord>,
    ) -> Result<DocumentMetadata, RevisionError> {
        match self.backend.commit(document, expected, new_head, record)? {
            CommitOutcome::Committed(meta) => {
                self.invalidate(document);
                log::debug!("Head of document {document} advanced to patch {new_head}");
                Ok(meta)
            }
            CommitOutcome::Conflict { actual } => {
                log::warn!(
                    "Head of document {document} moved under a commit: expected {expected:?}, found {actual:?}"
                );
                Err(RevisionError::Conflict {
                    document,
                    expected,
                    actual,
                })
            }
            CommitOutcome::UnknownTarget => Err(Self::vanished(document, new_head)),
        }
    }

    fn vanished(document: DocumentId, patch: PatchId) -> RevisionError {
        log::warn!("Patch {patch} of document {document} was removed before the pointer moved");
        RevisionError::validation(document, format!("patch {patch} is no longer stored"))
    }

    fn owned_record(&self, document: DocumentId, patch: PatchId) -> Result<PatchRecord, RevisionError> {
        match self.backend.load_record(patch)? {
            Some(record) if record.document == document => Ok(record),
            Some(record) => Err(RevisionError::validation(
                document,
                format!("patch {patch} belongs to document {}", record.document),
            )),
            None => Err(RevisionError::validation(
                document,
                format!("patch {patch} does not exist"),
            )),
        }
    }

    fn invalidate(&self, document: DocumentId) {
        if let Some(cache) = &self.cache {
            cache.invalidate_document(document);
        }
    }
}
