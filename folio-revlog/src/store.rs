//! Patch Record Store: append-only access to patch records.
//!
//! Ids come from one store-wide counter, recovered from the backend's id
//! high-water mark on open, so ids order records by creation time across
//! documents and an id is never reused after its document is deleted.
//! Appending validates linkage before anything is written:
//!
//! ```text
//!   parent = None      → payload must be a Snapshot        (chain root)
//!   parent = Some(p)   → p exists and p.document == document
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use folio_core::{
    now_millis, DocumentId, PatchId, PatchPayload, PatchRecord, PatchSource, RevisionError,
};

use crate::storage::RevisionBackend;

pub struct PatchStore<B> {
    backend: Arc<B>,
    next_id: AtomicU64,
}

impl<B: RevisionBackend> PatchStore<B> {
    pub fn open(backend: Arc<B>) -> Result<Self, RevisionError> {
        let next = backend.last_patch_id()?.map_or(1, |id| id.get() + 1);
        log::debug!("Patch store resuming at id {next}");
        Ok(Self {
            backend,
            next_id: AtomicU64::new(next),
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Validate linkage and build the next record without storing it.
    ///
    /// Used directly when the write has to happen together with a head move
    /// (see [`crate::HeadPointers::commit`]).
    pub fn prepare(
        &self,
        document: DocumentId,
        parent: Option<PatchId>,
        payload: PatchPayload,
        author: &str,
    ) -> Result<PatchRecord, RevisionError> {
        let version = match parent {
            Some(parent_id) => {
                let Some(parent) = self.backend.load_record(parent_id)? else {
                    return Err(RevisionError::validation(
                        document,
                        format!("parent patch {parent_id} does not exist"),
                    ));
                };
                if parent.document != document {
                    return Err(RevisionError::validation(
                        document,
                        format!(
                            "parent patch {parent_id} belongs to document {}",
                            parent.document
                        ),
                    ));
                }
                parent.version.saturating_add(1)
            }
            None if !payload.is_snapshot() => {
                return Err(RevisionError::validation(
                    document,
                    "a record without a parent must be a snapshot",
                ));
            }
            None => 1,
        };

        Ok(PatchRecord {
            id: PatchId::new(self.next_id.fetch_add(1, Ordering::SeqCst)),
            document,
            parent,
            version,
            payload,
            created_at: now_millis(),
            author: author.to_owned(),
        })
    }

    /// Validate and durably store a new record. Does not move any pointer.
    pub fn append(
        &self,
        document: DocumentId,
        parent: Option<PatchId>,
        payload: PatchPayload,
        author: &str,
    ) -> Result<PatchRecord, RevisionError> {
        let record = self.prepare(document, parent, payload, author)?;
        self.backend.insert_record(&record)?;
        log::debug!(
            "Appended {} patch {} to document {document}",
            record.kind(),
            record.id
        );
        Ok(record)
    }

    pub fn get(&self, id: PatchId) -> Result<PatchRecord, RevisionError> {
        self.backend
            .load_record(id)?
            .ok_or(RevisionError::PatchNotFound(id))
    }

    pub fn patch_count(&self, document: DocumentId) -> Result<u64, RevisionError> {
        Ok(self
            .backend
            .load_metadata(document)?
            .map_or(0, |meta| meta.patch_count))
    }

    /// Walk parent links from `from`, newest first, yielding at most `limit` records.
    pub fn list_chain(&self, document: DocumentId, from: PatchId, limit: usize) -> ChainWalk<'_, B> {
        ChainWalk {
            store: self,
            document,
            from,
            limit,
            next: Some(from),
            previous: None,
            remaining: limit,
        }
    }

    /// Every record of `document`, across all branches, in creation order.
    pub fn document_records(&self, document: DocumentId) -> Result<Vec<PatchRecord>, RevisionError> {
        Ok(self.backend.document_records(document)?)
    }

    /// Cascade delete. Returns the number of records removed.
    pub fn delete_document(&self, document: DocumentId) -> Result<u64, RevisionError> {
        Ok(self.backend.delete_document(document)?)
    }
}

impl<B: RevisionBackend> PatchSource for PatchStore<B> {
    fn patch(&self, id: PatchId) -> Result<PatchRecord, RevisionError> {
        self.get(id)
    }

    fn patch_count(&self, document: DocumentId) -> Result<u64, RevisionError> {
        PatchStore::patch_count(self, document)
    }
}

/// Lazy, bounded walk over a document's parent links.
///
/// Stops after `limit` records, at the chain root, or after the first error.
/// Cloning or calling [`ChainWalk::restart`] starts over from the original patch.
pub struct ChainWalk<'a, B> {
    store: &'a PatchStore<B>,
    document: DocumentId,
    from: PatchId,
    limit: usize,
    next: Option<PatchId>,
    previous: Option<PatchId>,
    remaining: usize,
}

impl<B> Clone for ChainWalk<'_, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            document: self.document,
            from: self.from,
            limit: self.limit,
            next: self.next,
            previous: self.previous,
            remaining: self.remaining,
        }
    }
}

impl<B> ChainWalk<'_, B> {
    pub fn restart(&mut self) {
        self.next = Some(self.from);
        self.previous = None;
        self.remaining = self.limit;
    }

    fn stop(&mut self, err: RevisionError) -> Option<Result<PatchRecord, RevisionError>> {
        self.next = None;
        self.remaining = 0;
        Some(Err(err))
    }
}

impl<B: RevisionBackend> Iterator for ChainWalk<'_, B> {
    type Item = Result<PatchRecord, RevisionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.next.take()?;
        self.remaining -= 1;

        let record = match (self.store.get(id), self.previous) {
            (Ok(record), _) => record,
            (Err(RevisionError::PatchNotFound(_)), Some(child)) => {
                return self.stop(RevisionError::corrupt(
                    self.document,
                    child,
                    format!("parent {id} is missing"),
                ));
            }
            (Err(e), _) => return self.stop(e),
        };

        if record.document != self.document {
            let err = match self.previous {
                None => RevisionError::validation(
                    self.document,
                    format!("patch {id} belongs to document {}", record.document),
                ),
                Some(child) => RevisionError::corrupt(
                    self.document,
                    child,
                    format!("parent link crosses into document {}", record.document),
                ),
            };
            return self.stop(err);
        }

        self.previous = Some(record.id);
        self.next = record.parent;
        Some(Ok(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(_) => (0, Some(self.remaining)),
            None => (0, Some(0)),
        }
    }
}
