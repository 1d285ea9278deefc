//! In-process backend for tests, previews and embedding without a database.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use folio_core::{DocumentId, DocumentMetadata, PatchId, PatchRecord};

use super::{CommitOutcome, PointerUpdate, RevisionBackend, StoreError};

#[derive(Default)]
struct MemoryState {
    records: BTreeMap<PatchId, PatchRecord>,
    chains: HashMap<DocumentId, BTreeSet<PatchId>>,
    documents: HashMap<DocumentId, DocumentMetadata>,
    /// High-water mark of assigned ids; never lowered by deletes.
    last_id: Option<PatchId>,
}

impl MemoryState {
    fn put_record(&mut self, record: &PatchRecord) {
        self.last_id = self.last_id.max(Some(record.id));
        self.records.insert(record.id, record.clone());
        self.chains.entry(record.document).or_default().insert(record.id);

        let meta = self
            .documents
            .entry(record.document)
            .or_insert_with(|| DocumentMetadata::new(record.document));
        meta.patch_count += 1;
        meta.touch();
    }

    fn owns(&self, document: DocumentId, id: PatchId) -> bool {
        self.records.get(&id).is_some_and(|r| r.document == document)
    }
}

/// Map-backed [`RevisionBackend`]. Every mutation runs under one write lock,
/// which makes `commit` atomic.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all documents.
    pub fn record_count(&self) -> usize {
        self.read().map(|s| s.records.len()).unwrap_or(0)
    }

    /// Overwrite a stored record in place, bypassing every check. Exists so
    /// tests can simulate corrupted storage.
    #[cfg(any(test, feature = "testing"))]
    pub fn overwrite_record(&self, record: PatchRecord) -> Result<(), StoreError> {
        self.write()?.records.insert(record.id, record);
        Ok(())
    }

    /// Drop a stored record, leaving index entries and pointers dangling.
    #[cfg(any(test, feature = "testing"))]
    pub fn remove_record(&self, id: PatchId) -> Result<Option<PatchRecord>, StoreError> {
        Ok(self.write()?.records.remove(&id))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

impl RevisionBackend for MemoryBackend {
    fn load_record(&self, id: PatchId) -> Result<Option<PatchRecord>, StoreError> {
        Ok(self.read()?.records.get(&id).cloned())
    }

    fn insert_record(&self, record: &PatchRecord) -> Result<(), StoreError> {
        self.write()?.put_record(record);
        Ok(())
    }

    fn load_metadata(&self, document: DocumentId) -> Result<Option<DocumentMetadata>, StoreError> {
        Ok(self.read()?.documents.get(&document).cloned())
    }

    fn commit(
        &self,
        document: DocumentId,
        expected: Option<PatchId>,
        new_head: PatchId,
        record: Option<&PatchRecord>,
    ) -> Result<CommitOutcome, StoreError> {
        let mut state = self.write()?;

        let actual = state.documents.get(&document).and_then(|m| m.head);
        if actual != expected {
            return Ok(CommitOutcome::Conflict { actual });
        }

        match record {
            Some(record) => state.put_record(record),
            None if !state.owns(document, new_head) => return Ok(CommitOutcome::UnknownTarget),
            None => {}
        }
        let meta = state
            .documents
            .entry(document)
            .or_insert_with(|| DocumentMetadata::new(document));
        meta.head = Some(new_head);
        meta.touch();
        Ok(CommitOutcome::Committed(meta.clone()))
    }

    fn store_pointer(
        &self,
        document: DocumentId,
        update: PointerUpdate,
    ) -> Result<Option<DocumentMetadata>, StoreError> {
        let mut state = self.write()?;
        if !state.owns(document, update.target()) {
            return Ok(None);
        }
        let Some(meta) = state.documents.get_mut(&document) else {
            return Ok(None);
        };
        match update {
            PointerUpdate::Head(id) => meta.head = Some(id),
            PointerUpdate::Published(id) => meta.published = Some(id),
        }
        meta.touch();
        Ok(Some(meta.clone()))
    }

    fn document_records(&self, document: DocumentId) -> Result<Vec<PatchRecord>, StoreError> {
        let state = self.read()?;
        let Some(ids) = state.chains.get(&document) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect())
    }

    fn delete_document(&self, document: DocumentId) -> Result<u64, StoreError> {
        let mut state = self.write()?;
        let ids = state.chains.remove(&document).unwrap_or_default();
        let mut removed = 0u64;
        for id in &ids {
            if state.records.remove(id).is_some() {
                removed += 1;
            }
        }
        state.documents.remove(&document);
        Ok(removed)
    }

    fn last_patch_id(&self) -> Result<Option<PatchId>, StoreError> {
        Ok(self.read()?.last_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::PatchPayload;

    fn snapshot(id: u64, document: DocumentId, parent: Option<u64>) -> PatchRecord {
        PatchRecord {
            id: PatchId::new(id),
            document,
            parent: parent.map(PatchId::new),
            version: 1,
            payload: PatchPayload::Snapshot(format!("v{id}")),
            created_at: 0,
            author: "test".into(),
        }
    }

    #[test]
    fn test_commit_writes_record_and_head() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let rec = snapshot(1, doc, None);

        let outcome = backend.commit(doc, None, rec.id, Some(&rec)).unwrap();
        let CommitOutcome::Committed(meta) = outcome else {
            panic!("expected commit");
        };
        assert_eq!(meta.head, Some(rec.id));
        assert_eq!(meta.patch_count, 1);
        assert_eq!(backend.load_record(rec.id).unwrap(), Some(rec));
    }

    #[test]
    fn test_conflict_writes_nothing() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let first = snapshot(1, doc, None);
        backend.commit(doc, None, first.id, Some(&first)).unwrap();

        let stale = snapshot(2, doc, Some(1));
        let outcome = backend.commit(doc, None, stale.id, Some(&stale)).unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict { actual: Some(first.id) });
        assert_eq!(backend.load_record(stale.id).unwrap(), None);
        assert_eq!(backend.record_count(), 1);
    }

    #[test]
    fn test_insert_record_leaves_head_alone() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        backend.insert_record(&snapshot(1, doc, None)).unwrap();

        let meta = backend.load_metadata(doc).unwrap().unwrap();
        assert_eq!(meta.head, None);
        assert_eq!(meta.patch_count, 1);
    }

    #[test]
    fn test_pointers_and_delete() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let other = DocumentId::new();
        backend.insert_record(&snapshot(1, doc, None)).unwrap();
        backend.insert_record(&snapshot(2, other, None)).unwrap();
        backend.insert_record(&snapshot(3, doc, Some(1))).unwrap();

        let meta = backend
            .store_pointer(doc, PointerUpdate::Published(PatchId::new(3)))
            .unwrap()
            .unwrap();
        assert_eq!(meta.published, Some(PatchId::new(3)));

        let ids: Vec<u64> = backend
            .document_records(doc)
            .unwrap()
            .iter()
            .map(|r| r.id.get())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(backend.last_patch_id().unwrap(), Some(PatchId::new(3)));

        assert_eq!(backend.delete_document(doc).unwrap(), 2);
        assert!(backend.load_metadata(doc).unwrap().is_none());
        assert!(backend.document_records(doc).unwrap().is_empty());
        assert_eq!(backend.document_records(other).unwrap().len(), 1);
    }

    #[test]
    fn test_last_patch_id_survives_delete() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let other = DocumentId::new();
        backend.insert_record(&snapshot(1, other, None)).unwrap();
        backend.insert_record(&snapshot(2, doc, None)).unwrap();
        backend.insert_record(&snapshot(3, doc, Some(2))).unwrap();

        backend.delete_document(doc).unwrap();
        assert_eq!(backend.last_patch_id().unwrap(), Some(PatchId::new(3)));
    }

    #[test]
    fn test_store_pointer_rejects_foreign_and_deleted_targets() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let other = DocumentId::new();
        let root = snapshot(1, doc, None);
        backend.commit(doc, None, root.id, Some(&root)).unwrap();
        backend.insert_record(&snapshot(2, other, None)).unwrap();

        let foreign = backend.store_pointer(doc, PointerUpdate::Head(PatchId::new(2))).unwrap();
        assert!(foreign.is_none());
        assert_eq!(backend.load_metadata(doc).unwrap().unwrap().head, Some(root.id));

        // A rollback that lost the race with a delete must not resurrect the document.
        backend.delete_document(doc).unwrap();
        let stale = backend.store_pointer(doc, PointerUpdate::Head(root.id)).unwrap();
        assert!(stale.is_none());
        assert!(backend.load_metadata(doc).unwrap().is_none());
    }

    #[test]
    fn test_commit_without_record_needs_owned_target() {
        let backend = MemoryBackend::new();
        let doc = DocumentId::new();
        let root = snapshot(1, doc, None);
        backend.insert_record(&root).unwrap();
        backend.delete_document(doc).unwrap();

        let outcome = backend.commit(doc, None, root.id, None).unwrap();
        assert_eq!(outcome, CommitOutcome::UnknownTarget);
        assert!(backend.load_metadata(doc).unwrap().is_none());
    }
}
