//! Revision Service: the operations the application layer calls.
//!
//! ```text
//!   commit_revision(doc, raw)
//!     ├─ observe head H
//!     ├─ resolve_chain(H) ──► base content (cache or replay)
//!     ├─ chain full? ── yes ─► Snapshot(raw)
//!     │               └ no ──► Delta(compute_delta(base, raw))
//!     ├─ PatchStore::prepare (linkage checks, id)
//!     └─ HeadPointers::commit (record + head, atomic, CAS on H)
//! ```
//!
//! A `Conflict` from the last step is returned to the caller unchanged; the
//! service never retries on its own.

use std::sync::Arc;

use folio_core::{
    compute_delta, materialize, reconstruct, resolve_chain, DocumentId, DocumentMetadata,
    MaterializedContent, PatchId, PatchKind, PatchPayload, PatchRecord, Renderer, RevisionError,
};

use crate::cache::{CacheStats, ContentCache};
use crate::config::RevisionConfig;
use crate::head::HeadPointers;
use crate::storage::RevisionBackend;
use crate::store::PatchStore;

/// One line of a document's history listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionSummary {
    pub id: PatchId,
    pub parent: Option<PatchId>,
    pub version: u32,
    pub kind: PatchKind,
    pub created_at: u64,
    pub author: String,
    /// Delta operations in the record; 0 for snapshots.
    pub op_count: usize,
    pub is_head: bool,
    pub is_published: bool,
}

impl RevisionSummary {
    fn new(record: &PatchRecord, meta: Option<&DocumentMetadata>) -> Self {
        let op_count = match &record.payload {
            PatchPayload::Snapshot(_) => 0,
            PatchPayload::Delta(ops) => ops.len(),
        };
        Self {
            id: record.id,
            parent: record.parent,
            version: record.version,
            kind: record.kind(),
            created_at: record.created_at,
            author: record.author.clone(),
            op_count,
            is_head: meta.and_then(|m| m.head) == Some(record.id),
            is_published: meta.and_then(|m| m.published) == Some(record.id),
        }
    }
}

pub struct RevisionService<B> {
    store: PatchStore<B>,
    heads: HeadPointers<B>,
    cache: Arc<ContentCache>,
    renderer: Arc<dyn Renderer>,
    config: RevisionConfig,
}

impl<B: RevisionBackend> RevisionService<B> {
    pub fn new(
        backend: B,
        renderer: Arc<dyn Renderer>,
        config: RevisionConfig,
    ) -> Result<Self, RevisionError> {
        Self::with_backend(Arc::new(backend), renderer, config)
    }

    /// Build over a backend shared with other components.
    pub fn with_backend(
        backend: Arc<B>,
        renderer: Arc<dyn Renderer>,
        config: RevisionConfig,
    ) -> Result<Self, RevisionError> {
        config.validate()?;
        let cache = Arc::new(ContentCache::new(config.cache_capacity));
        Ok(Self {
            store: PatchStore::open(backend.clone())?,
            heads: HeadPointers::new(backend).with_cache(cache.clone()),
            cache,
            renderer,
            config,
        })
    }

    /// Commit `raw` on top of the document's current head.
    pub fn commit_revision(
        &self,
        document: DocumentId,
        raw: &str,
        author: &str,
    ) -> Result<PatchRecord, RevisionError> {
        let observed = self.heads.get_head(document)?;
        self.commit_revision_from(document, observed, raw, author)
    }

    /// Commit `raw` on top of `observed`, the head the caller based its edit on.
    /// Fails with `Conflict` if the head has moved since.
    pub fn commit_revision_from(
        &self,
        document: DocumentId,
        observed: Option<PatchId>,
        raw: &str,
        author: &str,
    ) -> Result<PatchRecord, RevisionError> {
        let payload = match observed {
            None => PatchPayload::Snapshot(raw.to_owned()),
            Some(base) => self.payload_against(document, base, raw)?,
        };

        let record = self.store.prepare(document, observed, payload, author)?;
        self.heads.commit(&record, observed)?;
        log::debug!(
            "Committed {} patch {} (v{}) to document {document}",
            record.kind(),
            record.id,
            record.version
        );
        Ok(record)
    }

    fn payload_against(
        &self,
        document: DocumentId,
        base: PatchId,
        raw: &str,
    ) -> Result<PatchPayload, RevisionError> {
        let chain = resolve_chain(&self.store, base)?;
        if chain.len() >= self.config.snapshot_interval as usize {
            log::debug!(
                "Base chain of document {document} holds {} records, writing snapshot",
                chain.len()
            );
            return Ok(PatchPayload::Snapshot(raw.to_owned()));
        }

        let ops = match self.cache.get(document, base) {
            Some(content) => compute_delta(&content.raw, raw, self.config.diff_granularity),
            None => {
                let base_raw = reconstruct(&chain)?;
                compute_delta(&base_raw, raw, self.config.diff_granularity)
            }
        };
        Ok(PatchPayload::Delta(ops))
    }

    /// Content at the document's head.
    pub fn current_content(
        &self,
        document: DocumentId,
    ) -> Result<Arc<MaterializedContent>, RevisionError> {
        let head = self
            .heads
            .get_head(document)?
            .ok_or(RevisionError::NoRevisions(document))?;
        self.load(document, head)
    }

    /// Content at an explicit patch, independent of either pointer.
    pub fn content_at(&self, patch: PatchId) -> Result<Arc<MaterializedContent>, RevisionError> {
        let record = self.store.get(patch)?;
        self.load(record.document, patch)
    }

    /// Content at the published pointer.
    pub fn published_content(
        &self,
        document: DocumentId,
    ) -> Result<Arc<MaterializedContent>, RevisionError> {
        let published = self
            .heads
            .get_published(document)?
            .ok_or(RevisionError::NotPublished(document))?;
        self.load(document, published)
    }

    fn load(
        &self,
        document: DocumentId,
        patch: PatchId,
    ) -> Result<Arc<MaterializedContent>, RevisionError> {
        if let Some(content) = self.cache.get(document, patch) {
            return Ok(content);
        }
        let chain = resolve_chain(&self.store, patch)?;
        let content = Arc::new(materialize(&chain, self.renderer.as_ref())?);
        self.cache.insert(content.clone());
        Ok(content)
    }

    /// Move the head back (or forward) to `target`. No record is deleted.
    pub fn rollback(
        &self,
        document: DocumentId,
        target: PatchId,
    ) -> Result<DocumentMetadata, RevisionError> {
        let meta = self.heads.set_head(document, target)?;
        log::info!("Rolled document {document} back to patch {target}");
        Ok(meta)
    }

    /// Publish the current head. Returns the published patch.
    pub fn publish(&self, document: DocumentId) -> Result<PatchId, RevisionError> {
        let head = self
            .heads
            .get_head(document)?
            .ok_or(RevisionError::NoRevisions(document))?;
        self.heads.publish(document, head)?;
        Ok(head)
    }

    /// Up to `limit` records walking back from the head, newest first.
    /// `None` uses the configured default.
    pub fn history(
        &self,
        document: DocumentId,
        limit: Option<usize>,
    ) -> Result<Vec<RevisionSummary>, RevisionError> {
        let meta = self.heads.metadata(document)?;
        let Some(head) = meta.as_ref().and_then(|m| m.head) else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(self.config.history_limit);
        self.store
            .list_chain(document, head, limit)
            .map(|record| record.map(|r| RevisionSummary::new(&r, meta.as_ref())))
            .collect()
    }

    /// Remove every record and pointer of the document.
    pub fn delete_document(&self, document: DocumentId) -> Result<u64, RevisionError> {
        let removed = self.store.delete_document(document)?;
        self.cache.invalidate_document(document);
        log::info!("Deleted document {document} ({removed} patch records)");
        Ok(removed)
    }

    pub fn store(&self) -> &PatchStore<B> {
        &self.store
    }

    pub fn heads(&self) -> &HeadPointers<B> {
        &self.heads
    }

    pub fn config(&self) -> &RevisionConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
