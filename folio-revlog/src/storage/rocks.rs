//! RocksDB-backed persistent revision store.
//!
//! Column families:
//! - `patches`  : Patch records keyed by id (8 bytes BE), checksummed + LZ4
//! - `chains`   : Per-document index `<doc_id:16><patch_id:8 BE>` → empty
//! - `documents`: Document metadata (bincode: head, published, counts)
//! - `meta`     : Store-wide values; `last_patch_id` is the id high-water mark
//!
//! Every mutation goes through a `WriteBatch`, and read-modify-write of a
//! metadata row is serialized by `write_lock`, so a commit either lands
//! record + index + head together or not at all.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use folio_core::{DocumentId, DocumentMetadata, PatchId, PatchRecord};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType,
    DBWithThreadMode, Direction, IteratorMode, Options, SingleThreaded, WriteBatch, WriteOptions,
};

use super::codec::{decode_metadata, decode_record, encode_metadata, encode_record};
use super::{CommitOutcome, PointerUpdate, RevisionBackend, StoreError};

const CF_PATCHES: &str = "patches";
const CF_CHAINS: &str = "chains";
const CF_DOCUMENTS: &str = "documents";
const CF_META: &str = "meta";

const COLUMN_FAMILIES: &[&str] = &[CF_PATCHES, CF_CHAINS, CF_DOCUMENTS, CF_META];

const KEY_LAST_PATCH_ID: &[u8] = b"last_patch_id";

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// fsync every commit (default: true)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 512)
    pub max_open_files: i32,
    /// Write buffer size per column family (default: 32MB)
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("folio_data"),
            block_cache_size: 64 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: true,
            max_open_files: 512,
            write_buffer_size: 32 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create config for testing (small caches, no fsync).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024,
        }
    }
}

/// RocksDB-backed [`RevisionBackend`].
pub struct RocksBackend {
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
    write_lock: Mutex<()>,
}

impl RocksBackend {
    /// Open the store at the configured path, creating it if missing.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(5);
        db_opts.increase_parallelism(num_cpus());

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name, &config)))
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )?;

        log::info!("Opened revision store at {}", config.path.display());

        Ok(Self {
            db,
            config,
            write_lock: Mutex::new(()),
        })
    }

    fn cf_options(name: &str, config: &StoreConfig) -> Options {
        let mut opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        block_opts.set_block_size(16 * 1024);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_write_buffer_size(config.write_buffer_size);

        match name {
            CF_PATCHES => {
                // Values are already LZ4 framed by the codec
                opts.set_compression_type(DBCompressionType::None);
                opts.set_max_write_buffer_number(4);
            }
            CF_CHAINS => {
                opts.set_compression_type(DBCompressionType::Lz4);
                opts.set_max_write_buffer_number(2);
                opts.set_prefix_extractor(rocksdb::SliceTransform::create_fixed_prefix(16));
            }
            CF_DOCUMENTS | CF_META => {
                opts.set_compression_type(DBCompressionType::Lz4);
                opts.set_max_write_buffer_number(2);
                opts.optimize_for_point_lookup(config.block_cache_size as u64);
            }
            _ => {}
        }

        opts
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("Column family '{name}' not found")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts)?;
        Ok(())
    }

    fn chain_key(document: DocumentId, id: PatchId) -> Vec<u8> {
        let mut key = Vec::with_capacity(24);
        key.extend_from_slice(document.as_bytes());
        key.extend_from_slice(&id.get().to_be_bytes());
        key
    }

    fn patch_key(id: PatchId) -> [u8; 8] {
        id.get().to_be_bytes()
    }

    fn id_from_be(bytes: &[u8]) -> Result<PatchId, StoreError> {
        let buf: [u8; 8] = bytes
            .try_into()
            .map_err(|_| StoreError::Deserialization("Invalid patch id key".into()))?;
        Ok(PatchId::new(u64::from_be_bytes(buf)))
    }

    /// Patch ids indexed under `document`, ascending.
    fn chain_ids(&self, document: DocumentId) -> Result<Vec<PatchId>, StoreError> {
        let cf = self.cf(CF_CHAINS)?;
        let start = Self::chain_key(document, PatchId::new(0));
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward));

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if key.len() != 24 || &key[..16] != document.as_bytes() {
                break;
            }
            ids.push(Self::id_from_be(&key[16..])?);
        }
        Ok(ids)
    }

    /// Whether `id` is indexed under `document`. The index and the record are
    /// written in one batch, so this doubles as an existence check.
    fn owns(&self, document: DocumentId, id: PatchId) -> Result<bool, StoreError> {
        let cf = self.cf(CF_CHAINS)?;
        Ok(self.db.get_cf(cf, Self::chain_key(document, id))?.is_some())
    }

    fn stored_mark(&self) -> Result<Option<PatchId>, StoreError> {
        match self.db.get_cf(self.cf(CF_META)?, KEY_LAST_PATCH_ID)? {
            Some(bytes) => Self::id_from_be(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Highest key in `patches`. Covers stores written before the mark existed.
    fn highest_stored_key(&self) -> Result<Option<PatchId>, StoreError> {
        let cf = self.cf(CF_PATCHES)?;
        let mut iter = self.db.iterator_cf(cf, IteratorMode::End);
        match iter.next() {
            Some(item) => {
                let (key, _) = item?;
                Self::id_from_be(&key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn metadata_or_new(&self, document: DocumentId) -> Result<DocumentMetadata, StoreError> {
        Ok(self
            .load_metadata(document)?
            .unwrap_or_else(|| DocumentMetadata::new(document)))
    }

    /// Stage record + index entry + id mark; the caller owns the metadata row
    /// and holds `write_lock`.
    fn stage_record(
        &self,
        batch: &mut WriteBatch,
        record: &PatchRecord,
        meta: &mut DocumentMetadata,
    ) -> Result<(), StoreError> {
        if self.stored_mark()?.is_none_or(|mark| mark < record.id) {
            batch.put_cf(self.cf(CF_META)?, KEY_LAST_PATCH_ID, Self::patch_key(record.id));
        }
        batch.put_cf(
            self.cf(CF_PATCHES)?,
            Self::patch_key(record.id),
            encode_record(record)?,
        );
        batch.put_cf(
            self.cf(CF_CHAINS)?,
            Self::chain_key(record.document, record.id),
            b"",
        );
        meta.patch_count += 1;
        Ok(())
    }

    fn stage_metadata(
        &self,
        batch: &mut WriteBatch,
        meta: &DocumentMetadata,
    ) -> Result<(), StoreError> {
        batch.put_cf(
            self.cf(CF_DOCUMENTS)?,
            meta.document.as_bytes(),
            encode_metadata(meta)?,
        );
        Ok(())
    }
}

impl RevisionBackend for RocksBackend {
    fn load_record(&self, id: PatchId) -> Result<Option<PatchRecord>, StoreError> {
        let cf = self.cf(CF_PATCHES)?;
        match self.db.get_cf(cf, Self::patch_key(id))? {
            Some(bytes) => decode_record(id, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn insert_record(&self, record: &PatchRecord) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        let mut meta = self.metadata_or_new(record.document)?;
        let mut batch = WriteBatch::default();
        self.stage_record(&mut batch, record, &mut meta)?;
        meta.touch();
        self.stage_metadata(&mut batch, &meta)?;
        self.write(batch)
    }

    fn load_metadata(&self, document: DocumentId) -> Result<Option<DocumentMetadata>, StoreError> {
        let cf = self.cf(CF_DOCUMENTS)?;
        match self.db.get_cf(cf, document.as_bytes())? {
            Some(bytes) => decode_metadata(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn commit(
        &self,
        document: DocumentId,
        expected: Option<PatchId>,
        new_head: PatchId,
        record: Option<&PatchRecord>,
    ) -> Result<CommitOutcome, StoreError> {
        let _guard = self.lock()?;
        let mut meta = self.metadata_or_new(document)?;
        if meta.head != expected {
            return Ok(CommitOutcome::Conflict { actual: meta.head });
        }

        let mut batch = WriteBatch::default();
        match record {
            Some(record) => self.stage_record(&mut batch, record, &mut meta)?,
            None if !self.owns(document, new_head)? => return Ok(CommitOutcome::UnknownTarget),
            None => {}
        }
        meta.head = Some(new_head);
        meta.touch();
        self.stage_metadata(&mut batch, &meta)?;
        self.write(batch)?;

        Ok(CommitOutcome::Committed(meta))
    }

    fn store_pointer(
        &self,
        document: DocumentId,
        update: PointerUpdate,
    ) -> Result<Option<DocumentMetadata>, StoreError> {
        let _guard = self.lock()?;
        if !self.owns(document, update.target())? {
            return Ok(None);
        }
        let Some(mut meta) = self.load_metadata(document)? else {
            return Ok(None);
        };
        match update {
            PointerUpdate::Head(id) => meta.head = Some(id),
            PointerUpdate::Published(id) => meta.published = Some(id),
        }
        meta.touch();

        let mut batch = WriteBatch::default();
        self.stage_metadata(&mut batch, &meta)?;
        self.write(batch)?;
        Ok(Some(meta))
    }

    fn document_records(&self, document: DocumentId) -> Result<Vec<PatchRecord>, StoreError> {
        let mut records = Vec::new();
        for id in self.chain_ids(document)? {
            match self.load_record(id)? {
                Some(record) => records.push(record),
                None => log::warn!("Index for document {document} lists missing patch {id}"),
            }
        }
        Ok(records)
    }

    fn delete_document(&self, document: DocumentId) -> Result<u64, StoreError> {
        let _guard = self.lock()?;
        let ids = self.chain_ids(document)?;

        let cf_patches = self.cf(CF_PATCHES)?;
        let cf_chains = self.cf(CF_CHAINS)?;
        let mut batch = WriteBatch::default();
        for id in &ids {
            batch.delete_cf(cf_patches, Self::patch_key(*id));
            batch.delete_cf(cf_chains, Self::chain_key(document, *id));
        }
        batch.delete_cf(self.cf(CF_DOCUMENTS)?, document.as_bytes());
        self.write(batch)?;

        Ok(ids.len() as u64)
    }

    fn last_patch_id(&self) -> Result<Option<PatchId>, StoreError> {
        Ok(self.stored_mark()?.max(self.highest_stored_key()?))
    }
}

fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::{DeltaOp, PatchPayload};

    fn open_temp() -> (tempfile::TempDir, RocksBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = RocksBackend::open(StoreConfig::for_testing(dir.path())).unwrap();
        (dir, backend)
    }

    fn record(id: u64, document: DocumentId, parent: Option<u64>, payload: PatchPayload) -> PatchRecord {
        PatchRecord {
            id: PatchId::new(id),
            document,
            parent: parent.map(PatchId::new),
            version: id as u32,
            payload,
            created_at: 0,
            author: "test".into(),
        }
    }

    #[test]
    fn test_store_open_close() {
        let (dir, backend) = open_temp();
        assert!(backend.path().exists());
        assert_eq!(backend.last_patch_id().unwrap(), None);
        drop(backend);
        drop(dir);
    }

    #[test]
    fn test_commit_then_load() {
        let (_dir, backend) = open_temp();
        let doc = DocumentId::new();
        let root = record(1, doc, None, PatchPayload::Snapshot("Hello".into()));

        let outcome = backend.commit(doc, None, root.id, Some(&root)).unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed(ref m) if m.head == Some(root.id)));

        assert_eq!(backend.load_record(root.id).unwrap(), Some(root));
        let meta = backend.load_metadata(doc).unwrap().unwrap();
        assert_eq!(meta.patch_count, 1);
    }

    #[test]
    fn test_stale_commit_conflicts() {
        let (_dir, backend) = open_temp();
        let doc = DocumentId::new();
        let root = record(1, doc, None, PatchPayload::Snapshot("a".into()));
        backend.commit(doc, None, root.id, Some(&root)).unwrap();

        let child = record(
            2,
            doc,
            Some(1),
            PatchPayload::Delta(vec![DeltaOp::Insert { at: 1, text: "b".into() }]),
        );
        let outcome = backend
            .commit(doc, Some(PatchId::new(99)), child.id, Some(&child))
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict { actual: Some(root.id) });
        assert_eq!(backend.load_record(child.id).unwrap(), None);
    }

    #[test]
    fn test_document_records_are_prefix_scoped() {
        let (_dir, backend) = open_temp();
        let a = DocumentId::new();
        let b = DocumentId::new();
        backend.insert_record(&record(1, a, None, PatchPayload::Snapshot("a".into()))).unwrap();
        backend.insert_record(&record(2, b, None, PatchPayload::Snapshot("b".into()))).unwrap();
        backend.insert_record(&record(3, a, Some(1), PatchPayload::Snapshot("a2".into()))).unwrap();

        let ids: Vec<u64> = backend
            .document_records(a)
            .unwrap()
            .iter()
            .map(|r| r.id.get())
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(backend.last_patch_id().unwrap(), Some(PatchId::new(3)));
    }

    #[test]
    fn test_delete_document() {
        let (_dir, backend) = open_temp();
        let doc = DocumentId::new();
        let keep = DocumentId::new();
        backend.insert_record(&record(1, doc, None, PatchPayload::Snapshot("x".into()))).unwrap();
        backend.insert_record(&record(2, doc, Some(1), PatchPayload::Snapshot("y".into()))).unwrap();
        backend.insert_record(&record(3, keep, None, PatchPayload::Snapshot("z".into()))).unwrap();
        backend.store_pointer(doc, PointerUpdate::Head(PatchId::new(2))).unwrap();

        assert_eq!(backend.delete_document(doc).unwrap(), 2);
        assert!(backend.load_metadata(doc).unwrap().is_none());
        assert!(backend.load_record(PatchId::new(1)).unwrap().is_none());
        assert_eq!(backend.document_records(keep).unwrap().len(), 1);
    }

    #[test]
    fn test_reopen_keeps_pointers() {
        let dir = tempfile::tempdir().unwrap();
        let doc = DocumentId::new();
        {
            let backend = RocksBackend::open(StoreConfig::for_testing(dir.path())).unwrap();
            let root = record(1, doc, None, PatchPayload::Snapshot("draft".into()));
            backend.commit(doc, None, root.id, Some(&root)).unwrap();
            backend.store_pointer(doc, PointerUpdate::Published(root.id)).unwrap();
        }

        let backend = RocksBackend::open(StoreConfig::for_testing(dir.path())).unwrap();
        let meta = backend.load_metadata(doc).unwrap().unwrap();
        assert_eq!(meta.head, Some(PatchId::new(1)));
        assert_eq!(meta.published, Some(PatchId::new(1)));
        assert_eq!(backend.last_patch_id().unwrap(), Some(PatchId::new(1)));
    }

    #[test]
    fn test_last_patch_id_survives_delete_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let doc = DocumentId::new();
        {
            let backend = RocksBackend::open(StoreConfig::for_testing(dir.path())).unwrap();
            let root = record(1, doc, None, PatchPayload::Snapshot("a".into()));
            backend.commit(doc, None, root.id, Some(&root)).unwrap();
            backend.insert_record(&record(2, doc, Some(1), PatchPayload::Snapshot("b".into()))).unwrap();
            backend.delete_document(doc).unwrap();
            assert_eq!(backend.last_patch_id().unwrap(), Some(PatchId::new(2)));
        }

        let backend = RocksBackend::open(StoreConfig::for_testing(dir.path())).unwrap();
        assert_eq!(backend.last_patch_id().unwrap(), Some(PatchId::new(2)));
    }

    #[test]
    fn test_pointer_moves_need_an_owned_record() {
        let (_dir, backend) = open_temp();
        let doc = DocumentId::new();
        let other = DocumentId::new();
        let root = record(1, doc, None, PatchPayload::Snapshot("a".into()));
        backend.commit(doc, None, root.id, Some(&root)).unwrap();
        backend.insert_record(&record(2, other, None, PatchPayload::Snapshot("z".into()))).unwrap();

        let foreign = backend.store_pointer(doc, PointerUpdate::Published(PatchId::new(2))).unwrap();
        assert!(foreign.is_none());
        assert_eq!(backend.load_metadata(doc).unwrap().unwrap().published, None);

        backend.delete_document(doc).unwrap();
        assert!(backend.store_pointer(doc, PointerUpdate::Head(root.id)).unwrap().is_none());
        assert_eq!(backend.commit(doc, None, root.id, None).unwrap(), CommitOutcome::UnknownTarget);
        assert!(backend.load_metadata(doc).unwrap().is_none());
    }
}
