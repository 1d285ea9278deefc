//! On-disk encoding of patch records and document metadata.
//!
//! Record layout:
//! ```text
//! ┌─────────┬──────────────┬───────────────────────────────────────┐
//! │ format  │ checksum     │ LZ4 (size-prepended) of bincode record │
//! │ 1 byte  │ 4 bytes LE   │ variable                               │
//! └─────────┴──────────────┴───────────────────────────────────────┘
//! ```
//!
//! The checksum (FNV-1a) covers the compressed body, so a torn or bit-flipped
//! value is caught before decompression. Metadata rows are small and rewritten
//! often; they are plain bincode.

use folio_core::{DocumentMetadata, PatchId, PatchRecord};

use super::StoreError;

const FORMAT_V1: u8 = 1;
const HEADER_LEN: usize = 5;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a over `bytes`.
pub fn checksum(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ *byte as u32).wrapping_mul(FNV_PRIME)
    })
}

pub fn encode_record(record: &PatchRecord) -> Result<Vec<u8>, StoreError> {
    let encoded = bincode::serde::encode_to_vec(record, bincode::config::standard())
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    let body = lz4_flex::compress_prepend_size(&encoded);

    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    out.push(FORMAT_V1);
    out.extend_from_slice(&checksum(&body).to_le_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decode the value stored under `id`, verifying format, checksum and key.
pub fn decode_record(id: PatchId, bytes: &[u8]) -> Result<PatchRecord, StoreError> {
    if bytes.len() < HEADER_LEN {
        return Err(StoreError::Deserialization(format!(
            "record {id} is truncated ({} bytes)",
            bytes.len()
        )));
    }
    if bytes[0] != FORMAT_V1 {
        return Err(StoreError::Deserialization(format!(
            "record {id} has unknown format {}",
            bytes[0]
        )));
    }

    let mut sum = [0u8; 4];
    sum.copy_from_slice(&bytes[1..HEADER_LEN]);
    let body = &bytes[HEADER_LEN..];
    if u32::from_le_bytes(sum) != checksum(body) {
        return Err(StoreError::ChecksumMismatch(id));
    }

    let encoded = lz4_flex::decompress_size_prepended(body)
        .map_err(|e| StoreError::Compression(e.to_string()))?;
    let (record, _): (PatchRecord, _) =
        bincode::serde::decode_from_slice(&encoded, bincode::config::standard())
            .map_err(|e| StoreError::Deserialization(e.to_string()))?;

    if record.id != id {
        return Err(StoreError::Deserialization(format!(
            "record stored under {id} claims id {}",
            record.id
        )));
    }
    Ok(record)
}

pub fn encode_metadata(meta: &DocumentMetadata) -> Result<Vec<u8>, StoreError> {
    bincode::serde::encode_to_vec(meta, bincode::config::standard())
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn decode_metadata(bytes: &[u8]) -> Result<DocumentMetadata, StoreError> {
    let (meta, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| StoreError::Deserialization(e.to_string()))?;
    Ok(meta)
}
