//! Content reconstruction from a resolved patch sequence.
//!
//! Starts from the snapshot at position 0 and replays every following delta in
//! chain order. The sequence itself is re-checked (single document, each record
//! the child of the previous one) so an out-of-order application is reported
//! instead of producing wrong text.

use crate::delta::apply_delta;
use crate::error::RevisionError;
use crate::model::{MaterializedContent, PatchPayload, PatchRecord};
use crate::render::Renderer;

/// Rebuild the raw source at the last record of `sequence`.
pub fn reconstruct(sequence: &[PatchRecord]) -> Result<String, RevisionError> {
    let Some((base, rest)) = sequence.split_first() else {
        return Err(RevisionError::EmptySequence);
    };

    let mut content = match &base.payload {
        PatchPayload::Snapshot(text) => text.clone(),
        PatchPayload::Delta(_) => {
            return Err(RevisionError::corrupt(
                base.document,
                base.id,
                "sequence does not start with a snapshot",
            ));
        }
    };

    let mut previous = base;
    for record in rest {
        if record.document != base.document {
            return Err(RevisionError::corrupt(
                base.document,
                record.id,
                format!("record belongs to document {}", record.document),
            ));
        }
        if record.parent != Some(previous.id) {
            return Err(RevisionError::corrupt(
                base.document,
                record.id,
                format!("out-of-order application: expected child of {}", previous.id),
            ));
        }

        content = match &record.payload {
            PatchPayload::Snapshot(text) => text.clone(),
            PatchPayload::Delta(ops) => apply_delta(&content, ops).map_err(|source| {
                log::error!(
                    "Patch {} of document {} failed to apply: {source}",
                    record.id,
                    record.document
                );
                RevisionError::PatchApplication {
                    document: record.document,
                    patch: record.id,
                    source,
                }
            })?,
        };
        previous = record;
    }

    Ok(content)
}

/// Rebuild the content at the last record of `sequence` and render it.
///
/// The raw text is passed to `renderer` unmodified.
pub fn materialize(
    sequence: &[PatchRecord],
    renderer: &dyn Renderer,
) -> Result<MaterializedContent, RevisionError> {
    let raw = reconstruct(sequence)?;
    let tip = sequence.last().ok_or(RevisionError::EmptySequence)?;
    let rendered = renderer.render(&raw);
    Ok(MaterializedContent {
        document: tip.document,
        patch: tip.id,
        version: tip.version,
        raw,
        rendered,
    })
}
