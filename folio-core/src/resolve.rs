//! Patch chain resolution.
//!
//! Walks parent links backward from a target patch until the nearest snapshot,
//! then returns the walked records oldest first:
//!
//! ```text
//!   resolve(D4):   S1 ◄── D2 ◄── S3 ◄── D4      walk: D4, S3 (stop)
//!                                               result: [S3, D4]
//! ```
//!
//! The walk is bounded by the document's known patch count, so a corrupted chain
//! (cycle, foreign parent, dangling link, root without snapshot) always
//! terminates with `CorruptChain` instead of looping.

use crate::error::RevisionError;
use crate::model::{DocumentId, PatchId, PatchRecord};

/// Read access to patch records, as needed by the resolver.
pub trait PatchSource {
    /// Fetch one record; `PatchNotFound` if absent.
    fn patch(&self, id: PatchId) -> Result<PatchRecord, RevisionError>;

    /// Number of records currently owned by `document`.
    fn patch_count(&self, document: DocumentId) -> Result<u64, RevisionError>;
}

/// Records from the nearest snapshot ancestor up to `target`, oldest first.
pub fn resolve_chain<S>(source: &S, target: PatchId) -> Result<Vec<PatchRecord>, RevisionError>
where
    S: PatchSource + ?Sized,
{
    let tip = source.patch(target)?;
    let document = tip.document;
    let budget = source.patch_count(document)?.max(1);

    let mut walked: Vec<PatchRecord> = Vec::new();
    let mut current = tip;
    loop {
        if current.document != document {
            return Err(RevisionError::corrupt(
                document,
                current.id,
                format!("parent link crosses into document {}", current.document),
            ));
        }
        if walked.len() as u64 >= budget {
            log::error!(
                "Chain walk for document {document} from patch {target} exceeded {budget} steps"
            );
            return Err(RevisionError::corrupt(
                document,
                current.id,
                format!("walk exceeded {budget} steps (cycle in parent links)"),
            ));
        }

        let parent = current.parent;
        let is_snapshot = current.payload.is_snapshot();
        let id = current.id;
        walked.push(current);

        if is_snapshot {
            break;
        }
        let Some(parent) = parent else {
            return Err(RevisionError::corrupt(
                document,
                id,
                "chain root is not a snapshot",
            ));
        };
        current = match source.patch(parent) {
            Ok(record) => record,
            Err(RevisionError::PatchNotFound(missing)) => {
                return Err(RevisionError::corrupt(
                    document,
                    id,
                    format!("parent {missing} is missing"),
                ));
            }
            Err(e) => return Err(e),
        };
    }

    walked.reverse();
    log::debug!(
        "Resolved patch {target} of document {document} through {} record(s)",
        walked.len()
    );
    Ok(walked)
}
