//! Error taxonomy for the revision log.
//!
//! | Kind               | Meaning                                   | Caller action          |
//! |--------------------|-------------------------------------------|------------------------|
//! | `NotFound`         | document has no head / patch absent       | show "no content yet"  |
//! | `Validation`       | malformed linkage, cross-document ref     | reject the request     |
//! | `Conflict`         | head moved since it was observed          | recompute and retry    |
//! | `CorruptChain`     | missing snapshot ancestor, cycle, dangling| report, never repair   |
//! | `PatchApplication` | delta out of bounds against its base      | report, never repair   |

use crate::delta::ApplyError;
use crate::model::{DocumentId, PatchId};

/// Coarse classification used by presentation layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    CorruptChain,
    PatchApplication,
    Storage,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    #[error("Patch not found: {0}")]
    PatchNotFound(PatchId),

    #[error("Document {0} has no revisions")]
    NoRevisions(DocumentId),

    #[error("Document {0} has never been published")]
    NotPublished(DocumentId),

    #[error("Invalid revision request for document {document}: {reason}")]
    Validation { document: DocumentId, reason: String },

    #[error("Cannot materialize an empty patch sequence")]
    EmptySequence,

    #[error("Head of document {document} moved: expected {}, found {}", fmt_head(.expected), fmt_head(.actual))]
    Conflict {
        document: DocumentId,
        expected: Option<PatchId>,
        actual: Option<PatchId>,
    },

    #[error("Corrupt patch chain for document {document} at patch {patch}: {reason}")]
    CorruptChain {
        document: DocumentId,
        patch: PatchId,
        reason: String,
    },

    #[error("Patch {patch} of document {document} does not apply to its base: {source}")]
    PatchApplication {
        document: DocumentId,
        patch: PatchId,
        #[source]
        source: ApplyError,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn fmt_head(head: &Option<PatchId>) -> String {
    match head {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}

impl RevisionError {
    pub fn validation(document: DocumentId, reason: impl Into<String>) -> Self {
        RevisionError::Validation {
            document,
            reason: reason.into(),
        }
    }

    pub fn corrupt(document: DocumentId, patch: PatchId, reason: impl Into<String>) -> Self {
        RevisionError::CorruptChain {
            document,
            patch,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RevisionError::PatchNotFound(_)
            | RevisionError::NoRevisions(_)
            | RevisionError::NotPublished(_) => ErrorKind::NotFound,
            RevisionError::Validation { .. } | RevisionError::EmptySequence => ErrorKind::Validation,
            RevisionError::Conflict { .. } => ErrorKind::Conflict,
            RevisionError::CorruptChain { .. } => ErrorKind::CorruptChain,
            RevisionError::PatchApplication { .. } => ErrorKind::PatchApplication,
            RevisionError::Storage(_) => ErrorKind::Storage,
            RevisionError::Config(_) => ErrorKind::Config,
        }
    }

    /// Only a head conflict can be fixed by recomputing against the new head.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Data-integrity violations for the document's history.
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::CorruptChain | ErrorKind::PatchApplication
        )
    }

    pub fn document(&self) -> Option<DocumentId> {
        match self {
            RevisionError::NoRevisions(document)
            | RevisionError::NotPublished(document)
            | RevisionError::Validation { document, .. }
            | RevisionError::Conflict { document, .. }
            | RevisionError::CorruptChain { document, .. }
            | RevisionError::PatchApplication { document, .. } => Some(*document),
            _ => None,
        }
    }

    pub fn patch(&self) -> Option<PatchId> {
        match self {
            RevisionError::PatchNotFound(patch)
            | RevisionError::CorruptChain { patch, .. }
            | RevisionError::PatchApplication { patch, .. } => Some(*patch),
            RevisionError::Conflict { actual, .. } => *actual,
            _ => None,
        }
    }

    /// Message suitable for end users.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::NotFound => "No content yet.".to_string(),
            ErrorKind::Conflict => "Someone else edited this, please retry.".to_string(),
            _ => {
                let mut message = String::from("Something went wrong");
                if let Some(document) = self.document() {
                    message.push_str(&format!(" (document {document}"));
                    if let Some(patch) = self.patch() {
                        message.push_str(&format!(", patch {patch}"));
                    }
                    message.push(')');
                } else if let Some(patch) = self.patch() {
                    message.push_str(&format!(" (patch {patch})"));
                }
                message.push('.');
                message
            }
        }
    }
}
