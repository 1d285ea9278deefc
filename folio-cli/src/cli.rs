//! Argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use folio_core::{DiffGranularity, DocumentId, PatchId};

/// Inspect and edit a folio revision log.
#[derive(Parser)]
#[command(name = "folio")]
#[command(version)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Clone)]
pub struct GlobalOptions {
    /// RocksDB directory holding the revision log.
    #[arg(long, env = "FOLIO_DB", default_value = "folio_data", global = true)]
    pub db: PathBuf,

    /// Maximum resolved chain length before a commit is stored as a snapshot.
    #[arg(long, default_value_t = 20, global = true)]
    pub snapshot_interval: u32,

    /// Diff unit for delta records: lines, words or chars.
    #[arg(long, default_value = "words", global = true)]
    pub granularity: DiffGranularity,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start a new document from FILE ("-" reads stdin). Prints its id.
    New { file: PathBuf },

    /// Commit FILE as the next revision of DOC.
    Commit {
        doc: DocumentId,
        file: PathBuf,
        #[arg(long, default_value = "cli")]
        author: String,
    },

    /// Print the content of DOC (head by default).
    Show {
        doc: DocumentId,
        /// Show an explicit historical patch instead of the head.
        #[arg(long, conflicts_with = "published")]
        at: Option<PatchId>,
        /// Show the published revision.
        #[arg(long)]
        published: bool,
        /// Render Markdown to HTML.
        #[arg(long)]
        render: bool,
    },

    /// List revisions walking back from the head.
    History {
        doc: DocumentId,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Point the head of DOC at PATCH. No revision is deleted.
    Rollback { doc: DocumentId, patch: PatchId },

    /// Publish the current head of DOC.
    Publish { doc: DocumentId },

    /// Delete DOC and its entire history.
    Delete { doc: DocumentId },
}
