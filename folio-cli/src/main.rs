//! folio: operator tool for the revision log.
//!
//! ```bash
//! export FOLIO_DB=./folio_data
//! folio new post.md                 # prints the new document id
//! folio commit <DOC> post.md
//! folio history <DOC>
//! folio show <DOC> --at 3 --render
//! folio rollback <DOC> 3
//! folio publish <DOC>
//! ```
//!
//! `RUST_LOG=debug` shows commit and resolve traffic.

mod cli;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use folio_core::{DocumentId, MarkdownRenderer, PlainRenderer, Renderer, RevisionError};
use folio_revlog::{RevisionConfig, RevisionService, RocksBackend, StoreConfig, StoreError};

use cli::{Cli, Command, GlobalOptions};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Revision(#[from] RevisionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot read {}: {source}", path.display())]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Revision(err)) => {
            log::error!("{err}");
            eprintln!("{}", err.user_message());
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn open(global: &GlobalOptions, renderer: Arc<dyn Renderer>) -> Result<RevisionService<RocksBackend>, CliError> {
    let backend = RocksBackend::open(StoreConfig::new(&global.db))?;
    let config = RevisionConfig {
        snapshot_interval: global.snapshot_interval,
        diff_granularity: global.granularity,
        ..RevisionConfig::default()
    };
    Ok(RevisionService::new(backend, renderer, config)?)
}

fn read_input(path: &Path) -> Result<String, CliError> {
    let result = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        std::fs::read_to_string(path)
    };
    result.map_err(|source| CliError::Input {
        path: path.to_path_buf(),
        source,
    })
}

fn run(cli: Cli) -> Result<(), CliError> {
    let plain: Arc<dyn Renderer> = Arc::new(PlainRenderer);

    match cli.command {
        Command::New { file } => {
            let raw = read_input(&file)?;
            let svc = open(&cli.global, plain)?;
            let doc = DocumentId::new();
            let record = svc.commit_revision(doc, &raw, "cli")?;
            println!("{doc}");
            log::info!("Created document {doc} at patch {}", record.id);
        }
        Command::Commit { doc, file, author } => {
            let raw = read_input(&file)?;
            let svc = open(&cli.global, plain)?;
            let record = svc.commit_revision(doc, &raw, &author)?;
            println!("{} {} v{}", record.id, record.kind(), record.version);
        }
        Command::Show {
            doc,
            at,
            published,
            render,
        } => {
            let renderer: Arc<dyn Renderer> = if render {
                Arc::new(MarkdownRenderer::new())
            } else {
                plain
            };
            let svc = open(&cli.global, renderer)?;
            let content = match (at, published) {
                (Some(patch), _) => {
                    let content = svc.content_at(patch)?;
                    if content.document != doc {
                        return Err(RevisionError::validation(
                            doc,
                            format!("patch {patch} belongs to document {}", content.document),
                        )
                        .into());
                    }
                    content
                }
                (None, true) => svc.published_content(doc)?,
                (None, false) => svc.current_content(doc)?,
            };
            print!("{}", content.rendered);
            if !content.rendered.ends_with('\n') {
                println!();
            }
        }
        Command::History { doc, limit } => {
            let svc = open(&cli.global, plain)?;
            for entry in svc.history(doc, limit)? {
                let marker = match (entry.is_head, entry.is_published) {
                    (true, true) => "H P",
                    (true, false) => "H  ",
                    (false, true) => "  P",
                    (false, false) => "   ",
                };
                println!(
                    "{marker} {:>8} v{:<5} {:<8} {:>4} ops  {:<12} {}",
                    entry.id,
                    entry.version,
                    entry.kind.to_string(),
                    entry.op_count,
                    entry.author,
                    entry.created_at
                );
            }
        }
        Command::Rollback { doc, patch } => {
            let svc = open(&cli.global, plain)?;
            svc.rollback(doc, patch)?;
            println!("head of {doc} is now {patch}");
        }
        Command::Publish { doc } => {
            let svc = open(&cli.global, plain)?;
            let patch = svc.publish(doc)?;
            println!("published {doc} at {patch}");
        }
        Command::Delete { doc } => {
            let svc = open(&cli.global, plain)?;
            let removed = svc.delete_document(doc)?;
            println!("deleted {doc} ({removed} revisions)");
        }
    }
    Ok(())
}
