//! File-arrival dispatcher
//!
//! Watches one directory tree recursively for one entity and runs the entity
//! processor under a scoped connection for every matching arrival. Arrivals
//! are handled one at a time in arrival order; a failed file is logged and
//! left in place, and never stops the loop.

use crate::pool::IngestPool;
use crate::processor::{EntityProcessor, FileOutcome};
use dropsink_common::{DropsinkError, Result};
use globset::{Glob, GlobMatcher};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// True for event kinds that signal a file landing in the watch tree: plain
/// creates, plus renames into the tree (producers that stage a file elsewhere
/// and atomically rename it in never emit a create).
fn is_arrival(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To))
    )
}

/// Compile a file-name glob such as `*.csv`.
fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)
        .map_err(|e| DropsinkError::Config(format!("invalid file pattern '{}': {}", pattern, e)))?
        .compile_matcher())
}

fn matches_pattern(matcher: &GlobMatcher, path: &Path) -> bool {
    path.file_name()
        .map(|name| matcher.is_match(name))
        .unwrap_or(false)
}

/// Long-lived watch loop for one (entity, directory) pair. Multiple entity
/// types need one dispatcher each, every one with its own watch root.
pub struct Dispatcher {
    pool: IngestPool,
    processor: EntityProcessor,
    root: PathBuf,
    matcher: GlobMatcher,
}

impl Dispatcher {
    pub fn new(
        pool: IngestPool,
        processor: EntityProcessor,
        root: impl Into<PathBuf>,
        file_pattern: &str,
    ) -> Result<Self> {
        processor.config().validate()?;
        Ok(Self {
            pool,
            processor,
            root: root.into(),
            matcher: compile_pattern(file_pattern)?,
        })
    }

    /// Start the watch loop in the background. Cancel the token to stop
    /// intake; the in-flight file finishes before the task ends.
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(error) = self.run(shutdown).await {
                error!(%error, "dispatcher stopped with error");
            }
        })
    }

    async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let entity = self.processor.config().entity_name;

        {
            let mut conn = self.pool.acquire().await?;
            self.processor.set_up_tables(&mut conn).await?;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) if is_arrival(&event.kind) => {
                    for path in event.paths {
                        // Fails only once the receiver is gone at shutdown.
                        let _ = tx.send(path);
                    }
                },
                Ok(_) => {},
                Err(error) => error!(%error, "file watch error"),
            }
        })?;
        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        info!(entity, root = %self.root.display(), "watching for file arrivals");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                arrival = rx.recv() => match arrival {
                    Some(path) => self.handle_arrival(&path).await,
                    None => break,
                },
            }
        }

        info!(entity, "dispatcher stopped");
        Ok(())
    }

    async fn handle_arrival(&self, path: &Path) {
        // Directory events and non-matching names are ignored.
        if !path.is_file() || !matches_pattern(&self.matcher, path) {
            return;
        }

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(error) => {
                error!(file = %path.display(), %error, "could not acquire a connection");
                return;
            },
        };

        match self.processor.process_file(path, &mut conn).await {
            Ok(FileOutcome::Merged {
                rows_staged,
                rows_merged,
            }) => {
                info!(file = %path.display(), rows_staged, rows_merged, "file ingested");
            },
            Ok(FileOutcome::Skipped { digest }) => {
                info!(file = %path.display(), %digest, "file skipped: already processed");
            },
            Err(error) => {
                error!(file = %path.display(), %error, "error processing file");
            },
        }
    }
}
