//! Entity processor
//!
//! Runs the per-file ingestion algorithm for one configured entity:
//! digest -> dedup check -> stage -> manifest record -> merge. Every step
//! returns an explicit error naming the step, so callers can see exactly
//! which state a file ended in. Stage, record, and merge share one
//! transaction: either the staging rows, the manifest row, and the merged
//! target rows all persist, or none do.

use crate::entity::EntityConfig;
use chrono::Utc;
use dropsink_common::digest::{content_digest, stable_name};
use sqlx::{Connection, PgConnection, Postgres, Transaction};
use std::path::Path;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, instrument};

/// Chunk size for streaming the input file into the bulk copy.
const COPY_CHUNK_SIZE: usize = 8192;

/// Terminal state of a successfully handled file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file was new: staged, recorded, and merged.
    Merged { rows_staged: u64, rows_merged: u64 },
    /// A manifest row with this digest already exists; no writes occurred.
    Skipped { digest: String },
}

/// Failure of one pipeline step. The file is left in place for manual
/// remediation; nothing from the failed file's transaction persists.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to digest {path}: {source}")]
    Digest {
        path: String,
        #[source]
        source: dropsink_common::DropsinkError,
    },

    #[error("dedup check against {table} failed: {source}")]
    DedupCheck {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to read input file {path}: {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bulk load into {table} failed: {source}")]
    Load {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("manifest insert into {table} failed: {source}")]
    Manifest {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("merge into {table} failed: {source}")]
    Merge {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("table setup failed: {0}")]
    Setup(#[source] sqlx::Error),

    #[error("transaction failure: {0}")]
    Transaction(#[source] sqlx::Error),
}

/// Stateless processor for one entity; all entity specifics come from the
/// immutable configuration.
#[derive(Debug, Clone)]
pub struct EntityProcessor {
    config: EntityConfig,
}

impl EntityProcessor {
    pub fn new(config: EntityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    /// Pipeline-lifecycle start: ensure the schema exists, drop and recreate
    /// the staging relation, create the manifest relation if absent. The
    /// target relation is durable and assumed pre-existing.
    pub async fn set_up_tables(&self, conn: &mut PgConnection) -> Result<(), ProcessError> {
        info!(
            entity = self.config.entity_name,
            "dropping and creating staging and manifest relations"
        );

        let statements = [
            format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", self.config.staging.schema),
            self.config.staging.drop_ddl(),
            self.config.staging.create_ddl(),
            self.config.manifest.create_ddl(),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .map_err(ProcessError::Setup)?;
        }

        Ok(())
    }

    /// Run the full ingestion algorithm for one file to a terminal state.
    #[instrument(skip(self, conn), fields(entity = self.config.entity_name))]
    pub async fn process_file(
        &self,
        path: &Path,
        conn: &mut PgConnection,
    ) -> Result<FileOutcome, ProcessError> {
        let digest = content_digest(path).map_err(|source| ProcessError::Digest {
            path: path.display().to_string(),
            source,
        })?;
        debug!(%digest, "content digest computed");

        let already_processed: bool = sqlx::query_scalar(&self.config.dedup_check_sql())
            .bind(&digest)
            .fetch_one(&mut *conn)
            .await
            .map_err(|source| ProcessError::DedupCheck {
                table: self.config.manifest.qualified_name(),
                source,
            })?;

        if already_processed {
            info!(%digest, "batch already processed");
            return Ok(FileOutcome::Skipped { digest });
        }

        let file_size = std::fs::metadata(path)
            .map(|meta| meta.len() as i64)
            .map_err(|source| ProcessError::FileRead {
                path: path.display().to_string(),
                source,
            })?;

        info!(%digest, file_size, "processing new batch");
        let mut tx = conn.begin().await.map_err(ProcessError::Transaction)?;

        let rows_staged = self.stage(path, &mut tx).await?;
        self.record_manifest(path, &digest, file_size, &mut tx).await?;
        let rows_merged = self.merge(&mut tx).await?;

        tx.commit().await.map_err(ProcessError::Transaction)?;

        info!(rows_staged, rows_merged, "batch merged");
        Ok(FileOutcome::Merged {
            rows_staged,
            rows_merged,
        })
    }

    /// Overwrite the staging relation with the file's rows via the store's
    /// streaming bulk-copy facility. Any malformed row fails the whole load.
    async fn stage(
        &self,
        path: &Path,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<u64, ProcessError> {
        let staging = self.config.staging.qualified_name();
        let load_err = |source| ProcessError::Load {
            table: staging.clone(),
            source,
        };
        let read_err = |source| ProcessError::FileRead {
            path: path.display().to_string(),
            source,
        };

        sqlx::query(&format!("TRUNCATE {}", staging))
            .execute(&mut **tx)
            .await
            .map_err(&load_err)?;

        let mut file = tokio::fs::File::open(path).await.map_err(&read_err)?;

        let mut copy = (&mut **tx)
            .copy_in_raw(&self.config.staging.copy_statement())
            .await
            .map_err(&load_err)?;

        let mut buffer = [0u8; COPY_CHUNK_SIZE];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => {
                    copy.send(&buffer[..n]).await.map_err(&load_err)?;
                },
                Err(source) => {
                    copy.abort("input file read failed").await.ok();
                    return Err(read_err(source));
                },
            }
        }

        let rows = copy.finish().await.map_err(&load_err)?;
        debug!(rows, table = %staging, "staged file rows");
        Ok(rows)
    }

    /// Append the manifest row claiming this digest. Runs before the merge,
    /// inside the same transaction.
    async fn record_manifest(
        &self,
        path: &Path,
        digest: &str,
        file_size: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<(), ProcessError> {
        let manifest = self.config.manifest.qualified_name();
        debug!(table = %manifest, "recording manifest row");

        sqlx::query(&self.config.manifest_insert_sql())
            .bind(stable_name(path))
            .bind(digest)
            .bind(file_size)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await
            .map_err(|source| ProcessError::Manifest {
                table: manifest.clone(),
                source,
            })?;

        Ok(())
    }

    /// Upsert every staged row into the target in one server-side statement.
    async fn merge(&self, tx: &mut Transaction<'_, Postgres>) -> Result<u64, ProcessError> {
        let target = self.config.target.qualified_name();
        debug!(table = %target, "merging staged rows");

        let result = sqlx::query(&self.config.merge_sql())
            .execute(&mut **tx)
            .await
            .map_err(|source| ProcessError::Merge {
                table: target.clone(),
                source,
            })?;

        Ok(result.rows_affected())
    }
}
