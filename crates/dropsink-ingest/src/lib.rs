//! Dropsink Ingest Library
//!
//! Ingests batch files dropped into watched directories, deduplicates them
//! by content digest, and merges their rows into durable target relations
//! with most-recent-timestamp-wins semantics per record.
//!
//! # Components
//!
//! - [`pool::IngestPool`]: bounded, thread-safe connection pool with scoped
//!   acquisition guards
//! - [`processor::EntityProcessor`]: the per-file dedup -> stage -> record ->
//!   merge algorithm
//! - [`watcher::Dispatcher`]: recursive directory watch loop driving the
//!   processor on file arrivals
//! - [`entity`] / [`entities`]: relation layouts per entity type
//!
//! # Example
//!
//! ```no_run
//! use dropsink_ingest::{config::Config, entities, pool::IngestPool};
//! use dropsink_ingest::processor::EntityProcessor;
//! use dropsink_ingest::watcher::Dispatcher;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = IngestPool::connect(&config.database).await?;
//!     let entity = entities::by_name("order").expect("built-in entity");
//!
//!     let dispatcher = Dispatcher::new(
//!         pool.clone(),
//!         EntityProcessor::new(entity),
//!         "./data/order",
//!         "*.csv",
//!     )?;
//!     let shutdown = CancellationToken::new();
//!     let handle = dispatcher.spawn(shutdown.clone());
//!
//!     tokio::signal::ctrl_c().await?;
//!     shutdown.cancel();
//!     handle.await?;
//!     pool.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entities;
pub mod entity;
pub mod pool;
pub mod processor;
pub mod watcher;
