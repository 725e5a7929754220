//! Dropsink Common Library
//!
//! Shared error handling, logging bootstrap, and file-digest utilities used
//! by the dropsink workspace members.
//!
//! # Example
//!
//! ```no_run
//! use dropsink_common::digest::content_digest;
//! use dropsink_common::Result;
//!
//! fn already_seen(path: &str) -> Result<String> {
//!     let digest = content_digest(path)?;
//!     Ok(digest)
//! }
//! ```

pub mod digest;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{DropsinkError, Result};
