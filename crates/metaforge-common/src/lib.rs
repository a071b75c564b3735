//! Metaforge-Common: shared record types and utilities.
//!
//! This crate provides the vocabulary shared by the resolver and the store:
//!
//! - **Core Types**: search candidates, resolved records, image kinds
//! - **Path Utilities**: cover/sample classification and content types by extension
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use metaforge_common::{Record, Error, Result};
//! use metaforge_common::paths::is_cover_path;
//!
//! let record = Record::new("javbus", "https://www.javbus.com/ABC-123");
//! assert!(record.title.is_empty());
//!
//! assert!(is_cover_path("/pics/cover/abc_b.jpg"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::database("pool exhausted"))
//! }
//! ```

pub mod error;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
