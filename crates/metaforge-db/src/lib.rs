//! Metaforge-DB: record store, caches, and migrations
//!
//! This crate provides persistence for metaforge using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! # Example
//!
//! ```no_run
//! use metaforge_common::Record;
//! use metaforge_db::pool::{init_pool, get_conn};
//! use metaforge_db::queries::records;
//!
//! let pool = init_pool("/var/lib/metaforge/metaforge.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let record = Record::new("javbus", "https://www.javbus.com/ABC-123");
//! records::upsert_record(&conn, &record).unwrap();
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
