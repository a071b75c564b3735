//! Metaforge - multi-provider title metadata resolver
//!
//! This library crate exposes the resolver, the image proxy and the HTTP
//! server for the binary and for integration testing.

pub mod baidu;
pub mod config;
pub mod fetch;
pub mod images;
pub mod keys;
pub mod locks;
pub mod metadata;
pub mod server;
pub mod services;
pub mod translate;
