//! Shortener - link storage engine for a URL shortening service
//!
//! # Architecture
//! - `storage`: key generation, the `StorageBackend` contract and its memory,
//!   file-snapshot and relational implementations, batch/bulk-delete/snapshot
//!   coordination
//! - `services`: `LinkService`, the caller-facing facade
//! - `config`: static configuration (TOML + environment)
//! - `runtime`: startup (restore) and shutdown (save) lifecycle
//! - `system`: logging

pub mod cli;
pub mod config;
pub mod errors;
pub mod runtime;
pub mod services;
pub mod storage;
pub mod system;
