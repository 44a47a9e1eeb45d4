//! Tenant-partitioned metadata store for the hangar deployment service.
//!
//! This crate provides:
//! - Row models for artifacts, deployments, device deployments, logs,
//!   release notes, upload intents and storage settings
//! - Repository traits with atomic conditional status updates
//! - A SQLite implementation built on sqlx

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};
