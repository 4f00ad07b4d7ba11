//! # ingestctl - whitelist-driven artifact registry replicator
//!
//! Replicates a whitelisted subset of charms and bundles from a source
//! artifact registry to a destination registry: channel publication state,
//! promulgated aliases, extra metadata, resources, and base-entity
//! permissions all carry over, via a concurrent, dependency-ordered transfer
//! pipeline.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ingestctl::config::{CliOverrides, Config};
//! use ingestctl::ingest::run_ingest;
//! use ingestctl::registry::http::HttpRegistryClient;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::resolve(CliOverrides::default())?;
//!     let src = Arc::new(HttpRegistryClient::new(&config.source));
//!     let dest = Arc::new(HttpRegistryClient::new(&config.dest));
//!     let stats = run_ingest(&config, src, dest).await?;
//!     println!("copied {} archives", stats.archives_copied_count);
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod config;
pub mod disk;
pub mod error;
pub mod id;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pool;
pub mod registry;
pub mod reopen;
pub mod scheduler;
pub mod stats;
pub mod whitelist;

pub use error::IngestError;
pub use id::EntityId;
pub use ingest::run_ingest;
pub use model::{Channel, EntityInfo, WhitelistBaseEntity};
pub use stats::IngestStats;

// vim: ts=4
