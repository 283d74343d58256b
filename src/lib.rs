//! # BackR - Debounced Multi-Destination Note Backup & Sync
//!
//! BackR watches a note collection, coalesces bursts of edits into a
//! single backup pass after a quiet period, fans each document out to any
//! number of storage destinations (S3-compatible object stores, WebDAV
//! shares, plain directories) in parallel, and reconciles local against
//! remote state by timestamp.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use backr::{BackupEngine, Config};
//! use backr::store::{FsDocumentStore, LogNotifier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = Arc::new(FsDocumentStore::new(config.collection_dir.clone()));
//!     let mut engine = BackupEngine::new(config, store, Arc::new(LogNotifier)).await?;
//!     let stats = engine.full_backup().await?;
//!     println!("{}", stats.summary());
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod catalog;
pub mod coalescer;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod reconcile;
pub mod store;
pub mod types;
pub mod watch;

// Re-export commonly used types and functions
pub use config::Config;
pub use engine::BackupEngine;
pub use error::{BackupError, ProviderError};
pub use types::{
	BackupArtifact, BackupMetadata, ChangeEvent, DispatchOutcome, DispatchResult, SyncDecision,
};

// vim: ts=4
