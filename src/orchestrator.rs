//! Concurrent fan-out of artifacts to all enabled destinations

use futures::future;
use std::collections::HashSet;
use uuid::Uuid;

use crate::logging::*;
use crate::provider::ProviderSet;
use crate::types::{BackupArtifact, DispatchResult, DocumentKind};

/// Invoke `store` on every initialized provider concurrently and wait for
/// all of them to settle. A single provider failing (error or `false`)
/// never cancels its siblings; it only lowers the success count.
pub async fn dispatch(artifact: &BackupArtifact, providers: &ProviderSet) -> DispatchResult {
	let stores: Vec<_> = providers
		.enabled()
		.map(|provider| async move {
			match provider.store(artifact).await {
				Ok(true) => true,
				Ok(false) => {
					warn!("{}: rejected {}", provider.name(), artifact.document_id);
					false
				}
				Err(e) => {
					warn!("{}: store failed for {}: {}", provider.name(), artifact.document_id, e);
					false
				}
			}
		})
		.collect();

	let results = future::join_all(stores).await;
	DispatchResult {
		success: results.iter().filter(|accepted| **accepted).count(),
		total: results.len(),
	}
}

/// Cumulative counters for one full pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
	pub succeeded: usize,
	pub failed: usize,
	pub skipped: usize,
}

impl RunStats {
	/// The one-line summary surfaced to the notifier after a full run.
	pub fn summary(&self) -> String {
		format!("{} succeeded, {} failed, {} skipped", self.succeeded, self.failed, self.skipped)
	}
}

/// Per-run state of one full backup: counters plus the set of asset paths
/// already dispatched, so an asset referenced by several documents is
/// uploaded once. Reset by constructing a fresh run.
pub struct BackupRun {
	pub run_id: Uuid,
	pub stats: RunStats,
	seen_assets: HashSet<String>,
}

impl BackupRun {
	pub fn new() -> Self {
		BackupRun { run_id: Uuid::new_v4(), stats: RunStats::default(), seen_assets: HashSet::new() }
	}

	/// Register an artifact about to be dispatched; `false` means an
	/// equivalent asset was already processed in this run.
	pub fn claim(&mut self, kind: DocumentKind, relative_path: &str) -> bool {
		if kind != DocumentKind::Asset {
			return true;
		}
		self.seen_assets.insert(relative_path.to_string())
	}

	/// A document counts as succeeded when at least one provider accepted
	/// it; only a total miss counts as failed.
	pub fn record(&mut self, result: DispatchResult) {
		if result.success > 0 {
			self.stats.succeeded += 1;
		} else {
			self.stats.failed += 1;
		}
	}

	pub fn record_skip(&mut self) {
		self.stats.skipped += 1;
	}

	pub fn record_failure(&mut self) {
		self.stats.failed += 1;
	}
}

impl Default for BackupRun {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_run_stats_summary() {
		let stats = RunStats { succeeded: 4, failed: 1, skipped: 2 };
		assert_eq!(stats.summary(), "4 succeeded, 1 failed, 2 skipped");
	}

	#[test]
	fn test_asset_dedup_within_run() {
		let mut run = BackupRun::new();
		assert!(run.claim(DocumentKind::Asset, "assets/cat.png"));
		assert!(!run.claim(DocumentKind::Asset, "assets/cat.png"));
		assert!(run.claim(DocumentKind::Asset, "assets/dog.png"));
		// non-assets are never deduplicated
		assert!(run.claim(DocumentKind::Page, "pages/todo.md"));
		assert!(run.claim(DocumentKind::Page, "pages/todo.md"));
	}

	#[test]
	fn test_record_counts_partial_as_success() {
		let mut run = BackupRun::new();
		run.record(DispatchResult { success: 1, total: 3 });
		run.record(DispatchResult { success: 0, total: 3 });
		assert_eq!(run.stats.succeeded, 1);
		assert_eq!(run.stats.failed, 1);
	}
}

// vim: ts=4
