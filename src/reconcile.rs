//! Timestamp-based reconciliation of local documents against remote
//! catalogs
//!
//! For every (document, provider) pair the reconciler compares the local
//! modification time with the newest matching catalog entry and decides
//! push, pull or no-op. Comparison runs with a tolerance window so
//! near-simultaneous timestamps count as equal across clock skew.

use chrono::{DateTime, Duration, Utc};

use crate::artifact::ArtifactBuilder;
use crate::catalog::RemoteCatalog;
use crate::error::BackupError;
use crate::logging::*;
use crate::provider::{KeyContext, ProviderSet};
use crate::store::DocumentStore;
use crate::types::{BackupMetadata, DocumentInfo, SyncDecision};

/// Pure decision function over parsed timestamps.
pub fn decide(
	local: DateTime<Utc>,
	remote: Option<DateTime<Utc>>,
	tolerance: Duration,
) -> SyncDecision {
	match remote {
		None => SyncDecision::RemoteMissing,
		Some(remote) => {
			let delta = local - remote;
			if delta.abs() < tolerance {
				SyncDecision::Same
			} else if delta > Duration::zero() {
				SyncDecision::LocalNewer
			} else {
				SyncDecision::RemoteNewer
			}
		}
	}
}

/// Decision over the raw catalog timestamp. A malformed remote timestamp
/// lands on the push side: an extra upload is recoverable, overwriting
/// local edits with a wrongly-trusted remote copy is not.
pub fn decide_from_str(
	local: DateTime<Utc>,
	remote_timestamp: Option<&str>,
	tolerance: Duration,
) -> SyncDecision {
	match remote_timestamp {
		None => SyncDecision::RemoteMissing,
		Some(raw) => match DateTime::parse_from_rfc3339(raw) {
			Ok(remote) => decide(local, Some(remote.with_timezone(&Utc)), tolerance),
			Err(_) => SyncDecision::LocalNewer,
		},
	}
}

/// Newest catalog entry matching the document's resolved path. Exact
/// matches win; a suffix match covers legacy path variants that carried
/// extra leading directories.
pub fn find_latest_match<'a>(
	catalog: &'a [BackupMetadata],
	relative_path: &str,
) -> Option<&'a BackupMetadata> {
	let exact: Vec<&BackupMetadata> = catalog
		.iter()
		.filter(|m| m.relative_path.as_deref() == Some(relative_path))
		.collect();

	let candidates = if exact.is_empty() {
		let suffix = format!("/{}", relative_path);
		catalog
			.iter()
			.filter(|m| {
				m.relative_path.as_deref().map(|rel| rel.ends_with(&suffix)).unwrap_or(false)
			})
			.collect()
	} else {
		exact
	};

	candidates
		.into_iter()
		.max_by_key(|m| m.parsed_timestamp().unwrap_or(DateTime::<Utc>::MIN_UTC))
}

/// What was done for one (document, provider) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
	Push,
	Pull,
	Noop,
}

/// Outcome of reconciling one document against one provider
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
	pub provider: String,

	/// `None` when the provider's catalog was unavailable for this pass
	pub decision: Option<SyncDecision>,

	pub action: SyncAction,

	pub ok: bool,
}

/// Cumulative counters for one sync pass. Push/pull count per
/// (document, provider) action, not per document.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncStats {
	pub pushed: usize,
	pub pulled: usize,
	pub unchanged: usize,
	pub skipped: usize,
	pub failed: usize,
}

impl SyncStats {
	pub fn summary(&self) -> String {
		format!(
			"Sync complete: {} pushed, {} pulled, {} unchanged, {} skipped, {} failed",
			self.pushed, self.pulled, self.unchanged, self.skipped, self.failed
		)
	}
}

/// One reconciliation pass' view of the world
pub struct Reconciler<'a> {
	pub store: &'a dyn DocumentStore,
	pub builder: &'a ArtifactBuilder,
	pub ctx: KeyContext,
	pub tolerance: Duration,
}

impl Reconciler<'_> {
	/// Reconcile one document against every enabled provider.
	///
	/// `Filtered` and `NotFound` propagate to the caller, which treats
	/// them as skips for the whole document.
	pub async fn reconcile_document(
		&self,
		info: &DocumentInfo,
		providers: &ProviderSet,
		catalog: &mut RemoteCatalog,
	) -> Result<Vec<ReconcileOutcome>, BackupError> {
		let artifact = self.builder.build(self.store, &info.id).await?;
		let relative = artifact.metadata.relative_path.clone().unwrap_or_default();

		let mut outcomes = Vec::new();
		for provider in providers.enabled() {
			let matched = match catalog.get_or_fetch(provider).await {
				Ok(listing) => find_latest_match(listing, &relative).cloned(),
				Err(e) => {
					warn!("{}: cannot reconcile {}: {}", provider.name(), info.id, e);
					outcomes.push(ReconcileOutcome {
						provider: provider.name().to_string(),
						decision: None,
						action: SyncAction::Noop,
						ok: false,
					});
					continue;
				}
			};

			let decision = decide_from_str(
				info.modified_at,
				matched.as_ref().map(|m| m.timestamp.as_str()),
				self.tolerance,
			);

			let (action, ok) = match decision {
				SyncDecision::Same => (SyncAction::Noop, true),
				SyncDecision::RemoteMissing | SyncDecision::LocalNewer => {
					match provider.store(&artifact).await {
						Ok(accepted) => (SyncAction::Push, accepted),
						Err(e) => {
							warn!("{}: push failed for {}: {}", provider.name(), info.id, e);
							(SyncAction::Push, false)
						}
					}
				}
				SyncDecision::RemoteNewer => {
					// decision implies a matched entry exists
					let key = match &matched {
						Some(meta) => self.ctx.key_for(meta),
						None => continue,
					};
					match provider.fetch(&key).await {
						Ok(Some(bytes)) => {
							match self.store.update_document(&info.id, &bytes).await {
								Ok(()) => (SyncAction::Pull, true),
								Err(e) => {
									warn!("Writing pulled content for {} failed: {}", info.id, e);
									(SyncAction::Pull, false)
								}
							}
						}
						// listed but gone by fetch time: skip, not failure
						Ok(None) => {
							debug!("{}: {} vanished before pull", provider.name(), key);
							(SyncAction::Noop, true)
						}
						Err(e) => {
							warn!("{}: pull failed for {}: {}", provider.name(), info.id, e);
							(SyncAction::Pull, false)
						}
					}
				}
			};

			outcomes.push(ReconcileOutcome {
				provider: provider.name().to_string(),
				decision: Some(decision),
				action,
				ok,
			});
		}

		Ok(outcomes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{DocumentKind, FORMAT_VERSION};
	use chrono::TimeZone;

	fn t(secs: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, secs).unwrap()
	}

	#[test]
	fn test_decide_tolerance_window() {
		let tolerance = Duration::milliseconds(5000);
		assert_eq!(decide(t(10), Some(t(13)), tolerance), SyncDecision::Same);
		assert_eq!(decide(t(10), Some(t(18)), tolerance), SyncDecision::RemoteNewer);
		assert_eq!(decide(t(10), Some(t(2)), tolerance), SyncDecision::LocalNewer);
		assert_eq!(decide(t(10), None, tolerance), SyncDecision::RemoteMissing);
	}

	#[test]
	fn test_decide_from_str_malformed_is_local_newer() {
		let tolerance = Duration::milliseconds(5000);
		assert_eq!(
			decide_from_str(t(10), Some("yesterday-ish"), tolerance),
			SyncDecision::LocalNewer
		);
		assert_eq!(decide_from_str(t(10), None, tolerance), SyncDecision::RemoteMissing);
		assert_eq!(
			decide_from_str(t(10), Some("2024-01-01T12:00:11+00:00"), tolerance),
			SyncDecision::Same
		);
	}

	fn entry(relative_path: &str, timestamp: &str) -> BackupMetadata {
		BackupMetadata {
			timestamp: timestamp.to_string(),
			format_version: FORMAT_VERSION,
			collection_name: "vault".to_string(),
			document_id: relative_path.to_string(),
			kind: DocumentKind::Page,
			relative_path: Some(relative_path.to_string()),
			file_name: relative_path.rsplit('/').next().unwrap_or_default().to_string(),
			size_bytes: 1,
		}
	}

	#[test]
	fn test_find_latest_match_prefers_exact() {
		let catalog = vec![
			entry("pages/todo.md", "2024-01-01T00:00:00Z"),
			entry("old/pages/todo.md", "2024-06-01T00:00:00Z"),
		];
		let found = find_latest_match(&catalog, "pages/todo.md").unwrap();
		assert_eq!(found.relative_path.as_deref(), Some("pages/todo.md"));
	}

	#[test]
	fn test_find_latest_match_suffix_fallback() {
		let catalog = vec![
			entry("old/pages/todo.md", "2024-01-01T00:00:00Z"),
			entry("older/pages/todo.md", "2023-01-01T00:00:00Z"),
		];
		let found = find_latest_match(&catalog, "pages/todo.md").unwrap();
		assert_eq!(found.relative_path.as_deref(), Some("old/pages/todo.md"));
		assert!(find_latest_match(&catalog, "pages/other.md").is_none());
	}

	#[test]
	fn test_find_latest_match_picks_newest() {
		let catalog = vec![
			entry("pages/todo.md", "2024-01-01T00:00:00Z"),
			entry("pages/todo.md", "2024-03-01T00:00:00Z"),
			entry("pages/todo.md", "garbled"),
		];
		let found = find_latest_match(&catalog, "pages/todo.md").unwrap();
		assert_eq!(found.timestamp, "2024-03-01T00:00:00Z");
	}
}

// vim: ts=4
