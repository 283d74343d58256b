//! Top-level backup engine: wires the store, builder, providers, catalog
//! and reconciler together and exposes the operations the CLI (and the
//! coalescer) trigger.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::artifact::ArtifactBuilder;
use crate::catalog::RemoteCatalog;
use crate::coalescer::PassHandler;
use crate::config::Config;
use crate::error::BackupError;
use crate::logging::*;
use crate::orchestrator::{dispatch, BackupRun, RunStats};
use crate::provider::{KeyContext, ProviderSet};
use crate::reconcile::{Reconciler, SyncAction, SyncStats};
use crate::store::{DocumentStore, Notifier, NotifyLevel};
use crate::types::{ChangeEvent, DispatchOutcome, DispatchResult, DocumentId};

pub struct BackupEngine {
	config: Config,
	store: Arc<dyn DocumentStore>,
	notifier: Arc<dyn Notifier>,
	providers: ProviderSet,
	builder: ArtifactBuilder,
	catalog: RemoteCatalog,
}

impl BackupEngine {
	/// Build the engine and initialize every enabled provider. Warns (but
	/// does not fail) when zero destinations survive initialization.
	pub async fn new(
		config: Config,
		store: Arc<dyn DocumentStore>,
		notifier: Arc<dyn Notifier>,
	) -> Result<Self, BackupError> {
		let builder = ArtifactBuilder::new(&config)?;
		let providers = ProviderSet::build(&config).await;
		if providers.is_empty() {
			notifier.notify(
				"No backup destinations are enabled; documents will not be backed up",
				NotifyLevel::Warning,
			);
		}
		Ok(BackupEngine {
			config,
			store,
			notifier,
			providers,
			builder,
			catalog: RemoteCatalog::new(),
		})
	}

	/// Test seam: assemble an engine around pre-built providers.
	pub fn with_providers(
		config: Config,
		store: Arc<dyn DocumentStore>,
		notifier: Arc<dyn Notifier>,
		providers: ProviderSet,
	) -> Result<Self, BackupError> {
		let builder = ArtifactBuilder::new(&config)?;
		Ok(BackupEngine {
			config,
			store,
			notifier,
			providers,
			builder,
			catalog: RemoteCatalog::new(),
		})
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	fn ensure_ready(&self) -> Result<(), BackupError> {
		if self.providers.is_empty() {
			return Err(BackupError::fatal("No backup destinations are enabled"));
		}
		Ok(())
	}

	/// Back up every eligible document to every destination. Emits one
	/// summary notification for the whole run.
	pub async fn full_backup(&mut self) -> Result<RunStats, BackupError> {
		self.ensure_ready()?;
		let docs = self.store.list_documents().await?;

		let mut run = BackupRun::new();
		info!("[run {}] Starting full backup of {} documents", run.run_id, docs.len());
		for doc in &docs {
			self.backup_one(&doc.id, &mut run).await;
		}

		let level =
			if run.stats.failed == 0 { NotifyLevel::Success } else { NotifyLevel::Warning };
		self.notifier.notify(&run.stats.summary(), level);
		info!("[run {}] Full backup finished: {}", run.run_id, run.stats.summary());
		Ok(run.stats)
	}

	/// Back up the documents touched by a coalesced burst of changes.
	/// Invoked by the pass handler; same per-run bookkeeping as a full
	/// backup, restricted to the resolved documents.
	pub async fn backup_changed(
		&mut self,
		events: Vec<ChangeEvent>,
	) -> Result<RunStats, BackupError> {
		self.ensure_ready()?;
		let ids = resolve_documents(self.store.as_ref(), &events);
		if ids.is_empty() {
			debug!("Change burst resolved to no documents");
			return Ok(RunStats::default());
		}

		let mut run = BackupRun::new();
		info!("[run {}] Backing up {} changed documents", run.run_id, ids.len());
		for id in &ids {
			self.backup_one(id, &mut run).await;
		}

		let level =
			if run.stats.failed == 0 { NotifyLevel::Success } else { NotifyLevel::Warning };
		self.notifier.notify(&run.stats.summary(), level);
		Ok(run.stats)
	}

	async fn backup_one(&self, id: &str, run: &mut BackupRun) {
		match self.builder.build(self.store.as_ref(), id).await {
			Ok(artifact) => {
				let relative = artifact.metadata.relative_path.clone().unwrap_or_default();
				if !run.claim(artifact.metadata.kind, &relative) {
					debug!("Asset {} already processed in this run", relative);
					return;
				}
				let result = dispatch(&artifact, &self.providers).await;
				if result.outcome() != DispatchOutcome::Full {
					warn!(
						"Dispatch of {} was {}: {}/{} destinations",
						id,
						result.outcome(),
						result.success,
						result.total
					);
				}
				run.record(result);
			}
			Err(e) if e.is_skip() => {
				debug!("Skipping {}: {}", id, e);
				run.record_skip();
			}
			Err(e) => {
				warn!("Backup failed for {}: {}", id, e);
				run.record_failure();
			}
		}
	}

	/// Manual single-document path. Notifies per document instead of per
	/// run, including the skip case.
	pub async fn backup_document(&self, id: &str) -> Result<DispatchResult, BackupError> {
		self.ensure_ready()?;
		match self.builder.build(self.store.as_ref(), id).await {
			Ok(artifact) => {
				let result = dispatch(&artifact, &self.providers).await;
				let (message, level) = match result.outcome() {
					DispatchOutcome::Full => (
						format!("Backed up {} to {} destination(s)", id, result.total),
						NotifyLevel::Success,
					),
					DispatchOutcome::Partial => (
						format!(
							"Backed up {} to {} of {} destinations",
							id, result.success, result.total
						),
						NotifyLevel::Warning,
					),
					DispatchOutcome::Failed => (
						format!("Backup of {} failed on all {} destination(s)", id, result.total),
						NotifyLevel::Error,
					),
				};
				self.notifier.notify(&message, level);
				Ok(result)
			}
			Err(e) if e.is_skip() => {
				self.notifier.notify(&format!("{}", e), NotifyLevel::Info);
				Err(e)
			}
			Err(e) => Err(e),
		}
	}

	/// Bidirectional reconciliation of every document against every
	/// destination, through one catalog that lives exactly as long as the
	/// pass.
	pub async fn sync_all(&mut self) -> Result<SyncStats, BackupError> {
		self.ensure_ready()?;
		let docs = self.store.list_documents().await?;

		let run_id = Uuid::new_v4();
		info!("[run {}] Starting sync pass over {} documents", run_id, docs.len());

		let Self { config, store, notifier, providers, builder, catalog } = self;
		let reconciler = Reconciler {
			store: store.as_ref(),
			builder,
			ctx: KeyContext::from_config(config),
			tolerance: config.sync_tolerance(),
		};

		let mut stats = SyncStats::default();
		for doc in &docs {
			match reconciler.reconcile_document(doc, providers, catalog).await {
				Ok(outcomes) => {
					for outcome in outcomes {
						match (outcome.action, outcome.ok) {
							(SyncAction::Push, true) => {
								stats.pushed += 1;
								notifier.notify(
									&format!("Pushed {} to {}", doc.id, outcome.provider),
									NotifyLevel::Info,
								);
							}
							(SyncAction::Pull, true) => {
								stats.pulled += 1;
								notifier.notify(
									&format!("Pulled {} from {}", doc.id, outcome.provider),
									NotifyLevel::Info,
								);
							}
							(SyncAction::Noop, true) => stats.unchanged += 1,
							(_, false) => stats.failed += 1,
						}
					}
				}
				Err(e) if e.is_skip() => {
					debug!("Skipping {}: {}", doc.id, e);
					stats.skipped += 1;
				}
				Err(e) => {
					warn!("Reconciliation failed for {}: {}", doc.id, e);
					stats.failed += 1;
				}
			}
		}

		catalog.clear();
		let level = if stats.failed == 0 { NotifyLevel::Success } else { NotifyLevel::Warning };
		notifier.notify(&stats.summary(), level);
		info!("[run {}] {}", run_id, stats.summary());
		Ok(stats)
	}

	/// Swap in a new configuration. Only providers whose settings changed
	/// are re-initialized, and only their catalog entries are dropped.
	pub async fn apply_settings(&mut self, config: Config) -> Result<(), BackupError> {
		self.builder = ArtifactBuilder::new(&config)?;
		let touched = self.providers.reconfigure(&config).await;
		for name in &touched {
			self.catalog.invalidate(name);
		}
		self.config = config;
		if self.providers.is_empty() {
			self.notifier.notify(
				"No backup destinations are enabled; documents will not be backed up",
				NotifyLevel::Warning,
			);
		}
		Ok(())
	}

	/// Listing of each destination's catalog, for the CLI `list` command.
	pub async fn list_remote(&self) -> Vec<(String, Result<usize, BackupError>)> {
		let mut out = Vec::new();
		for provider in self.providers.enabled() {
			let result = provider.list().await.map(|listing| listing.len());
			out.push((provider.name().to_string(), result));
		}
		out
	}
}

/// Resolve a burst of change events to an ordered, deduplicated list of
/// document ids. First-seen order is kept: documents are processed in the
/// order their changes were observed.
pub fn resolve_documents(store: &dyn DocumentStore, events: &[ChangeEvent]) -> Vec<DocumentId> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();
	for event in events {
		let id = event
			.document_id
			.clone()
			.or_else(|| event.path.as_deref().and_then(|p| store.document_id_for_path(p)));
		if let Some(id) = id {
			if seen.insert(id.clone()) {
				out.push(id);
			}
		}
	}
	out
}

/// Bridges the coalescer to the engine: each quiescent burst becomes one
/// changed-documents backup pass.
pub struct EnginePassHandler {
	engine: Arc<Mutex<BackupEngine>>,
}

impl EnginePassHandler {
	pub fn new(engine: Arc<Mutex<BackupEngine>>) -> Self {
		EnginePassHandler { engine }
	}
}

#[async_trait]
impl PassHandler for EnginePassHandler {
	async fn run_pass(&self, changes: Vec<ChangeEvent>) -> Result<(), BackupError> {
		let mut engine = self.engine.lock().await;
		engine.backup_changed(changes).await.map(|_| ())
	}
}

// vim: ts=4
