/// Dispatch aggregation tests for the backup orchestrator
///
/// Providers are scripted to accept, reject or fail; the orchestrator must
/// wait for all of them, never let one failure cancel the others, and
/// classify the aggregate as full / partial / failed.
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use backr::config::ProviderKind;
use backr::error::{BackupError, ProviderError};
use backr::orchestrator::dispatch;
use backr::provider::{Provider, ProviderSet};
use backr::types::{
	BackupArtifact, BackupMetadata, DispatchOutcome, DocumentKind, FORMAT_VERSION,
};

#[derive(Clone, Copy)]
enum StoreScript {
	Accept,
	Reject,
	Fail,
}

struct ScriptedProvider {
	name: String,
	script: StoreScript,
	calls: Arc<AtomicUsize>,
}

impl ScriptedProvider {
	fn boxed(name: &str, script: StoreScript, calls: Arc<AtomicUsize>) -> Box<dyn Provider> {
		Box::new(ScriptedProvider { name: name.to_string(), script, calls })
	}
}

#[async_trait]
impl Provider for ScriptedProvider {
	fn name(&self) -> &str {
		&self.name
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::Filesystem
	}

	async fn initialize(&mut self) -> Result<bool, BackupError> {
		Ok(true)
	}

	async fn store(&self, _artifact: &BackupArtifact) -> Result<bool, BackupError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		match self.script {
			StoreScript::Accept => Ok(true),
			StoreScript::Reject => Ok(false),
			StoreScript::Fail => Err(ProviderError::request(&self.name, "connection reset").into()),
		}
	}

	async fn list(&self) -> Result<Vec<BackupMetadata>, BackupError> {
		Ok(Vec::new())
	}

	async fn fetch(&self, _key: &str) -> Result<Option<Vec<u8>>, BackupError> {
		Ok(None)
	}

	async fn erase(&self, _key: &str) -> Result<bool, BackupError> {
		Ok(false)
	}

	async fn last_modified(&self, _key: &str) -> Result<Option<String>, BackupError> {
		Ok(None)
	}
}

fn artifact() -> BackupArtifact {
	BackupArtifact {
		document_id: "pages/todo.md".to_string(),
		payload: b"- [ ] water the plants".to_vec(),
		metadata: BackupMetadata {
			timestamp: "2024-01-01T00:00:00Z".to_string(),
			format_version: FORMAT_VERSION,
			collection_name: "vault".to_string(),
			document_id: "pages/todo.md".to_string(),
			kind: DocumentKind::Page,
			relative_path: Some("pages/todo.md".to_string()),
			file_name: "todo.md".to_string(),
			size_bytes: 22,
		},
	}
}

fn set_of(scripts: &[StoreScript], calls: &Arc<AtomicUsize>) -> ProviderSet {
	let adapters = scripts
		.iter()
		.enumerate()
		.map(|(i, script)| ScriptedProvider::boxed(&format!("dest-{}", i), *script, calls.clone()))
		.collect();
	ProviderSet::from_initialized(adapters)
}

#[tokio::test]
async fn test_mixed_outcomes_classify_as_partial() {
	let calls = Arc::new(AtomicUsize::new(0));
	let providers =
		set_of(&[StoreScript::Accept, StoreScript::Fail, StoreScript::Accept], &calls);

	let result = dispatch(&artifact(), &providers).await;

	assert_eq!(result.success, 2);
	assert_eq!(result.total, 3);
	assert_eq!(result.outcome(), DispatchOutcome::Partial);
	// the failing provider did not cancel its siblings
	assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_all_accept_is_full() {
	let calls = Arc::new(AtomicUsize::new(0));
	let providers = set_of(&[StoreScript::Accept, StoreScript::Accept], &calls);

	let result = dispatch(&artifact(), &providers).await;
	assert_eq!(result.success, 2);
	assert_eq!(result.outcome(), DispatchOutcome::Full);
}

#[tokio::test]
async fn test_rejections_and_failures_count_alike() {
	let calls = Arc::new(AtomicUsize::new(0));
	let providers = set_of(&[StoreScript::Reject, StoreScript::Fail], &calls);

	let result = dispatch(&artifact(), &providers).await;
	assert_eq!(result.success, 0);
	assert_eq!(result.total, 2);
	assert_eq!(result.outcome(), DispatchOutcome::Failed);
}

#[tokio::test]
async fn test_empty_provider_set_is_failed() {
	let providers = ProviderSet::from_initialized(Vec::new());
	let result = dispatch(&artifact(), &providers).await;
	assert_eq!(result.total, 0);
	assert_eq!(result.outcome(), DispatchOutcome::Failed);
}

// vim: ts=4
