/// Filesystem provider round-trip tests over real temporary directories
///
/// Also exercises the whole engine against two on-disk destinations,
/// which is the closest thing to a production run that needs no network.
use filetime::FileTime;
use std::sync::Arc;
use tempfile::TempDir;

use backr::config::{Config, FilesystemConfig, ProviderConfig};
use backr::engine::BackupEngine;
use backr::provider::{FilesystemProvider, KeyContext, Provider, ProviderSet};
use backr::store::{FsDocumentStore, LogNotifier};
use backr::types::{BackupArtifact, BackupMetadata, DocumentKind, FORMAT_VERSION};

fn ctx() -> KeyContext {
	KeyContext { prefix: "backr".to_string(), collection: "vault".to_string() }
}

fn artifact(relative_path: &str, payload: &[u8], timestamp: &str) -> BackupArtifact {
	BackupArtifact {
		document_id: relative_path.to_string(),
		payload: payload.to_vec(),
		metadata: BackupMetadata {
			timestamp: timestamp.to_string(),
			format_version: FORMAT_VERSION,
			collection_name: "vault".to_string(),
			document_id: relative_path.to_string(),
			kind: DocumentKind::Page,
			relative_path: Some(relative_path.to_string()),
			file_name: relative_path.rsplit('/').next().unwrap_or_default().to_string(),
			size_bytes: payload.len() as u64,
		},
	}
}

async fn ready_provider(root: &TempDir) -> FilesystemProvider {
	let config = FilesystemConfig {
		name: "disk".to_string(),
		enabled: true,
		root: root.path().to_path_buf(),
	};
	let mut provider = FilesystemProvider::new(config, ctx());
	assert!(provider.initialize().await.unwrap());
	provider
}

#[tokio::test]
async fn test_store_list_fetch_erase_round_trip() {
	let root = TempDir::new().unwrap();
	let provider = ready_provider(&root).await;

	let artifact = artifact("pages/todo.md", b"- [ ] sharpen axe", "2024-06-01T10:00:00Z");
	assert!(provider.store(&artifact).await.unwrap());

	// payload and manifest land under the derived key
	let payload_path = root.path().join("backr/vault/pages/todo.md");
	assert!(payload_path.exists());
	assert!(root.path().join("backr/vault/pages/todo.md.meta").exists());

	// listing returns the manifest's metadata, not a synthesized record
	let listing = provider.list().await.unwrap();
	assert_eq!(listing.len(), 1);
	assert_eq!(listing[0], artifact.metadata);

	let fetched = provider.fetch("backr/vault/pages/todo.md").await.unwrap();
	assert_eq!(fetched.as_deref(), Some(b"- [ ] sharpen axe".as_ref()));
	assert!(provider.fetch("backr/vault/pages/missing.md").await.unwrap().is_none());

	assert!(provider.erase("backr/vault/pages/todo.md").await.unwrap());
	assert!(!provider.erase("backr/vault/pages/todo.md").await.unwrap());
	assert!(provider.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_synthesizes_when_manifest_is_missing() {
	let root = TempDir::new().unwrap();
	let provider = ready_provider(&root).await;

	let artifact = artifact("pages/orphan.md", b"no manifest", "2024-06-01T10:00:00Z");
	provider.store(&artifact).await.unwrap();

	let payload_path = root.path().join("backr/vault/pages/orphan.md");
	std::fs::remove_file(root.path().join("backr/vault/pages/orphan.md.meta")).unwrap();
	filetime::set_file_mtime(&payload_path, FileTime::from_unix_time(1_717_236_000, 0)).unwrap();

	let listing = provider.list().await.unwrap();
	assert_eq!(listing.len(), 1);
	assert_eq!(listing[0].relative_path.as_deref(), Some("pages/orphan.md"));
	assert_eq!(listing[0].kind, DocumentKind::Page);
	assert_eq!(listing[0].size_bytes, 11);
	// timestamp comes from the file's mtime
	assert_eq!(listing[0].timestamp, "2024-06-01T10:00:00Z");
}

#[tokio::test]
async fn test_last_modified_tracks_mtime() {
	let root = TempDir::new().unwrap();
	let provider = ready_provider(&root).await;

	let artifact = artifact("pages/todo.md", b"x", "2024-06-01T10:00:00Z");
	provider.store(&artifact).await.unwrap();
	filetime::set_file_mtime(
		root.path().join("backr/vault/pages/todo.md"),
		FileTime::from_unix_time(1_717_236_000, 0),
	)
	.unwrap();

	let modified = provider.last_modified("backr/vault/pages/todo.md").await.unwrap();
	assert_eq!(modified.as_deref(), Some("2024-06-01T10:00:00Z"));
	assert!(provider.last_modified("backr/vault/nope.md").await.unwrap().is_none());
}

#[tokio::test]
async fn test_engine_fans_out_to_two_disk_destinations() {
	let collection = TempDir::new().unwrap();
	std::fs::create_dir_all(collection.path().join("pages")).unwrap();
	std::fs::create_dir_all(collection.path().join("journals")).unwrap();
	std::fs::write(collection.path().join("pages/Boat Notes.md"), "rowing").unwrap();
	std::fs::write(collection.path().join("journals/2024-06-01.md"), "sunny").unwrap();

	let dest_a = TempDir::new().unwrap();
	let dest_b = TempDir::new().unwrap();

	let mut config = Config::default();
	config.collection_name = "vault".to_string();
	config.collection_dir = collection.path().to_path_buf();
	config.key_prefix = "backr".to_string();
	config.providers = vec![
		ProviderConfig::Filesystem(FilesystemConfig {
			name: "disk-a".to_string(),
			enabled: true,
			root: dest_a.path().to_path_buf(),
		}),
		ProviderConfig::Filesystem(FilesystemConfig {
			name: "disk-b".to_string(),
			enabled: true,
			root: dest_b.path().to_path_buf(),
		}),
	];

	let store = Arc::new(FsDocumentStore::new(collection.path().to_path_buf()));
	let mut engine =
		BackupEngine::new(config, store, Arc::new(LogNotifier)).await.expect("engine");

	let stats = engine.full_backup().await.expect("full backup");
	assert_eq!(stats.succeeded, 2);
	assert_eq!(stats.failed, 0);

	for dest in [&dest_a, &dest_b] {
		assert!(dest.path().join("backr/vault/pages/boat_notes.md").exists());
		assert!(dest.path().join("backr/vault/journals/2024_06_01.md").exists());
	}
}

#[tokio::test]
async fn test_reconfigure_reports_touched_providers() {
	let dest_a = TempDir::new().unwrap();
	let dest_b = TempDir::new().unwrap();

	let mut config = Config::default();
	config.collection_name = "vault".to_string();
	config.providers = vec![ProviderConfig::Filesystem(FilesystemConfig {
		name: "disk-a".to_string(),
		enabled: true,
		root: dest_a.path().to_path_buf(),
	})];

	let mut providers = ProviderSet::build(&config).await;
	assert_eq!(providers.enabled_count(), 1);

	// unchanged config: nothing is re-initialized
	let touched = providers.reconfigure(&config).await;
	assert!(touched.is_empty());

	// moving the root re-initializes that provider
	config.providers = vec![ProviderConfig::Filesystem(FilesystemConfig {
		name: "disk-a".to_string(),
		enabled: true,
		root: dest_b.path().to_path_buf(),
	})];
	let touched = providers.reconfigure(&config).await;
	assert_eq!(touched, vec!["disk-a".to_string()]);

	// dropping it reports it as touched so its catalog entry is cleared
	config.providers = vec![];
	let touched = providers.reconfigure(&config).await;
	assert_eq!(touched, vec!["disk-a".to_string()]);
	assert!(providers.is_empty());
}

// vim: ts=4
