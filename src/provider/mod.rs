//! Storage provider contract shared by all backup destinations
//!
//! Every destination implements the `Provider` trait; the engine only ever
//! talks to the trait. The set of backends is closed (see
//! `config::ProviderKind`) and adapters are built by the registry below,
//! never probed at runtime.
//!
//! Key derivation is a pure function shared by all backends so that the
//! same artifact lands on the same key everywhere.

use async_trait::async_trait;

use crate::config::{Config, ProviderConfig, ProviderKind};
use crate::error::BackupError;
use crate::logging::*;
use crate::types::{BackupArtifact, BackupMetadata, DocumentKind, FORMAT_VERSION};

pub mod filesystem;
pub mod object_store;
pub mod webdav;

pub use filesystem::FilesystemProvider;
pub use object_store::ObjectStoreProvider;
pub use webdav::WebdavProvider;

/// Suffix of the JSON manifest stored next to every payload
pub const MANIFEST_SUFFIX: &str = ".meta";

/// Capability contract every storage destination implements
#[async_trait]
pub trait Provider: Send + Sync {
	/// Stable identity used for catalog keys and logs
	fn name(&self) -> &str;

	fn kind(&self) -> ProviderKind;

	/// Validate configuration and prepare the backend. `Ok(false)` means
	/// incomplete configuration: the provider is skipped without aborting
	/// startup. `Err` is reserved for unexpected failures.
	async fn initialize(&mut self) -> Result<bool, BackupError>;

	/// Write payload and manifest under the derived key. Overwrites are
	/// idempotent by design.
	async fn store(&self, artifact: &BackupArtifact) -> Result<bool, BackupError>;

	/// Enumerate existing backups under the configured prefix. Always a
	/// fresh remote query; memoization lives in `RemoteCatalog`.
	async fn list(&self) -> Result<Vec<BackupMetadata>, BackupError>;

	/// Read a payload back; `None` when the key does not exist.
	async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, BackupError>;

	/// Remove a stored backup; `false` when the key did not exist.
	async fn erase(&self, key: &str) -> Result<bool, BackupError>;

	/// Backend's view of the key's modification time, RFC 3339.
	async fn last_modified(&self, key: &str) -> Result<Option<String>, BackupError>;
}

/// Key namespace shared by every provider of one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyContext {
	pub prefix: String,
	pub collection: String,
}

impl KeyContext {
	pub fn from_config(config: &Config) -> Self {
		KeyContext {
			prefix: config.key_prefix.clone(),
			collection: config.collection_name.clone(),
		}
	}

	pub fn key_for(&self, metadata: &BackupMetadata) -> String {
		derive_key(&self.prefix, &self.collection, metadata)
	}

	/// Collection-relative path of a full storage key, when the key
	/// belongs to this namespace.
	pub fn relative_of(&self, key: &str) -> Option<String> {
		let mut rest = key;
		let prefix = self.prefix.trim_matches('/');
		if !prefix.is_empty() {
			rest = rest.strip_prefix(prefix)?.strip_prefix('/')?;
		}
		rest = rest.strip_prefix(self.collection.as_str())?.strip_prefix('/')?;
		if rest.is_empty() {
			None
		} else {
			Some(rest.to_string())
		}
	}

	/// Root all keys of this namespace live under, with a trailing slash.
	pub fn root(&self) -> String {
		let prefix = self.prefix.trim_matches('/');
		if prefix.is_empty() {
			format!("{}/", self.collection)
		} else {
			format!("{}/{}/", prefix, self.collection)
		}
	}
}

/// Derive the storage key for an artifact. Identical across providers:
/// two artifacts with the same relative path and collection are the same
/// logical object on every destination.
pub fn derive_key(prefix: &str, collection: &str, metadata: &BackupMetadata) -> String {
	let collection_prefix = format!("{}/", collection);
	let body = match metadata.relative_path.as_deref() {
		Some(rel) if rel.starts_with(&collection_prefix) => rel.to_string(),
		Some(rel) => format!("{}/{}", collection, rel),
		None => {
			format!("{}/backups/{}.archive", collection, sanitize_timestamp(&metadata.timestamp))
		}
	};
	let prefix = prefix.trim_matches('/');
	if prefix.is_empty() {
		body
	} else {
		format!("{}/{}", prefix, body)
	}
}

fn sanitize_timestamp(timestamp: &str) -> String {
	timestamp.chars().map(|c| if c == ':' || c == '+' { '-' } else { c }).collect()
}

pub(crate) fn manifest_key(key: &str) -> String {
	format!("{}{}", key, MANIFEST_SUFFIX)
}

pub(crate) fn is_manifest_key(key: &str) -> bool {
	key.ends_with(MANIFEST_SUFFIX)
}

pub(crate) fn encode_manifest(metadata: &BackupMetadata) -> Result<Vec<u8>, BackupError> {
	Ok(serde_json::to_vec_pretty(metadata)?)
}

/// Catalog entry for a key whose manifest is missing or unreadable: the
/// listing itself still tells us the path, size and store time.
pub(crate) fn synthesize_metadata(
	ctx: &KeyContext,
	key: &str,
	timestamp: Option<String>,
	size_bytes: u64,
) -> Option<BackupMetadata> {
	let relative = ctx.relative_of(key)?;
	let kind = match relative.split('/').next() {
		Some("journals") => DocumentKind::Journal,
		Some("pages") => DocumentKind::Page,
		_ => DocumentKind::Asset,
	};
	let file_name = relative.rsplit('/').next().unwrap_or(&relative).to_string();
	Some(BackupMetadata {
		timestamp: timestamp.unwrap_or_default(),
		format_version: FORMAT_VERSION,
		collection_name: ctx.collection.clone(),
		document_id: relative.clone(),
		kind,
		relative_path: Some(relative),
		file_name,
		size_bytes,
	})
}

// ============================================================================
// REGISTRY
// ============================================================================

/// One constructed destination plus its initialization outcome
pub struct ProviderEntry {
	config: ProviderConfig,
	pub adapter: Box<dyn Provider>,
	pub initialized: bool,
}

/// The engine's set of constructed providers
pub struct ProviderSet {
	ctx: KeyContext,
	entries: Vec<ProviderEntry>,
}

impl ProviderSet {
	/// Construct and initialize adapters for every enabled provider in
	/// the configuration.
	pub async fn build(config: &Config) -> Self {
		let mut set = ProviderSet { ctx: KeyContext::from_config(config), entries: Vec::new() };
		for provider_config in config.providers.iter().filter(|p| p.enabled()) {
			let adapter = make_adapter(&set.ctx, provider_config);
			set.push_initialized(provider_config.clone(), adapter).await;
		}
		set
	}

	/// Wrap already-initialized adapters. Test seam: lets integration
	/// tests inject scripted providers without any configuration.
	pub fn from_initialized(adapters: Vec<Box<dyn Provider>>) -> Self {
		let ctx = KeyContext { prefix: String::new(), collection: String::new() };
		let entries = adapters
			.into_iter()
			.map(|adapter| ProviderEntry {
				config: ProviderConfig::Filesystem(Default::default()),
				adapter,
				initialized: true,
			})
			.collect();
		ProviderSet { ctx, entries }
	}

	async fn push_initialized(&mut self, config: ProviderConfig, mut adapter: Box<dyn Provider>) {
		let initialized = match adapter.initialize().await {
			Ok(true) => {
				info!("Provider {} ready", adapter.name());
				true
			}
			Ok(false) => {
				warn!("Provider {} skipped: incomplete configuration", adapter.name());
				false
			}
			Err(e) => {
				warn!("Provider {} failed to initialize: {}", adapter.name(), e);
				false
			}
		};
		self.entries.push(ProviderEntry { config, adapter, initialized });
	}

	/// Rebuild the set for a new configuration, reusing adapters whose
	/// provider config is unchanged. Returns the names whose adapters
	/// were re-initialized or dropped; their catalog entries are stale.
	pub async fn reconfigure(&mut self, config: &Config) -> Vec<String> {
		let new_ctx = KeyContext::from_config(config);
		let ctx_changed = new_ctx != self.ctx;
		self.ctx = new_ctx;

		let mut old: Vec<ProviderEntry> = self.entries.drain(..).collect();
		let mut touched = Vec::new();

		for provider_config in config.providers.iter().filter(|p| p.enabled()) {
			if !ctx_changed {
				if let Some(pos) = old.iter().position(|e| &e.config == provider_config) {
					self.entries.push(old.remove(pos));
					continue;
				}
			}
			// a replaced same-name entry is re-initialized, not dropped
			old.retain(|e| e.adapter.name() != provider_config.name());
			let adapter = make_adapter(&self.ctx, provider_config);
			touched.push(provider_config.name().to_string());
			self.push_initialized(provider_config.clone(), adapter).await;
		}

		for dropped in old {
			touched.push(dropped.adapter.name().to_string());
		}
		touched
	}

	/// Providers that passed initialization, in configuration order.
	pub fn enabled(&self) -> impl Iterator<Item = &dyn Provider> {
		self.entries.iter().filter(|e| e.initialized).map(|e| e.adapter.as_ref())
	}

	pub fn enabled_count(&self) -> usize {
		self.entries.iter().filter(|e| e.initialized).count()
	}

	pub fn is_empty(&self) -> bool {
		self.enabled_count() == 0
	}
}

fn make_adapter(ctx: &KeyContext, config: &ProviderConfig) -> Box<dyn Provider> {
	match config {
		ProviderConfig::ObjectStore(c) => {
			Box::new(ObjectStoreProvider::new(c.clone(), ctx.clone()))
		}
		ProviderConfig::Webdav(c) => Box::new(WebdavProvider::new(c.clone(), ctx.clone())),
		ProviderConfig::Filesystem(c) => Box::new(FilesystemProvider::new(c.clone(), ctx.clone())),
	}
}


// vim: ts=4
