//! Unified configuration system for backr
//!
//! All configuration lives in a single `Config` struct. The priority
//! chain is:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (~/.backr/<profile>.toml or <profile>.json5)
//! 3. CLI flags (highest priority, applied in main)

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BackupError;

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

/// Unified configuration for backup and sync operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// RUNTIME & STATE MANAGEMENT
	// ========================================================================
	/// Home directory for backr state (~/.backr)
	pub backr_dir: PathBuf,

	/// Profile name for configuration isolation
	pub profile: String,

	// ========================================================================
	// COLLECTION
	// ========================================================================
	/// Logical collection name, used as the cross-provider key namespace
	pub collection_name: String,

	/// Root directory of the local document collection
	pub collection_dir: PathBuf,

	// ========================================================================
	// SCHEDULING
	// ========================================================================
	/// Quiescence window: total inactivity required before a buffered
	/// change set is processed (seconds)
	pub quiescence_window_secs: u64,

	// ========================================================================
	// RECONCILIATION
	// ========================================================================
	/// Timestamps closer than this are treated as equal (milliseconds)
	pub sync_tolerance_ms: u64,

	// ========================================================================
	// STORAGE KEYS
	// ========================================================================
	/// Prefix joined in front of every derived storage key
	pub key_prefix: String,

	// ========================================================================
	// EXCLUSION
	// ========================================================================
	/// Glob patterns for document names excluded from backup
	pub exclude_patterns: Vec<String>,

	// ========================================================================
	// OUTPUT & LOGGING
	// ========================================================================
	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,

	// ========================================================================
	// STORAGE DESTINATIONS
	// ========================================================================
	/// Configured storage destinations; each entry is tagged by kind
	pub providers: Vec<ProviderConfig>,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			backr_dir: std::env::var("HOME")
				.ok()
				.map(|h| PathBuf::from(h).join(".backr"))
				.unwrap_or_else(|| PathBuf::from(".backr")),
			profile: "default".to_string(),

			collection_name: "notes".to_string(),
			collection_dir: PathBuf::from("."),

			quiescence_window_secs: 15,
			sync_tolerance_ms: 5000,

			key_prefix: "backr".to_string(),

			exclude_patterns: vec![],

			log_level: "info".to_string(),

			providers: vec![],
		}
	}
}

impl Config {
	/// Load the profile's config file from `backr_dir`, falling back to
	/// defaults when no file exists. Both TOML and JSON5 are accepted.
	pub fn load(backr_dir: &std::path::Path, profile: &str) -> Result<Self, BackupError> {
		let toml_path = backr_dir.join(format!("{}.toml", profile));
		let json5_path = backr_dir.join(format!("{}.json5", profile));

		let mut config = if toml_path.exists() {
			let raw = std::fs::read_to_string(&toml_path)?;
			toml::from_str(&raw).map_err(|e| BackupError::InvalidConfig {
				message: format!("{}: {}", toml_path.display(), e),
			})?
		} else if json5_path.exists() {
			let raw = std::fs::read_to_string(&json5_path)?;
			json5::from_str(&raw).map_err(|e| BackupError::InvalidConfig {
				message: format!("{}: {}", json5_path.display(), e),
			})?
		} else {
			Config::default()
		};

		config.backr_dir = backr_dir.to_path_buf();
		config.profile = profile.to_string();
		Ok(config)
	}

	pub fn quiescence_window(&self) -> Duration {
		Duration::from_secs(self.quiescence_window_secs)
	}

	pub fn sync_tolerance(&self) -> chrono::Duration {
		chrono::Duration::milliseconds(self.sync_tolerance_ms as i64)
	}

	/// Compile the exclusion patterns into a matcher.
	pub fn exclusion_matcher(&self) -> Result<GlobSet, BackupError> {
		let mut builder = GlobSetBuilder::new();
		for pattern in &self.exclude_patterns {
			let glob = Glob::new(pattern).map_err(|e| BackupError::InvalidConfig {
				message: format!("Bad exclude pattern '{}': {}", pattern, e),
			})?;
			builder.add(glob);
		}
		builder.build().map_err(|e| BackupError::InvalidConfig {
			message: format!("Failed to compile exclude patterns: {}", e),
		})
	}
}

// ============================================================================
// PROVIDER CONFIGURATION
// ============================================================================

/// Storage destination kind. The set is closed: new backends are added
/// here and in the provider registry, never probed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
	ObjectStore,
	Webdav,
	Filesystem,
}

impl FromStr for ProviderKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"object-store" | "s3" => Ok(Self::ObjectStore),
			"webdav" | "dav" => Ok(Self::Webdav),
			"filesystem" | "fs" | "local" => Ok(Self::Filesystem),
			_ => Err(format!(
				"Unknown provider kind: {}. Valid options: object-store, webdav, filesystem",
				s
			)),
		}
	}
}

impl std::fmt::Display for ProviderKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::ObjectStore => write!(f, "object-store"),
			Self::Webdav => write!(f, "webdav"),
			Self::Filesystem => write!(f, "filesystem"),
		}
	}
}

/// Tagged configuration for one storage destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProviderConfig {
	ObjectStore(ObjectStoreConfig),
	Webdav(WebdavConfig),
	Filesystem(FilesystemConfig),
}

impl ProviderConfig {
	pub fn kind(&self) -> ProviderKind {
		match self {
			ProviderConfig::ObjectStore(_) => ProviderKind::ObjectStore,
			ProviderConfig::Webdav(_) => ProviderKind::Webdav,
			ProviderConfig::Filesystem(_) => ProviderKind::Filesystem,
		}
	}

	pub fn name(&self) -> &str {
		match self {
			ProviderConfig::ObjectStore(c) => &c.name,
			ProviderConfig::Webdav(c) => &c.name,
			ProviderConfig::Filesystem(c) => &c.name,
		}
	}

	pub fn enabled(&self) -> bool {
		match self {
			ProviderConfig::ObjectStore(c) => c.enabled,
			ProviderConfig::Webdav(c) => c.enabled,
			ProviderConfig::Filesystem(c) => c.enabled,
		}
	}
}

/// S3-compatible object storage destination (AWS, R2, MinIO)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectStoreConfig {
	pub name: String,
	pub enabled: bool,

	/// Endpoint URL (e.g. https://<account>.r2.cloudflarestorage.com)
	pub endpoint: String,
	pub region: String,
	pub bucket: String,
	pub access_key_id: String,
	pub secret_access_key: String,
}

impl Default for ObjectStoreConfig {
	fn default() -> Self {
		ObjectStoreConfig {
			name: "object-store".to_string(),
			enabled: true,
			endpoint: String::new(),
			region: "auto".to_string(),
			bucket: String::new(),
			access_key_id: String::new(),
			secret_access_key: String::new(),
		}
	}
}

/// WebDAV destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebdavConfig {
	pub name: String,
	pub enabled: bool,

	/// Base URL of the WebDAV share
	pub url: String,
	pub username: String,
	pub password: String,
}

impl Default for WebdavConfig {
	fn default() -> Self {
		WebdavConfig {
			name: "webdav".to_string(),
			enabled: true,
			url: String::new(),
			username: String::new(),
			password: String::new(),
		}
	}
}

/// Local or mounted directory destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilesystemConfig {
	pub name: String,
	pub enabled: bool,

	/// Root directory backups are written under
	pub root: PathBuf,
}

impl Default for FilesystemConfig {
	fn default() -> Self {
		FilesystemConfig { name: "filesystem".to_string(), enabled: true, root: PathBuf::new() }
	}
}


// vim: ts=4
