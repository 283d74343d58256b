//! Local or mounted directory destination

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};

use super::{
	encode_manifest, is_manifest_key, manifest_key, synthesize_metadata, KeyContext, Provider,
};
use crate::config::{FilesystemConfig, ProviderKind};
use crate::error::BackupError;
use crate::logging::*;
use crate::types::{BackupArtifact, BackupMetadata};

pub struct FilesystemProvider {
	config: FilesystemConfig,
	ctx: KeyContext,
}

impl FilesystemProvider {
	pub fn new(config: FilesystemConfig, ctx: KeyContext) -> Self {
		FilesystemProvider { config, ctx }
	}

	fn path_for(&self, key: &str) -> PathBuf {
		self.config.root.join(key)
	}

	fn key_of(&self, path: &Path) -> Option<String> {
		let rel = path.strip_prefix(&self.config.root).ok()?;
		let parts: Vec<String> =
			rel.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
		Some(parts.join("/"))
	}
}

#[async_trait]
impl Provider for FilesystemProvider {
	fn name(&self) -> &str {
		&self.config.name
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::Filesystem
	}

	async fn initialize(&mut self) -> Result<bool, BackupError> {
		if self.config.root.as_os_str().is_empty() {
			return Ok(false);
		}
		tokio::fs::create_dir_all(&self.config.root).await?;
		Ok(true)
	}

	async fn store(&self, artifact: &BackupArtifact) -> Result<bool, BackupError> {
		let key = self.ctx.key_for(&artifact.metadata);
		let path = self.path_for(&key);
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(&path, &artifact.payload).await?;
		tokio::fs::write(self.path_for(&manifest_key(&key)), encode_manifest(&artifact.metadata)?)
			.await?;
		debug!("{}: stored {}", self.name(), key);
		Ok(true)
	}

	async fn list(&self) -> Result<Vec<BackupMetadata>, BackupError> {
		let base = self.config.root.join(self.ctx.root().trim_end_matches('/'));
		if tokio::fs::metadata(&base).await.is_err() {
			return Ok(Vec::new());
		}

		let mut out = Vec::new();
		let mut stack = vec![base];
		while let Some(current) = stack.pop() {
			let mut entries = tokio::fs::read_dir(&current).await?;
			while let Some(entry) = entries.next_entry().await? {
				let path = entry.path();
				if entry.file_type().await?.is_dir() {
					stack.push(path);
					continue;
				}
				let key = match self.key_of(&path) {
					Some(key) if !is_manifest_key(&key) => key,
					_ => continue,
				};

				// Prefer the manifest written at store time; synthesize
				// from the file itself when it is missing or unreadable.
				match tokio::fs::read(self.path_for(&manifest_key(&key))).await {
					Ok(bytes) => match serde_json::from_slice::<BackupMetadata>(&bytes) {
						Ok(meta) => {
							out.push(meta);
							continue;
						}
						Err(e) => {
							warn!("{}: unreadable manifest for {}: {}", self.name(), key, e)
						}
					},
					Err(_) => {}
				}

				let fs_meta = entry.metadata().await?;
				let modified = fs_meta
					.modified()
					.ok()
					.map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true));
				if let Some(meta) = synthesize_metadata(&self.ctx, &key, modified, fs_meta.len()) {
					out.push(meta);
				}
			}
		}
		Ok(out)
	}

	async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, BackupError> {
		match tokio::fs::read(self.path_for(key)).await {
			Ok(bytes) => Ok(Some(bytes)),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}

	async fn erase(&self, key: &str) -> Result<bool, BackupError> {
		let _ = tokio::fs::remove_file(self.path_for(&manifest_key(key))).await;
		match tokio::fs::remove_file(self.path_for(key)).await {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}

	async fn last_modified(&self, key: &str) -> Result<Option<String>, BackupError> {
		match tokio::fs::metadata(self.path_for(key)).await {
			Ok(meta) => Ok(meta
				.modified()
				.ok()
				.map(|t| DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true))),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(e.into()),
		}
	}
}


// vim: ts=4
