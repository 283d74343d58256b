//! S3-compatible object storage destination (AWS, R2, MinIO)

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{
	encode_manifest, is_manifest_key, manifest_key, synthesize_metadata, KeyContext, Provider,
};
use crate::config::{ObjectStoreConfig, ProviderKind};
use crate::error::{BackupError, ProviderError};
use crate::logging::*;
use crate::types::{BackupArtifact, BackupMetadata};

pub struct ObjectStoreProvider {
	config: ObjectStoreConfig,
	ctx: KeyContext,
	client: Option<Client>,
}

impl ObjectStoreProvider {
	pub fn new(config: ObjectStoreConfig, ctx: KeyContext) -> Self {
		ObjectStoreProvider { config, ctx, client: None }
	}

	fn client(&self) -> Result<&Client, BackupError> {
		self.client.as_ref().ok_or_else(|| {
			ProviderError::request(&self.config.name, "provider not initialized").into()
		})
	}

	fn missing_field(&self) -> Option<&'static str> {
		if self.config.endpoint.trim().is_empty() {
			Some("endpoint")
		} else if self.config.bucket.trim().is_empty() {
			Some("bucket")
		} else if self.config.access_key_id.trim().is_empty() {
			Some("accessKeyId")
		} else if self.config.secret_access_key.trim().is_empty() {
			Some("secretAccessKey")
		} else {
			None
		}
	}
}

#[async_trait]
impl Provider for ObjectStoreProvider {
	fn name(&self) -> &str {
		&self.config.name
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::ObjectStore
	}

	async fn initialize(&mut self) -> Result<bool, BackupError> {
		if let Some(field) = self.missing_field() {
			warn!("{}: missing required field '{}'", self.config.name, field);
			return Ok(false);
		}

		let credentials = Credentials::new(
			self.config.access_key_id.clone(),
			self.config.secret_access_key.clone(),
			None,
			None,
			"backr-object-store",
		);
		let sdk_config = aws_sdk_s3::config::Builder::new()
			.region(Region::new(self.config.region.clone()))
			.credentials_provider(credentials)
			.endpoint_url(self.config.endpoint.clone())
			.force_path_style(true)
			.build();
		self.client = Some(Client::from_conf(sdk_config));
		Ok(true)
	}

	async fn store(&self, artifact: &BackupArtifact) -> Result<bool, BackupError> {
		let client = self.client()?;
		let key = self.ctx.key_for(&artifact.metadata);

		client
			.put_object()
			.bucket(&self.config.bucket)
			.key(&key)
			.body(ByteStream::from(artifact.payload.clone()))
			.send()
			.await
			.map_err(|e| ProviderError::request(&self.config.name, e))?;

		client
			.put_object()
			.bucket(&self.config.bucket)
			.key(manifest_key(&key))
			.content_type("application/json")
			.body(ByteStream::from(encode_manifest(&artifact.metadata)?))
			.send()
			.await
			.map_err(|e| ProviderError::request(&self.config.name, e))?;

		debug!("{}: stored {}", self.config.name, key);
		Ok(true)
	}

	async fn list(&self) -> Result<Vec<BackupMetadata>, BackupError> {
		let client = self.client()?;
		let mut out = Vec::new();
		let mut token: Option<String> = None;

		loop {
			let mut request = client
				.list_objects_v2()
				.bucket(&self.config.bucket)
				.prefix(self.ctx.root());
			if let Some(t) = &token {
				request = request.continuation_token(t.clone());
			}
			let response = request
				.send()
				.await
				.map_err(|e| ProviderError::request(&self.config.name, e))?;

			for object in response.contents() {
				let key = match object.key() {
					Some(key) if !is_manifest_key(key) => key,
					_ => continue,
				};
				let timestamp = object
					.last_modified()
					.and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
					.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true));
				let size = object.size().unwrap_or(0).max(0) as u64;
				if let Some(meta) = synthesize_metadata(&self.ctx, key, timestamp, size) {
					out.push(meta);
				}
			}

			if response.is_truncated() == Some(true) {
				token = response.next_continuation_token().map(String::from);
				if token.is_none() {
					break;
				}
			} else {
				break;
			}
		}

		Ok(out)
	}

	async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, BackupError> {
		let client = self.client()?;
		match client.get_object().bucket(&self.config.bucket).key(key).send().await {
			Ok(response) => {
				let data = response
					.body
					.collect()
					.await
					.map_err(|e| ProviderError::request(&self.config.name, e))?;
				Ok(Some(data.into_bytes().to_vec()))
			}
			Err(e) => {
				let service = e.into_service_error();
				if service.is_no_such_key() {
					Ok(None)
				} else {
					Err(ProviderError::request(&self.config.name, service).into())
				}
			}
		}
	}

	async fn erase(&self, key: &str) -> Result<bool, BackupError> {
		let client = self.client()?;
		let _ = client
			.delete_object()
			.bucket(&self.config.bucket)
			.key(manifest_key(key))
			.send()
			.await;
		client
			.delete_object()
			.bucket(&self.config.bucket)
			.key(key)
			.send()
			.await
			.map_err(|e| ProviderError::request(&self.config.name, e))?;
		Ok(true)
	}

	async fn last_modified(&self, key: &str) -> Result<Option<String>, BackupError> {
		let client = self.client()?;
		match client.head_object().bucket(&self.config.bucket).key(key).send().await {
			Ok(response) => Ok(response
				.last_modified()
				.and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
				.map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))),
			Err(e) => {
				let service = e.into_service_error();
				if service.is_not_found() {
					Ok(None)
				} else {
					Err(ProviderError::request(&self.config.name, service).into())
				}
			}
		}
	}
}


// vim: ts=4
