//! WebDAV destination
//!
//! Uses plain HTTP verbs plus MKCOL/PROPFIND. The multistatus listing is
//! parsed tolerantly (namespace prefixes vary wildly between servers), so
//! only the elements the catalog needs are extracted.

use async_trait::async_trait;
use chrono::DateTime;
use regex::Regex;

use super::{encode_manifest, is_manifest_key, manifest_key, synthesize_metadata, KeyContext, Provider};
use crate::config::{ProviderKind, WebdavConfig};
use crate::error::{BackupError, ProviderError};
use crate::logging::*;
use crate::types::{BackupArtifact, BackupMetadata};

const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8" ?><D:propfind xmlns:D="DAV:"><D:prop><D:getlastmodified/><D:getcontentlength/><D:resourcetype/></D:prop></D:propfind>"#;

pub struct WebdavProvider {
	config: WebdavConfig,
	ctx: KeyContext,
	client: Option<reqwest::Client>,
}

impl WebdavProvider {
	pub fn new(config: WebdavConfig, ctx: KeyContext) -> Self {
		WebdavProvider { config, ctx, client: None }
	}

	fn url_for(&self, key: &str) -> String {
		let base = self.config.url.trim_end_matches('/');
		let encoded: Vec<String> =
			key.split('/').map(|s| urlencoding::encode(s).into_owned()).collect();
		format!("{}/{}", base, encoded.join("/"))
	}

	fn request(&self, method: &str, url: &str) -> Result<reqwest::RequestBuilder, BackupError> {
		let client = self.client.as_ref().ok_or_else(|| {
			ProviderError::request(&self.config.name, "provider not initialized")
		})?;
		let method = reqwest::Method::from_bytes(method.as_bytes())
			.map_err(|e| ProviderError::request(&self.config.name, e))?;
		let mut builder = client.request(method, url);
		if !self.config.username.is_empty() {
			builder = builder.basic_auth(&self.config.username, Some(&self.config.password));
		}
		Ok(builder)
	}

	async fn send(
		&self,
		builder: reqwest::RequestBuilder,
	) -> Result<reqwest::Response, BackupError> {
		builder
			.send()
			.await
			.map_err(|e| ProviderError::request(&self.config.name, e).into())
	}

	/// Create the parent collections of a key, one MKCOL per level.
	/// Existing collections answer 405 (or a redirect); both are fine.
	async fn ensure_collections(&self, key: &str) -> Result<(), BackupError> {
		let segments: Vec<&str> = key.split('/').collect();
		let mut path = String::new();
		for segment in &segments[..segments.len().saturating_sub(1)] {
			if !path.is_empty() {
				path.push('/');
			}
			path.push_str(segment);
			let response = self.send(self.request("MKCOL", &self.url_for(&path))?).await?;
			let status = response.status();
			if !(status.is_success() || status.is_redirection() || status.as_u16() == 405) {
				return Err(ProviderError::UnexpectedStatus {
					provider: self.config.name.clone(),
					status: status.as_u16(),
				}
				.into());
			}
		}
		Ok(())
	}

	fn base_path(&self) -> String {
		match reqwest::Url::parse(&self.config.url) {
			Ok(url) => url.path().trim_end_matches('/').to_string(),
			Err(_) => String::new(),
		}
	}
}

#[async_trait]
impl Provider for WebdavProvider {
	fn name(&self) -> &str {
		&self.config.name
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::Webdav
	}

	async fn initialize(&mut self) -> Result<bool, BackupError> {
		if self.config.url.trim().is_empty() {
			warn!("{}: missing required field 'url'", self.config.name);
			return Ok(false);
		}
		if reqwest::Url::parse(&self.config.url).is_err() {
			warn!("{}: invalid url '{}'", self.config.name, self.config.url);
			return Ok(false);
		}
		let client = reqwest::Client::builder()
			.build()
			.map_err(|e| ProviderError::request(&self.config.name, e))?;
		self.client = Some(client);
		Ok(true)
	}

	async fn store(&self, artifact: &BackupArtifact) -> Result<bool, BackupError> {
		let key = self.ctx.key_for(&artifact.metadata);
		self.ensure_collections(&key).await?;

		let response = self
			.send(self.request("PUT", &self.url_for(&key))?.body(artifact.payload.clone()))
			.await?;
		if !response.status().is_success() {
			return Err(ProviderError::UnexpectedStatus {
				provider: self.config.name.clone(),
				status: response.status().as_u16(),
			}
			.into());
		}

		let manifest = encode_manifest(&artifact.metadata)?;
		let response = self
			.send(self.request("PUT", &self.url_for(&manifest_key(&key)))?.body(manifest))
			.await?;
		if !response.status().is_success() {
			return Err(ProviderError::UnexpectedStatus {
				provider: self.config.name.clone(),
				status: response.status().as_u16(),
			}
			.into());
		}

		debug!("{}: stored {}", self.config.name, key);
		Ok(true)
	}

	async fn list(&self) -> Result<Vec<BackupMetadata>, BackupError> {
		let root = self.ctx.root();
		let url = self.url_for(root.trim_end_matches('/'));
		let response = self
			.send(
				self.request("PROPFIND", &url)?
					.header("Depth", "infinity")
					.header("Content-Type", "application/xml")
					.body(PROPFIND_BODY),
			)
			.await?;

		if response.status().as_u16() == 404 {
			return Ok(Vec::new());
		}
		if !(response.status().is_success() || response.status().as_u16() == 207) {
			return Err(ProviderError::UnexpectedStatus {
				provider: self.config.name.clone(),
				status: response.status().as_u16(),
			}
			.into());
		}

		let body = response
			.text()
			.await
			.map_err(|e| ProviderError::request(&self.config.name, e))?;
		self.parse_multistatus(&body)
	}

	async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, BackupError> {
		let response = self.send(self.request("GET", &self.url_for(key))?).await?;
		if response.status().as_u16() == 404 {
			return Ok(None);
		}
		if !response.status().is_success() {
			return Err(ProviderError::UnexpectedStatus {
				provider: self.config.name.clone(),
				status: response.status().as_u16(),
			}
			.into());
		}
		let bytes = response
			.bytes()
			.await
			.map_err(|e| ProviderError::request(&self.config.name, e))?;
		Ok(Some(bytes.to_vec()))
	}

	async fn erase(&self, key: &str) -> Result<bool, BackupError> {
		let _ = self.send(self.request("DELETE", &self.url_for(&manifest_key(key)))?).await;
		let response = self.send(self.request("DELETE", &self.url_for(key))?).await?;
		if response.status().as_u16() == 404 {
			return Ok(false);
		}
		if !response.status().is_success() {
			return Err(ProviderError::UnexpectedStatus {
				provider: self.config.name.clone(),
				status: response.status().as_u16(),
			}
			.into());
		}
		Ok(true)
	}

	async fn last_modified(&self, key: &str) -> Result<Option<String>, BackupError> {
		let response = self.send(self.request("HEAD", &self.url_for(key))?).await?;
		if response.status().as_u16() == 404 {
			return Ok(None);
		}
		if !response.status().is_success() {
			return Err(ProviderError::UnexpectedStatus {
				provider: self.config.name.clone(),
				status: response.status().as_u16(),
			}
			.into());
		}
		Ok(response
			.headers()
			.get(reqwest::header::LAST_MODIFIED)
			.and_then(|v| v.to_str().ok())
			.and_then(parse_http_date))
	}
}

impl WebdavProvider {
	fn parse_multistatus(&self, body: &str) -> Result<Vec<BackupMetadata>, BackupError> {
		let name = &self.config.name;
		let response_re = dav_element_re("response").map_err(|e| ProviderError::request(name, e))?;
		let href_re = dav_element_re("href").map_err(|e| ProviderError::request(name, e))?;
		let modified_re =
			dav_element_re("getlastmodified").map_err(|e| ProviderError::request(name, e))?;
		let length_re =
			dav_element_re("getcontentlength").map_err(|e| ProviderError::request(name, e))?;
		let collection_re = Regex::new(r"(?is)<(?:[a-z0-9_-]+:)?collection[\s/>]")
			.map_err(|e| ProviderError::request(name, e))?;

		let base_path = self.base_path();
		let mut out = Vec::new();

		for response in response_re.captures_iter(body) {
			let block = &response[1];
			if collection_re.is_match(block) {
				continue;
			}
			let href = match href_re.captures(block) {
				Some(captures) => unescape_xml(captures[1].trim()),
				None => continue,
			};
			let decoded = match urlencoding::decode(&href) {
				Ok(decoded) => decoded.into_owned(),
				Err(_) => href.clone(),
			};
			let key = decoded
				.strip_prefix(&base_path)
				.unwrap_or(&decoded)
				.trim_matches('/')
				.to_string();
			if key.is_empty() || is_manifest_key(&key) {
				continue;
			}

			let timestamp = modified_re
				.captures(block)
				.and_then(|c| parse_http_date(c[1].trim()));
			let size = length_re
				.captures(block)
				.and_then(|c| c[1].trim().parse::<u64>().ok())
				.unwrap_or(0);

			if let Some(meta) = synthesize_metadata(&self.ctx, &key, timestamp, size) {
				out.push(meta);
			}
		}

		Ok(out)
	}
}

fn dav_element_re(local: &str) -> Result<Regex, regex::Error> {
	Regex::new(&format!(r"(?is)<(?:[a-z0-9_-]+:)?{0}[^>]*>(.*?)</(?:[a-z0-9_-]+:)?{0}>", local))
}

/// WebDAV timestamps come back RFC 1123 style; normalize to RFC 3339.
fn parse_http_date(raw: &str) -> Option<String> {
	DateTime::parse_from_rfc2822(raw)
		.ok()
		.map(|dt| dt.with_timezone(&chrono::Utc).to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn unescape_xml(raw: &str) -> String {
	raw.replace("&amp;", "&")
		.replace("&lt;", "<")
		.replace("&gt;", ">")
		.replace("&quot;", "\"")
		.replace("&apos;", "'")
}


// vim: ts=4
