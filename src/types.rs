//! Core data types shared across the backup engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Stable identifier of a document inside a collection.
///
/// For the filesystem store this is the collection-relative path
/// ("journals/2024-01-01.md"); other stores may use opaque ids.
pub type DocumentId = String;

/// Format version stamped into every artifact's metadata.
pub const FORMAT_VERSION: u32 = 1;

/// Document category, derived from where the document lives in the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
	/// Dated journal entry
	Journal,

	/// Regular named page
	Page,

	/// Binary attachment referenced by pages
	Asset,
}

impl FromStr for DocumentKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"journal" => Ok(Self::Journal),
			"page" => Ok(Self::Page),
			"asset" => Ok(Self::Asset),
			_ => Err(format!("Unknown document kind: {}. Valid options: journal, page, asset", s)),
		}
	}
}

impl std::fmt::Display for DocumentKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Journal => write!(f, "journal"),
			Self::Page => write!(f, "page"),
			Self::Asset => write!(f, "asset"),
		}
	}
}

/// A single change notification from the watcher or host integration.
///
/// Carries enough to resolve zero or more affected documents; resolution
/// itself happens in one place (`engine::resolve_documents`) so the
/// coalescer stays independent of how changes are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
	/// Already-resolved document, when the source knows it
	pub document_id: Option<DocumentId>,

	/// Filesystem path the change was observed on, when it wasn't
	pub path: Option<PathBuf>,
}

impl ChangeEvent {
	pub fn for_document(id: impl Into<DocumentId>) -> Self {
		ChangeEvent { document_id: Some(id.into()), path: None }
	}

	pub fn for_path(path: impl Into<PathBuf>) -> Self {
		ChangeEvent { document_id: None, path: Some(path.into()) }
	}
}

/// Directory listing entry for a document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
	pub id: DocumentId,

	/// Display name (file stem for the filesystem store)
	pub name: String,

	pub kind: DocumentKind,

	/// Local modification time
	pub modified_at: DateTime<Utc>,
}

/// Full document as loaded from the store
#[derive(Debug, Clone)]
pub struct Document {
	pub info: DocumentInfo,

	/// Raw content bytes
	pub content: Vec<u8>,

	/// Container pages (tag/system indexes) are excluded from backup
	pub container: bool,
}

/// Metadata record attached to every stored artifact.
///
/// `relative_path` together with `collection_name` is the canonical
/// cross-provider key component: two artifacts agreeing on both are the
/// same logical object on every destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
	/// RFC 3339 timestamp. Kept as a string on the wire; parsed only at
	/// comparison time so a corrupt manifest degrades to the documented
	/// push-side bias instead of a deserialization failure.
	pub timestamp: String,

	pub format_version: u32,

	pub collection_name: String,

	pub document_id: DocumentId,

	pub kind: DocumentKind,

	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub relative_path: Option<String>,

	pub file_name: String,

	pub size_bytes: u64,
}

impl BackupMetadata {
	/// Parse the stored timestamp, if well-formed.
	pub fn parsed_timestamp(&self) -> Option<DateTime<Utc>> {
		DateTime::parse_from_rfc3339(&self.timestamp).ok().map(|dt| dt.with_timezone(&Utc))
	}
}

/// Serialized artifact ready for dispatch. Immutable once constructed,
/// discarded after dispatch.
#[derive(Debug, Clone)]
pub struct BackupArtifact {
	pub document_id: DocumentId,
	pub payload: Vec<u8>,
	pub metadata: BackupMetadata,
}

/// Per-(document, provider) reconciliation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
	/// Local copy is newer than the latest remote backup
	LocalNewer,

	/// Remote backup is newer than the local copy
	RemoteNewer,

	/// Timestamps agree within the tolerance window
	Same,

	/// No remote backup matches the document's path
	RemoteMissing,
}

impl std::fmt::Display for SyncDecision {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::LocalNewer => write!(f, "local-newer"),
			Self::RemoteNewer => write!(f, "remote-newer"),
			Self::Same => write!(f, "same"),
			Self::RemoteMissing => write!(f, "remote-missing"),
		}
	}
}

/// Aggregate result of fanning one artifact out to all enabled providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchResult {
	/// Providers that accepted the artifact
	pub success: usize,

	/// Providers that were asked
	pub total: usize,
}

impl DispatchResult {
	pub fn outcome(&self) -> DispatchOutcome {
		if self.total > 0 && self.success == self.total {
			DispatchOutcome::Full
		} else if self.success > 0 {
			DispatchOutcome::Partial
		} else {
			DispatchOutcome::Failed
		}
	}
}

/// Three-way dispatch classification, surfaced verbatim to the notifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
	/// Every provider accepted the artifact
	Full,

	/// Some providers accepted, some failed
	Partial,

	/// No provider accepted the artifact
	Failed,
}

impl std::fmt::Display for DispatchOutcome {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Full => write!(f, "full"),
			Self::Partial => write!(f, "partial"),
			Self::Failed => write!(f, "failed"),
		}
	}
}


// vim: ts=4
