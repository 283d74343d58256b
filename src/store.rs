//! Host collaborator contracts and their production implementations
//!
//! The engine never touches a concrete document source directly: it goes
//! through `DocumentStore`, and reports user-facing outcomes through
//! `Notifier`. Tests substitute in-memory implementations; the CLI wires
//! up the filesystem-backed ones below.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::BackupError;
use crate::logging::*;
use crate::types::{Document, DocumentId, DocumentInfo, DocumentKind};

/// Collection subdirectories recognized by the filesystem store, in the
/// order documents are enumerated.
const KIND_DIRS: [(&str, DocumentKind); 3] = [
	("journals", DocumentKind::Journal),
	("pages", DocumentKind::Page),
	("assets", DocumentKind::Asset),
];

/// Read/write access to the document collection
#[async_trait]
pub trait DocumentStore: Send + Sync {
	/// Enumerate all documents in the collection.
	async fn list_documents(&self) -> Result<Vec<DocumentInfo>, BackupError>;

	/// Load one document; `None` when it no longer exists.
	async fn get_document(&self, id: &str) -> Result<Option<Document>, BackupError>;

	/// Replace a document's content (used by the pull side of a sync).
	async fn update_document(&self, id: &str, content: &[u8]) -> Result<(), BackupError>;

	/// Map an observed filesystem path to a document id, when the path
	/// belongs to this collection.
	fn document_id_for_path(&self, path: &Path) -> Option<DocumentId>;
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
	Info,
	Success,
	Warning,
	Error,
}

impl std::fmt::Display for NotifyLevel {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Info => write!(f, "info"),
			Self::Success => write!(f, "success"),
			Self::Warning => write!(f, "warning"),
			Self::Error => write!(f, "error"),
		}
	}
}

/// Sink for user-facing outcome messages
pub trait Notifier: Send + Sync {
	fn notify(&self, message: &str, level: NotifyLevel);
}

/// Notifier that routes messages to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
	fn notify(&self, message: &str, level: NotifyLevel) {
		match level {
			NotifyLevel::Info | NotifyLevel::Success => info!("{}", message),
			NotifyLevel::Warning => warn!("{}", message),
			NotifyLevel::Error => error!("{}", message),
		}
	}
}

/// Document store over a collection directory laid out as
/// `journals/`, `pages/` and `assets/` subtrees. Document ids are
/// collection-relative paths with forward slashes.
pub struct FsDocumentStore {
	root: PathBuf,
}

impl FsDocumentStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		FsDocumentStore { root: root.into() }
	}

	fn kind_for_id(id: &str) -> Option<DocumentKind> {
		let top = id.split('/').next()?;
		KIND_DIRS.iter().find(|(dir, _)| *dir == top).map(|(_, kind)| *kind)
	}

	/// Walk one kind subtree, collecting files in name order.
	async fn scan_kind(
		&self,
		dir: &str,
		kind: DocumentKind,
		out: &mut Vec<DocumentInfo>,
	) -> Result<(), BackupError> {
		let top = self.root.join(dir);
		if tokio::fs::metadata(&top).await.is_err() {
			return Ok(());
		}

		let mut stack = vec![top];
		let mut found = Vec::new();
		while let Some(current) = stack.pop() {
			let mut entries = tokio::fs::read_dir(&current).await?;
			while let Some(entry) = entries.next_entry().await? {
				let path = entry.path();
				let file_type = entry.file_type().await?;
				let name = entry.file_name().to_string_lossy().to_string();
				if name.starts_with('.') {
					continue;
				}
				if file_type.is_dir() {
					stack.push(path);
				} else if file_type.is_file() {
					let modified: DateTime<Utc> =
						entry.metadata().await?.modified().map(DateTime::from)?;
					let id = relative_id(&self.root, &path)
						.ok_or_else(|| BackupError::Other {
							message: format!("Path escapes collection: {}", path.display()),
						})?;
					found.push(DocumentInfo {
						name: display_name(&id, dir, kind),
						id,
						kind,
						modified_at: modified,
					});
				}
			}
		}

		found.sort_by(|a, b| a.id.cmp(&b.id));
		out.append(&mut found);
		Ok(())
	}
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
	async fn list_documents(&self) -> Result<Vec<DocumentInfo>, BackupError> {
		if tokio::fs::metadata(&self.root).await.is_err() {
			return Err(BackupError::fatal(format!(
				"Collection directory does not exist: {}",
				self.root.display()
			)));
		}

		let mut out = Vec::new();
		for (dir, kind) in KIND_DIRS {
			self.scan_kind(dir, kind, &mut out).await?;
		}
		Ok(out)
	}

	async fn get_document(&self, id: &str) -> Result<Option<Document>, BackupError> {
		let kind = match Self::kind_for_id(id) {
			Some(kind) => kind,
			None => return Ok(None),
		};
		let path = self.root.join(id);

		let content = match tokio::fs::read(&path).await {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(e.into()),
		};
		let modified: DateTime<Utc> =
			tokio::fs::metadata(&path).await?.modified().map(DateTime::from)?;

		let container = kind != DocumentKind::Asset && is_container(&content);
		let top = id.split('/').next().unwrap_or_default().to_string();
		Ok(Some(Document {
			info: DocumentInfo {
				name: display_name(id, &top, kind),
				id: id.to_string(),
				kind,
				modified_at: modified,
			},
			content,
			container,
		}))
	}

	async fn update_document(&self, id: &str, content: &[u8]) -> Result<(), BackupError> {
		if Self::kind_for_id(id).is_none() {
			return Err(BackupError::Other { message: format!("Unknown document id: {}", id) });
		}
		let path = self.root.join(id);
		if let Some(parent) = path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}
		tokio::fs::write(&path, content).await?;
		Ok(())
	}

	fn document_id_for_path(&self, path: &Path) -> Option<DocumentId> {
		let id = relative_id(&self.root, path)?;
		Self::kind_for_id(&id)?;
		let file_name = id.rsplit('/').next()?;
		if file_name.starts_with('.') || file_name.ends_with('~') {
			return None;
		}
		Some(id)
	}
}

/// Collection-relative id with forward slashes, or `None` when the path
/// lies outside the root.
fn relative_id(root: &Path, path: &Path) -> Option<DocumentId> {
	let rel = path.strip_prefix(root).ok()?;
	let parts: Vec<String> =
		rel.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
	if parts.is_empty() {
		return None;
	}
	Some(parts.join("/"))
}

/// Display name: kind-relative path without the markdown extension for
/// documents; the raw file name for assets.
fn display_name(id: &str, kind_dir: &str, kind: DocumentKind) -> String {
	let rel = id.strip_prefix(kind_dir).and_then(|s| s.strip_prefix('/')).unwrap_or(id);
	match kind {
		DocumentKind::Asset => rel.rsplit('/').next().unwrap_or(rel).to_string(),
		_ => rel.strip_suffix(".md").unwrap_or(rel).to_string(),
	}
}

/// Container pages carry a `type: tag` or `type: system` front matter
/// marker; those act as indexes over other documents and are never
/// backed up themselves.
fn is_container(content: &[u8]) -> bool {
	let text = match std::str::from_utf8(content) {
		Ok(text) => text,
		Err(_) => return false,
	};
	let mut lines = text.lines();
	if lines.next().map(str::trim) != Some("---") {
		return false;
	}
	for line in lines {
		let line = line.trim();
		if line == "---" {
			break;
		}
		if let Some(value) = line.strip_prefix("type:") {
			let value = value.trim().to_lowercase();
			if value == "tag" || value == "system" {
				return true;
			}
		}
	}
	false
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_is_container_detects_tag_pages() {
		assert!(is_container(b"---\ntype: tag\n---\ncontent"));
		assert!(is_container(b"---\ntitle: x\ntype: System\n---\n"));
		assert!(!is_container(b"---\ntitle: x\n---\ntype: tag"));
		assert!(!is_container(b"plain content"));
		assert!(!is_container(&[0xff, 0xfe, 0x00]));
	}

	#[test]
	fn test_display_name() {
		assert_eq!(display_name("pages/todo.md", "pages", DocumentKind::Page), "todo");
		assert_eq!(
			display_name("pages/projects/rust.md", "pages", DocumentKind::Page),
			"projects/rust"
		);
		assert_eq!(display_name("assets/img/cat.png", "assets", DocumentKind::Asset), "cat.png");
	}

	#[test]
	fn test_kind_for_id() {
		assert_eq!(FsDocumentStore::kind_for_id("journals/2024-01-01.md"), Some(DocumentKind::Journal));
		assert_eq!(FsDocumentStore::kind_for_id("assets/a.png"), Some(DocumentKind::Asset));
		assert_eq!(FsDocumentStore::kind_for_id("trash/x.md"), None);
	}
}

// vim: ts=4
