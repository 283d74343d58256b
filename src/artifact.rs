//! Serialization of documents into storage-ready artifacts

use chrono::{SecondsFormat, Utc};
use globset::GlobSet;

use crate::config::Config;
use crate::error::BackupError;
use crate::store::DocumentStore;
use crate::types::{
	BackupArtifact, BackupMetadata, Document, DocumentInfo, DocumentKind, FORMAT_VERSION,
};

/// Converts one document into a `BackupArtifact`, applying the container
/// and exclusion-pattern filters. Stateless apart from configuration;
/// read-only against the store.
pub struct ArtifactBuilder {
	collection_name: String,
	exclude: GlobSet,
}

impl ArtifactBuilder {
	pub fn new(config: &Config) -> Result<Self, BackupError> {
		Ok(ArtifactBuilder {
			collection_name: config.collection_name.clone(),
			exclude: config.exclusion_matcher()?,
		})
	}

	/// Resolve and serialize one document.
	///
	/// Fails with `NotFound` when the document vanished since enumeration
	/// and with `Filtered` for container pages and excluded names; both
	/// are skips, not failures.
	pub async fn build(
		&self,
		store: &dyn DocumentStore,
		id: &str,
	) -> Result<BackupArtifact, BackupError> {
		let doc = store
			.get_document(id)
			.await?
			.ok_or_else(|| BackupError::NotFound { document: id.to_string() })?;
		self.build_from(&doc)
	}

	/// Serialize an already-loaded document.
	pub fn build_from(&self, doc: &Document) -> Result<BackupArtifact, BackupError> {
		if doc.container || self.exclude.is_match(&doc.info.name) {
			return Err(BackupError::Filtered { document: doc.info.id.clone() });
		}

		let (relative_path, file_name) = resolve_paths(&doc.info);
		let metadata = BackupMetadata {
			timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
			format_version: FORMAT_VERSION,
			collection_name: self.collection_name.clone(),
			document_id: doc.info.id.clone(),
			kind: doc.info.kind,
			relative_path: Some(relative_path),
			file_name,
			size_bytes: doc.content.len() as u64,
		};

		Ok(BackupArtifact {
			document_id: doc.info.id.clone(),
			payload: doc.content.clone(),
			metadata,
		})
	}
}

/// Canonical cross-provider path for a document: journals and pages get a
/// normalized markdown filename under their kind root, assets keep their
/// collection-relative path untouched.
pub fn resolve_paths(info: &DocumentInfo) -> (String, String) {
	match info.kind {
		DocumentKind::Journal => {
			let normalized = normalize_journal_name(&info.name);
			let file_name = leaf(&normalized);
			(format!("journals/{}.md", normalized), format!("{}.md", file_name))
		}
		DocumentKind::Page => {
			let normalized = normalize_page_name(&info.name);
			let file_name = leaf(&normalized);
			(format!("pages/{}.md", normalized), format!("{}.md", file_name))
		}
		DocumentKind::Asset => {
			let file_name = leaf(&info.id);
			(info.id.clone(), file_name.to_string())
		}
	}
}

/// Lowercase, whitespace to underscores. Path separators survive so
/// namespaced pages keep their hierarchy.
pub fn normalize_page_name(name: &str) -> String {
	name.trim()
		.chars()
		.map(|c| if c.is_whitespace() { '_' } else { c.to_ascii_lowercase() })
		.collect()
}

/// Journal names are date-derived; dashes join the date parts on disk.
pub fn normalize_journal_name(name: &str) -> String {
	normalize_page_name(name).replace('-', "_")
}

fn leaf(path: &str) -> String {
	path.rsplit('/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn info(name: &str, id: &str, kind: DocumentKind) -> DocumentInfo {
		DocumentInfo {
			id: id.to_string(),
			name: name.to_string(),
			kind,
			modified_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
		}
	}

	#[test]
	fn test_journal_path_derivation() {
		let (rel, file) =
			resolve_paths(&info("2024-01-01", "journals/2024-01-01.md", DocumentKind::Journal));
		assert_eq!(rel, "journals/2024_01_01.md");
		assert_eq!(file, "2024_01_01.md");
	}

	#[test]
	fn test_page_path_derivation() {
		let (rel, file) = resolve_paths(&info("Meeting Notes", "pages/Meeting Notes.md", DocumentKind::Page));
		assert_eq!(rel, "pages/meeting_notes.md");
		assert_eq!(file, "meeting_notes.md");
	}

	#[test]
	fn test_namespaced_page_keeps_hierarchy() {
		let (rel, file) =
			resolve_paths(&info("Projects/Rust Book", "pages/Projects/Rust Book.md", DocumentKind::Page));
		assert_eq!(rel, "pages/projects/rust_book.md");
		assert_eq!(file, "rust_book.md");
	}

	#[test]
	fn test_asset_path_untouched() {
		let (rel, file) = resolve_paths(&info("Cat.PNG", "assets/img/Cat.PNG", DocumentKind::Asset));
		assert_eq!(rel, "assets/img/Cat.PNG");
		assert_eq!(file, "Cat.PNG");
	}

	#[test]
	fn test_container_page_is_filtered() {
		let config = Config::default();
		let builder = ArtifactBuilder::new(&config).unwrap();
		let doc = Document {
			info: info("inbox", "pages/inbox.md", DocumentKind::Page),
			content: b"---\ntype: tag\n---\n".to_vec(),
			container: true,
		};
		match builder.build_from(&doc) {
			Err(BackupError::Filtered { document }) => assert_eq!(document, "pages/inbox.md"),
			other => panic!("expected Filtered, got {:?}", other.map(|a| a.metadata)),
		}
	}

	#[test]
	fn test_excluded_name_is_filtered() {
		let mut config = Config::default();
		config.exclude_patterns = vec!["draft-*".to_string()];
		let builder = ArtifactBuilder::new(&config).unwrap();
		let doc = Document {
			info: info("draft-ideas", "pages/draft-ideas.md", DocumentKind::Page),
			content: b"wip".to_vec(),
			container: false,
		};
		assert!(matches!(builder.build_from(&doc), Err(BackupError::Filtered { .. })));
	}

	#[test]
	fn test_metadata_stamp() {
		let config = Config::default();
		let builder = ArtifactBuilder::new(&config).unwrap();
		let doc = Document {
			info: info("todo", "pages/todo.md", DocumentKind::Page),
			content: b"- [ ] write tests".to_vec(),
			container: false,
		};
		let artifact = builder.build_from(&doc).unwrap();
		assert_eq!(artifact.metadata.size_bytes, doc.content.len() as u64);
		assert_eq!(artifact.metadata.format_version, FORMAT_VERSION);
		assert_eq!(artifact.metadata.relative_path.as_deref(), Some("pages/todo.md"));
		assert!(artifact.metadata.parsed_timestamp().is_some());
	}
}

// vim: ts=4
