//! Per-provider catalog of existing remote backups, memoized for one
//! reconciliation pass
//!
//! `Provider::list` is a remote round-trip; the reconciler would otherwise
//! issue it once per document. Each pass owns one catalog, fills it
//! lazily, and clears it when the pass completes. Configuration changes
//! invalidate the affected providers.

use std::collections::HashMap;

use crate::error::{BackupError, ProviderError};
use crate::logging::*;
use crate::provider::Provider;
use crate::types::BackupMetadata;

enum CatalogEntry {
	Listed(Vec<BackupMetadata>),
	/// The listing failed earlier in this pass; remembered so one broken
	/// provider costs a single round-trip per pass, not one per document.
	Unavailable,
}

#[derive(Default)]
pub struct RemoteCatalog {
	entries: HashMap<String, CatalogEntry>,
}

impl RemoteCatalog {
	pub fn new() -> Self {
		RemoteCatalog { entries: HashMap::new() }
	}

	/// The provider's catalog, fetched on first use within the pass.
	pub async fn get_or_fetch(
		&mut self,
		provider: &dyn Provider,
	) -> Result<&[BackupMetadata], BackupError> {
		let name = provider.name().to_string();
		if !self.entries.contains_key(&name) {
			let entry = match provider.list().await {
				Ok(listing) => {
					debug!("{}: cached catalog with {} entries", name, listing.len());
					CatalogEntry::Listed(listing)
				}
				Err(e) => {
					warn!("{}: listing failed: {}", name, e);
					CatalogEntry::Unavailable
				}
			};
			self.entries.insert(name.clone(), entry);
		}

		match self.entries.get(&name) {
			Some(CatalogEntry::Listed(listing)) => Ok(listing),
			_ => Err(ProviderError::request(&name, "catalog unavailable for this pass").into()),
		}
	}

	/// Forget one provider's catalog (configuration changed).
	pub fn invalidate(&mut self, name: &str) {
		self.entries.remove(name);
	}

	/// Forget everything (a sync pass completed).
	pub fn clear(&mut self) {
		self.entries.clear();
	}
}

// vim: ts=4
