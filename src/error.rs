//! Error types for backup and sync operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for backup engine operations
#[derive(Debug)]
pub enum BackupError {
	/// Pass-level setup failure; aborts the whole backup or sync pass
	Fatal { message: String },

	/// Invalid or incomplete configuration
	InvalidConfig { message: String },

	/// Document disappeared between enumeration and processing, or no
	/// remote payload existed for a pull. Counted as a skip, not a failure.
	NotFound { document: String },

	/// Document excluded by container/system-page rules or exclusion
	/// patterns. Counted as a skip, not a failure.
	Filtered { document: String },

	/// A single provider call failed (nested)
	Provider(ProviderError),

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl BackupError {
	/// Skips are per-document outcomes that land in the "skipped" bucket
	/// of a run summary instead of the failure counter.
	pub fn is_skip(&self) -> bool {
		matches!(self, BackupError::NotFound { .. } | BackupError::Filtered { .. })
	}

	pub fn fatal(message: impl Into<String>) -> Self {
		BackupError::Fatal { message: message.into() }
	}
}

impl fmt::Display for BackupError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BackupError::Fatal { message } => {
				write!(f, "Fatal: {}", message)
			}
			BackupError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			BackupError::NotFound { document } => {
				write!(f, "Document not found: {}", document)
			}
			BackupError::Filtered { document } => {
				write!(f, "Document excluded from backup: {}", document)
			}
			BackupError::Provider(e) => write!(f, "Provider error: {}", e),
			BackupError::Io(e) => write!(f, "I/O error: {}", e),
			BackupError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for BackupError {}

impl From<io::Error> for BackupError {
	fn from(e: io::Error) -> Self {
		BackupError::Io(e)
	}
}

impl From<String> for BackupError {
	fn from(e: String) -> Self {
		BackupError::Other { message: e }
	}
}

impl From<ProviderError> for BackupError {
	fn from(e: ProviderError) -> Self {
		BackupError::Provider(e)
	}
}

impl From<serde_json::Error> for BackupError {
	fn from(e: serde_json::Error) -> Self {
		BackupError::Other { message: format!("Serialization failed: {}", e) }
	}
}

/// Provider-specific errors. All of these are transient from the engine's
/// point of view: they contribute to the partial-failure aggregate of one
/// pass and are not retried within it.
#[derive(Debug)]
pub enum ProviderError {
	/// Required configuration field missing or empty
	MissingField { provider: String, field: String },

	/// Network or backend request failed
	Request { provider: String, message: String },

	/// Backend answered with an unexpected status
	UnexpectedStatus { provider: String, status: u16 },

	/// Stored manifest or listing entry could not be decoded
	BadManifest { provider: String, key: String, message: String },
}

impl fmt::Display for ProviderError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProviderError::MissingField { provider, field } => {
				write!(f, "{}: missing required config field '{}'", provider, field)
			}
			ProviderError::Request { provider, message } => {
				write!(f, "{}: request failed: {}", provider, message)
			}
			ProviderError::UnexpectedStatus { provider, status } => {
				write!(f, "{}: unexpected status {}", provider, status)
			}
			ProviderError::BadManifest { provider, key, message } => {
				write!(f, "{}: bad manifest for '{}': {}", provider, key, message)
			}
		}
	}
}

impl Error for ProviderError {}

impl ProviderError {
	pub fn request(provider: &str, err: impl fmt::Display) -> Self {
		ProviderError::Request { provider: provider.to_string(), message: err.to_string() }
	}
}


// vim: ts=4
