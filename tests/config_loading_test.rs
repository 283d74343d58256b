/// Configuration loading tests
///
/// Tests that profile config files are found in the state directory, that
/// both TOML and JSON5 are accepted, and that tagged provider entries come
/// out as the right variants.
use std::fs;
use tempfile::TempDir;

use backr::config::{Config, ProviderConfig, ProviderKind};

#[test]
fn test_missing_config_file_falls_back_to_defaults() {
	let dir = TempDir::new().expect("Failed to create temp dir");

	let config = Config::load(dir.path(), "default").expect("load");
	assert_eq!(config.profile, "default");
	assert_eq!(config.quiescence_window_secs, 15);
	assert_eq!(config.sync_tolerance_ms, 5000);
	assert!(config.providers.is_empty());
	assert_eq!(config.backr_dir, dir.path());
}

#[test]
fn test_toml_config_with_tagged_providers() {
	let dir = TempDir::new().expect("Failed to create temp dir");
	let config_toml = r#"
collectionName = "vault"
collectionDir = "/srv/notes"
quiescenceWindowSecs = 30
keyPrefix = "backups"
excludePatterns = ["draft-*"]

[[providers]]
kind = "filesystem"
name = "usb"
root = "/mnt/usb"

[[providers]]
kind = "webdav"
url = "https://dav.example.com/notes"
username = "me"
password = "secret"

[[providers]]
kind = "object-store"
bucket = "vault-backups"
endpoint = "https://account.r2.cloudflarestorage.com"
accessKeyId = "key"
secretAccessKey = "shh"
"#;
	fs::write(dir.path().join("work.toml"), config_toml).expect("write config");

	let config = Config::load(dir.path(), "work").expect("load");
	assert_eq!(config.profile, "work");
	assert_eq!(config.collection_name, "vault");
	assert_eq!(config.quiescence_window_secs, 30);
	assert_eq!(config.key_prefix, "backups");
	assert_eq!(config.exclude_patterns, vec!["draft-*".to_string()]);

	assert_eq!(config.providers.len(), 3);
	assert_eq!(config.providers[0].kind(), ProviderKind::Filesystem);
	assert_eq!(config.providers[0].name(), "usb");
	assert_eq!(config.providers[1].kind(), ProviderKind::Webdav);
	assert_eq!(config.providers[2].kind(), ProviderKind::ObjectStore);

	match &config.providers[1] {
		ProviderConfig::Webdav(c) => {
			assert_eq!(c.url, "https://dav.example.com/notes");
			assert_eq!(c.username, "me");
			assert!(c.enabled);
		}
		other => panic!("expected webdav, got {:?}", other),
	}
}

#[test]
fn test_json5_config_is_accepted() {
	let dir = TempDir::new().expect("Failed to create temp dir");
	let config_json5 = r#"{
		// home profile backs up to a single local drive
		collectionName: "home",
		syncToleranceMs: 2500,
		providers: [
			{ kind: "filesystem", name: "drive", root: "/mnt/drive", enabled: false },
		],
	}"#;
	fs::write(dir.path().join("home.json5"), config_json5).expect("write config");

	let config = Config::load(dir.path(), "home").expect("load");
	assert_eq!(config.collection_name, "home");
	assert_eq!(config.sync_tolerance_ms, 2500);
	assert_eq!(config.providers.len(), 1);
	assert!(!config.providers[0].enabled());
}

#[test]
fn test_toml_takes_precedence_over_json5() {
	let dir = TempDir::new().expect("Failed to create temp dir");
	fs::write(dir.path().join("default.toml"), "collectionName = \"from-toml\"\n")
		.expect("write toml");
	fs::write(dir.path().join("default.json5"), "{ collectionName: \"from-json5\" }")
		.expect("write json5");

	let config = Config::load(dir.path(), "default").expect("load");
	assert_eq!(config.collection_name, "from-toml");
}

#[test]
fn test_invalid_config_reports_path() {
	let dir = TempDir::new().expect("Failed to create temp dir");
	fs::write(dir.path().join("broken.toml"), "providers = \"not-a-list\"\n").expect("write");

	let err = Config::load(dir.path(), "broken").expect_err("must fail");
	assert!(err.to_string().contains("broken.toml"));
}

// vim: ts=4
