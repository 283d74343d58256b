use clap::{Arg, Command};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::{env, fs, path};
use tokio::sync::Mutex;

use backr::config::Config;
use backr::engine::BackupEngine;
use backr::store::{FsDocumentStore, LogNotifier};
use backr::{logging, watch};

///////////////////////
// Utility functions //
///////////////////////

fn init_backr_dir() -> Result<path::PathBuf, Box<dyn Error>> {
	match env::var("HOME") {
		Ok(home) => {
			let backr_dir = path::PathBuf::from(home).join(".backr");

			match fs::metadata(&backr_dir) {
				Ok(meta) => {
					if meta.is_dir() {
						Ok(backr_dir)
					} else {
						Err(format!("{} exists, but it is not a directory!", backr_dir.display())
							.into())
					}
				}
				Err(_err) => {
					// Not exists
					fs::create_dir(&backr_dir)
						.map_err(|err| format!("Cannot create directory: {}", err))?;
					Ok(backr_dir)
				}
			}
		}
		Err(_e) => Err("Could not determine HOME directory!".into()),
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("BackR")
		.version("0.2.0")
		.about("Debounced multi-destination backup and sync for note collections")
		.subcommand_required(true)
		.arg(
			Arg::new("profile")
				.short('p')
				.long("profile")
				.value_name("PROFILE")
				.help("Profile"),
		)
		.arg(
			Arg::new("collection")
				.short('C')
				.long("collection")
				.value_name("DIR")
				.help("Collection directory (overrides the config file)"),
		)
		.subcommand(
			Command::new("backup")
				.about("Back up documents to all destinations")
				.arg(Arg::new("doc").long("doc").value_name("ID").help("Back up a single document")),
		)
		.subcommand(Command::new("sync").about("Reconcile local and remote state"))
		.subcommand(
			Command::new("watch")
				.about("Watch the collection and back up after each quiet period"),
		)
		.subcommand(Command::new("list").about("List remote backups per destination"))
		.get_matches();

	let backr_dir = init_backr_dir()?;
	let profile =
		matches.get_one::<String>("profile").map(|s| s.as_str()).unwrap_or("default");
	let mut config = Config::load(&backr_dir, profile)?;
	if let Some(dir) = matches.get_one::<String>("collection") {
		config.collection_dir = PathBuf::from(dir);
	}

	logging::init_tracing(&config.log_level);

	let store = Arc::new(FsDocumentStore::new(config.collection_dir.clone()));
	let mut engine = BackupEngine::new(config.clone(), store, Arc::new(LogNotifier)).await?;

	match matches.subcommand() {
		Some(("backup", sub_matches)) => {
			if let Some(id) = sub_matches.get_one::<String>("doc") {
				match engine.backup_document(id).await {
					Ok(_) => {}
					Err(e) if e.is_skip() => {}
					Err(e) => return Err(e.into()),
				}
			} else {
				engine.full_backup().await?;
			}
		}
		Some(("sync", _)) => {
			engine.sync_all().await?;
		}
		Some(("watch", _)) => {
			let engine = Arc::new(Mutex::new(engine));
			watch::watch(engine, &config).await?;
		}
		Some(("list", _)) => {
			for (name, result) in engine.list_remote().await {
				match result {
					Ok(count) => println!("{}: {} backups", name, count),
					Err(e) => println!("{}: listing failed: {}", name, e),
				}
			}
		}
		_ => unreachable!("subcommand required"),
	}

	Ok(())
}

// vim: ts=4
