//! Watch mode: feeds filesystem change notifications into the coalescer
//! until interrupted, then flushes whatever is still buffered.

use notify::{RecursiveMode, Watcher};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::coalescer::Coalescer;
use crate::config::Config;
use crate::engine::{BackupEngine, EnginePassHandler};
use crate::error::BackupError;
use crate::logging::*;
use crate::types::ChangeEvent;

pub async fn watch(engine: Arc<Mutex<BackupEngine>>, config: &Config) -> Result<(), BackupError> {
	let handler = Arc::new(EnginePassHandler::new(engine));
	let handle = Coalescer::spawn(config.quiescence_window(), handler);

	// The watcher reports on its own thread; hand events over a channel so
	// nothing blocks the notify callback.
	let (tx, mut rx) = mpsc::unbounded_channel();
	let mut watcher = notify::recommended_watcher(
		move |result: Result<notify::Event, notify::Error>| {
			let _ = tx.send(result);
		},
	)
	.map_err(|e| BackupError::Other { message: format!("Failed to create watcher: {}", e) })?;
	watcher.watch(&config.collection_dir, RecursiveMode::Recursive).map_err(|e| {
		BackupError::Other {
			message: format!("Failed to watch {}: {}", config.collection_dir.display(), e),
		}
	})?;

	info!(
		"Watching {} (quiescence window {}s)",
		config.collection_dir.display(),
		config.quiescence_window_secs
	);

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("Interrupted; flushing buffered changes");
				break;
			}
			event = rx.recv() => match event {
				Some(Ok(event)) => {
					if event.kind.is_access() {
						continue;
					}
					for path in event.paths {
						handle.notify_change(ChangeEvent::for_path(path));
					}
				}
				Some(Err(e)) => warn!("Watch error: {}", e),
				None => break,
			}
		}
	}

	handle.shutdown().await;
	Ok(())
}

// vim: ts=4
