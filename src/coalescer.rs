//! Change coalescing with reset-on-edit debouncing
//!
//! Buffers change events and fires exactly one processing pass after a
//! configurable period of total inactivity, measured from the most recent
//! event. The buffer, deadline and processing flag are owned by a single
//! worker task; callers interact through a cloneable channel handle, so no
//! lock is ever shared with the edit path.
//!
//! Guarantees:
//! - at most one processing pass is in flight at any time
//! - events arriving during a pass are buffered for the next pass
//! - shutdown drains a non-empty buffer through one final pass, bypassing
//!   the quiescence wait
//! - a failing (or panicking) pass consumes its snapshot and never poisons
//!   the worker: the burst is processed at most once

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use crate::error::BackupError;
use crate::logging::*;
use crate::types::ChangeEvent;

/// Receives the snapshot of buffered changes when a quiescence window
/// closes. Failed snapshots are consumed, not redelivered.
#[async_trait]
pub trait PassHandler: Send + Sync + 'static {
	async fn run_pass(&self, changes: Vec<ChangeEvent>) -> Result<(), BackupError>;
}

enum Command {
	Change(ChangeEvent),
	Flush,
	Shutdown(oneshot::Sender<()>),
}

/// Buffer and timer state for one coalescing cycle
struct PendingChangeSet {
	events: Vec<ChangeEvent>,
	last_edit: Option<Instant>,
	deadline: Option<Instant>,
}

impl PendingChangeSet {
	fn new() -> Self {
		PendingChangeSet { events: Vec::new(), last_edit: None, deadline: None }
	}

	/// Append an event and re-arm the deadline from now. The previous
	/// deadline is overwritten, never queued alongside.
	fn push(&mut self, event: ChangeEvent, window: Duration) {
		let now = Instant::now();
		self.events.push(event);
		self.last_edit = Some(now);
		self.deadline = Some(now + window);
	}

	/// Snapshot and clear the buffer, disarming the deadline.
	fn take(&mut self) -> Vec<ChangeEvent> {
		self.deadline = None;
		self.last_edit = None;
		std::mem::take(&mut self.events)
	}

	fn is_empty(&self) -> bool {
		self.events.is_empty()
	}

	fn len(&self) -> usize {
		self.events.len()
	}
}

/// Cloneable front end to a coalescer worker
#[derive(Clone)]
pub struct CoalescerHandle {
	tx: mpsc::UnboundedSender<Command>,
}

impl CoalescerHandle {
	/// Report a change. Never blocks the caller; a dead worker makes this
	/// a no-op.
	pub fn notify_change(&self, event: ChangeEvent) {
		let _ = self.tx.send(Command::Change(event));
	}

	/// Force an immediate pass of whatever is buffered, subject to the
	/// usual single-pass exclusion.
	pub fn flush(&self) {
		let _ = self.tx.send(Command::Flush);
	}

	/// Stop the worker: cancels the armed deadline, waits for an in-flight
	/// pass, then drains a non-empty buffer through one final pass.
	pub async fn shutdown(&self) {
		let (ack_tx, ack_rx) = oneshot::channel();
		if self.tx.send(Command::Shutdown(ack_tx)).is_ok() {
			let _ = ack_rx.await;
		}
	}
}

/// Change coalescer: owns the debounce state machine
pub struct Coalescer;

impl Coalescer {
	/// Spawn the worker task and return its handle. Dropping every handle
	/// triggers the same drain-and-exit path as `shutdown`.
	pub fn spawn(window: Duration, handler: Arc<dyn PassHandler>) -> CoalescerHandle {
		let (tx, rx) = mpsc::unbounded_channel();
		tokio::spawn(run(rx, window, handler));
		CoalescerHandle { tx }
	}
}

/// Run the handler on its own task and report back over `done_tx`. A
/// panicking handler is converted into an error so the processing flag is
/// always released.
fn spawn_pass(
	handler: Arc<dyn PassHandler>,
	snapshot: Vec<ChangeEvent>,
	done_tx: mpsc::UnboundedSender<Result<(), BackupError>>,
) {
	debug!("Starting processing pass with {} buffered changes", snapshot.len());
	tokio::spawn(async move {
		let result = match tokio::spawn(async move { handler.run_pass(snapshot).await }).await {
			Ok(result) => result,
			Err(join_err) => Err(BackupError::Other {
				message: format!("processing pass panicked: {}", join_err),
			}),
		};
		let _ = done_tx.send(result);
	});
}

fn log_pass_result(result: Result<(), BackupError>) {
	match result {
		Ok(()) => debug!("Processing pass finished"),
		Err(e) => error!("Processing pass failed: {}", e),
	}
}

async fn run(
	mut rx: mpsc::UnboundedReceiver<Command>,
	window: Duration,
	handler: Arc<dyn PassHandler>,
) {
	let mut pending = PendingChangeSet::new();
	let mut processing = false;
	let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Result<(), BackupError>>();

	loop {
		// Park far in the future while no deadline is armed; the branch
		// precondition keeps it from ever firing in that state.
		let deadline =
			pending.deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86400));

		tokio::select! {
			cmd = rx.recv() => match cmd {
				Some(Command::Change(event)) => {
					pending.push(event, window);
				}
				Some(Command::Flush) => {
					if !processing && !pending.is_empty() {
						processing = true;
						spawn_pass(handler.clone(), pending.take(), done_tx.clone());
					}
				}
				Some(Command::Shutdown(ack)) => {
					drain(&mut done_rx, &mut pending, &mut processing, handler.as_ref()).await;
					let _ = ack.send(());
					return;
				}
				None => {
					drain(&mut done_rx, &mut pending, &mut processing, handler.as_ref()).await;
					return;
				}
			},
			result = done_rx.recv(), if processing => {
				processing = false;
				log_pass_result(result.unwrap_or(Ok(())));
				// Events that accumulated during the pass get their own
				// window, measured from the most recent of them.
				if let Some(last) = pending.last_edit {
					pending.deadline = Some(last + window);
				}
			},
			_ = sleep_until(deadline), if pending.deadline.is_some() && !processing => {
				// Safety check: an event can slip in between timer fire and
				// cancellation. If the window has not truly elapsed since
				// the last edit, rearm instead of firing short.
				match pending.last_edit {
					Some(last) if Instant::now().duration_since(last) < window => {
						pending.deadline = Some(last + window);
					}
					_ => {
						processing = true;
						spawn_pass(handler.clone(), pending.take(), done_tx.clone());
					}
				}
			},
		}
	}
}

/// Forced flush at teardown: no quiescence wait, no new timer.
async fn drain(
	done_rx: &mut mpsc::UnboundedReceiver<Result<(), BackupError>>,
	pending: &mut PendingChangeSet,
	processing: &mut bool,
	handler: &dyn PassHandler,
) {
	pending.deadline = None;

	if *processing {
		if let Some(result) = done_rx.recv().await {
			log_pass_result(result);
		}
		*processing = false;
	}

	if !pending.is_empty() {
		info!("Draining {} buffered changes before shutdown", pending.len());
		if let Err(e) = handler.run_pass(pending.take()).await {
			error!("Shutdown drain pass failed: {}", e);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pending_change_set_reset_on_edit() {
		let window = Duration::from_secs(15);
		let mut pending = PendingChangeSet::new();

		pending.push(ChangeEvent::for_document("a"), window);
		let first_deadline = pending.deadline.expect("armed");

		pending.push(ChangeEvent::for_document("b"), window);
		let second_deadline = pending.deadline.expect("rearmed");

		assert!(second_deadline >= first_deadline);
		assert_eq!(pending.len(), 2);
	}

	#[test]
	fn test_pending_change_set_take_disarms() {
		let mut pending = PendingChangeSet::new();
		pending.push(ChangeEvent::for_document("a"), Duration::from_secs(1));

		let snapshot = pending.take();
		assert_eq!(snapshot.len(), 1);
		assert!(pending.is_empty());
		assert!(pending.deadline.is_none());
		assert!(pending.last_edit.is_none());
	}
}

// vim: ts=4
