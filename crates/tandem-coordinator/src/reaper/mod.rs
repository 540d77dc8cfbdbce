//! Background TTL reaper.
//!
//! The reaper is a named thread that wakes every reaper interval and aborts
//! transactions that have been idle for longer than their TTL. It holds only
//! a weak reference to the coordinator and exits on its own once the
//! coordinator is dropped.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::coordinator::Coordinator;

const REAPER_THREAD_NAME: &str = "tandem-reaper";

/// Handle to a running reaper thread.
///
/// Dropping the handle stops the thread and waits for it.
#[derive(Debug)]
pub struct ReaperHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    /// Stops the reaper and waits for the thread to exit. Idempotent.
    pub fn shutdown(&mut self) {
        // Dropping the sender wakes the thread with a disconnect.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("{} thread panicked", REAPER_THREAD_NAME);
            }
        }
    }

    /// Returns true while the thread has not been shut down.
    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Starts the reaper for `coordinator`, ticking at its configured interval.
pub fn spawn(coordinator: &Arc<Coordinator>) -> std::io::Result<ReaperHandle> {
    spawn_with_interval(coordinator, coordinator.config().reaper_interval())
}

/// Starts the reaper with an explicit interval.
pub fn spawn_with_interval(
    coordinator: &Arc<Coordinator>,
    interval: Duration,
) -> std::io::Result<ReaperHandle> {
    let (stop, stopped) = mpsc::channel::<()>();
    let weak = Arc::downgrade(coordinator);

    let thread = thread::Builder::new()
        .name(REAPER_THREAD_NAME.to_string())
        .spawn(move || run(&weak, &stopped, interval))?;

    tracing::info!("Started {} (interval {:?})", REAPER_THREAD_NAME, interval);
    Ok(ReaperHandle {
        stop: Some(stop),
        thread: Some(thread),
    })
}

fn run(coordinator: &Weak<Coordinator>, stopped: &mpsc::Receiver<()>, interval: Duration) {
    loop {
        match stopped.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let Some(coordinator) = coordinator.upgrade() else {
            break;
        };
        let reaped = coordinator.reap_expired();
        if !reaped.is_empty() {
            tracing::debug!("Reaper pass aborted {} transactions", reaped.len());
        }
    }
    tracing::info!("{} stopped", REAPER_THREAD_NAME);
}

impl Coordinator {
    /// Starts the TTL reaper for this coordinator.
    pub fn start_reaper(self: &Arc<Self>) -> std::io::Result<ReaperHandle> {
        spawn(self)
    }
}
