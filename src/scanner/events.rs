use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::debug;

use super::{ScanError, ScanResult};
use crate::error::Error;

/// Buffered events between the scan thread and its consumer.
pub const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    pub scan_id: String,
    pub folders_scanned: usize,
    pub total_folders: usize,
    pub current_path: String,
    pub projects_found: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDiscovery {
    pub scan_id: String,
    pub project_path: String,
    pub is_valid: bool,
    pub has_breadcrumbs: bool,
    pub invalid_breadcrumbs: bool,
    pub stale_breadcrumbs: bool,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ScanEvent {
    Progress(ScanProgress),
    Discovered(ProjectDiscovery),
    #[serde(rename_all = "camelCase")]
    Completed { scan_id: String, result: ScanResult },
    #[serde(rename_all = "camelCase")]
    Failed { scan_id: String, error: ScanError },
    #[serde(rename_all = "camelCase")]
    Cancelled { scan_id: String },
}

impl ScanEvent {
    pub fn scan_id(&self) -> &str {
        match self {
            ScanEvent::Progress(p) => &p.scan_id,
            ScanEvent::Discovered(d) => &d.scan_id,
            ScanEvent::Completed { scan_id, .. }
            | ScanEvent::Failed { scan_id, .. }
            | ScanEvent::Cancelled { scan_id } => scan_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanEvent::Completed { .. } | ScanEvent::Failed { .. } | ScanEvent::Cancelled { .. }
        )
    }
}

/// Producer half of the scan event stream.
///
/// Progress is offered with `try_send` and dropped when the consumer lags; every
/// other event blocks until the consumer takes it. A sender without a channel
/// discards everything, for callers that only want the returned `ScanResult`.
pub struct EventSender {
    scan_id: String,
    tx: Option<SyncSender<ScanEvent>>,
}

impl EventSender {
    pub fn new(scan_id: &str, tx: SyncSender<ScanEvent>) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            tx: Some(tx),
        }
    }

    pub fn detached(scan_id: &str) -> Self {
        Self {
            scan_id: scan_id.to_string(),
            tx: None,
        }
    }

    pub fn scan_id(&self) -> &str {
        &self.scan_id
    }

    /// Returns false when the event was dropped.
    pub fn progress(&self, progress: ScanProgress) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(ScanEvent::Progress(progress)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn send(&self, event: ScanEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("Scan {}: event consumer has gone away", self.scan_id);
            }
        }
    }
}

/// Shared cancellation flag, polled by the scanner before every folder visit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub fn event_channel(scan_id: &str) -> (EventSender, Receiver<ScanEvent>) {
    let (tx, rx) = mpsc::sync_channel(EVENT_BUFFER);
    (EventSender::new(scan_id, tx), rx)
}

/// A scan running on its own thread.
///
/// Drain `events()` until it ends, then `join()`. Joining without draining is
/// fine too: the receiver is dropped first so the scan never blocks on a full buffer.
pub struct ScanHandle {
    pub scan_id: String,
    cancel: CancelToken,
    events: Receiver<ScanEvent>,
    thread: JoinHandle<Result<ScanResult, Error>>,
}

impl ScanHandle {
    pub(crate) fn new(
        scan_id: String,
        cancel: CancelToken,
        events: Receiver<ScanEvent>,
        thread: JoinHandle<Result<ScanResult, Error>>,
    ) -> Self {
        Self {
            scan_id,
            cancel,
            events,
            thread,
        }
    }

    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn join(self) -> Result<ScanResult, Error> {
        drop(self.events);
        self.thread
            .join()
            .map_err(|_| Error::Other("Scan thread panicked".to_string()))?
    }
}
