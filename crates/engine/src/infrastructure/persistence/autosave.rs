//! Debounced autosave.
//!
//! The session actor hands the latest full snapshot to [`Autosaver::schedule`]
//! after every committed mutation. A background task waits for the debounce
//! window to pass without a newer request and then writes the file. A newer
//! request for a different path flushes the pending one first, unless it
//! was sent with [`Autosaver::retarget`] because the file itself moved.
//!
//! Failed writes are kept per path and retried every window until they
//! succeed, a newer write for the same path supersedes them, or the file is
//! saved or deleted explicitly.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use mapkeep_domain::GameSnapshot;

use super::location_store::LocationStore;

/// Write attempts made for each outstanding request once the session is gone.
const SHUTDOWN_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct AutosaveRequest {
    pub path: String,
    pub snapshot: GameSnapshot,
    /// Replace a pending write for another path instead of flushing it
    pub retarget: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Signal {
    Write(AutosaveRequest),
    /// An explicit save wrote `path`; nothing pending is worth writing
    Cancel { path: String },
    /// `path` is gone; never write it again
    Discard { path: String },
}

/// Handle used by the session to schedule writes.
#[derive(Debug, Clone)]
pub struct Autosaver {
    tx: Arc<watch::Sender<Option<Signal>>>,
}

impl Autosaver {
    pub fn schedule(&self, path: impl Into<String>, snapshot: GameSnapshot) {
        self.tx.send_replace(Some(Signal::Write(AutosaveRequest {
            path: path.into(),
            snapshot,
            retarget: false,
        })));
    }

    /// Schedule a write after the current file was renamed or moved. Any
    /// pending write for the old path is dropped rather than flushed.
    pub fn retarget(&self, path: impl Into<String>, snapshot: GameSnapshot) {
        self.tx.send_replace(Some(Signal::Write(AutosaveRequest {
            path: path.into(),
            snapshot,
            retarget: true,
        })));
    }

    /// Drop the pending write and any failed write for `path`, which an
    /// explicit save just wrote.
    pub fn cancel(&self, path: impl Into<String>) {
        self.tx
            .send_replace(Some(Signal::Cancel { path: path.into() }));
    }

    /// Drop every write for `path`, which was deleted.
    pub fn discard(&self, path: impl Into<String>) {
        self.tx
            .send_replace(Some(Signal::Discard { path: path.into() }));
    }
}

/// Spawn the autosave task. It exits (after a final flush) once every
/// [`Autosaver`] handle has been dropped.
pub fn spawn_autosaver(store: Arc<LocationStore>, window: Duration) -> (Autosaver, JoinHandle<()>) {
    let (tx, rx) = watch::channel(None);
    let handle = tokio::spawn(run(store, window, rx));
    (Autosaver { tx: Arc::new(tx) }, handle)
}

/// The latest request plus failed writes for paths the session moved away from.
#[derive(Debug, Default)]
struct Queue {
    pending: Option<AutosaveRequest>,
    failed: BTreeMap<String, AutosaveRequest>,
}

impl Queue {
    fn is_empty(&self) -> bool {
        self.pending.is_none() && self.failed.is_empty()
    }

    async fn apply(&mut self, store: &LocationStore, signal: Signal) {
        match signal {
            Signal::Write(request) => {
                self.failed.remove(&request.path);
                if let Some(old) = self.pending.take() {
                    if old.path != request.path && !request.retarget {
                        self.keep_failed(flush(store, old).await);
                    }
                }
                self.pending = Some(request);
            }
            Signal::Cancel { path } => {
                self.pending = None;
                self.failed.remove(&path);
            }
            Signal::Discard { path } => {
                if self.pending.as_ref().is_some_and(|p| p.path == path) {
                    self.pending = None;
                }
                self.failed.remove(&path);
            }
        }
    }

    /// Try every outstanding write once; failures stay queued.
    async fn flush_all(&mut self, store: &LocationStore) {
        if let Some(request) = self.pending.take() {
            self.pending = flush(store, request).await;
        }
        for (_, request) in std::mem::take(&mut self.failed) {
            self.keep_failed(flush(store, request).await);
        }
    }

    fn keep_failed(&mut self, request: Option<AutosaveRequest>) {
        if let Some(request) = request {
            self.failed.insert(request.path.clone(), request);
        }
    }
}

async fn run(
    store: Arc<LocationStore>,
    window: Duration,
    mut rx: watch::Receiver<Option<Signal>>,
) {
    let mut queue = Queue::default();

    loop {
        let changed = if queue.is_empty() {
            rx.changed().await
        } else {
            match tokio::time::timeout(window, rx.changed()).await {
                Ok(changed) => changed,
                Err(_) => {
                    // Quiet for a whole window.
                    queue.flush_all(&store).await;
                    continue;
                }
            }
        };

        if changed.is_err() {
            break;
        }

        let signal = rx.borrow_and_update().clone();
        if let Some(signal) = signal {
            queue.apply(&store, signal).await;
        }
    }

    for attempt in 1..=SHUTDOWN_ATTEMPTS {
        queue.flush_all(&store).await;
        if queue.is_empty() {
            break;
        }
        if attempt < SHUTDOWN_ATTEMPTS {
            tokio::time::sleep(window).await;
        }
    }
    for path in queue.pending.iter().map(|r| &r.path).chain(queue.failed.keys()) {
        tracing::error!(path = %path, "Autosave abandoned at shutdown");
    }
    tracing::debug!("Autosave task stopped");
}

/// Write a request. On failure it is handed back so the next window retries.
async fn flush(store: &LocationStore, request: AutosaveRequest) -> Option<AutosaveRequest> {
    match store.write_snapshot(&request.path, &request.snapshot).await {
        Ok(path) => {
            tracing::debug!(path = %path, "Autosaved location");
            None
        }
        Err(e) => {
            tracing::warn!(path = %request.path, error = %e, "Autosave failed, will retry");
            Some(request)
        }
    }
}
