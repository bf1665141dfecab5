//! Resource governor timer and footprint estimate.
//!
//! The governor owns no state. It periodically pushes a tick into the
//! session actor's queue; the actor does the actual trimming.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// Rough per-item costs in bytes. Only used to decide when to shed memory.
const TOKEN_BYTES: usize = 640;
const ASSET_BYTES: usize = 256;
const FLOOR_CELL_BYTES: usize = 64;
const FOG_CELL_BYTES: usize = 40;
const HISTORY_ENTRY_BYTES: usize = 512;

/// Entity counts feeding [`estimate_footprint`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Footprint {
    pub tokens: usize,
    pub assets: usize,
    pub floor_cells: usize,
    pub fog_cells: usize,
    /// Snapshots held by undo and redo (each holds a before and an after)
    pub undo_entries: usize,
    pub history_entries: usize,
}

/// Estimated bytes held by the board, the undo stacks and the history log.
///
/// Every undo entry is costed as two copies of the current board, which
/// over-estimates fog-only entries.
pub fn estimate_footprint(f: &Footprint) -> usize {
    let board = f.tokens * TOKEN_BYTES
        + f.assets * ASSET_BYTES
        + f.floor_cells * FLOOR_CELL_BYTES
        + f.fog_cells * FOG_CELL_BYTES;
    board
        .saturating_mul(1 + 2 * f.undo_entries)
        .saturating_add(f.history_entries * HISTORY_ENTRY_BYTES)
}

/// Send `make()` into `tx` every `period`, starting one period from now.
/// Stops once the receiver is gone.
pub fn spawn_ticker<T>(tx: mpsc::Sender<T>, period: Duration, make: fn() -> T) -> JoinHandle<()>
where
    T: Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            if tx.send(make()).await.is_err() {
                tracing::debug!("Governor ticker stopped");
                break;
            }
        }
    })
}
