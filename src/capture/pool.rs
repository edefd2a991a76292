//! Fixed-depth frame buffer pool shared by the streaming and inference paths

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crossbeam::utils::CachePadded;
use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::error;

use crate::{CaptureError, InitError};

/// Backing memory of one pool slot.
pub(crate) struct Slot {
    pub(crate) index: usize,
    pub(crate) data: Vec<u8>,
}

/// Pool of `depth` slots allocated once at startup.
///
/// Free slots sit in a bounded channel; checkout takes one, checkin puts it
/// back. The channel serializes issuance, so two contexts racing on
/// checkout always receive distinct slots.
pub struct FramePool {
    free_tx: Sender<Slot>,
    free_rx: Receiver<Slot>,
    depth: usize,
    slot_size: usize,

    /// Statistics
    stats: CachePadded<Stats>,
}

#[derive(Default)]
struct Stats {
    issued: AtomicUsize,
    returned: AtomicUsize,
    timeouts: AtomicUsize,
}

/// Snapshot of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub issued: usize,
    pub returned: usize,
    pub timeouts: usize,
}

impl PoolStats {
    pub fn outstanding(&self) -> usize {
        self.issued - self.returned
    }
}

impl FramePool {
    pub fn new(depth: usize, slot_size: usize) -> Result<Self, InitError> {
        if depth == 0 {
            return Err(InitError::Config("pool depth must be at least 1".into()));
        }
        if slot_size == 0 {
            return Err(InitError::Config("frame slot size must be non-zero".into()));
        }

        let (free_tx, free_rx) = flume::bounded(depth);
        for index in 0..depth {
            let mut data = Vec::new();
            data.try_reserve_exact(slot_size)
                .map_err(|_| InitError::PoolAllocation { depth, slot_size })?;
            data.resize(slot_size, 0);
            free_tx
                .try_send(Slot { index, data })
                .map_err(|_| InitError::PoolAllocation { depth, slot_size })?;
        }

        Ok(Self {
            free_tx,
            free_rx,
            depth,
            slot_size,
            stats: CachePadded::new(Stats::default()),
        })
    }

    /// Block until a slot is free or `timeout` elapses.
    pub(crate) fn checkout(&self, timeout: Duration) -> Result<Slot, CaptureError> {
        match self.free_rx.recv_timeout(timeout) {
            Ok(slot) => {
                self.stats.issued.fetch_add(1, Ordering::Relaxed);
                Ok(slot)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
                Err(CaptureError::Timeout(timeout))
            }
            // Unreachable while the pool owns its sender
            Err(RecvTimeoutError::Disconnected) => {
                Err(CaptureError::HardwareFault("frame pool closed".into()))
            }
        }
    }

    pub(crate) fn checkin(&self, slot: Slot) {
        let index = slot.index;
        match self.free_tx.try_send(slot) {
            Ok(()) => {
                self.stats.returned.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => error!("frame slot {} could not be returned: {}", index, e),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            issued: self.stats.issued.load(Ordering::Relaxed),
            returned: self.stats.returned.load(Ordering::Relaxed),
            timeouts: self.stats.timeouts.load(Ordering::Relaxed),
        }
    }
}
