//! # Snapshot storage.
//!
//! Opaque persisted processor state, keyed by the last processed position it covers.
//! The controller reads the latest snapshot while recovering from a fresh open and
//! writes one every `snapshot_period` processed events and on close.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Describes a stored snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotMetadata {
    /// Last log position reflected in the snapshot.
    pub position: i64,
    /// Size of the stored state in bytes.
    pub size: usize,
}

/// A stored snapshot and its state bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// Where the snapshot stands in the log.
    pub metadata: SnapshotMetadata,
    /// State produced by [`StreamProcessor::snapshot`](crate::StreamProcessor::snapshot).
    pub state: Vec<u8>,
}

/// Persistent store for processor snapshots.
pub trait SnapshotStorage: Send + Sync + 'static {
    /// Metadata of the most recent snapshot, if any.
    fn latest(&self) -> Option<SnapshotMetadata>;

    /// The most recent snapshot including its state.
    fn read_latest(&self) -> anyhow::Result<Option<Snapshot>>;

    /// Stores `state` as covering everything up to `position`.
    fn write(&self, position: i64, state: &[u8]) -> anyhow::Result<SnapshotMetadata>;
}

/// Keeps the latest snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStorage {
    latest: Mutex<Option<Snapshot>>,
    failing: AtomicBool,
}

impl InMemorySnapshotStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of the latest snapshot.
    pub fn latest_state(&self) -> Option<Vec<u8>> {
        self.latest.lock().as_ref().map(|s| s.state.clone())
    }

    /// Makes every read and write fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.failing.load(Ordering::Acquire),
            "snapshot storage unavailable"
        );
        Ok(())
    }
}

impl SnapshotStorage for InMemorySnapshotStorage {
    fn latest(&self) -> Option<SnapshotMetadata> {
        self.latest.lock().as_ref().map(|s| s.metadata)
    }

    fn read_latest(&self) -> anyhow::Result<Option<Snapshot>> {
        self.check()?;
        Ok(self.latest.lock().clone())
    }

    fn write(&self, position: i64, state: &[u8]) -> anyhow::Result<SnapshotMetadata> {
        self.check()?;
        let mut latest = self.latest.lock();
        if let Some(stored) = latest.as_ref() {
            anyhow::ensure!(
                position >= stored.metadata.position,
                "snapshot at {position} is older than stored {}",
                stored.metadata.position
            );
        }
        let metadata = SnapshotMetadata {
            position,
            size: state.len(),
        };
        *latest = Some(Snapshot {
            metadata,
            state: state.to_vec(),
        });
        Ok(metadata)
    }
}
