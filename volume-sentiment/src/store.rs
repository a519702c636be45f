use std::collections::VecDeque;
use volume_feed::Snapshot;

/// Bounded, insertion-ordered buffer of admitted snapshots.
///
/// After every admission no entry is older than the retention horizon relative to
/// the admission time, and at most `capacity` entries remain (oldest evicted first).
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    retention_ms: i64,
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
}

impl SnapshotStore {
    pub fn new(retention_ms: i64, capacity: usize) -> Self {
        Self {
            retention_ms,
            capacity,
            snapshots: VecDeque::with_capacity(capacity),
        }
    }

    /// Append `snapshot` then prune by age and by count.
    pub fn admit(&mut self, snapshot: Snapshot, now: i64) {
        self.snapshots.push_back(snapshot);

        let cutoff = now - self.retention_ms;
        self.snapshots.retain(|snapshot| snapshot.timestamp > cutoff);

        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.snapshots.clear();
    }

    pub fn all(&self) -> &VecDeque<Snapshot> {
        &self.snapshots
    }

    /// Snapshots strictly newer than `cutoff`, in insertion order.
    pub fn since(&self, cutoff: i64) -> impl Iterator<Item = &Snapshot> {
        self.snapshots
            .iter()
            .filter(move |snapshot| snapshot.timestamp > cutoff)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    fn snapshot(timestamp: i64) -> Snapshot {
        Snapshot::new("x", timestamp).with_buy(1.0, 100.0, 1)
    }

    #[test]
    fn test_capacity_keeps_most_recent() {
        let mut store = SnapshotStore::new(300_000, 1_000);

        // 1001 snapshots spread over 10 seconds
        for i in 0..1_001 {
            let ts = T + i * 10;
            store.admit(snapshot(ts), ts);
        }

        assert_eq!(store.len(), 1_000);
        assert_eq!(store.all().front().map(|s| s.timestamp), Some(T + 10));
        assert_eq!(store.all().back().map(|s| s.timestamp), Some(T + 10_000));
    }

    #[test]
    fn test_retention_prunes_relative_to_now() {
        let mut store = SnapshotStore::new(300_000, 1_000);
        store.admit(snapshot(T), T);
        store.admit(snapshot(T + 1_000), T + 1_000);

        // Exactly at the horizon is dropped
        store.admit(snapshot(T + 300_000), T + 300_000);
        assert_eq!(store.len(), 2);
        assert!(store.all().iter().all(|s| s.timestamp > T));
    }

    #[test]
    fn test_admitted_snapshot_older_than_horizon_is_dropped() {
        let mut store = SnapshotStore::new(300_000, 1_000);
        store.admit(snapshot(T - 400_000), T);
        assert!(store.is_empty());
    }

    #[test]
    fn test_since_and_reset() {
        let mut store = SnapshotStore::new(300_000, 1_000);
        for i in 0..5 {
            store.admit(snapshot(T + i * 1_000), T + i * 1_000);
        }

        let recent: Vec<i64> = store.since(T + 2_000).map(|s| s.timestamp).collect();
        assert_eq!(recent, vec![T + 3_000, T + 4_000]);

        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.since(0).count(), 0);
    }
}
