use metrics_util::AtomicBucket;
use std::sync::Arc;
use std::time::Duration;

/// Latency samples of one test case run, one lock-free bucket per worker.
pub struct LatencyAggregator {
    slots: Box<[AtomicBucket<Duration>]>,
}

impl LatencyAggregator {
    /// Create an aggregator with `n` slots and the single writer handle for each.
    pub fn with_slots(n: usize) -> (Arc<Self>, Vec<LatencySink>) {
        let slots = (0..n).map(|_| AtomicBucket::new()).collect();
        let aggregator = Arc::new(Self { slots });
        let sinks = (0..n)
            .map(|slot| LatencySink { aggregator: Arc::clone(&aggregator), slot })
            .collect();
        (aggregator, sinks)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Take every sample appended since the previous drain, slot by slot.
    /// Order within a slot is not preserved.
    pub fn drain_all(&self) -> Vec<Duration> {
        let mut samples = Vec::new();
        for slot in self.slots.iter() {
            slot.clear_with(|block| samples.extend_from_slice(block));
        }
        samples
    }
}

/// Write handle for one aggregator slot. Not `Clone`: each slot has exactly one writer.
pub struct LatencySink {
    aggregator: Arc<LatencyAggregator>,
    slot: usize,
}

impl LatencySink {
    pub fn append(&self, sample: Duration) {
        self.aggregator.slots[self.slot].push(sample);
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}
