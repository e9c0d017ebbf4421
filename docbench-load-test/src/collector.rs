use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::aggregator::LatencyAggregator;

pub const HEADER: &str = "elapsed time (sec), threads, requests, documents, latency average (ms), \
latency min (ms), latency max (ms), latency 50th (ms), latency 95th (ms), latency 99th (ms)";

/// Nearest-rank index of percentile `p` in `n` sorted samples: `floor(n * p / 100) - 1`,
/// clamped to the valid range.
pub fn percentile_index(n: usize, p: usize) -> usize {
    (n * p / 100).saturating_sub(1).min(n.saturating_sub(1))
}

/// Latency summary of one reporting interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStatistics {
    pub count: usize,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl SummaryStatistics {
    /// Summarize samples already sorted ascending. No samples gives all zeros.
    pub fn from_sorted(samples: &[Duration]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self::default();
        }
        let total: u128 = samples.iter().map(Duration::as_nanos).sum();
        let mean = u64::try_from(total / n as u128).unwrap_or(u64::MAX);
        Self {
            count: n,
            mean: Duration::from_nanos(mean),
            min: samples[0],
            max: samples[n - 1],
            p50: samples[percentile_index(n, 50)],
            p95: samples[percentile_index(n, 95)],
            p99: samples[percentile_index(n, 99)],
        }
    }

    /// Sort `samples` in place and summarize them.
    pub fn compute(samples: &mut [Duration]) -> Self {
        samples.sort_unstable();
        Self::from_sorted(samples)
    }
}

/// One CSV row of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalReport {
    pub interval: Duration,
    pub threads: usize,
    pub requests: usize,
    pub documents: usize,
    pub statistics: SummaryStatistics,
}

fn millis(d: Duration) -> String {
    format!("{:.3}", d.as_micros() as f64 / 1000.0)
}

impl IntervalReport {
    pub fn to_row(&self) -> String {
        let s = &self.statistics;
        [
            self.interval.as_secs_f64().to_string(),
            self.threads.to_string(),
            self.requests.to_string(),
            self.documents.to_string(),
            millis(s.mean),
            millis(s.min),
            millis(s.max),
            millis(s.p50),
            millis(s.p95),
            millis(s.p99),
        ]
        .join(", ")
    }
}

/// Totals over all rows a collector emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorTotals {
    pub requests: u64,
    pub intervals: u64,
}

/// Periodically drains the aggregator and writes one row per interval.
pub struct Collector {
    interval: Duration,
    threads: usize,
    batch_size: usize,
}

impl Collector {
    pub fn new(interval: Duration, threads: usize, batch_size: usize) -> Self {
        Self { interval, threads, batch_size }
    }

    fn report(&self, samples: &mut [Duration]) -> IntervalReport {
        let statistics = SummaryStatistics::compute(samples);
        IntervalReport {
            interval: self.interval,
            threads: self.threads,
            requests: statistics.count,
            documents: statistics.count * self.batch_size,
            statistics,
        }
    }

    fn emit(&self, out: &mut dyn Write, totals: &mut CollectorTotals, samples: &mut [Duration]) -> io::Result<()> {
        let report = self.report(samples);
        debug!(requests = report.requests, "interval drained");
        writeln!(out, "{}", report.to_row())?;
        out.flush()?;
        totals.requests += report.requests as u64;
        totals.intervals += 1;
        Ok(())
    }

    /// Write the header, then report every interval until `any_alive` says all
    /// workers are done. Liveness is probed before each drain, so the last
    /// drain sees every sample the workers produced.
    pub fn run(
        &self,
        aggregator: &LatencyAggregator,
        any_alive: impl Fn() -> bool,
        out: &mut dyn Write,
    ) -> io::Result<CollectorTotals> {
        let mut totals = CollectorTotals::default();
        writeln!(out, "{}", HEADER)?;

        if !any_alive() {
            let mut samples = aggregator.drain_all();
            if !samples.is_empty() {
                self.emit(out, &mut totals, &mut samples)?;
            }
            return Ok(totals);
        }

        loop {
            thread::sleep(self.interval);
            let alive = any_alive();
            let mut samples = aggregator.drain_all();
            self.emit(out, &mut totals, &mut samples)?;
            if !alive {
                break;
            }
        }
        Ok(totals)
    }
}
