use docbench_load_test::aggregator::LatencyAggregator;
use docbench_load_test::collector::{percentile_index, Collector, IntervalReport, SummaryStatistics, HEADER};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[test]
fn test_percentile_index() {
    assert_eq!(percentile_index(100, 95), 94);
    assert_eq!(percentile_index(4, 50), 1);
    assert_eq!(percentile_index(4, 99), 2);
    assert_eq!(percentile_index(1, 50), 0);
    assert_eq!(percentile_index(1, 99), 0);
    assert_eq!(percentile_index(0, 50), 0);
    assert_eq!(percentile_index(10, 100), 9);
}

#[test]
fn test_statistics_of_no_samples_are_zero() {
    let stats = SummaryStatistics::compute(&mut []);
    assert_eq!(stats, SummaryStatistics::default());
    assert_eq!(stats.count, 0);
    assert_eq!(stats.max, Duration::ZERO);
}

#[test]
fn test_statistics_ordering() {
    let mut samples: Vec<Duration> = (1..=100).rev().map(ms).collect();
    let stats = SummaryStatistics::compute(&mut samples);

    assert_eq!(stats.count, 100);
    assert_eq!(stats.min, ms(1));
    assert_eq!(stats.max, ms(100));
    assert_eq!(stats.p50, ms(50));
    assert_eq!(stats.p95, ms(95));
    assert_eq!(stats.p99, ms(99));
    assert_eq!(stats.mean, Duration::from_micros(50_500));
    assert!(stats.min <= stats.p50 && stats.p50 <= stats.p95 && stats.p95 <= stats.p99 && stats.p99 <= stats.max);
}

#[test]
fn test_statistics_small_sample() {
    let mut samples = vec![ms(4), ms(1), ms(3), ms(2)];
    let stats = SummaryStatistics::compute(&mut samples);
    assert_eq!(stats.p50, ms(2));
    assert_eq!(stats.p95, ms(3));
    assert_eq!(stats.p99, ms(3));
    assert_eq!(stats.min, ms(1));
    assert_eq!(stats.max, ms(4));
}

#[test]
fn test_row_format() {
    let mut samples = vec![Duration::from_micros(1500), Duration::from_micros(2500)];
    let report = IntervalReport {
        interval: Duration::from_secs(1),
        threads: 4,
        requests: 2,
        documents: 20,
        statistics: SummaryStatistics::compute(&mut samples),
    };
    assert_eq!(report.to_row(), "1, 4, 2, 20, 2.000, 1.500, 2.500, 1.500, 1.500, 1.500");
}

#[test]
fn test_row_truncates_below_a_microsecond() {
    let mut samples = vec![Duration::from_nanos(1_234_999)];
    let report = IntervalReport {
        interval: Duration::from_secs(2),
        threads: 1,
        requests: 1,
        documents: 1,
        statistics: SummaryStatistics::compute(&mut samples),
    };
    assert!(report.to_row().ends_with("1.234, 1.234, 1.234, 1.234, 1.234, 1.234"), "{}", report.to_row());
}

#[test]
fn test_header_columns() {
    assert_eq!(HEADER.split(", ").count(), 10);
    assert!(HEADER.starts_with("elapsed time (sec), threads, requests, documents"));
}

#[test]
fn test_collector_drains_after_workers_finish() {
    let (aggregator, sinks) = LatencyAggregator::with_slots(2);
    for sink in &sinks {
        for i in 0..5 {
            sink.append(ms(i + 1));
        }
    }

    // Alive for the first two probes: one row with the samples, one empty final row.
    let probes = AtomicUsize::new(0);
    let any_alive = || probes.fetch_add(1, Ordering::SeqCst) < 2;

    let collector = Collector::new(Duration::from_millis(10), 2, 3);
    let mut out = Vec::new();
    let totals = collector.run(&aggregator, any_alive, &mut out).unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], HEADER);
    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains(", 2, 10, 30, "), "{}", lines[1]);
    assert!(lines[2].contains(", 2, 0, 0, 0.000"), "{}", lines[2]);
    assert_eq!(totals.requests, 10);
    assert_eq!(totals.intervals, 2);
}

#[test]
fn test_collector_with_no_live_workers() {
    let (aggregator, sinks) = LatencyAggregator::with_slots(1);
    sinks[0].append(ms(7));

    let collector = Collector::new(Duration::from_secs(60), 1, 1);
    let mut out = Vec::new();
    let totals = collector.run(&aggregator, || false, &mut out).unwrap();

    assert_eq!(totals.requests, 1);
    assert_eq!(totals.intervals, 1);
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
}
