use docbench_load_test::aggregator::LatencyAggregator;
use std::thread;
use std::time::Duration;

#[test]
fn test_drain_takes_everything_once() {
    let (aggregator, sinks) = LatencyAggregator::with_slots(3);
    assert_eq!(aggregator.slot_count(), 3);
    assert_eq!(sinks.iter().map(|s| s.slot()).collect::<Vec<_>>(), vec![0, 1, 2]);

    sinks[0].append(Duration::from_millis(1));
    sinks[2].append(Duration::from_millis(3));
    sinks[2].append(Duration::from_millis(2));

    let mut first = aggregator.drain_all();
    first.sort();
    assert_eq!(first, vec![Duration::from_millis(1), Duration::from_millis(2), Duration::from_millis(3)]);
    assert!(aggregator.drain_all().is_empty());
}

#[test]
fn test_drain_spanning_blocks_keeps_every_sample() {
    let (aggregator, sinks) = LatencyAggregator::with_slots(1);
    let appended: Vec<Duration> = (0..200).map(Duration::from_micros).collect();
    for sample in &appended {
        sinks[0].append(*sample);
    }

    let mut drained = aggregator.drain_all();
    drained.sort();
    assert_eq!(drained, appended);
}

#[test]
fn test_concurrent_writers_lose_nothing() {
    let (aggregator, sinks) = LatencyAggregator::with_slots(4);
    let handles: Vec<_> = sinks
        .into_iter()
        .map(|sink| {
            thread::spawn(move || {
                for i in 0..1000 {
                    sink.append(Duration::from_micros(i));
                }
            })
        })
        .collect();

    // Drain while writers are still appending; every sample lands in exactly one drain.
    let mut total = 0;
    while handles.iter().any(|h| !h.is_finished()) {
        total += aggregator.drain_all().len();
    }
    for handle in handles {
        handle.join().unwrap();
    }
    total += aggregator.drain_all().len();
    assert_eq!(total, 4000);
}
