use docbench_load_test::keygen::KeyGenerator;
use std::collections::HashSet;

#[test]
fn test_key_format() {
    let mut plain = KeyGenerator::new(2, 7, None);
    assert_eq!(plain.generate_keys(3), vec!["2-7-0", "2-7-1", "2-7-2"]);
    assert_eq!(plain.generate_keys(1), vec!["2-7-3"]);

    let mut prefixed = KeyGenerator::new(0, 1, Some("host-a"));
    assert_eq!(prefixed.generate_keys(2), vec!["host-a-0-1-0", "host-a-0-1-1"]);

    let mut empty_prefix = KeyGenerator::new(0, 1, Some(""));
    assert_eq!(empty_prefix.generate_keys(1), vec!["0-1-0"]);
}

#[test]
fn test_keys_unique_across_runs_and_workers() {
    let mut seen = HashSet::new();
    for run in 0..3 {
        for worker in 0..4 {
            let mut keygen = KeyGenerator::new(run, worker, Some("p"));
            for _ in 0..10 {
                for key in keygen.generate_keys(5) {
                    assert!(seen.insert(key.clone()), "duplicate key {}", key);
                }
            }
        }
    }
    assert_eq!(seen.len(), 3 * 4 * 50);
}
