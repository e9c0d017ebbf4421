/// Produces document keys unique to one worker of one run.
///
/// Keys are `{prefix}-{run}-{worker}-{counter}`, or `{run}-{worker}-{counter}`
/// without a prefix. The counter only grows, so an instance never repeats a key,
/// and distinct `(run, worker)` pairs never share one.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    stem: String,
    counter: u64,
}

impl KeyGenerator {
    pub fn new(run_index: usize, worker_index: usize, prefix: Option<&str>) -> Self {
        let stem = match prefix.filter(|p| !p.is_empty()) {
            Some(p) => format!("{}-{}-{}", p, run_index, worker_index),
            None => format!("{}-{}", run_index, worker_index),
        };
        Self { stem, counter: 0 }
    }

    pub fn generate_keys(&mut self, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| {
                let key = format!("{}-{}", self.stem, self.counter);
                self.counter += 1;
                key
            })
            .collect()
    }
}
