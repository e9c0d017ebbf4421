use docbench_client::Protocol;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};

use crate::aggregator::LatencyAggregator;
use crate::backend::{BackendFactory, StopSignal};
use crate::collector::Collector;
use crate::config::RunConfiguration;
use crate::error::HarnessError;
use crate::setup::DatabaseSetup;
use crate::testcase::{create_test_case, TestCaseKind};
use crate::worker::{Worker, WorkerState};

/// Totals of one test case in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseReport {
    pub kind: TestCaseKind,
    pub run_index: usize,
    /// Samples reported across all intervals.
    pub requests: u64,
    pub intervals: u64,
    pub executions: u64,
    pub failures: u64,
    pub worker_states: Vec<WorkerState>,
}

fn protocol_name(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Http1 => "http1",
        Protocol::Http2 => "http2",
    }
}

/// Runs every configured test case for every run.
pub struct Orchestrator {
    config: Arc<RunConfiguration>,
    factory: Arc<dyn BackendFactory>,
    setup: Box<dyn DatabaseSetup>,
    stop: StopSignal,
}

impl Orchestrator {
    pub fn new(
        config: RunConfiguration,
        factory: Arc<dyn BackendFactory>,
        setup: Box<dyn DatabaseSetup>,
        stop: StopSignal,
    ) -> Self {
        Self { config: Arc::new(config), factory, setup, stop }
    }

    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Validate, then execute all runs, writing markers and CSV rows to `out`.
    pub fn run(&self, out: &mut dyn Write) -> Result<Vec<TestCaseReport>, HarnessError> {
        let config = &self.config;
        config.validate()?;

        let mut reports = Vec::new();
        for run_index in 0..config.runs {
            if self.stop.is_stopped() {
                break;
            }
            if run_index > 0 && !config.delay.is_zero() {
                if config.verbose {
                    writeln!(out, "## SLEEP {} seconds till next run", config.delay.as_secs())?;
                }
                thread::sleep(config.delay);
            }
            if run_index == 0 || config.drop_db {
                self.setup.setup(config, config.drop_db)?;
            }
            if config.verbose {
                writeln!(out, "# RUN {}", run_index + 1)?;
            }
            info!(run = run_index, "run started");

            for &kind in &config.test_cases {
                if self.stop.is_stopped() {
                    warn!(run = run_index, test_case = %kind, "stopped before test case");
                    break;
                }
                if config.verbose {
                    writeln!(
                        out,
                        "## TEST CASE \"{}\". {} threads, {} connections/thread, {} protocol",
                        kind,
                        config.threads,
                        config.connection.connections,
                        protocol_name(config.connection.protocol)
                    )?;
                }
                reports.push(self.run_test_case(kind, run_index, out)?);
            }
        }
        Ok(reports)
    }

    fn run_test_case(
        &self,
        kind: TestCaseKind,
        run_index: usize,
        out: &mut dyn Write,
    ) -> Result<TestCaseReport, HarnessError> {
        let config = &self.config;
        info!(run = run_index, test_case = %kind, threads = config.threads, "test case started");

        let (aggregator, sinks) = LatencyAggregator::with_slots(config.threads);
        let mut workers = Vec::with_capacity(config.threads);
        for (index, sink) in sinks.into_iter().enumerate() {
            let test_case = create_test_case(kind, config, self.factory.as_ref(), run_index, index, sink)?;
            workers.push(Worker::new(index, test_case, config.budget, self.stop.clone()));
        }

        let mut started = Ok(());
        for worker in &mut workers {
            if let Err(e) = worker.start() {
                error!(worker = worker.index(), error = %e, "worker did not start");
                started = Err(e);
                break;
            }
        }

        let collected = match &started {
            Ok(()) => {
                let collector = Collector::new(config.output_interval, config.threads, config.batch_size);
                Some(collector.run(&aggregator, || workers.iter().any(Worker::is_alive), out))
            }
            Err(_) => None,
        };

        let mut report = TestCaseReport {
            kind,
            run_index,
            requests: 0,
            intervals: 0,
            executions: 0,
            failures: 0,
            worker_states: Vec::with_capacity(workers.len()),
        };
        for worker in &mut workers {
            if let Some(test_case) = worker.join() {
                report.executions += test_case.executions();
                report.failures += test_case.failures();
            }
            report.worker_states.push(worker.state());
            worker.close();
        }

        started?;
        if let Some(totals) = collected.transpose()? {
            report.requests = totals.requests;
            report.intervals = totals.intervals;
        }
        info!(
            run = run_index,
            test_case = %kind,
            requests = report.requests,
            failures = report.failures,
            "test case finished"
        );
        Ok(report)
    }
}
