use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::backend::StopSignal;
use crate::config::RequestBudget;
use crate::error::HarnessError;
use crate::stopwatch::Stopwatch;
use crate::testcase::TestCase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    RequestBudgetExhausted,
    DurationExhausted,
    Cancelled,
    Failed,
    Closed,
}

/// One OS thread repeating one test case until its budget is spent.
pub struct Worker {
    index: usize,
    budget: RequestBudget,
    stop: StopSignal,
    state: WorkerState,
    test_case: Option<TestCase>,
    handle: Option<JoinHandle<(TestCase, WorkerState)>>,
}

impl Worker {
    pub fn new(index: usize, test_case: TestCase, budget: RequestBudget, stop: StopSignal) -> Self {
        Self { index, budget, stop, state: WorkerState::Created, test_case: Some(test_case), handle: None }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Spawn the worker thread. Calling it again after a successful start does nothing.
    pub fn start(&mut self) -> Result<(), HarnessError> {
        let Some(mut test_case) = self.test_case.take() else {
            return Ok(());
        };
        let index = self.index;
        let budget = self.budget;
        let stop = self.stop.clone();
        let handle = thread::Builder::new()
            .name(format!("docbench-worker-{}", index))
            .spawn(move || {
                let state = run_loop(index, &mut test_case, budget, &stop);
                (test_case, state)
            })
            .map_err(|source| HarnessError::WorkerSpawn { index, source })?;
        self.handle = Some(handle);
        self.state = WorkerState::Running;
        Ok(())
    }

    /// Started and not yet finished.
    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the thread and take back its test case. A panicked worker
    /// is logged and reported as `Failed`; its test case was closed while unwinding.
    pub fn join(&mut self) -> Option<&TestCase> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok((test_case, state)) => {
                    self.test_case = Some(test_case);
                    self.state = state;
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(worker = self.index, panic = %message, "worker thread panicked");
                    self.state = WorkerState::Failed;
                }
            }
        }
        self.test_case.as_ref()
    }

    /// Close the test case. Later calls are no-ops.
    pub fn close(&mut self) {
        if let Some(test_case) = self.test_case.as_mut() {
            test_case.close();
        }
        if self.state != WorkerState::Failed {
            self.state = WorkerState::Closed;
        }
    }
}

fn run_loop(index: usize, test_case: &mut TestCase, budget: RequestBudget, stop: &StopSignal) -> WorkerState {
    debug!(worker = index, test_case = %test_case.kind(), ?budget, "worker started");
    let mut step = || -> Option<WorkerState> {
        if stop.is_stopped() {
            return Some(WorkerState::Cancelled);
        }
        match test_case.run() {
            Ok(()) => None,
            Err(e) => {
                error!(worker = index, error = %e, "worker failed");
                Some(WorkerState::Failed)
            }
        }
    };
    let state = match budget {
        RequestBudget::Requests(n) => (0..n)
            .find_map(|_| step())
            .unwrap_or(WorkerState::RequestBudgetExhausted),
        RequestBudget::Duration(duration) => {
            let stopwatch = Stopwatch::start();
            let mut state = WorkerState::DurationExhausted;
            while stopwatch.elapsed() < duration {
                if let Some(stopped) = step() {
                    state = stopped;
                    break;
                }
            }
            state
        }
    };
    debug!(worker = index, ?state, "worker finished");
    state
}
