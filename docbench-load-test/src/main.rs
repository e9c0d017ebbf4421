use clap::{CommandFactory, Parser};
use docbench_load_test::backend::{HttpBackendFactory, StopSignal};
use docbench_load_test::cli::Args;
use docbench_load_test::error::HarnessError;
use docbench_load_test::orchestrator::Orchestrator;
use docbench_load_test::setup::HttpDatabaseSetup;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::process;
use std::sync::Arc;
use std::thread;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docbench=info,docbench_load_test=info")),
        )
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
    }

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            let _ = Args::command().print_help();
            process::exit(1);
        }
    };

    let stop = StopSignal::new();
    spawn_interrupt_handler(stop.clone());

    let mut out: Box<dyn Write> = match &config.output_file {
        Some(path) => match File::create(path) {
            Ok(file) => Box::new(BufWriter::new(file)),
            Err(e) => {
                eprintln!("Cannot open output file {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => Box::new(io::stdout()),
    };

    let factory = Arc::new(HttpBackendFactory::new(&config, stop.clone()));
    let orchestrator = Orchestrator::new(config, factory, Box::new(HttpDatabaseSetup), stop);

    let code = match orchestrator.run(&mut out) {
        Ok(reports) => {
            let failures: u64 = reports.iter().map(|r| r.failures).sum();
            info!(test_cases = reports.len(), failures, "benchmark finished");
            0
        }
        Err(HarnessError::Configuration(e)) => {
            eprintln!("{e}");
            1
        }
        Err(e) => {
            error!(error = %e, "benchmark aborted");
            0
        }
    };
    if let Err(e) = out.flush() {
        warn!(error = %e, "failed to flush output");
    }
    process::exit(code);
}

/// On Ctrl-C, tell workers and in-flight calls to stop.
fn spawn_interrupt_handler(stop: StopSignal) {
    let spawned = thread::Builder::new().name("docbench-signal".to_string()).spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(error = %e, "interrupt handler unavailable");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping workers");
                stop.stop();
            }
        });
    });
    if let Err(e) = spawned {
        warn!(error = %e, "interrupt handler unavailable");
    }
}
