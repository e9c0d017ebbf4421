pub mod aggregator;
pub mod backend;
pub mod cli;
pub mod collector;
pub mod config;
pub mod document;
pub mod error;
pub mod keygen;
pub mod orchestrator;
pub mod setup;
pub mod stopwatch;
pub mod testcase;
pub mod worker;
