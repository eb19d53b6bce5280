pub mod common;

mod run_scenarios;
