//! CLI entry point for mtgdb.

use std::process::ExitCode;

mod app;
mod app_config;
mod cli;
mod commands;

/// How the process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Everything succeeded.
    Success,
    /// Some archives failed, others were ingested.
    Partial,
    /// Nothing succeeded.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Partial => ExitCode::from(2),
            ProcessExit::Failure => ExitCode::FAILURE,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_mtgdb().await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
