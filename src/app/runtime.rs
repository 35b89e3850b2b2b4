use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing::debug;

use crate::ProcessExit;
use crate::app::{command_dispatcher, config_runtime, terminal};
use crate::app_config::load_file_config;
use crate::cli::Cli;

pub(crate) async fn run_mtgdb() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    let default_level = config_runtime::resolve_default_log_level(cli.verbose, cli.quiet);
    let no_color = terminal::no_color_env_requested() || terminal::is_dumb_terminal();
    terminal::init_tracing(default_level, no_color);

    let loaded = load_file_config(cli.config.as_deref())?;
    let settings = config_runtime::resolve_settings(&cli, &loaded);
    debug!(?cli, ?settings, "Configuration resolved");

    let use_progress_bars = terminal::should_use_progress_bars(
        io::stderr().is_terminal(),
        cli.quiet,
        terminal::is_dumb_terminal(),
    );

    command_dispatcher::dispatch(&cli, &settings, use_progress_bars).await
}
