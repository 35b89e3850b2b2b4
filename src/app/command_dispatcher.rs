//! CLI command routing: runs the handler for the parsed subcommand.

use anyhow::Result;

use crate::app::config_runtime::Settings;
use crate::cli::{Cli, Command, ConfigCommand, DeckCommand, LinksCommand};
use crate::{ProcessExit, commands};

pub(crate) async fn dispatch(
    cli: &Cli,
    settings: &Settings,
    use_progress_bars: bool,
) -> Result<ProcessExit> {
    match &cli.command {
        Command::Ingest(args) => {
            return commands::run_ingest_command(args, settings, use_progress_bars).await;
        }
        Command::Links { command } => match command {
            LinksCommand::Import { file } => {
                commands::run_links_import_command(file, settings).await?;
            }
            LinksCommand::List => commands::run_links_list_command(settings).await?,
        },
        Command::Db { command } => commands::run_db_command(command, settings).await?,
        Command::View(args) => commands::run_view_command(args, settings).await?,
        Command::Deck { command } => match command {
            DeckCommand::Validate { input, save } => {
                commands::run_deck_validate_command(input, save.as_deref(), settings).await?;
            }
            DeckCommand::Generate {
                theme,
                include,
                save,
                ..
            } => {
                commands::run_deck_generate_command(theme, include, save.as_deref(), settings)
                    .await?;
            }
        },
        Command::Config { command } => match command {
            ConfigCommand::Show => commands::run_config_show_command(settings),
        },
    }

    Ok(ProcessExit::Success)
}
