//! Stillwater CLI - log meditation practice offline, sync it later
//!
//! Records land in a local libSQL database first; `sync`, `schedule` and
//! `watch` push them to the remote backend when the connection allows.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::commands::common::Context;
use crate::commands::completions::run_completions;
use crate::commands::config::{run_config_set, run_config_show};
use crate::commands::list::run_list;
use crate::commands::log::run_log;
use crate::commands::schedule::{run_schedule, run_watch};
use crate::commands::status::run_status;
use crate::commands::sync::{run_conflicts, run_resolve, run_sync};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

fn env_filter() -> EnvFilter {
    let filter = EnvFilter::from_default_env();
    match "stillwater=info".parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    if let Commands::Completions { shell, output } = &command {
        return run_completions(*shell, output.as_deref());
    }

    let context = Context::resolve(cli.db_path, cli.user, cli.network.as_deref())?;
    tracing::debug!(
        "Using {} for user {}",
        context.db_path.display(),
        context.user_id
    );

    match command {
        Commands::Log { command } => run_log(&context, command).await?,
        Commands::List {
            domain,
            limit,
            json,
        } => run_list(&context, domain, limit, json).await?,
        Commands::Sync {
            force,
            resolve,
            manual,
            json,
        } => run_sync(&context, force, resolve, manual, json).await?,
        Commands::Status { json } => run_status(&context, json).await?,
        Commands::Conflicts { json } => run_conflicts(&context, json).await?,
        Commands::Resolve { id, resolution } => run_resolve(&context, &id, resolution).await?,
        Commands::Config { command } => match command.unwrap_or(ConfigCommands::Show { json: false })
        {
            ConfigCommands::Show { json } => run_config_show(&context, json).await?,
            ConfigCommands::Set(args) => run_config_set(&context, args).await?,
        },
        Commands::Schedule { trigger } => run_schedule(&context, trigger).await?,
        Commands::Watch { tick } => run_watch(&context, tick).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
