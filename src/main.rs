pub mod config;
mod cli;
mod drivers;
mod error;
mod importer;
mod ops;
mod pipeline;
mod registry;
mod storage;
mod utils;
mod version;

#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConnectionsCommand, ImportCommand};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let config = match cli.config {
        Some(path) => path,
        None => registry::default_path()?,
    };

    match cli.command {
        Commands::Connections { command } => match command {
            ConnectionsCommand::Add(args) => ops::do_connections_add(&config, args)?,
            ConnectionsCommand::List => ops::do_connections_list(&config)?,
            ConnectionsCommand::Remove { name, yes } => {
                ops::do_connections_remove(&config, name, yes)?
            }
            ConnectionsCommand::Import { source } => match source {
                ImportCommand::Env(args) => ops::do_import_env(&config, args)?,
            },
        },
        Commands::Connect { name } => {
            ops::do_connect(&config, name)?;
        }
        Commands::Dump { name, output, schemas } => {
            ops::do_dump(&config, name, output, schemas)?;
        }
        Commands::Restore { input, name, yes } => {
            ops::do_restore(&config, &input, name, yes)?;
        }
        Commands::Transfer { source, destination, yes } => {
            ops::do_transfer(&config, source, destination, yes)?;
        }
        Commands::Version => {
            ops::do_version();
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for tables and prompts.
fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dbear={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
