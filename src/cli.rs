use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::connection::EngineType;

/// dbear: database connection manager with dump, restore and transfer
#[derive(Parser, Debug)]
#[command(name = "dbear", version, about = "Manage database connections and dump, restore or transfer their data.", long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Path to the connections file (defaults to ~/.config/dbear/config.json)
    #[arg(long, global = true, env = "DBEAR_CONFIG", value_name = "path")]
    pub config: Option<PathBuf>,

    /// Increase log output (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage saved connections
    Connections {
        #[command(subcommand)]
        command: ConnectionsCommand,
    },

    /// Open an interactive usql session on a connection
    Connect {
        /// Connection name (prompted when omitted)
        name: Option<String>,
    },

    /// Dump a database to a file
    Dump {
        /// Connection name (prompted when omitted)
        name: Option<String>,
        /// Output file (defaults to dump_<name>_<timestamp><ext> in the current directory)
        #[arg(short = 'o', long, value_name = "file")]
        output: Option<PathBuf>,
        /// Comma-separated schemas to include (PostgreSQL only)
        #[arg(long, value_name = "list")]
        schemas: Option<String>,
    },

    /// Load a dump file into a database, replacing its contents
    Restore {
        /// Dump file produced by `dbear dump`
        input: PathBuf,
        /// Connection name (prompted when omitted)
        name: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Copy all data from a source database into a destination database
    Transfer {
        /// Source connection name (prompted when omitted)
        source: Option<String>,
        /// Destination connection name (prompted when omitted)
        destination: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print CLI version
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConnectionsCommand {
    /// Add a connection; missing fields are prompted for
    Add(AddArgs),

    /// List saved connections
    List,

    /// Remove a saved connection
    Remove {
        /// Connection name (prompted when omitted)
        name: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Import a connection from another source
    Import {
        #[command(subcommand)]
        source: ImportCommand,
    },
}

#[derive(Args, Debug, Default)]
pub struct AddArgs {
    /// Connection name
    #[arg(short = 'n', long)]
    pub name: Option<String>,
    /// Database type: postgresql, mysql or sqlite
    #[arg(short = 't', long = "type", value_name = "type", value_parser = parse_engine)]
    pub engine: Option<EngineType>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(short = 'p', long)]
    pub port: Option<u16>,
    /// Database name, or the file path for sqlite
    #[arg(short = 'd', long)]
    pub database: Option<String>,
    #[arg(short = 'u', long)]
    pub username: Option<String>,
    /// Password (prompted with hidden input when omitted)
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ImportCommand {
    /// Import from a dotenv file (Laravel-style DB_* keys by default)
    Env(EnvArgs),
}

#[derive(Args, Debug)]
pub struct EnvArgs {
    /// Path to the .env file
    #[arg(default_value = ".env")]
    pub file: PathBuf,
    /// Name for the imported connection (prompted when omitted)
    #[arg(short = 'n', long)]
    pub name: Option<String>,
    /// Database type when the file does not name one
    #[arg(short = 't', long = "type", value_name = "type", value_parser = parse_engine)]
    pub engine: Option<EngineType>,
    /// Key holding a full connection string, e.g. DATABASE_URL
    #[arg(long, value_name = "key")]
    pub url_key: Option<String>,
    #[arg(long, value_name = "key", default_value = "DB_HOST")]
    pub host_key: String,
    #[arg(long, value_name = "key", default_value = "DB_PORT")]
    pub port_key: String,
    #[arg(long, value_name = "key", default_value = "DB_DATABASE")]
    pub database_key: String,
    #[arg(long, value_name = "key", default_value = "DB_USERNAME")]
    pub username_key: String,
    #[arg(long, value_name = "key", default_value = "DB_PASSWORD")]
    pub password_key: String,
}

fn parse_engine(raw: &str) -> Result<EngineType, String> {
    raw.parse::<EngineType>().map_err(|e| e.to_string())
}
