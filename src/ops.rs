use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use colored::*;
use comfy_table::{Attribute, Cell, ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};
use rpassword::read_password;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

use crate::cli::{AddArgs, EnvArgs};
use crate::config::connection::{Connection, EngineType};
use crate::config::uri;
use crate::drivers::{SchemaFilter, Toolchain};
use crate::importer::{self, EnvImportOptions};
use crate::pipeline::{Endpoint, Pipeline, Stage};
use crate::registry;
use crate::storage;

pub fn do_connections_add(config: &Path, args: AddArgs) -> Result<()> {
    let name = or_prompt(args.name, "Connection name", None)?.trim().to_string();
    if name.is_empty() {
        bail!("connection name cannot be empty");
    }
    // Fail before asking for the rest of the form.
    if registry::get(config, &name)?.is_some() {
        bail!("connection '{}' already exists", name);
    }

    let engine = match args.engine {
        Some(engine) => engine,
        None => {
            let choices: Vec<&str> = EngineType::ALL.iter().map(EngineType::as_str).collect();
            prompt_line(&format!("Database type ({})", choices.join(", ")), None)?
                .parse::<EngineType>()?
        }
    };

    let conn = if engine == EngineType::Sqlite {
        let path = or_prompt(args.database, "Database file path", None)?;
        Connection::sqlite(name, path)
    } else {
        let host = or_prompt(args.host, "Host", Some("localhost"))?;
        let port = match args.port {
            Some(port) => port,
            None => prompt_line("Port", Some(&engine.default_port().to_string()))?
                .parse::<u16>()
                .context("port must be a number between 0 and 65535")?,
        };
        let database = or_prompt(args.database, "Database", None)?;
        let username = or_prompt(args.username, "Username", None)?;
        let password = match args.password {
            Some(password) => password,
            None => prompt_password("Password: ")?,
        };
        Connection {
            name,
            engine,
            host,
            port,
            database,
            username,
            password,
        }
    };

    let summary = format!(
        "Added connection '{}' ({} at {})",
        conn.name,
        conn.engine,
        conn.address()
    );
    registry::add(config, conn)?;
    println!("{} {}", "✔".green().bold(), summary.green());
    Ok(())
}

pub fn do_connections_list(config: &Path) -> Result<()> {
    let connections = registry::list(config)?;
    if connections.is_empty() {
        println!("{} {}", "i".yellow().bold(), "No connections found".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Type").add_attribute(Attribute::Bold),
            Cell::new("Address").add_attribute(Attribute::Bold),
            Cell::new("Database").add_attribute(Attribute::Bold),
            Cell::new("User").add_attribute(Attribute::Bold),
        ]);

    for c in &connections {
        let (database, user) = match c.engine {
            EngineType::Sqlite => ("-", "-"),
            EngineType::Postgresql | EngineType::Mysql => {
                (c.database.as_str(), c.username.as_str())
            }
        };
        table.add_row(vec![
            Cell::new(&c.name),
            Cell::new(c.engine),
            Cell::new(c.address()),
            Cell::new(database),
            Cell::new(user),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn do_connections_remove(config: &Path, name: Option<String>, yes: bool) -> Result<()> {
    let conn = resolve_connection(config, name, "Select a connection to remove")?;
    if !yes && !prompt_confirm(&format!("Remove connection '{}'? [y/N] ", conn.name))? {
        println!("{} {}", "i".yellow().bold(), "Aborted".yellow());
        return Ok(());
    }
    let removed = registry::remove(config, &conn.name)?;
    println!(
        "{} {}",
        "✔".green().bold(),
        format!("Removed connection '{}'", removed.name).green()
    );
    Ok(())
}

pub fn do_import_env(config: &Path, args: EnvArgs) -> Result<()> {
    if !args.file.exists() {
        bail!("{} not found", args.file.display());
    }
    let name = or_prompt(args.name, "Connection name", None)?;
    let options = EnvImportOptions {
        name,
        engine: args.engine,
        connection_string_key: args.url_key,
        host_key: args.host_key,
        port_key: args.port_key,
        database_key: args.database_key,
        username_key: args.username_key,
        password_key: args.password_key,
    };

    let conn = importer::import_env(&args.file, &options)?;
    let summary = format!(
        "Imported connection '{}' ({} at {}) from {}",
        conn.name,
        conn.engine,
        conn.address(),
        args.file.display()
    );
    registry::add(config, conn)?;
    println!("{} {}", "✔".green().bold(), summary.green());
    Ok(())
}

pub fn do_connect(config: &Path, name: Option<String>) -> Result<()> {
    let conn = resolve_connection(config, name, "Select a connection")?;
    let target = uri::build(&conn)?;
    info!(connection = %conn.name, "starting usql");

    let status = Command::new("usql").arg(&target).status().map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            anyhow!("usql is not installed or not in PATH")
        } else {
            anyhow!("failed to launch usql: {}", e)
        }
    })?;
    if !status.success() {
        bail!("usql exited with {}", status);
    }
    Ok(())
}

pub fn do_dump(
    config: &Path,
    name: Option<String>,
    output: Option<PathBuf>,
    schemas: Option<String>,
) -> Result<()> {
    let conn = resolve_connection(config, name, "Select a connection to dump")?;
    let schemas = schemas.as_deref().and_then(SchemaFilter::parse);
    if schemas.is_some() && conn.engine != EngineType::Postgresql {
        eprintln!(
            "{} {}: {}",
            "!".yellow().bold(),
            "Warning".yellow(),
            format!("schema filtering is not supported for {}; dumping everything", conn.engine)
        );
    }

    let path = output
        .unwrap_or_else(|| storage::default_dump_path(&conn.name, conn.engine, Local::now()));
    let bar = create_progress_bar(&format!("Dumping '{}'", conn.name));
    let payload = Pipeline::new()
        .dump(&conn, schemas.as_ref())
        .inspect_err(|_| bar.abandon_with_message("Dump failed"))?;
    storage::write_dump(&path, &payload)?;
    bar.finish_with_message("Dump complete");

    println!(
        "{} {}",
        "✔".green().bold(),
        format!(
            "Dumped '{}' to {} ({} bytes, sha256 {})",
            conn.name,
            path.display(),
            payload.len(),
            storage::payload_digest(&payload)
        )
        .green()
    );
    Ok(())
}

pub fn do_restore(config: &Path, input: &Path, name: Option<String>, yes: bool) -> Result<()> {
    let payload = fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let conn = resolve_connection(config, name, "Select a connection to restore into")?;

    if !yes {
        println!(
            "{} {}",
            "!".yellow().bold(),
            "This will overwrite all data in the destination database.".yellow()
        );
        if !prompt_confirm(&format!("Restore {} into '{}'? [y/N] ", input.display(), conn.name))? {
            println!("{} {}", "i".yellow().bold(), "Aborted".yellow());
            return Ok(());
        }
    }

    let bar = create_progress_bar(&format!("Restoring '{}'", conn.name));
    Pipeline::new()
        .restore(&conn, &payload)
        .inspect_err(|_| bar.abandon_with_message("Restore failed"))?;
    bar.finish_with_message("Restore complete");

    println!(
        "{} {}",
        "✔".green().bold(),
        format!("Restored {} into '{}'", input.display(), conn.name).green()
    );
    Ok(())
}

pub fn do_transfer(
    config: &Path,
    source: Option<String>,
    destination: Option<String>,
    yes: bool,
) -> Result<()> {
    let connections = registry::list(config)?;
    if (source.is_none() || destination.is_none()) && connections.len() < 2 {
        bail!("at least two connections are required for a transfer");
    }

    let src = match source {
        Some(name) => find(&connections, &name)?,
        None => select_connection(&connections, "Select the source connection")?,
    };
    let dst = match destination {
        Some(name) => find(&connections, &name)?,
        None => {
            let others: Vec<Connection> = connections
                .iter()
                .filter(|c| c.name != src.name)
                .cloned()
                .collect();
            select_connection(&others, "Select the destination connection")?
        }
    };
    if src.name == dst.name {
        bail!("source and destination must be different connections");
    }

    let pipeline = Pipeline::new();
    let mut last = Stage::Idle;
    let bar;
    let result = if yes {
        bar = create_progress_bar("Starting transfer");
        pipeline.transfer(&src, &dst, |stage| track(&bar, &mut last, stage))
    } else {
        let planning = create_progress_bar("Detecting server versions");
        let plan = pipeline
            .plan(&src, &dst)
            .inspect_err(|_| planning.abandon_with_message("Planning failed"))?;
        planning.finish_and_clear();

        describe("Source", &plan.source);
        describe("Destination", &plan.destination);
        println!(
            "{} {}",
            "!".yellow().bold(),
            "This will overwrite all data in the destination database.".yellow()
        );
        if !prompt_confirm(&format!("Transfer '{}' into '{}'? [y/N] ", src.name, dst.name))? {
            println!("{} {}", "i".yellow().bold(), "Aborted".yellow());
            return Ok(());
        }

        bar = create_progress_bar("Starting transfer");
        pipeline.execute(&plan, |stage| track(&bar, &mut last, stage))
    };
    result?;

    println!(
        "{} {}",
        "✔".green().bold(),
        format!("Transferred '{}' into '{}'", src.name, dst.name).green()
    );
    Ok(())
}

pub fn do_version() {
    println!("{} {}", "dbear".bold(), env!("CARGO_PKG_VERSION").cyan());
}

fn track(bar: &ProgressBar, last: &mut Stage, stage: Stage) {
    match stage {
        Stage::Failed if *last == Stage::Idle => bar.abandon_with_message("Transfer failed"),
        Stage::Failed => bar.abandon_with_message(format!("{} failed", last)),
        Stage::Done => bar.finish_with_message("Transfer complete"),
        _ => {
            *last = stage;
            bar.set_message(stage.to_string());
        }
    }
}

fn describe(label: &str, endpoint: &Endpoint) {
    let tools = match &endpoint.toolchain {
        Toolchain::Native => "native tools".to_string(),
        Toolchain::Container(image) => format!("image {}", image),
    };
    println!(
        "{} {}: {} ({} {}, {})",
        "i".yellow().bold(),
        label,
        endpoint.connection.name.bold(),
        endpoint.connection.engine,
        endpoint.version,
        tools
    );
}

fn resolve_connection(config: &Path, name: Option<String>, title: &str) -> Result<Connection> {
    match name {
        Some(name) => registry::require(config, &name),
        None => select_connection(&registry::list(config)?, title),
    }
}

fn find(connections: &[Connection], name: &str) -> Result<Connection> {
    connections
        .iter()
        .find(|c| c.name == name)
        .cloned()
        .ok_or_else(|| anyhow!("connection '{}' not found", name))
}

fn select_connection(connections: &[Connection], title: &str) -> Result<Connection> {
    if connections.is_empty() {
        bail!("no connections configured; add one with `dbear connections add`");
    }
    println!("{} {}", "?".cyan().bold(), title.cyan());
    for (i, c) in connections.iter().enumerate() {
        println!(
            "  {}) {} {}",
            i + 1,
            c.name.bold(),
            format!("({}, {})", c.engine, c.address()).dimmed()
        );
    }

    let answer = prompt_line("Number or name", None)?;
    match answer.parse::<usize>() {
        Ok(n) => n
            .checked_sub(1)
            .and_then(|i| connections.get(i))
            .cloned()
            .ok_or_else(|| anyhow!("no connection numbered {}", n)),
        Err(_) => find(connections, &answer),
    }
}

fn create_progress_bar(prefix: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
    );
    bar.set_message(prefix.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

fn or_prompt(value: Option<String>, label: &str, default: Option<&str>) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => prompt_line(label, default),
    }
}

fn prompt_line(label: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => print!("{} {} [{}]: ", "?".cyan().bold(), label.cyan(), d),
        None => print!("{} {}: ", "?".cyan().bold(), label.cyan()),
    }
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    match (input.trim(), default) {
        ("", Some(d)) => Ok(d.to_string()),
        ("", None) => Err(anyhow!("{} cannot be empty", label.to_lowercase())),
        (answer, _) => Ok(answer.to_string()),
    }
}

fn prompt_confirm(message: &str) -> Result<bool> {
    print!("{} {}", "?".cyan().bold(), message.cyan());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let ans = input.trim().to_lowercase();
    Ok(ans == "y" || ans == "yes")
}

fn prompt_password(message: &str) -> Result<String> {
    print!("{} {}", "?".cyan().bold(), message.cyan());
    io::stdout().flush()?;
    let password = read_password()?; // input hidden
    Ok(password)
}
