use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::config::connection::{Connection, ConnectionsFile};

fn config_dir() -> Result<PathBuf> {
    if cfg!(windows) {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return Ok(PathBuf::from(appdata).join("dbear"));
        }
        // Fallback to USERPROFILE if APPDATA is missing
        if let Ok(home) = std::env::var("USERPROFILE") {
            return Ok(PathBuf::from(home).join("AppData\\Roaming").join("dbear"));
        }
        Err(anyhow!("APPDATA not set; cannot determine config directory"))
    } else {
        if let Ok(home) = std::env::var("HOME") {
            return Ok(PathBuf::from(home).join(".config").join("dbear"));
        }
        Err(anyhow!("HOME not set; cannot determine config directory"))
    }
}

/// Default location of the profile store.
pub fn default_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

pub fn load(path: &Path) -> Result<ConnectionsFile> {
    if !path.exists() {
        return Ok(ConnectionsFile::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if content.trim().is_empty() {
        // Treat empty file as empty store
        return Ok(ConnectionsFile::default());
    }
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn save(path: &Path, file: &ConnectionsFile) -> Result<()> {
    let dir = path.parent().ok_or_else(|| anyhow!("invalid config path {}", path.display()))?;
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(file)?;
    // Write atomically: write to temp file then rename
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    // On Windows, replace by removing first if necessary
    if cfg!(windows) && path.exists() {
        let _ = fs::remove_file(path);
    }
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), connections = file.connections.len(), "saved connections");
    Ok(())
}

pub fn list(path: &Path) -> Result<Vec<Connection>> {
    Ok(load(path)?.connections)
}

pub fn get(path: &Path, name: &str) -> Result<Option<Connection>> {
    Ok(load(path)?.connections.into_iter().find(|c| c.name == name))
}

/// Look a connection up by name, failing when it does not exist.
pub fn require(path: &Path, name: &str) -> Result<Connection> {
    get(path, name)?.ok_or_else(|| anyhow!("connection '{}' not found", name))
}

pub fn add(path: &Path, conn: Connection) -> Result<()> {
    let mut file = load(path)?;
    if file.connections.iter().any(|c| c.name == conn.name) {
        return Err(anyhow!("connection '{}' already exists", conn.name));
    }
    file.connections.push(conn);
    save(path, &file)
}

pub fn remove(path: &Path, name: &str) -> Result<Connection> {
    let mut file = load(path)?;
    let index = file
        .connections
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| anyhow!("connection '{}' not found", name))?;
    let removed = file.connections.remove(index);
    save(path, &file)?;
    Ok(removed)
}
