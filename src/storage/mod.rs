use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::connection::EngineType;
use crate::utils::hash::short_digest;

/// PostgreSQL dumps are custom-format archives; the others are plain SQL.
pub fn dump_extension(engine: EngineType) -> &'static str {
    match engine {
        EngineType::Postgresql => ".dump",
        EngineType::Mysql | EngineType::Sqlite => ".sql",
    }
}

/// `dump_<name>_<YYYYMMDD_HHMMSS><ext>` in the current directory.
pub fn default_dump_path(name: &str, engine: EngineType, now: DateTime<Local>) -> PathBuf {
    let ts = now.format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("dump_{}_{}{}", sanitize(name), ts, dump_extension(engine)))
}

/// Write a dump readable by the owner only; dumps carry the whole database.
pub fn write_dump(path: &Path, payload: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(payload)?;
    }
    #[cfg(not(unix))]
    fs::write(path, payload).with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

pub fn payload_digest(payload: &[u8]) -> String {
    short_digest(payload)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn extensions_follow_engine() {
        assert_eq!(dump_extension(EngineType::Postgresql), ".dump");
        assert_eq!(dump_extension(EngineType::Mysql), ".sql");
        assert_eq!(dump_extension(EngineType::Sqlite), ".sql");
    }

    #[test]
    fn default_path_is_timestamped_and_sanitized() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = default_dump_path("prod db/main", EngineType::Postgresql, now);
        assert_eq!(path, PathBuf::from("dump_prod_db_main_20240309_140507.dump"));
    }

    #[test]
    fn write_dump_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backups").join("app.sql");
        write_dump(&path, b"CREATE TABLE t(x);").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"CREATE TABLE t(x);");
    }

    #[cfg(unix)]
    #[test]
    fn dumps_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.dump");
        write_dump(&path, b"PGDMP").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
