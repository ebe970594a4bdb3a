use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DbearError;

/// Database engines dbear knows how to dump and restore.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Postgresql,
    Mysql,
    Sqlite,
}

impl EngineType {
    pub const ALL: [EngineType; 3] = [EngineType::Postgresql, EngineType::Mysql, EngineType::Sqlite];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Postgresql => "postgresql",
            EngineType::Mysql => "mysql",
            EngineType::Sqlite => "sqlite",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            EngineType::Postgresql => 5432,
            EngineType::Mysql => 3306,
            EngineType::Sqlite => 0,
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = DbearError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgresql" => Ok(EngineType::Postgresql),
            "mysql" => Ok(EngineType::Mysql),
            "sqlite" => Ok(EngineType::Sqlite),
            other => Err(DbearError::UnsupportedEngine(other.to_string())),
        }
    }
}

/// A named connection profile.
///
/// For SQLite, `database` is a filesystem path and the network fields are
/// inert (`host` is `localhost`, `port` is 0).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    pub name: String,
    #[serde(rename = "type")]
    pub engine: EngineType,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Connection {
    pub fn sqlite(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: EngineType::Sqlite,
            host: "localhost".into(),
            port: 0,
            database: path.into(),
            username: String::new(),
            password: String::new(),
        }
    }

    /// `host:port` for server engines, the file path for SQLite.
    pub fn address(&self) -> String {
        match self.engine {
            EngineType::Sqlite => self.database.clone(),
            EngineType::Postgresql | EngineType::Mysql => format!("{}:{}", self.host, self.port),
        }
    }
}

/// On-disk layout of the profile store.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct ConnectionsFile {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub connections: Vec<Connection>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Connection>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Connection>>::deserialize(deserializer)?.unwrap_or_default())
}
