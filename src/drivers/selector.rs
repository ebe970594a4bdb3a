use std::fmt;

use super::{BackendDriver, Toolchain, mysql::MySqlDriver, postgres::PostgresDriver, sqlite::SqliteDriver};
use crate::config::connection::EngineType;
use crate::error::{DbearError, Result};
use crate::version::VersionToken;

/// Container image reference such as `postgres:15`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(reference: impl Into<String>) -> Self {
        ImageRef(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn driver_for(engine: EngineType) -> &'static dyn BackendDriver {
    match engine {
        EngineType::Postgresql => &PostgresDriver,
        EngineType::Mysql => &MySqlDriver,
        EngineType::Sqlite => &SqliteDriver,
    }
}

/// Image holding the dump/restore tools for `engine` at `version`.
///
/// `None` for SQLite, which only has a native path, and for a `Native` token
/// on a server engine.
pub fn select_image(engine: EngineType, version: &VersionToken) -> Option<ImageRef> {
    let repository = match engine {
        EngineType::Postgresql => "postgres",
        EngineType::Mysql => "mysql",
        EngineType::Sqlite => return None,
    };
    match version {
        VersionToken::Latest => Some(ImageRef::new(format!("{}:latest", repository))),
        VersionToken::Release(v) => Some(ImageRef::new(format!("{}:{}", repository, v))),
        VersionToken::Native => None,
    }
}

/// Like [`select_image`], but a missing image on a server engine is an error.
pub fn select_toolchain(engine: EngineType, version: &VersionToken) -> Result<Toolchain> {
    match (engine, select_image(engine, version)) {
        (EngineType::Sqlite, _) => Ok(Toolchain::Native),
        (_, Some(image)) => Ok(Toolchain::Container(image)),
        (_, None) => Err(DbearError::ImageResolutionFailed {
            engine,
            version: version.to_string(),
        }),
    }
}
