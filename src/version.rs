//! Server version detection.
//!
//! Raw version strings are bucketed onto a handful of tokens so that many
//! patch and minor releases share one known-good tool image.

use mysql_async::prelude::*;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tokio_postgres::NoTls;
use tokio_postgres::config::SslMode;
use tracing::{debug, info};

use crate::config::connection::{Connection, EngineType};
use crate::error::{DbearError, Result, error_chain};

static POSTGRES_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PostgreSQL (\d+)\.(\d+)").expect("static pattern"));

const KNOWN_POSTGRES_MAJORS: [&str; 5] = ["12", "13", "14", "15", "16"];

/// Normalized server version used to pick a tool image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionToken {
    /// Embedded engine; use the local client.
    Native,
    /// Version could not be normalized; use the newest tool available.
    Latest,
    Release(String),
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionToken::Native => f.write_str("native"),
            VersionToken::Latest => f.write_str("latest"),
            VersionToken::Release(v) => f.write_str(v),
        }
    }
}

/// Source of raw server version strings.
pub trait VersionProbe {
    fn server_version(&self, conn: &Connection) -> Result<String>;
}

/// Queries the live server over its native protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveProbe;

impl VersionProbe for LiveProbe {
    fn server_version(&self, conn: &Connection) -> Result<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        match conn.engine {
            EngineType::Postgresql => runtime.block_on(postgres_server_version(conn)),
            EngineType::Mysql => runtime.block_on(mysql_server_version(conn)),
            // embedded; nothing to connect to
            EngineType::Sqlite => Ok(VersionToken::Native.to_string()),
        }
    }
}

async fn postgres_server_version(conn: &Connection) -> Result<String> {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&conn.host)
        .port(conn.port)
        .user(&conn.username)
        .password(&conn.password)
        .dbname(&conn.database)
        .ssl_mode(SslMode::Disable);

    let (client, connection) =
        config
            .connect(NoTls)
            .await
            .map_err(|e| DbearError::ConnectionFailed {
                engine: EngineType::Postgresql,
                address: conn.address(),
                reason: error_chain(&e),
            })?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            debug!("postgres probe connection closed: {}", e);
        }
    });

    let query_failed = |e: tokio_postgres::Error| DbearError::QueryFailed {
        engine: EngineType::Postgresql,
        reason: error_chain(&e),
    };
    let row = client
        .query_one("SELECT version()", &[])
        .await
        .map_err(query_failed)?;
    row.try_get::<_, String>(0).map_err(query_failed)
}

async fn mysql_server_version(conn: &Connection) -> Result<String> {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let opts = mysql_async::OptsBuilder::default()
        .ip_or_hostname(conn.host.clone())
        .tcp_port(conn.port)
        .user(non_empty(&conn.username))
        .pass(non_empty(&conn.password))
        .db_name(non_empty(&conn.database));

    let mut mysql = mysql_async::Conn::new(opts)
        .await
        .map_err(|e| DbearError::ConnectionFailed {
            engine: EngineType::Mysql,
            address: conn.address(),
            reason: error_chain(&e),
        })?;

    let version: Option<String> =
        mysql
            .query_first("SELECT VERSION()")
            .await
            .map_err(|e| DbearError::QueryFailed {
                engine: EngineType::Mysql,
                reason: error_chain(&e),
            })?;
    if let Err(e) = mysql.disconnect().await {
        debug!("mysql probe disconnect failed: {}", e);
    }

    version.ok_or_else(|| DbearError::QueryFailed {
        engine: EngineType::Mysql,
        reason: "SELECT VERSION() returned no rows".into(),
    })
}

/// Detect the version token for `conn`. SQLite never touches the probe.
pub fn detect<P: VersionProbe + ?Sized>(probe: &P, conn: &Connection) -> Result<VersionToken> {
    let token = match conn.engine {
        EngineType::Sqlite => return Ok(VersionToken::Native),
        EngineType::Postgresql => postgres_token(&probe.server_version(conn)?),
        EngineType::Mysql => mysql_token(&probe.server_version(conn)?),
    };
    info!(
        connection = %conn.name,
        engine = %conn.engine,
        version = %token,
        "detected server version"
    );
    Ok(token)
}

/// `"PostgreSQL 15.3 on x86_64..."` → `15`.
pub fn postgres_token(raw: &str) -> VersionToken {
    let Some(caps) = POSTGRES_VERSION.captures(raw) else {
        return VersionToken::Latest;
    };
    let major = &caps[1];
    if !KNOWN_POSTGRES_MAJORS.contains(&major) {
        debug!("PostgreSQL {} is outside the tested tool range", major);
    }
    VersionToken::Release(major.to_string())
}

/// `"8.0.34"` → `8.0`, `"5.7.44-log"` → `5.7`, other 5.x → `5.6`.
pub fn mysql_token(raw: &str) -> VersionToken {
    let mut parts = raw.trim().split('.');
    let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
        return VersionToken::Latest;
    };

    match major {
        "8" => VersionToken::Release("8.0".into()),
        "5" if minor.starts_with('7') => VersionToken::Release("5.7".into()),
        "5" => VersionToken::Release("5.6".into()),
        _ => VersionToken::Release(format!("{}.{}", major, minor)),
    }
}
