use super::{BackendDriver, SchemaFilter, Toolchain};
use crate::config::connection::Connection;
use crate::error::Result;
use crate::utils::process::CommandSpec;

/// Local `sqlite3` client; the database file is read and written in place.
pub struct SqliteDriver;

impl BackendDriver for SqliteDriver {
    fn name(&self) -> &'static str { "sqlite" }

    fn dump_command(
        &self,
        conn: &Connection,
        _toolchain: &Toolchain,
        _schemas: Option<&SchemaFilter>,
    ) -> Result<CommandSpec> {
        Ok(CommandSpec::new("sqlite3").args([conn.database.as_str(), ".dump"]))
    }

    fn restore_command(&self, conn: &Connection, _toolchain: &Toolchain) -> Result<CommandSpec> {
        Ok(CommandSpec::new("sqlite3").arg(conn.database.as_str()))
    }
}
