use super::{BackendDriver, SchemaFilter, Toolchain, docker_run};
use crate::config::connection::{Connection, EngineType};
use crate::drivers::selector::ImageRef;
use crate::error::{DbearError, Result};
use crate::utils::process::CommandSpec;

/// `pg_dump`/`pg_restore` in the custom archive format, run from a
/// version-matched `postgres` image.
pub struct PostgresDriver;

impl PostgresDriver {
    fn image<'a>(&self, toolchain: &'a Toolchain) -> Result<&'a ImageRef> {
        match toolchain {
            Toolchain::Container(image) => Ok(image),
            Toolchain::Native => Err(DbearError::ImageResolutionFailed {
                engine: EngineType::Postgresql,
                version: "native".into(),
            }),
        }
    }

    fn libpq_env(conn: &Connection) -> Vec<(&'static str, String)> {
        vec![
            ("PGHOST", conn.host.clone()),
            ("PGPORT", conn.port.to_string()),
            ("PGUSER", conn.username.clone()),
            ("PGPASSWORD", conn.password.clone()),
            ("PGDATABASE", conn.database.clone()),
        ]
    }
}

impl BackendDriver for PostgresDriver {
    fn name(&self) -> &'static str { "postgresql" }

    fn dump_command(
        &self,
        conn: &Connection,
        toolchain: &Toolchain,
        schemas: Option<&SchemaFilter>,
    ) -> Result<CommandSpec> {
        let image = self.image(toolchain)?;
        let mut spec = docker_run(image, Self::libpq_env(conn), false)
            .args(["pg_dump", "--no-owner", "--no-acl", "-Fc"]);
        for schema in schemas.map(SchemaFilter::names).unwrap_or_default() {
            spec = spec.args(["-n", schema.as_str()]);
        }
        Ok(spec)
    }

    fn restore_command(&self, conn: &Connection, toolchain: &Toolchain) -> Result<CommandSpec> {
        let image = self.image(toolchain)?;
        Ok(docker_run(image, Self::libpq_env(conn), true).args([
            "pg_restore",
            "--no-owner",
            "--no-acl",
            "--disable-triggers",
            "-d",
            conn.database.as_str(),
        ]))
    }
}
