use super::{BackendDriver, SchemaFilter, Toolchain, docker_run};
use crate::config::connection::{Connection, EngineType};
use crate::error::{DbearError, Result};
use crate::utils::process::CommandSpec;

/// `mysqldump`/`mysql` plain SQL streams from a version-matched `mysql` image.
pub struct MySqlDriver;

impl MySqlDriver {
    // Force TCP: inside the container there is no local socket even for "localhost".
    fn client_args(conn: &Connection) -> Vec<String> {
        vec![
            "--protocol=TCP".into(),
            "-h".into(),
            conn.host.clone(),
            "-P".into(),
            conn.port.to_string(),
            "-u".into(),
            conn.username.clone(),
            conn.database.clone(),
        ]
    }

    fn container_command(
        conn: &Connection,
        toolchain: &Toolchain,
        tool: &str,
        stdin: bool,
    ) -> Result<CommandSpec> {
        let Toolchain::Container(image) = toolchain else {
            return Err(DbearError::ImageResolutionFailed {
                engine: EngineType::Mysql,
                version: "native".into(),
            });
        };
        Ok(docker_run(image, vec![("MYSQL_PWD", conn.password.clone())], stdin)
            .arg(tool)
            .args(Self::client_args(conn)))
    }
}

impl BackendDriver for MySqlDriver {
    fn name(&self) -> &'static str { "mysql" }

    fn dump_command(
        &self,
        conn: &Connection,
        toolchain: &Toolchain,
        _schemas: Option<&SchemaFilter>,
    ) -> Result<CommandSpec> {
        Self::container_command(conn, toolchain, "mysqldump", false)
    }

    fn restore_command(&self, conn: &Connection, toolchain: &Toolchain) -> Result<CommandSpec> {
        Self::container_command(conn, toolchain, "mysql", true)
    }
}
