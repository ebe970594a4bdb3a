//! Dump, restore and transfer orchestration.
//!
//! Every external tool runs through a [`CommandRunner`] and every server
//! version comes from a [`VersionProbe`], so the orchestration can be driven
//! end to end without docker or a live database.

use std::fmt;

use tracing::{info, warn};

use crate::config::connection::{Connection, EngineType};
use crate::drivers::selector::{driver_for, select_toolchain};
use crate::drivers::{SchemaFilter, Toolchain};
use crate::error::{DbearError, Result};
use crate::utils::process::{CommandOutput, CommandRunner, ProcessRunner};
use crate::version::{self, LiveProbe, VersionProbe, VersionToken};

/// Progress of a transfer. Any stage may jump straight to `Failed`.
///
/// `Idle` is never reported; it is the state before the first callback.
/// SQLite transfers skip `DetectingVersions` and `ResolvingImages` and go
/// straight to `Dumping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    DetectingVersions,
    ResolvingImages,
    Dumping,
    Restoring,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "Idle",
            Stage::DetectingVersions => "Detecting server versions",
            Stage::ResolvingImages => "Resolving tool images",
            Stage::Dumping => "Dumping source database",
            Stage::Restoring => "Restoring destination database",
            Stage::Done => "Done",
            Stage::Failed => "Failed",
        })
    }
}

/// A connection with its detected version and the tools chosen for it.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub connection: Connection,
    pub version: VersionToken,
    pub toolchain: Toolchain,
}

/// Both ends of a transfer, resolved but not yet executed.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    pub source: Endpoint,
    pub destination: Endpoint,
}

pub struct Pipeline<R = ProcessRunner, P = LiveProbe> {
    runner: R,
    probe: P,
}

impl Pipeline {
    /// Real processes and live version probes.
    pub fn new() -> Self {
        Self::with(ProcessRunner, LiveProbe)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner, P: VersionProbe> Pipeline<R, P> {
    pub fn with(runner: R, probe: P) -> Self {
        Self { runner, probe }
    }

    /// Detect the server version of `conn` and pick its toolchain.
    pub fn resolve(&self, conn: &Connection) -> Result<Endpoint> {
        let version = version::detect(&self.probe, conn)?;
        let toolchain = select_toolchain(conn.engine, &version)?;
        Ok(Endpoint {
            connection: conn.clone(),
            version,
            toolchain,
        })
    }

    /// Full logical backup of `conn`, held in memory.
    pub fn dump(&self, conn: &Connection, schemas: Option<&SchemaFilter>) -> Result<Vec<u8>> {
        let toolchain = match conn.engine {
            EngineType::Sqlite => Toolchain::Native,
            EngineType::Postgresql | EngineType::Mysql => self.resolve(conn)?.toolchain,
        };
        self.dump_with(conn, &toolchain, schemas)
    }

    /// Load `payload` into `conn`, replacing what is there.
    pub fn restore(&self, conn: &Connection, payload: &[u8]) -> Result<()> {
        let toolchain = match conn.engine {
            EngineType::Sqlite => Toolchain::Native,
            EngineType::Postgresql | EngineType::Mysql => self.resolve(conn)?.toolchain,
        };
        self.restore_with(conn, &toolchain, payload)
    }

    pub fn dump_with(
        &self,
        conn: &Connection,
        toolchain: &Toolchain,
        schemas: Option<&SchemaFilter>,
    ) -> Result<Vec<u8>> {
        let driver = driver_for(conn.engine);
        let spec = driver.dump_command(conn, toolchain, schemas)?;
        info!(connection = %conn.name, driver = driver.name(), tool = %spec.program, "dumping");

        let output = self
            .runner
            .run(&spec, None)
            .map_err(|e| DbearError::dump_failed(conn.engine, e.to_string()))?;
        check(conn.engine, &output).map_err(|d| DbearError::dump_failed(conn.engine, d))?;

        info!(connection = %conn.name, bytes = output.stdout.len(), "dump complete");
        Ok(output.stdout)
    }

    pub fn restore_with(
        &self,
        conn: &Connection,
        toolchain: &Toolchain,
        payload: &[u8],
    ) -> Result<()> {
        let driver = driver_for(conn.engine);
        let spec = driver.restore_command(conn, toolchain)?;
        info!(connection = %conn.name, driver = driver.name(), bytes = payload.len(), "restoring");

        let output = self
            .runner
            .run(&spec, Some(payload))
            .map_err(|e| DbearError::restore_failed(conn.engine, e.to_string()))?;
        check(conn.engine, &output).map_err(|d| DbearError::restore_failed(conn.engine, d))?;

        info!(connection = %conn.name, "restore complete");
        Ok(())
    }

    /// Check engines match and resolve both endpoints, without moving data.
    pub fn plan(&self, source: &Connection, destination: &Connection) -> Result<TransferPlan> {
        self.plan_stages(source, destination, &mut |_| {})
    }

    /// Dump the plan's source and restore it into its destination.
    pub fn execute(&self, plan: &TransferPlan, mut on_stage: impl FnMut(Stage)) -> Result<()> {
        let result = self.execute_stages(plan, &mut on_stage);
        finish(result, &mut on_stage)
    }

    /// Replace the contents of `destination` with those of `source`.
    ///
    /// `on_stage` sees every transition, ending in `Done` or `Failed`.
    pub fn transfer(
        &self,
        source: &Connection,
        destination: &Connection,
        mut on_stage: impl FnMut(Stage),
    ) -> Result<()> {
        let result = self
            .plan_stages(source, destination, &mut on_stage)
            .and_then(|plan| self.execute_stages(&plan, &mut on_stage));
        finish(result, &mut on_stage)
    }

    fn plan_stages(
        &self,
        source: &Connection,
        destination: &Connection,
        on_stage: &mut dyn FnMut(Stage),
    ) -> Result<TransferPlan> {
        if source.engine != destination.engine {
            return Err(DbearError::EngineMismatch {
                source_engine: source.engine,
                destination_engine: destination.engine,
            });
        }

        if source.engine == EngineType::Sqlite {
            let native = |conn: &Connection| Endpoint {
                connection: conn.clone(),
                version: VersionToken::Native,
                toolchain: Toolchain::Native,
            };
            return Ok(TransferPlan {
                source: native(source),
                destination: native(destination),
            });
        }

        on_stage(Stage::DetectingVersions);
        let source_version = version::detect(&self.probe, source)?;
        let destination_version = version::detect(&self.probe, destination)?;

        on_stage(Stage::ResolvingImages);
        let source_toolchain = select_toolchain(source.engine, &source_version)?;
        let destination_toolchain = select_toolchain(destination.engine, &destination_version)?;

        Ok(TransferPlan {
            source: Endpoint {
                connection: source.clone(),
                version: source_version,
                toolchain: source_toolchain,
            },
            destination: Endpoint {
                connection: destination.clone(),
                version: destination_version,
                toolchain: destination_toolchain,
            },
        })
    }

    fn execute_stages(&self, plan: &TransferPlan, on_stage: &mut dyn FnMut(Stage)) -> Result<()> {
        on_stage(Stage::Dumping);
        let payload = self.dump_with(&plan.source.connection, &plan.source.toolchain, None)?;

        on_stage(Stage::Restoring);
        self.restore_with(&plan.destination.connection, &plan.destination.toolchain, &payload)
    }
}

fn finish(result: Result<()>, on_stage: &mut dyn FnMut(Stage)) -> Result<()> {
    match &result {
        Ok(()) => on_stage(Stage::Done),
        Err(e) => {
            warn!("transfer failed: {}", e);
            on_stage(Stage::Failed);
        }
    }
    result
}

/// Diagnostic text when `output` counts as a failure.
///
/// sqlite3 can report errors on stderr and still exit 0, so for SQLite any
/// stderr output fails the step. Container tools are judged by exit status
/// alone since docker writes pull progress to stderr.
fn check(engine: EngineType, output: &CommandOutput) -> std::result::Result<(), String> {
    let stderr_fails = engine == EngineType::Sqlite && !output.stderr_text().is_empty();
    if output.success && !stderr_fails {
        Ok(())
    } else {
        Err(output.diagnostic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::selector::ImageRef;
    use crate::testing::{FakeProbe, FakeRunner, server};

    fn pipeline(runner: FakeRunner, probe: FakeProbe) -> Pipeline<FakeRunner, FakeProbe> {
        Pipeline::with(runner, probe)
    }

    #[test]
    fn sqlite_dump_uses_native_client_without_probe() {
        let probe = FakeProbe::new("unused");
        let p = pipeline(FakeRunner::new().succeed_with(b"BEGIN TRANSACTION;\nCOMMIT;\n"), probe);
        let conn = Connection::sqlite("local", "/tmp/app.db");

        let payload = p.dump(&conn, None).unwrap();

        assert_eq!(payload, b"BEGIN TRANSACTION;\nCOMMIT;\n");
        assert_eq!(p.probe.calls(), 0);
        let calls = p.runner.invocations();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].spec.program, "sqlite3");
        assert_eq!(calls[0].spec.args, ["/tmp/app.db", ".dump"]);
    }

    #[test]
    fn sqlite_stderr_fails_the_dump_even_on_zero_exit() {
        let runner = FakeRunner::new().succeed_with_stderr(b"", "Error: file is not a database");
        let p = pipeline(runner, FakeProbe::new("unused"));
        let err = p.dump(&Connection::sqlite("local", "/tmp/app.db"), None).unwrap_err();
        assert!(err.to_string().contains("file is not a database"), "{}", err);
    }

    #[test]
    fn postgres_dump_runs_in_version_matched_image() {
        let p = pipeline(
            FakeRunner::new().succeed_with(b"PGDMP"),
            FakeProbe::new("PostgreSQL 15.3 on x86_64-pc-linux-gnu"),
        );
        let schemas = SchemaFilter::parse("public");

        let payload = p.dump(&server("pg", EngineType::Postgresql), schemas.as_ref()).unwrap();

        assert_eq!(payload, b"PGDMP");
        let spec = &p.runner.invocations()[0].spec;
        assert_eq!(spec.program, "docker");
        assert!(spec.args.iter().any(|a| a == "postgres:15"));
        assert!(spec.args.ends_with(&["-n".to_string(), "public".to_string()]));
    }

    #[test]
    fn mysql_dump_maps_version_to_image() {
        let p = pipeline(
            FakeRunner::new().succeed_with(b"-- MySQL dump"),
            FakeProbe::new("8.0.34"),
        );
        p.dump(&server("my", EngineType::Mysql), None).unwrap();
        let spec = &p.runner.invocations()[0].spec;
        assert!(spec.args.iter().any(|a| a == "mysql:8.0"));
    }

    #[test]
    fn dump_failure_carries_tool_stderr() {
        let p = pipeline(
            FakeRunner::new().fail_with(1, "pg_dump: error: connection to server failed"),
            FakeProbe::new("PostgreSQL 16.1"),
        );
        let err = p.dump(&server("pg", EngineType::Postgresql), None).unwrap_err();
        match err {
            DbearError::DumpFailed { engine, diagnostic } => {
                assert_eq!(engine, EngineType::Postgresql);
                assert!(diagnostic.contains("connection to server failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn probe_failure_stops_dump_before_spawning() {
        let p = pipeline(FakeRunner::new(), FakeProbe::failing());
        let err = p.dump(&server("pg", EngineType::Postgresql), None).unwrap_err();
        assert!(matches!(err, DbearError::ConnectionFailed { .. }));
        assert_eq!(p.runner.spawn_count(), 0);
    }

    #[test]
    fn missing_docker_becomes_dump_failure() {
        let p = pipeline(
            FakeRunner::new().launch_error("failed to launch docker: No such file or directory"),
            FakeProbe::new("8.0.34"),
        );
        let err = p.dump(&server("my", EngineType::Mysql), None).unwrap_err();
        match err {
            DbearError::DumpFailed { diagnostic, .. } => {
                assert!(diagnostic.contains("failed to launch docker"), "{}", diagnostic);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn restore_failure_surfaces_permission_denied() {
        let p = pipeline(
            FakeRunner::new().fail_with(1, "permission denied"),
            FakeProbe::new("PostgreSQL 14.2"),
        );
        let err = p
            .restore(&server("pg", EngineType::Postgresql), b"PGDMP")
            .unwrap_err();
        assert!(matches!(err, DbearError::RestoreFailed { .. }));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn restore_feeds_payload_on_stdin() {
        let p = pipeline(FakeRunner::new(), FakeProbe::new("unused"));
        p.restore(&Connection::sqlite("copy", "/tmp/copy.db"), b"CREATE TABLE t(x);")
            .unwrap();
        let calls = p.runner.invocations();
        assert_eq!(calls[0].stdin.as_deref(), Some(&b"CREATE TABLE t(x);"[..]));
    }

    #[test]
    fn engine_mismatch_spawns_nothing() {
        for source in EngineType::ALL {
            for destination in EngineType::ALL {
                if source == destination {
                    continue;
                }
                let p = pipeline(FakeRunner::new(), FakeProbe::new("PostgreSQL 15.3"));
                let mut stages = Vec::new();
                let err = p
                    .transfer(&server("a", source), &server("b", destination), |s| stages.push(s))
                    .unwrap_err();
                assert!(matches!(err, DbearError::EngineMismatch { .. }));
                assert_eq!(p.runner.spawn_count(), 0);
                assert_eq!(p.probe.calls(), 0);
                assert_eq!(stages, [Stage::Failed]);
            }
        }
    }

    #[test]
    fn transfer_uses_each_endpoints_own_image() {
        let p = pipeline(
            FakeRunner::new().succeed_with(b"PGDMP-archive"),
            FakeProbe::sequence(&["PostgreSQL 12.17", "PostgreSQL 16.2"]),
        );
        let mut stages = Vec::new();
        p.transfer(
            &server("old", EngineType::Postgresql),
            &server("new", EngineType::Postgresql),
            |s| stages.push(s),
        )
        .unwrap();

        assert_eq!(
            stages,
            [
                Stage::DetectingVersions,
                Stage::ResolvingImages,
                Stage::Dumping,
                Stage::Restoring,
                Stage::Done
            ]
        );
        let calls = p.runner.invocations();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].spec.args.iter().any(|a| a == "postgres:12"));
        assert!(calls[0].spec.args.iter().any(|a| a == "pg_dump"));
        assert!(calls[1].spec.args.iter().any(|a| a == "postgres:16"));
        assert!(calls[1].spec.args.iter().any(|a| a == "pg_restore"));
        assert_eq!(calls[1].stdin.as_deref(), Some(&b"PGDMP-archive"[..]));
    }

    #[test]
    fn sqlite_transfer_skips_version_and_image_stages() {
        let p = pipeline(FakeRunner::new().succeed_with(b"dump"), FakeProbe::new("unused"));
        let mut stages = Vec::new();
        p.transfer(
            &Connection::sqlite("a", "/tmp/a.db"),
            &Connection::sqlite("b", "/tmp/b.db"),
            |s| stages.push(s),
        )
        .unwrap();
        assert_eq!(stages, [Stage::Dumping, Stage::Restoring, Stage::Done]);
        assert_eq!(p.probe.calls(), 0);
    }

    #[test]
    fn failed_dump_never_touches_destination() {
        let p = pipeline(
            FakeRunner::new().fail_with(2, "mysqldump: Got error: 1045"),
            FakeProbe::new("5.7.40"),
        );
        let mut stages = Vec::new();
        let err = p
            .transfer(
                &server("a", EngineType::Mysql),
                &server("b", EngineType::Mysql),
                |s| stages.push(s),
            )
            .unwrap_err();
        assert!(matches!(err, DbearError::DumpFailed { .. }));
        assert_eq!(p.runner.spawn_count(), 1);
        assert_eq!(stages.last(), Some(&Stage::Failed));
        assert!(!stages.contains(&Stage::Restoring));
    }

    #[test]
    fn plan_reports_versions_and_images() {
        let p = pipeline(FakeRunner::new(), FakeProbe::sequence(&["8.0.34", "5.7.44"]));
        let plan = p
            .plan(&server("a", EngineType::Mysql), &server("b", EngineType::Mysql))
            .unwrap();
        assert_eq!(plan.source.version, VersionToken::Release("8.0".into()));
        assert_eq!(plan.destination.toolchain, Toolchain::Container(ImageRef::new("mysql:5.7")));
        assert_eq!(p.runner.spawn_count(), 0);

        p.execute(&plan, |_| {}).unwrap();
        assert_eq!(p.runner.spawn_count(), 2);
        assert_eq!(p.probe.calls(), 2);
    }
}
