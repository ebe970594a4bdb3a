//! Test doubles for the process and version-probe seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;

use crate::config::connection::{Connection, EngineType};
use crate::error::{DbearError, Result};
use crate::utils::process::{CommandOutput, CommandRunner, CommandSpec};
use crate::version::VersionProbe;

pub fn server(name: &str, engine: EngineType) -> Connection {
    Connection {
        name: name.into(),
        engine,
        host: "db1".into(),
        port: engine.default_port(),
        database: "app".into(),
        username: "u".into(),
        password: "p".into(),
    }
}

/// Answers every probe with canned version strings, in order; the last one repeats.
pub struct FakeProbe {
    versions: RefCell<VecDeque<String>>,
    fail: bool,
    calls: Cell<usize>,
}

impl FakeProbe {
    pub fn new(version: &str) -> Self {
        Self::sequence(&[version])
    }

    pub fn sequence(versions: &[&str]) -> Self {
        Self {
            versions: RefCell::new(versions.iter().map(|v| v.to_string()).collect()),
            fail: false,
            calls: Cell::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            versions: RefCell::new(VecDeque::new()),
            fail: true,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl VersionProbe for FakeProbe {
    fn server_version(&self, conn: &Connection) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(DbearError::ConnectionFailed {
                engine: conn.engine,
                address: conn.address(),
                reason: "connection refused".into(),
            });
        }
        let mut versions = self.versions.borrow_mut();
        let version = if versions.len() > 1 {
            versions.pop_front()
        } else {
            versions.front().cloned()
        };
        Ok(version.unwrap_or_default())
    }
}

/// A recorded invocation: the spec plus whatever was written to stdin.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub spec: CommandSpec,
    pub stdin: Option<Vec<u8>>,
}

/// Replays queued outputs and records every invocation.
#[derive(Default)]
pub struct FakeRunner {
    outputs: RefCell<VecDeque<io::Result<CommandOutput>>>,
    invocations: RefCell<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed_with(self, stdout: &[u8]) -> Self {
        self.outputs.borrow_mut().push_back(Ok(CommandOutput {
            code: Some(0),
            success: true,
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
        }));
        self
    }

    pub fn succeed_with_stderr(self, stdout: &[u8], stderr: &str) -> Self {
        self.outputs.borrow_mut().push_back(Ok(CommandOutput {
            code: Some(0),
            success: true,
            stdout: stdout.to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }));
        self
    }

    pub fn fail_with(self, code: i32, stderr: &str) -> Self {
        self.outputs.borrow_mut().push_back(Ok(CommandOutput {
            code: Some(code),
            success: false,
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }));
        self
    }

    pub fn launch_error(self, message: &str) -> Self {
        self.outputs
            .borrow_mut()
            .push_back(Err(io::Error::new(io::ErrorKind::NotFound, message.to_string())));
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.invocations.borrow().len()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec, stdin: Option<&[u8]>) -> io::Result<CommandOutput> {
        self.invocations.borrow_mut().push(Invocation {
            spec: spec.clone(),
            stdin: stdin.map(<[u8]>::to_vec),
        });
        self.outputs
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput { code: Some(0), success: true, ..Default::default() }))
    }
}
