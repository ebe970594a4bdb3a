use std::fmt;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

/// A program invocation: arguments plus environment scoped to the child only.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[cfg(test)]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

// Env values are credentials; only the keys are ever printed.
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &keys)
            .finish()
    }
}

/// Exit status and captured streams of a finished program.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }

    /// Diagnostic text for a failed run: stderr if present, otherwise the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr_text();
        match (stderr.is_empty(), self.code) {
            (false, Some(code)) => format!("exit status {}, stderr: {}", code, stderr),
            (false, None) => format!("terminated by signal, stderr: {}", stderr),
            (true, Some(code)) => format!("exit status {}", code),
            (true, None) => "terminated by signal".to_string(),
        }
    }
}

/// Runs external programs to completion.
pub trait CommandRunner {
    /// Run `spec`, feeding `stdin` when given, and capture stdout and stderr.
    fn run(&self, spec: &CommandSpec, stdin: Option<&[u8]>) -> io::Result<CommandOutput>;
}

/// Spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec, stdin: Option<&[u8]>) -> io::Result<CommandOutput> {
        debug!(command = ?spec, stdin_bytes = stdin.map(<[u8]>::len), "spawning");

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                io::Error::new(e.kind(), format!("failed to launch {}: {}", spec.program, e))
            })?;

        // Feed stdin from a scoped thread so a child blocked on a full stdout
        // pipe cannot deadlock against us.
        let output = thread::scope(|scope| {
            let writer = match (stdin, child.stdin.take()) {
                (Some(bytes), Some(mut pipe)) => Some(scope.spawn(move || -> io::Result<()> {
                    match pipe.write_all(bytes) {
                        // child exited without reading everything; its status tells the story
                        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                        other => other,
                    }
                })),
                _ => None,
            };

            let output = child.wait_with_output()?;
            if let Some(handle) = writer {
                handle
                    .join()
                    .map_err(|_| io::Error::other("stdin writer thread panicked"))??;
            }
            Ok::<_, io::Error>(output)
        })?;

        debug!(
            program = %spec.program,
            code = ?output.status.code(),
            stdout_bytes = output.stdout.len(),
            "finished"
        );

        Ok(CommandOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
