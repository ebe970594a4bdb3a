use crate::config::connection::Connection;
use crate::error::Result;
use crate::utils::process::CommandSpec;

pub mod mysql;
pub mod postgres;
pub mod selector;
pub mod sqlite;

use selector::ImageRef;

/// Where the dump/restore tools for a connection come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toolchain {
    /// Client installed on the invoking host.
    Native,
    /// Tools run inside a throwaway container built from this image.
    Container(ImageRef),
}

/// Builds the external commands that move data in and out of one engine.
///
/// Dump commands write the whole backup to stdout; restore commands read it
/// from stdin. Credentials go into `CommandSpec::env`, never into arguments.
pub trait BackendDriver: Send + Sync {
    fn name(&self) -> &'static str;

    fn dump_command(
        &self,
        conn: &Connection,
        toolchain: &Toolchain,
        schemas: Option<&SchemaFilter>,
    ) -> Result<CommandSpec>;

    fn restore_command(&self, conn: &Connection, toolchain: &Toolchain) -> Result<CommandSpec>;
}

/// Ordered, de-duplicated, non-empty set of schema names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaFilter(Vec<String>);

impl SchemaFilter {
    /// `None` when no usable name remains, meaning "all schemas".
    pub fn from_names<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() && !kept.iter().any(|k| k == name) {
                kept.push(name.to_string());
            }
        }
        (!kept.is_empty()).then_some(SchemaFilter(kept))
    }

    /// Parse a comma-separated list such as `public, audit`.
    pub fn parse(list: &str) -> Option<Self> {
        Self::from_names(list.split(','))
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// `docker run --rm [-i] --network host -e KEY...` forwarding each env key by
/// name, so values never show up in the process list.
fn docker_run(image: &ImageRef, env: Vec<(&str, String)>, stdin: bool) -> CommandSpec {
    let mut spec = CommandSpec::new("docker").args(["run", "--rm"]);
    if stdin {
        spec = spec.arg("-i");
    }
    spec = spec.args(["--network", "host"]);
    for (key, value) in env {
        spec = spec.args(["-e", key]).env(key, value);
    }
    spec.arg(image.as_str())
}
