//! Import connection profiles from files other tools already maintain.

pub mod env;

pub use env::{EnvImportOptions, import_env};
