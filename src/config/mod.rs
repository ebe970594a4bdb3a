pub mod connection;
pub mod uri;
