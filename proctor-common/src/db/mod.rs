//! Database module: pool initialization and schema creation

pub mod init;

pub use init::init_database;
