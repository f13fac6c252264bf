//! Domain primitives for the Nuevo León finance ETL.
//!
//! This crate owns report naming, worksheet transforms, table schemas and the
//! invocation contract. It intentionally excludes AWS SDK, database driver and
//! Lambda runtime concerns.

pub mod contract;
pub mod error;
pub mod grid;
pub mod keys;
pub mod report;
pub mod run_log;
pub mod schema;
pub mod text;
pub mod transform;

pub use error::EtlError;
