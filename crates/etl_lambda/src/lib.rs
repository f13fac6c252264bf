//! Function runtime for the Nuevo León finance ETL: report storage, workbook
//! decoding, Postgres loading, run metadata and the invocation handler.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod logging;
pub mod runtime;
