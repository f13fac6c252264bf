pub mod report_source;
pub mod run_log_store;
pub mod warehouse;
pub mod workbook;
