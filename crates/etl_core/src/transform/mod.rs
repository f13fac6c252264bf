//! Worksheet-to-record transforms, one module per report family.

pub mod balance;
pub mod egresos;
pub mod ingresos;

use crate::error::EtlError;
use crate::grid::Grid;
use crate::keys::SurrogateKeyed;
use crate::report::Dataset;
use crate::schema::TableRecord;

pub use balance::BalanceRecord;
pub use egresos::EgresoRecord;
pub use ingresos::IngresoRecord;

/// A loadable row produced from one report worksheet.
pub trait DatasetRecord: TableRecord + SurrogateKeyed + Sized + Send + Sync {
    const DATASET: Dataset;

    fn from_grid(grid: &Grid) -> Result<Vec<Self>, EtlError>;
}

/// Keeps the first row for each key; rows without a key are dropped.
pub(crate) fn first_per_key<T>(rows: Vec<(Option<String>, T)>) -> Vec<(String, T)> {
    let mut seen = std::collections::HashSet::new();
    rows.into_iter()
        .filter_map(|(key, row)| key.map(|key| (key, row)))
        .filter(|(key, _)| seen.insert(key.clone()))
        .collect()
}
