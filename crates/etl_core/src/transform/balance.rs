//! F4 Balance Presupuestario, reshaped to one row per (concept, amount type).

use crate::error::EtlError;
use crate::grid::{Cell, Grid};
use crate::keys::SurrogateKeyed;
use crate::report::Dataset;
use crate::schema::{ColumnSpec, SqlValue, TableRecord, TableSpec};
use crate::text::{balance_code, clean_amount, parse_fecha_header, split_balance_code};

use super::{first_per_key, DatasetRecord};

const HEADER_ROW: usize = 3;
const CONCEPT_COLUMN: usize = 1;
const VALUE_COLUMNS: std::ops::Range<usize> = 1..5;

/// Amount columns in output order.
pub const AMOUNT_TYPES: [&str; 3] = ["estimated_or_approved", "devengado", "recaudado_pagado"];

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRecord {
    pub surrogate_key: String,
    pub concept: Option<String>,
    pub sublabel: String,
    pub year_quarter: String,
    pub full_date: Option<String>,
    pub amount_type: String,
    pub amount: Option<f64>,
}

impl TableRecord for BalanceRecord {
    fn table() -> TableSpec {
        TableSpec {
            name: Dataset::BalancePresupuestario.table_name(),
            columns: vec![
                ColumnSpec::surrogate_key(),
                ColumnSpec::text("concept"),
                ColumnSpec::text("sublabel"),
                ColumnSpec::text("year_quarter"),
                ColumnSpec::text("full_date"),
                ColumnSpec::text("type"),
                ColumnSpec::float("amount"),
            ],
        }
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(Some(self.surrogate_key.clone())),
            SqlValue::Text(self.concept.clone()),
            SqlValue::Text(Some(self.sublabel.clone())),
            SqlValue::Text(Some(self.year_quarter.clone())),
            SqlValue::Text(self.full_date.clone()),
            SqlValue::Text(Some(self.amount_type.clone())),
            SqlValue::Float(self.amount),
        ]
    }
}

impl SurrogateKeyed for BalanceRecord {
    fn set_surrogate_key(&mut self, key: String) {
        self.surrogate_key = key;
    }
}

impl DatasetRecord for BalanceRecord {
    const DATASET: Dataset = Dataset::BalancePresupuestario;

    fn from_grid(grid: &Grid) -> Result<Vec<Self>, EtlError> {
        Ok(transform_balance(grid))
    }
}

pub fn transform_balance(grid: &Grid) -> Vec<BalanceRecord> {
    let (full_date, year_quarter) = parse_fecha_header(&grid.display(HEADER_ROW, CONCEPT_COLUMN));

    let coded: Vec<(Option<String>, Vec<Cell>)> = (0..grid.height())
        .map(|row| {
            let cells = grid.row_slice(row, VALUE_COLUMNS);
            (balance_code(&cells[0].display()), cells)
        })
        .collect();
    let unique = first_per_key(coded);

    // Long format: every concept for the first amount type, then the next type.
    let mut records = Vec::with_capacity(unique.len() * AMOUNT_TYPES.len());
    for (offset, amount_type) in AMOUNT_TYPES.iter().enumerate() {
        for (_, cells) in &unique {
            let (concept, sublabel) = split_balance_code(&cells[0].display());
            records.push(BalanceRecord {
                surrogate_key: String::new(),
                concept,
                sublabel,
                year_quarter: year_quarter.clone(),
                full_date: full_date.clone(),
                amount_type: (*amount_type).to_string(),
                amount: clean_amount(&cells[offset + 1]),
            });
        }
    }
    records
}
