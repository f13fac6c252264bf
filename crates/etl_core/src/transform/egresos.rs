//! F6 a) Estado Analítico del Ejercicio del Presupuesto de Egresos Detallado
//! (clasificación por objeto del gasto).

use std::sync::LazyLock;

use regex::Regex;

use crate::error::EtlError;
use crate::grid::{Cell, Grid};
use crate::keys::SurrogateKeyed;
use crate::report::Dataset;
use crate::schema::{ColumnSpec, SqlValue, TableRecord, TableSpec};
use crate::text::{clean_amount, extract_egreso_code, parse_corte_date};

use super::{first_per_key, DatasetRecord};

const DATE_ROW: usize = 4;
const CONCEPT_COLUMN: usize = 1;
const SECTION_I_FIRST_ROW: usize = 8;
const VALUE_COLUMNS: std::ops::Range<usize> = 1..8;

static SECTION_II_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*II\.\s*Gasto Etiquetado").expect("valid regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct EgresoRecord {
    pub surrogate_key: String,
    pub codigo: String,
    pub concepto: Option<String>,
    pub aprobado: Option<f64>,
    pub ampliaciones_reducciones: Option<f64>,
    pub modificado: Option<f64>,
    pub devengado: Option<f64>,
    pub pagado: Option<f64>,
    pub subejercicio: Option<f64>,
    pub fecha: String,
    pub cuarto: Option<String>,
    pub seccion: String,
}

impl TableRecord for EgresoRecord {
    fn table() -> TableSpec {
        TableSpec {
            name: Dataset::EgresosDetallado.table_name(),
            columns: vec![
                ColumnSpec::surrogate_key(),
                ColumnSpec::text("Codigo"),
                ColumnSpec::text("Concepto"),
                ColumnSpec::float("Aprobado"),
                ColumnSpec::float("Ampliaciones/Reducciones"),
                ColumnSpec::float("Modificado"),
                ColumnSpec::float("Devengado"),
                ColumnSpec::float("Pagado"),
                ColumnSpec::float("Subejercicio"),
                ColumnSpec::text("Fecha"),
                ColumnSpec::text("Cuarto"),
                ColumnSpec::text("Seccion"),
            ],
        }
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(Some(self.surrogate_key.clone())),
            SqlValue::Text(Some(self.codigo.clone())),
            SqlValue::Text(self.concepto.clone()),
            SqlValue::Float(self.aprobado),
            SqlValue::Float(self.ampliaciones_reducciones),
            SqlValue::Float(self.modificado),
            SqlValue::Float(self.devengado),
            SqlValue::Float(self.pagado),
            SqlValue::Float(self.subejercicio),
            SqlValue::Text(Some(self.fecha.clone())),
            SqlValue::Text(self.cuarto.clone()),
            SqlValue::Text(Some(self.seccion.clone())),
        ]
    }
}

impl SurrogateKeyed for EgresoRecord {
    fn set_surrogate_key(&mut self, key: String) {
        self.surrogate_key = key;
    }
}

impl DatasetRecord for EgresoRecord {
    const DATASET: Dataset = Dataset::EgresosDetallado;

    fn from_grid(grid: &Grid) -> Result<Vec<Self>, EtlError> {
        transform_egresos(grid)
    }
}

pub fn transform_egresos(grid: &Grid) -> Result<Vec<EgresoRecord>, EtlError> {
    let (fecha, cuarto) = match parse_corte_date(&grid.display(DATE_ROW, CONCEPT_COLUMN)) {
        Some(date) => (date.fecha(), Some(date.quarter_label())),
        None => (String::new(), None),
    };

    let section_ii_header = (0..grid.height())
        .find(|&row| SECTION_II_HEADER.is_match(&grid.display(row, CONCEPT_COLUMN)))
        .ok_or_else(|| EtlError::layout("Header 'II. Gasto Etiquetado' not found."))?;

    let section_ii_first = section_ii_header + 1;
    // Only an explicitly blank text cell ends section II; missing cells do not.
    let section_ii_end = (section_ii_first..grid.height())
        .find(|&row| grid.cell(row, CONCEPT_COLUMN).is_blank_text())
        .unwrap_or(grid.height());

    let mut records = section_rows(
        grid,
        SECTION_I_FIRST_ROW..section_ii_header,
        "I",
        &fecha,
        cuarto.as_deref(),
    );
    records.extend(section_rows(
        grid,
        section_ii_first..section_ii_end,
        "II",
        &fecha,
        cuarto.as_deref(),
    ));
    Ok(records)
}

fn section_rows(
    grid: &Grid,
    rows: std::ops::Range<usize>,
    seccion: &str,
    fecha: &str,
    cuarto: Option<&str>,
) -> Vec<EgresoRecord> {
    let rows = grid.clamp_rows(rows);
    let keyed: Vec<(Option<String>, Vec<Cell>)> = rows
        .map(|row| {
            let cells = grid.row_slice(row, VALUE_COLUMNS);
            (extract_egreso_code(&cells[0].display()), cells)
        })
        .collect();

    first_per_key(keyed)
        .into_iter()
        .map(|(codigo, cells)| EgresoRecord {
            surrogate_key: String::new(),
            codigo,
            concepto: cells[0].to_optional_text(),
            aprobado: clean_amount(&cells[1]),
            ampliaciones_reducciones: clean_amount(&cells[2]),
            modificado: clean_amount(&cells[3]),
            devengado: clean_amount(&cells[4]),
            pagado: clean_amount(&cells[5]),
            subejercicio: clean_amount(&cells[6]),
            fecha: fecha.to_string(),
            cuarto: cuarto.map(str::to_string),
            seccion: seccion.to_string(),
        })
        .collect()
}
