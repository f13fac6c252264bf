//! F5 Estado Analítico de Ingresos Detallado.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::EtlError;
use crate::grid::Grid;
use crate::keys::SurrogateKeyed;
use crate::report::Dataset;
use crate::schema::{ColumnSpec, SqlValue, TableRecord, TableSpec};
use crate::text::parse_corte_date;

use super::DatasetRecord;

const DATE_ROW: usize = 3;
const VALUE_COLUMNS: std::ops::Range<usize> = 1..8;
const SECTION_I_ROWS: std::ops::Range<usize> = 7..44;
const SECTION_II_ROWS: std::ops::Range<usize> = 45..76;

static PRIMARY_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]\.)").expect("valid regex"));
static SECONDARY_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]\d+\))").expect("valid regex"));

/// Every column is stored as text, matching the published table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngresoRecord {
    pub surrogate_key: String,
    pub concepto: Option<String>,
    pub estimado: Option<String>,
    pub ampliaciones_reducciones: Option<String>,
    pub modificado: Option<String>,
    pub devengado: Option<String>,
    pub recaudado: Option<String>,
    pub diferencia: Option<String>,
    pub clave_primaria: Option<String>,
    pub clave_secundaria: Option<String>,
    pub fecha: String,
    pub cuarto: String,
    pub seccion: String,
}

impl TableRecord for IngresoRecord {
    fn table() -> TableSpec {
        TableSpec {
            name: Dataset::IngresosDetallado.table_name(),
            columns: vec![
                ColumnSpec::surrogate_key(),
                ColumnSpec::text("concepto"),
                ColumnSpec::text("estimado"),
                ColumnSpec::text("ampliaciones_reducciones"),
                ColumnSpec::text("modificado"),
                ColumnSpec::text("devengado"),
                ColumnSpec::text("recaudado"),
                ColumnSpec::text("diferencia"),
                ColumnSpec::text("clave_primaria"),
                ColumnSpec::text("clave_secundaria"),
                ColumnSpec::text("fecha"),
                ColumnSpec::text("cuarto"),
                ColumnSpec::text("seccion"),
            ],
        }
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(Some(self.surrogate_key.clone())),
            SqlValue::Text(self.concepto.clone()),
            SqlValue::Text(self.estimado.clone()),
            SqlValue::Text(self.ampliaciones_reducciones.clone()),
            SqlValue::Text(self.modificado.clone()),
            SqlValue::Text(self.devengado.clone()),
            SqlValue::Text(self.recaudado.clone()),
            SqlValue::Text(self.diferencia.clone()),
            SqlValue::Text(self.clave_primaria.clone()),
            SqlValue::Text(self.clave_secundaria.clone()),
            SqlValue::Text(Some(self.fecha.clone())),
            SqlValue::Text(Some(self.cuarto.clone())),
            SqlValue::Text(Some(self.seccion.clone())),
        ]
    }
}

impl SurrogateKeyed for IngresoRecord {
    fn set_surrogate_key(&mut self, key: String) {
        self.surrogate_key = key;
    }
}

impl DatasetRecord for IngresoRecord {
    const DATASET: Dataset = Dataset::IngresosDetallado;

    fn from_grid(grid: &Grid) -> Result<Vec<Self>, EtlError> {
        Ok(transform_ingresos(grid))
    }
}

/// Date header spread across row 3; cells are joined before searching.
pub fn extract_fecha_y_cuarto(grid: &Grid) -> (String, String) {
    let header = VALUE_COLUMNS
        .map(|column| grid.display(DATE_ROW, column).trim().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    match parse_corte_date(&header) {
        Some(date) => (date.fecha(), date.year_quarter()),
        None => (String::new(), String::new()),
    }
}

pub fn transform_ingresos(grid: &Grid) -> Vec<IngresoRecord> {
    let (fecha, cuarto) = extract_fecha_y_cuarto(grid);
    let mut records = section_rows(grid, SECTION_I_ROWS, "I", &fecha, &cuarto);
    records.extend(section_rows(grid, SECTION_II_ROWS, "II", &fecha, &cuarto));
    records
}

fn section_rows(
    grid: &Grid,
    rows: std::ops::Range<usize>,
    seccion: &str,
    fecha: &str,
    cuarto: &str,
) -> Vec<IngresoRecord> {
    grid.clamp_rows(rows)
        .map(|row| {
            let cells = grid.row_slice(row, VALUE_COLUMNS);
            let concept_text = cells[0].display();
            IngresoRecord {
                surrogate_key: String::new(),
                concepto: cells[0].to_optional_text(),
                estimado: cells[1].to_optional_text(),
                ampliaciones_reducciones: cells[2].to_optional_text(),
                modificado: cells[3].to_optional_text(),
                devengado: cells[4].to_optional_text(),
                recaudado: cells[5].to_optional_text(),
                diferencia: cells[6].to_optional_text(),
                clave_primaria: first_capture(&PRIMARY_KEY_PATTERN, &concept_text),
                clave_secundaria: first_capture(&SECONDARY_KEY_PATTERN, &concept_text),
                fecha: fecha.to_string(),
                cuarto: cuarto.to_string(),
                seccion: seccion.to_string(),
            }
        })
        .collect()
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .map(|captures| captures[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    fn ingresos_grid() -> Grid {
        let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); 80];
        rows[3] = vec![
            Cell::Empty,
            Cell::text("Del 1 de enero"),
            Cell::text("al 31 de marzo de 2025"),
        ];
        rows[7] = vec![
            Cell::Empty,
            Cell::text("A. Impuestos"),
            Cell::Number(1500.0),
            Cell::Number(0.0),
            Cell::Number(1500.0),
            Cell::Number(400.5),
            Cell::Number(380.0),
            Cell::Number(-1120.0),
        ];
        rows[8] = vec![Cell::Empty, Cell::text("a1) Impuesto sobre nómina")];
        rows[44] = vec![Cell::Empty, Cell::text("Total de Ingresos de Libre Disposición")];
        rows[45] = vec![Cell::Empty, Cell::text("B. Transferencias Federales")];
        rows[76] = vec![Cell::Empty, Cell::text("Total")];
        Grid::new(rows)
    }

    #[test]
    fn reads_fixed_sections_including_empty_rows() {
        let records = transform_ingresos(&ingresos_grid());
        assert_eq!(records.len(), 37 + 31);
        assert!(records[..37].iter().all(|record| record.seccion == "I"));
        assert!(records[37..].iter().all(|record| record.seccion == "II"));
        assert!(records
            .iter()
            .all(|record| record.concepto.as_deref() != Some("Total de Ingresos de Libre Disposición")));
    }

    #[test]
    fn extracts_primary_and_secondary_keys() {
        let records = transform_ingresos(&ingresos_grid());
        assert_eq!(records[0].clave_primaria.as_deref(), Some("A."));
        assert_eq!(records[0].clave_secundaria, None);
        assert_eq!(records[1].clave_primaria, None);
        assert_eq!(records[1].clave_secundaria.as_deref(), Some("a1)"));
        assert_eq!(records[37].clave_primaria.as_deref(), Some("B."));
    }

    #[test]
    fn amounts_are_kept_as_text() {
        let records = transform_ingresos(&ingresos_grid());
        assert_eq!(records[0].estimado.as_deref(), Some("1500.0"));
        assert_eq!(records[0].devengado.as_deref(), Some("400.5"));
        assert_eq!(records[1].estimado, None);
    }

    #[test]
    fn date_is_found_across_joined_cells() {
        assert_eq!(
            extract_fecha_y_cuarto(&ingresos_grid()),
            ("2025-03-31".to_string(), "2025_Q1".to_string())
        );
        assert_eq!(
            extract_fecha_y_cuarto(&Grid::default()),
            (String::new(), String::new())
        );
    }

    #[test]
    fn short_sheet_truncates_sections() {
        let grid = Grid::from_text_rows(&[
            &[""],
            &[""],
            &[""],
            &[""],
            &[""],
            &[""],
            &[""],
            &["", "A. Impuestos"],
            &["", "a1) Predial"],
        ]);
        let records = transform_ingresos(&grid);
        assert_eq!(records.len(), 2);
    }
}
