use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Range, Reader, Xlsx};
use etl_core::grid::{Cell, Grid};

/// Turns a downloaded report into the worksheet grid the transforms read.
pub trait WorkbookDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], sheet_name: &str) -> Result<Grid, String>;
}

pub struct XlsxDecoder;

impl WorkbookDecoder for XlsxDecoder {
    fn decode(&self, bytes: &[u8], sheet_name: &str) -> Result<Grid, String> {
        decode_sheet(bytes, sheet_name)
    }
}

/// Decodes one worksheet of an `.xlsx` payload into a grid anchored at `A1`,
/// so leading empty rows and columns keep their positions.
pub fn decode_sheet(bytes: &[u8], sheet_name: &str) -> Result<Grid, String> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|error| format!("failed to open workbook: {error}"))?;
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|error| format!("failed to read sheet '{sheet_name}': {error}"))?;
    Ok(grid_from_range(&range))
}

pub fn grid_from_range(range: &Range<Data>) -> Grid {
    let Some((first_row, first_column)) = range.start() else {
        return Grid::default();
    };
    let first_row = first_row as usize;
    let first_column = first_column as usize;

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); first_row];
    for values in range.rows() {
        let mut cells = vec![Cell::Empty; first_column];
        cells.extend(values.iter().map(to_cell));
        rows.push(cells);
    }
    Grid::new(rows)
}

fn to_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Float(number) => Cell::Number(*number),
        Data::Int(number) => Cell::Number(*number as f64),
        Data::Bool(flag) => Cell::Bool(*flag),
        Data::DateTime(value) => Cell::Number(value.as_f64()),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Cell::Text(text.clone()),
        Data::Error(error) => Cell::Text(error.to_string()),
    }
}
