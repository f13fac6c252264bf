//! Header-less cell grid decoded from a worksheet.
//!
//! Row and column indices are zero-based sheet positions (`A1` is `(0, 0)`),
//! so layout constants in the transforms read the same as the raw report.

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Text form used for pattern matching and text-typed columns.
    /// Integral numbers keep a trailing `.0` (`1000.0`).
    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(value) => value.clone(),
            Self::Number(value) => format_number(*value),
            Self::Bool(true) => "True".to_string(),
            Self::Bool(false) => "False".to_string(),
        }
    }

    /// Text form for nullable columns; empty cells become `None`.
    pub fn to_optional_text(&self) -> Option<String> {
        match self {
            Self::Empty => None,
            other => Some(other.display()),
        }
    }

    /// True for a text cell holding only whitespace. An `Empty` cell is not blank.
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Self::Text(value) if value.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

static EMPTY_CELL: Cell = Cell::Empty;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<Cell>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        Self { rows }
    }

    /// Builds a grid from string literals; `""` becomes an empty cell.
    pub fn from_text_rows(rows: &[&[&str]]) -> Self {
        Self::new(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|value| {
                            if value.is_empty() {
                                Cell::Empty
                            } else {
                                Cell::text(*value)
                            }
                        })
                        .collect()
                })
                .collect(),
        )
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(Cell::is_empty))
    }

    /// Out-of-range positions read as empty cells.
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn display(&self, row: usize, column: usize) -> String {
        self.cell(row, column).display()
    }

    /// Cells `columns` of `row`, padded with empties for short rows.
    pub fn row_slice(&self, row: usize, columns: std::ops::Range<usize>) -> Vec<Cell> {
        columns.map(|column| self.cell(row, column).clone()).collect()
    }

    /// Row indices in `rows` that exist in the grid.
    pub fn clamp_rows(&self, rows: std::ops::Range<usize>) -> std::ops::Range<usize> {
        let end = rows.end.min(self.height());
        rows.start.min(end)..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_render_like_spreadsheet_exports() {
        assert_eq!(Cell::Number(1000.0).display(), "1000.0");
        assert_eq!(Cell::Number(12.5).display(), "12.5");
        assert_eq!(Cell::Empty.display(), "");
        assert_eq!(Cell::Empty.to_optional_text(), None);
    }

    #[test]
    fn blank_text_differs_from_empty_cell() {
        assert!(Cell::text("   ").is_blank_text());
        assert!(!Cell::Empty.is_blank_text());
        assert!(!Cell::text("A1)").is_blank_text());
    }

    #[test]
    fn out_of_range_reads_are_empty() {
        let grid = Grid::from_text_rows(&[&["a", "b"], &["c"]]);
        assert_eq!(grid.cell(1, 1), &Cell::Empty);
        assert_eq!(grid.cell(9, 0), &Cell::Empty);
        assert_eq!(grid.row_slice(1, 0..3).len(), 3);
        assert_eq!(grid.clamp_rows(1..10), 1..2);
        assert_eq!(grid.clamp_rows(5..10), 2..2);
    }

    #[test]
    fn grid_of_empty_cells_is_empty() {
        assert!(Grid::default().is_empty());
        assert!(Grid::from_text_rows(&[&["", ""]]).is_empty());
        assert!(!Grid::from_text_rows(&[&["", "x"]]).is_empty());
    }
}
