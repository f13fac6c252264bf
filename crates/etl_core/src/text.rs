use std::sync::LazyLock;

use regex::Regex;

use crate::grid::Cell;

static FECHA_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}) de (\w+)(?: de)? (\d{4})").expect("valid regex"));
static CORTE_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"al (\d{1,2}) de (\w+) de (\d{4})").expect("valid regex"));
static BALANCE_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(A[123]|B[12]|C[12]|E[12]|F[12]|G[12])\.\s*(.*)").expect("valid regex")
});
static EGRESO_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z])([0-9]+)\)").expect("valid regex"));

pub fn month_number(name: &str) -> u32 {
    match name {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => 0,
    }
}

/// Quarter number for a month; an unknown month (0) maps to quarter 0.
pub fn quarter_of_month(month: u32) -> u32 {
    ((month as i64 - 1).div_euclid(3) + 1) as u32
}

/// Cut-off date of a report ("al 31 de marzo de 2023").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorteDate {
    pub year: u32,
    pub month: u32,
    pub day: u32,
}

impl CorteDate {
    /// `YYYY-MM-DD`.
    pub fn fecha(&self) -> String {
        format!("{}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn quarter(&self) -> u32 {
        quarter_of_month(self.month)
    }

    /// `Qn`.
    pub fn quarter_label(&self) -> String {
        format!("Q{}", self.quarter())
    }

    /// `YYYY_Qn`.
    pub fn year_quarter(&self) -> String {
        format!("{}_Q{}", self.year, self.quarter())
    }
}

fn corte_from_captures(captures: &regex::Captures<'_>) -> Option<CorteDate> {
    Some(CorteDate {
        day: captures[1].parse().ok()?,
        month: month_number(&captures[2].to_lowercase()),
        year: captures[3].parse().ok()?,
    })
}

/// Full date and `YYYY_Qn` from a balance header; `(None, "unknown")` when absent.
pub fn parse_fecha_header(text: &str) -> (Option<String>, String) {
    let lowered = text.to_lowercase();
    match FECHA_HEADER
        .captures(&lowered)
        .and_then(|captures| corte_from_captures(&captures))
    {
        Some(date) => (Some(date.fecha()), date.year_quarter()),
        None => (None, "unknown".to_string()),
    }
}

/// Searches for the `al <d> de <mes> de <yyyy>` phrase. The leading words are
/// matched case-sensitively; the month name is not.
pub fn parse_corte_date(text: &str) -> Option<CorteDate> {
    CORTE_DATE
        .captures(text)
        .and_then(|captures| corte_from_captures(&captures))
}

/// Splits `"A1. Concepto"` into `(Some("A1"), "Concepto")`.
pub fn split_balance_code(text: &str) -> (Option<String>, String) {
    match BALANCE_CODE.captures(text) {
        Some(captures) => (Some(captures[1].to_string()), captures[2].to_string()),
        None => (None, text.to_string()),
    }
}

pub fn balance_code(text: &str) -> Option<String> {
    split_balance_code(text).0
}

/// `"a1) Servicios"` -> `"A1"`.
pub fn extract_egreso_code(text: &str) -> Option<String> {
    EGRESO_CODE
        .captures(text)
        .map(|captures| format!("{}{}", captures[1].to_uppercase(), &captures[2]))
}

/// Monetary amount from a cell: numbers pass through, text loses `,`, `$`
/// and spaces before parsing. Unparseable values and NaN yield `None`.
pub fn clean_amount(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Number(value) => *value,
        Cell::Empty => return None,
        other => {
            let cleaned: String = other
                .display()
                .chars()
                .filter(|ch| !matches!(ch, ',' | '$' | ' '))
                .collect();
            cleaned.trim().parse::<f64>().ok()?
        }
    };
    (!value.is_nan()).then_some(value)
}
