//! Report families, reporting periods and the object keys they live under.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static EGRESOS_FILE: LazyLock<Regex> =
    LazyLock::new(|| build_file_pattern(Dataset::EgresosDetallado.file_stem()));
static INGRESOS_FILE: LazyLock<Regex> =
    LazyLock::new(|| build_file_pattern(Dataset::IngresosDetallado.file_stem()));
static BALANCE_FILE: LazyLock<Regex> =
    LazyLock::new(|| build_file_pattern(Dataset::BalancePresupuestario.file_stem()));

fn build_file_pattern(stem: &str) -> Regex {
    let pattern = format!(r"^{}([1-4]T)(\d{{4}})\.xlsx", regex::escape(stem));
    Regex::new(&pattern).expect("report file pattern is a valid regex")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    EgresosDetallado,
    IngresosDetallado,
    BalancePresupuestario,
}

impl Dataset {
    pub fn label(self) -> &'static str {
        match self {
            Self::EgresosDetallado => "Egresos Detallado",
            Self::IngresosDetallado => "Ingresos Detallado",
            Self::BalancePresupuestario => "Balance Presupuestario",
        }
    }

    pub fn object_prefix(self) -> &'static str {
        match self {
            Self::EgresosDetallado => "finanzas/Egresos_Detallado/raw/",
            Self::IngresosDetallado => "finanzas/Ingresos_Detallado/raw/",
            Self::BalancePresupuestario => "finanzas/Balance_Presupuestario/raw/",
        }
    }

    fn file_stem(self) -> &'static str {
        match self {
            Self::EgresosDetallado => "F6_a_EAPED_Clas_Obj_Gas_LDF_",
            Self::IngresosDetallado => "F5_Edo_Ana_Ing_Det_LDF_",
            Self::BalancePresupuestario => "F4_Balance_Presupuestario_LDF_",
        }
    }

    pub fn sheet_name(self) -> &'static str {
        match self {
            Self::EgresosDetallado => "F6a COG",
            Self::IngresosDetallado => "F5 EAI",
            Self::BalancePresupuestario => "F4 BAP",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Self::EgresosDetallado => "nuevo_leon_egresos_detallado",
            Self::IngresosDetallado => "nuevo_leon_ingresos_detallado",
            Self::BalancePresupuestario => "nuevo_leon_balance_presupuestario",
        }
    }

    fn file_pattern(self) -> &'static Regex {
        match self {
            Self::EgresosDetallado => &*EGRESOS_FILE,
            Self::IngresosDetallado => &*INGRESOS_FILE,
            Self::BalancePresupuestario => &*BALANCE_FILE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Quarter code used inside published file names (`1T`..`4T`).
    pub fn file_code(self) -> &'static str {
        match self {
            Self::Q1 => "1T",
            Self::Q2 => "2T",
            Self::Q3 => "3T",
            Self::Q4 => "4T",
        }
    }

    pub fn from_file_code(code: &str) -> Option<Self> {
        match code {
            "1T" => Some(Self::Q1),
            "2T" => Some(Self::Q2),
            "3T" => Some(Self::Q3),
            "4T" => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering is by year, then quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReportPeriod {
    pub year: u16,
    pub quarter: Quarter,
}

impl ReportPeriod {
    pub fn new(year: u16, quarter: Quarter) -> Self {
        Self { year, quarter }
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "year={}, quarter={}", self.year, self.quarter)
    }
}

pub fn file_name(dataset: Dataset, period: ReportPeriod) -> String {
    format!(
        "{}{}{}.xlsx",
        dataset.file_stem(),
        period.quarter.file_code(),
        period.year
    )
}

pub fn object_key(dataset: Dataset, period: ReportPeriod) -> String {
    format!("{}{}", dataset.object_prefix(), file_name(dataset, period))
}

pub fn object_location(bucket: &str, key: &str) -> String {
    format!("s3://{bucket}/{key}")
}

/// Parses the base name of `key` against the dataset's file pattern.
pub fn parse_object_key(dataset: Dataset, key: &str) -> Option<ReportPeriod> {
    let base_name = key.rsplit('/').next().unwrap_or(key);
    let captures = dataset.file_pattern().captures(base_name)?;
    let quarter = Quarter::from_file_code(&captures[1])?;
    let year = captures[2].parse::<u16>().ok()?;
    Some(ReportPeriod::new(year, quarter))
}

pub fn discover_periods<'a>(
    dataset: Dataset,
    keys: impl IntoIterator<Item = &'a str>,
) -> Vec<ReportPeriod> {
    let mut periods: Vec<ReportPeriod> = keys
        .into_iter()
        .filter_map(|key| parse_object_key(dataset, key))
        .collect();
    periods.sort_unstable();
    periods.dedup();
    periods
}

pub fn latest_period<'a>(
    dataset: Dataset,
    keys: impl IntoIterator<Item = &'a str>,
) -> Option<ReportPeriod> {
    keys.into_iter()
        .filter_map(|key| parse_object_key(dataset, key))
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_egresos_object_key() {
        let key = object_key(
            Dataset::EgresosDetallado,
            ReportPeriod::new(2025, Quarter::Q3),
        );
        assert_eq!(
            key,
            "finanzas/Egresos_Detallado/raw/F6_a_EAPED_Clas_Obj_Gas_LDF_3T2025.xlsx"
        );
    }

    #[test]
    fn parses_key_from_nested_prefix() {
        let period = parse_object_key(
            Dataset::BalancePresupuestario,
            "finanzas/Balance_Presupuestario/raw/F4_Balance_Presupuestario_LDF_4T2020.xlsx",
        );
        assert_eq!(period, Some(ReportPeriod::new(2020, Quarter::Q4)));
    }

    #[test]
    fn ignores_other_dataset_and_bad_quarters() {
        assert_eq!(
            parse_object_key(
                Dataset::IngresosDetallado,
                "finanzas/Ingresos_Detallado/raw/F6_a_EAPED_Clas_Obj_Gas_LDF_1T2024.xlsx"
            ),
            None
        );
        assert_eq!(
            parse_object_key(
                Dataset::IngresosDetallado,
                "F5_Edo_Ana_Ing_Det_LDF_5T2024.xlsx"
            ),
            None
        );
        assert_eq!(
            parse_object_key(
                Dataset::IngresosDetallado,
                "copy_F5_Edo_Ana_Ing_Det_LDF_1T2024.xlsx"
            ),
            None
        );
    }

    #[test]
    fn latest_period_prefers_year_then_quarter() {
        let keys = [
            "finanzas/Egresos_Detallado/raw/F6_a_EAPED_Clas_Obj_Gas_LDF_4T2023.xlsx",
            "finanzas/Egresos_Detallado/raw/F6_a_EAPED_Clas_Obj_Gas_LDF_1T2024.xlsx",
            "finanzas/Egresos_Detallado/raw/F6_a_EAPED_Clas_Obj_Gas_LDF_2T2024.xlsx",
            "finanzas/Egresos_Detallado/raw/notes.txt",
        ];
        assert_eq!(
            latest_period(Dataset::EgresosDetallado, keys),
            Some(ReportPeriod::new(2024, Quarter::Q2))
        );
    }

    #[test]
    fn discover_periods_sorts_and_deduplicates() {
        let keys = [
            "raw/F5_Edo_Ana_Ing_Det_LDF_2T2022.xlsx",
            "raw/F5_Edo_Ana_Ing_Det_LDF_1T2021.xlsx",
            "archive/F5_Edo_Ana_Ing_Det_LDF_2T2022.xlsx",
        ];
        assert_eq!(
            discover_periods(Dataset::IngresosDetallado, keys),
            vec![
                ReportPeriod::new(2021, Quarter::Q1),
                ReportPeriod::new(2022, Quarter::Q2),
            ]
        );
    }

    #[test]
    fn latest_period_is_none_without_matches() {
        assert_eq!(latest_period(Dataset::BalancePresupuestario, std::iter::empty()), None);
    }

    #[test]
    fn file_patterns_are_compiled_once_per_dataset() {
        let first = Dataset::IngresosDetallado.file_pattern();
        let second = Dataset::IngresosDetallado.file_pattern();
        assert!(std::ptr::eq(first, second));
        assert!(!std::ptr::eq(first, Dataset::EgresosDetallado.file_pattern()));
        assert!(first.is_match("F5_Edo_Ana_Ing_Det_LDF_3T2024.xlsx"));
    }
}
