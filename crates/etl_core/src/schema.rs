//! Target table descriptions and the SQL text used to load them.

use std::str::FromStr;

use crate::error::EtlError;

pub const SURROGATE_KEY_COLUMN: &str = "surrogate_key";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Float,
}

impl ColumnKind {
    fn sql_type(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Float => "DOUBLE PRECISION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub primary_key: bool,
}

impl ColumnSpec {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
            primary_key: false,
        }
    }

    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Float,
            primary_key: false,
        }
    }

    pub const fn surrogate_key() -> Self {
        Self {
            name: SURROGATE_KEY_COLUMN,
            kind: ColumnKind::Text,
            primary_key: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: Vec<ColumnSpec>,
}

/// A bound value for one column of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Float(Option<f64>),
}

/// A row type that knows the table it loads into.
pub trait TableRecord {
    fn table() -> TableSpec;

    /// Values in `table().columns` order.
    fn values(&self) -> Vec<SqlValue>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMethod {
    Insert,
    Upsert,
    /// Drop and recreate the table, then insert.
    Overwrite,
    /// Truncate the table, then insert.
    Replace,
}

impl LoadMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Upsert => "upsert",
            Self::Overwrite => "overwrite",
            Self::Replace => "replace",
        }
    }
}

impl FromStr for LoadMethod {
    type Err = EtlError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "insert" => Ok(Self::Insert),
            "upsert" => Ok(Self::Upsert),
            "overwrite" => Ok(Self::Overwrite),
            "replace" => Ok(Self::Replace),
            other => Err(EtlError::InvalidLoadMethod(other.to_string())),
        }
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl TableSpec {
    pub fn primary_key(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|column| column.primary_key)
            .map(|column| column.name)
            .collect()
    }

    pub fn create_table_sql(&self) -> String {
        let mut definitions: Vec<String> = self
            .columns
            .iter()
            .map(|column| format!("{} {}", quote_ident(column.name), column.kind.sql_type()))
            .collect();
        let key = self.primary_key();
        if !key.is_empty() {
            definitions.push(format!(
                "PRIMARY KEY ({})",
                key.iter().map(|name| quote_ident(name)).collect::<Vec<_>>().join(", ")
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(self.name),
            definitions.join(", ")
        )
    }

    pub fn truncate_sql(&self) -> String {
        format!("TRUNCATE TABLE {}", quote_ident(self.name))
    }

    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(self.name))
    }

    /// `INSERT INTO "t" ("a", "b") `; the caller appends the values.
    pub fn insert_prefix_sql(&self) -> String {
        format!(
            "INSERT INTO {} ({}) ",
            quote_ident(self.name),
            self.columns
                .iter()
                .map(|column| quote_ident(column.name))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }

    /// Conflict clause updating every non-key column from `EXCLUDED`.
    pub fn upsert_suffix_sql(&self) -> String {
        let key = self.primary_key();
        let updates: Vec<String> = self
            .columns
            .iter()
            .filter(|column| !column.primary_key)
            .map(|column| {
                let name = quote_ident(column.name);
                format!("{name} = EXCLUDED.{name}")
            })
            .collect();
        let target = key.iter().map(|name| quote_ident(name)).collect::<Vec<_>>().join(", ");
        if updates.is_empty() {
            format!(" ON CONFLICT ({target}) DO NOTHING")
        } else {
            format!(" ON CONFLICT ({target}) DO UPDATE SET {}", updates.join(", "))
        }
    }

    /// Statements run before inserting rows with `method`.
    pub fn preparation_sql(&self, method: LoadMethod) -> Vec<String> {
        match method {
            LoadMethod::Insert | LoadMethod::Upsert => vec![self.create_table_sql()],
            LoadMethod::Overwrite => vec![self.drop_sql(), self.create_table_sql()],
            LoadMethod::Replace => vec![self.create_table_sql(), self.truncate_sql()],
        }
    }

    /// Rows per INSERT so bound parameters stay under the protocol limit.
    pub fn rows_per_statement(&self) -> usize {
        const MAX_BIND_PARAMETERS: usize = 65_535;
        (MAX_BIND_PARAMETERS / self.columns.len().max(1)).max(1)
    }
}
