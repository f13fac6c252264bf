use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use etl_core::schema::{LoadMethod, SqlValue, TableSpec};

/// Destination database for transformed report rows.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Prepares `table` for `method` and writes `rows`, returning rows affected.
    async fn load(
        &self,
        table: &TableSpec,
        rows: Vec<Vec<SqlValue>>,
        method: LoadMethod,
    ) -> Result<u64, String>;
}

pub struct PgWarehouse {
    pool: PgPool,
}

impl PgWarehouse {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Warehouse for PgWarehouse {
    async fn load(
        &self,
        table: &TableSpec,
        rows: Vec<Vec<SqlValue>>,
        method: LoadMethod,
    ) -> Result<u64, String> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| format!("failed to open transaction: {error}"))?;

        for statement in table.preparation_sql(method) {
            sqlx::query(&statement)
                .execute(&mut *tx)
                .await
                .map_err(|error| format!("failed to prepare {}: {error}", table.name))?;
        }

        let mut affected = 0;
        for chunk in rows.chunks(table.rows_per_statement()) {
            let result = insert_statement(table, chunk, method)
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|error| format!("failed to write {}: {error}", table.name))?;
            affected += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|error| format!("failed to commit {}: {error}", table.name))?;
        Ok(affected)
    }
}

fn insert_statement(
    table: &TableSpec,
    rows: &[Vec<SqlValue>],
    method: LoadMethod,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(table.insert_prefix_sql());
    builder.push_values(rows, |mut row, values| {
        for value in values {
            match value {
                SqlValue::Text(text) => {
                    row.push_bind(text.clone());
                }
                SqlValue::Float(number) => {
                    row.push_bind(*number);
                }
            }
        }
    });
    if method == LoadMethod::Upsert {
        builder.push(table.upsert_suffix_sql());
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_core::schema::ColumnSpec;

    fn table() -> TableSpec {
        TableSpec {
            name: "nuevo_leon_sample",
            columns: vec![
                ColumnSpec::surrogate_key(),
                ColumnSpec::text("concept"),
                ColumnSpec::float("amount"),
            ],
        }
    }

    fn rows() -> Vec<Vec<SqlValue>> {
        vec![
            vec![
                SqlValue::Text(Some("k1".to_string())),
                SqlValue::Text(Some("A1".to_string())),
                SqlValue::Float(Some(10.0)),
            ],
            vec![
                SqlValue::Text(Some("k2".to_string())),
                SqlValue::Text(None),
                SqlValue::Float(None),
            ],
        ]
    }

    #[test]
    fn upsert_statement_binds_rows_and_conflict_clause() {
        let rows = rows();
        let builder = insert_statement(&table(), &rows, LoadMethod::Upsert);
        let sql = builder.sql();

        assert!(sql.starts_with(
            "INSERT INTO \"nuevo_leon_sample\" (\"surrogate_key\", \"concept\", \"amount\") VALUES"
        ));
        assert!(sql.contains("($1, $2, $3), ($4, $5, $6)"));
        assert!(sql.ends_with(
            "ON CONFLICT (\"surrogate_key\") DO UPDATE SET \"concept\" = EXCLUDED.\"concept\", \"amount\" = EXCLUDED.\"amount\""
        ));
    }

    #[test]
    fn replace_statement_has_no_conflict_clause() {
        let rows = rows();
        let builder = insert_statement(&table(), &rows, LoadMethod::Replace);
        assert!(!builder.sql().contains("ON CONFLICT"));
    }
}
