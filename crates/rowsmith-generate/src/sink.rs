use std::collections::BTreeMap;

use crate::errors::GenerationError;
use crate::value::Row;

/// Destination for completed tables. Called once per table, from the
/// scheduling thread, after every row of the table is assembled.
pub trait RowSink {
    fn write_table(&mut self, schema: &str, table: &str, rows: &[Row]) -> Result<(), GenerationError>;
}

/// Keeps every table in memory, keyed by `schema.table`.
#[derive(Debug, Default)]
pub struct CollectingSink {
    tables: BTreeMap<String, Vec<Row>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, schema: &str, table: &str) -> Option<&[Row]> {
        self.tables
            .get(&format!("{schema}.{table}"))
            .map(Vec::as_slice)
    }

    pub fn table_keys(&self) -> impl Iterator<Item = &String> {
        self.tables.keys()
    }

    pub fn into_tables(self) -> BTreeMap<String, Vec<Row>> {
        self.tables
    }
}

impl RowSink for CollectingSink {
    fn write_table(&mut self, schema: &str, table: &str, rows: &[Row]) -> Result<(), GenerationError> {
        let key = format!("{schema}.{table}");
        if self.tables.contains_key(&key) {
            return Err(GenerationError::Sink(format!("table {key} written twice")));
        }
        self.tables.insert(key, rows.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::GeneratedValue;

    #[test]
    fn collects_by_table_key() {
        let mut sink = CollectingSink::new();
        let row = Row::from([("id".to_string(), GeneratedValue::Int(1))]);
        sink.write_table("public", "users", &[row.clone()])
            .expect("write");
        assert_eq!(sink.rows("public", "users"), Some(&[row][..]));
        assert!(sink.rows("public", "orders").is_none());

        let err = sink.write_table("public", "users", &[]).expect_err("duplicate");
        assert!(matches!(err, GenerationError::Sink(_)));
    }
}
