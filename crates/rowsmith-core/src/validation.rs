use std::collections::{BTreeMap, BTreeSet};

use crate::constraints::Constraint;
use crate::error::{Error, Result};
use crate::schema::{DatabaseSchema, Table};

/// Validate internal consistency of a database schema.
///
/// This checks:
/// - duplicate schemas/tables/columns
/// - every constraint column exists in its table (see [`validate_table`])
/// - foreign key referenced targets exist
pub fn validate_schema(schema: &DatabaseSchema) -> Result<()> {
    let mut catalog: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();

    for db_schema in &schema.schemas {
        if catalog.contains_key(&db_schema.name) {
            return Err(Error::InvalidSchema(format!(
                "duplicate schema name: {}",
                db_schema.name
            )));
        }

        let mut tables = BTreeMap::new();
        for table in &db_schema.tables {
            if tables.contains_key(&table.name) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate table name: {}.{}",
                    db_schema.name, table.name
                )));
            }

            let mut columns = BTreeSet::new();
            for column in &table.columns {
                if !columns.insert(column.name.clone()) {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate column name: {}.{}.{}",
                        db_schema.name, table.name, column.name
                    )));
                }
            }

            tables.insert(table.name.clone(), columns);
        }

        catalog.insert(db_schema.name.clone(), tables);
    }

    for db_schema in &schema.schemas {
        for table in &db_schema.tables {
            validate_table(&db_schema.name, table)?;

            for fk in table.foreign_keys() {
                let ref_columns = catalog
                    .get(&fk.referenced_schema)
                    .and_then(|tables| tables.get(&fk.referenced_table))
                    .ok_or_else(|| {
                        Error::InvalidSchema(format!(
                            "referenced table not found: {}.{}",
                            fk.referenced_schema, fk.referenced_table
                        ))
                    })?;

                for column in &fk.referenced_columns {
                    if !ref_columns.contains(column) {
                        return Err(Error::InvalidSchema(format!(
                            "referenced column not found: {}.{}.{}",
                            fk.referenced_schema, fk.referenced_table, column
                        )));
                    }
                }
            }
        }
    }

    Ok(())
}

/// Check that every constraint of `table` only names columns the table has.
///
/// A failure here is fatal for this table alone; callers generating several
/// tables keep going with the others.
pub fn validate_table(schema: &str, table: &Table) -> Result<()> {
    let mismatch = |detail: String| Error::SchemaMismatch {
        table: format!("{schema}.{}", table.name),
        detail,
    };

    for constraint in &table.constraints {
        let (kind, columns) = match constraint {
            Constraint::PrimaryKey(pk) => ("primary key", &pk.columns),
            Constraint::Unique(unique) => ("unique constraint", &unique.columns),
            Constraint::ForeignKey(fk) => {
                if fk.columns.len() != fk.referenced_columns.len() {
                    return Err(mismatch(format!(
                        "foreign key {} has {} columns but references {}",
                        fk.label(),
                        fk.columns.len(),
                        fk.referenced_columns.len()
                    )));
                }
                ("foreign key", &fk.columns)
            }
        };

        if columns.is_empty() {
            return Err(mismatch(format!("{kind} has no columns")));
        }

        for column in columns {
            if table.column(column).is_none() {
                return Err(mismatch(format!("{kind} column not found: {column}")));
            }
        }
    }

    Ok(())
}
