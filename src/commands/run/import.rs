use std::path::Path;

use anyhow::{Context, Result as AnyResult};
use regex::Regex;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

use super::schema::open_database;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    /// Narrowest type that holds every non-empty field.
    pub(crate) fn infer<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        let mut inferred = Self::Integer;
        let mut saw_value = false;

        for field in fields.into_iter().filter(|field| !field.is_empty()) {
            saw_value = true;
            if inferred == Self::Integer && field.parse::<i64>().is_err() {
                inferred = Self::Real;
            }
            if inferred == Self::Real && field.parse::<f64>().is_err() {
                return Self::Text;
            }
        }

        if saw_value { inferred } else { Self::Text }
    }

    fn to_value(self, field: &str) -> Value {
        if field.is_empty() {
            return Value::Null;
        }
        match self {
            Self::Integer => field
                .parse()
                .map(Value::Integer)
                .unwrap_or_else(|_| Value::Text(field.to_string())),
            Self::Real => field
                .parse()
                .map(Value::Real)
                .unwrap_or_else(|_| Value::Text(field.to_string())),
            Self::Text => Value::Text(field.to_string()),
        }
    }
}

/// A delimited resource held in memory: header plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TabularData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TabularData {
    pub(crate) fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|idx| ColumnType::infer(self.rows.iter().map(|row| row[idx].as_str())))
            .collect()
    }
}

/// Loads delimited text resources into tables with replace semantics.
pub(crate) struct TabularImporter {
    identifier: Regex,
    delimiter: u8,
}

impl TabularImporter {
    pub(crate) fn new() -> AnyResult<Self> {
        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .context("failed to compile table name regex")?;
        Ok(Self {
            identifier,
            delimiter: b',',
        })
    }

    pub(crate) fn read_resource(&self, resource_path: &Path) -> Result<TabularData> {
        if !resource_path.is_file() {
            return Err(PipelineError::ResourceNotFound(resource_path.to_path_buf()));
        }

        let parse_error = |source: csv::Error| PipelineError::TabularParse {
            path: resource_path.to_path_buf(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_path(resource_path)
            .map_err(parse_error)?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(parse_error)?
            .iter()
            .map(ToOwned::to_owned)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(parse_error)?;
            rows.push(record.iter().map(ToOwned::to_owned).collect());
        }

        if columns.is_empty() || rows.is_empty() {
            return Err(PipelineError::EmptyResource(resource_path.to_path_buf()));
        }

        Ok(TabularData { columns, rows })
    }

    /// Replaces `table` with the contents of `resource_path`, returning the
    /// number of rows loaded. The database is untouched unless the resource
    /// parses and has at least one data row.
    pub(crate) fn import_table(
        &self,
        db_path: &Path,
        resource_path: &Path,
        table: &str,
    ) -> Result<usize> {
        if !self.identifier.is_match(table) {
            return Err(PipelineError::InvalidTableName(table.to_string()));
        }

        let data = self.read_resource(resource_path)?;
        debug!(
            table,
            columns = %data.columns.join(", "),
            rows = data.rows.len(),
            "parsed tabular resource"
        );

        let mut connection = open_database(db_path)?;
        let import_error = |source: rusqlite::Error| PipelineError::Import {
            table: table.to_string(),
            source,
        };

        let tx = connection.transaction().map_err(import_error)?;
        let column_types = data.column_types();
        {
            let quoted_table = quote_identifier(table);
            let column_defs = data
                .columns
                .iter()
                .zip(&column_types)
                .map(|(name, ty)| format!("{} {}", quote_identifier(name), ty.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");

            tx.execute_batch(&format!(
                "DROP TABLE IF EXISTS {quoted_table};
                 CREATE TABLE {quoted_table} ({column_defs});"
            ))
            .map_err(import_error)?;

            let placeholders = vec!["?"; data.columns.len()].join(", ");
            let mut statement = tx
                .prepare(&format!(
                    "INSERT INTO {quoted_table} VALUES ({placeholders})"
                ))
                .map_err(import_error)?;

            for row in &data.rows {
                let values = row
                    .iter()
                    .zip(&column_types)
                    .map(|(field, ty)| ty.to_value(field));
                statement
                    .execute(params_from_iter(values))
                    .map_err(import_error)?;
            }
        }
        tx.commit().map_err(import_error)?;

        info!(
            table,
            resource = %resource_path.display(),
            rows = data.rows.len(),
            "imported tabular resource"
        );
        Ok(data.rows.len())
    }
}

pub(crate) fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, quote_identifier};

    #[test]
    fn column_types_widen_from_integer_to_text() {
        assert_eq!(ColumnType::infer(["1", "2", ""]), ColumnType::Integer);
        assert_eq!(ColumnType::infer(["1", "2.5"]), ColumnType::Real);
        assert_eq!(ColumnType::infer(["1", "Song X"]), ColumnType::Text);
        assert_eq!(ColumnType::infer(["", ""]), ColumnType::Text);
    }

    #[test]
    fn quote_identifier_escapes_embedded_quotes() {
        assert_eq!(quote_identifier("release year"), "\"release year\"");
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
