use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use rusqlite::fallible_iterator::FallibleIterator;
use rusqlite::{Batch, Connection};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::model::{OperationResult, ResultRow, SqlValue};

use super::schema::open_database;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum ScriptClass {
    Mutation,
    Query,
}

/// Loads `script_path` and runs it against the database at `db_path`.
///
/// Mutations run as one batch and yield [`OperationResult::Empty`]. Queries
/// must hold exactly one statement and yield every row in engine order.
pub(crate) fn run_script(
    db_path: &Path,
    script_path: &Path,
    class: ScriptClass,
) -> Result<OperationResult> {
    let sql = read_script(script_path)?;
    let mut connection = open_database(db_path)?;

    match class {
        ScriptClass::Mutation => {
            debug!(script = %script_path.display(), sql = %sql, "executing mutation script");
            execute_script(&mut connection, &sql)
                .map_err(|source| PipelineError::script(script_path, source))?;
            info!(script = %script_path.display(), "executed mutation script");
            Ok(OperationResult::Empty)
        }
        ScriptClass::Query => {
            let statement = single_statement(&sql);
            let statement_count = count_statements(&connection, statement)
                .map_err(|source| PipelineError::script(script_path, source))?;
            if statement_count != 1 {
                let reason = if statement_count == 0 {
                    "query script is empty".to_string()
                } else {
                    format!("query script must hold one statement, found {statement_count}")
                };
                return Err(PipelineError::ScriptExecution {
                    path: script_path.to_path_buf(),
                    reason,
                });
            }

            let rows = fetch_all(&connection, statement)
                .map_err(|source| PipelineError::script(script_path, source))?;
            info!(script = %script_path.display(), rows = rows.len(), "executed query script");
            Ok(OperationResult::RowSet(rows))
        }
    }
}

pub(crate) fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => PipelineError::ResourceNotFound(path.to_path_buf()),
        _ => PipelineError::ResourceRead {
            path: path.to_path_buf(),
            source,
        },
    })
}

const TRANSACTION_KEYWORDS: [&str; 6] = [
    "BEGIN",
    "COMMIT",
    "END",
    "ROLLBACK",
    "SAVEPOINT",
    "RELEASE",
];

/// Runs a multi-statement script.
///
/// A script without transaction control of its own is wrapped in one
/// transaction, so a failing statement rolls back every statement before it.
/// A script that opens its own transaction runs as written; if it fails while
/// that transaction is still open, the transaction is rolled back.
pub(crate) fn execute_script(connection: &mut Connection, sql: &str) -> rusqlite::Result<()> {
    if !controls_transactions(sql) {
        let tx = connection.transaction()?;
        tx.execute_batch(sql)?;
        return tx.commit();
    }

    let result = connection.execute_batch(sql);
    if result.is_err() && !connection.is_autocommit() {
        if let Err(err) = connection.execute_batch("ROLLBACK") {
            warn!(error = %err, "failed to roll back script transaction");
        }
    }
    result
}

/// True when any statement of `sql` starts with a transaction keyword.
/// The `END` closing a trigger body also matches; such scripts run unwrapped.
fn controls_transactions(sql: &str) -> bool {
    sql.split(';').any(|segment| {
        let keyword = leading_keyword(segment);
        TRANSACTION_KEYWORDS
            .iter()
            .any(|candidate| keyword.eq_ignore_ascii_case(candidate))
    })
}

fn leading_keyword(segment: &str) -> &str {
    let mut rest = segment.trim_start();
    while let Some(comment) = rest.strip_prefix("--") {
        rest = comment
            .split_once('\n')
            .map_or("", |(_, tail)| tail)
            .trim_start();
    }
    let end = rest
        .find(|ch: char| !ch.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}

fn count_statements(connection: &Connection, sql: &str) -> rusqlite::Result<usize> {
    let mut batch = Batch::new(connection, sql);
    let mut count = 0;
    while batch.next()?.is_some() {
        count += 1;
    }
    Ok(count)
}

pub(crate) fn fetch_all(connection: &Connection, sql: &str) -> rusqlite::Result<Vec<ResultRow>> {
    let mut statement = connection.prepare(sql)?;
    let column_count = statement.column_count();

    let rows = statement.query_map([], |row| {
        (0..column_count)
            .map(|idx| row.get_ref(idx).map(SqlValue::from))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map(ResultRow)
    })?;

    rows.collect()
}

fn single_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}
