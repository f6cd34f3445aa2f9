use std::path::Path;

use anyhow::Result as AnyResult;
use tracing::{debug, error, info, warn};

use crate::cli::{FailurePolicy, RunMode};
use crate::config::{PipelineConfig, TableSource};
use crate::error::{PipelineError, Result};
use crate::model::{OperationResult, StepRecord, StepStatus, TableCount};

use super::catalog::{Operation, OperationAction, OperationCatalog};
use super::import::{TabularImporter, quote_identifier};
use super::provision::provision_paths;
use super::report::{discard_stale_report, write_report};
use super::schema::{apply_schema, ensure_database, open_database};
use super::script::{fetch_all, run_script};

#[derive(Debug, Clone, Copy)]
pub(crate) enum Step<'a> {
    ProvisionPaths,
    EnsureDatabase,
    ApplySchema,
    ImportTable(&'a TableSource),
    Operation(&'a Operation),
}

impl Step<'_> {
    pub(crate) fn name(&self) -> String {
        match self {
            Self::ProvisionPaths => "provision_paths".to_string(),
            Self::EnsureDatabase => "ensure_database".to_string(),
            Self::ApplySchema => "apply_schema".to_string(),
            Self::ImportTable(source) => format!("import_table:{}", source.table),
            Self::Operation(operation) => operation.id.name().to_string(),
        }
    }

    fn is_setup(&self) -> bool {
        !matches!(self, Self::Operation(_))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RunSummary {
    pub steps: Vec<StepRecord>,
    pub halted: bool,
}

impl RunSummary {
    pub(crate) fn failed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|record| record.status == StepStatus::Failed)
            .count()
    }

    pub(crate) fn status(&self) -> &'static str {
        if self.halted {
            "halted"
        } else if self.failed_count() > 0 {
            "completed_with_failures"
        } else {
            "completed"
        }
    }

    #[cfg(test)]
    pub(crate) fn record(&self, step: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.step == step)
    }
}

/// Runs setup and the operation catalog strictly in order. Each step opens
/// its own connection; the failure policy decides whether a failed step
/// stops the remaining ones.
pub(crate) struct Pipeline {
    config: PipelineConfig,
    catalog: OperationCatalog,
    importer: TabularImporter,
    mode: RunMode,
    policy: FailurePolicy,
}

impl Pipeline {
    pub(crate) fn new(config: PipelineConfig, mode: RunMode, policy: FailurePolicy) -> AnyResult<Self> {
        let catalog = OperationCatalog::from_config(&config);
        let importer = TabularImporter::new()?;
        Ok(Self {
            config,
            catalog,
            importer,
            mode,
            policy,
        })
    }

    pub(crate) fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn plan(&self) -> Vec<Step<'_>> {
        let mut steps = Vec::with_capacity(3 + self.config.tables.len() + self.catalog.len());
        steps.extend([Step::ProvisionPaths, Step::EnsureDatabase, Step::ApplySchema]);
        steps.extend(self.config.tables.iter().map(Step::ImportTable));
        if self.mode == RunMode::Full {
            steps.extend(self.catalog.iter().map(Step::Operation));
        }
        steps
    }

    pub(crate) fn execute(&self) -> RunSummary {
        info!(
            mode = self.mode.as_str(),
            on_failure = self.policy.as_str(),
            database = %self.config.database_path.display(),
            "pipeline started"
        );

        let mut summary = RunSummary::default();
        for step in self.plan() {
            let name = step.name();

            if summary.halted {
                debug!(step = %name, "skipping step after halt");
                summary.steps.push(StepRecord {
                    step: name,
                    status: StepStatus::Skipped,
                    rows: None,
                    error_kind: None,
                    error: None,
                });
                continue;
            }

            match self.run_step(step) {
                Ok(rows) => {
                    debug!(step = %name, rows = ?rows, "step completed");
                    summary.steps.push(StepRecord {
                        step: name,
                        status: StepStatus::Completed,
                        rows,
                        error_kind: None,
                        error: None,
                    });
                }
                Err(err) => {
                    error!(step = %name, kind = err.kind(), error = %err, "step failed");
                    if let Step::Operation(Operation {
                        action: OperationAction::Script { report: Some(report), .. },
                        ..
                    }) = step
                    {
                        discard_stale_report(&report.path);
                    }

                    summary.steps.push(StepRecord {
                        step: name,
                        status: StepStatus::Failed,
                        rows: None,
                        error_kind: Some(err.kind().to_string()),
                        error: Some(err.to_string()),
                    });

                    if self.policy.halts_after(step.is_setup()) {
                        warn!(on_failure = self.policy.as_str(), "halting pipeline");
                        summary.halted = true;
                    }
                }
            }
        }

        info!(
            status = summary.status(),
            failed_steps = summary.failed_count(),
            "pipeline finished"
        );
        summary
    }

    fn run_step(&self, step: Step<'_>) -> Result<Option<usize>> {
        let db_path = self.config.database_path.as_path();

        match step {
            Step::ProvisionPaths => {
                provision_paths(&self.config.all_paths()).map(|created| Some(created.len()))
            }
            Step::EnsureDatabase => ensure_database(db_path).map(|_| None),
            Step::ApplySchema => apply_schema(db_path, &self.config.schema_script).map(|()| None),
            Step::ImportTable(source) => self
                .importer
                .import_table(db_path, &source.resource, &source.table)
                .map(Some),
            Step::Operation(operation) => self.run_operation(operation),
        }
    }

    fn run_operation(&self, operation: &Operation) -> Result<Option<usize>> {
        let db_path = self.config.database_path.as_path();

        match &operation.action {
            OperationAction::Verify => verify_tables(db_path, &self.config.tables).map(Some),
            OperationAction::Script {
                path,
                class,
                report,
            } => {
                let result = run_script(db_path, path, *class)?;
                if let (Some(report), OperationResult::RowSet(rows)) = (report, &result) {
                    write_report(rows, &report.path, report.title)?;
                }
                Ok(result.row_count())
            }
        }
    }
}

/// Logs every record of each table; returns the total number of rows seen.
pub(crate) fn verify_tables(db_path: &Path, tables: &[TableSource]) -> Result<usize> {
    let connection = open_database(db_path)?;
    let mut total = 0;

    for source in tables {
        let sql = format!("SELECT * FROM {}", quote_identifier(&source.table));
        let rows = fetch_all(&connection, &sql).map_err(|source_err| PipelineError::TableQuery {
            table: source.table.clone(),
            source: source_err,
        })?;

        info!(table = %source.table, rows = rows.len(), "verifying table contents");
        for row in &rows {
            info!(table = %source.table, record = %row, "table record");
        }
        total += rows.len();
    }

    Ok(total)
}

/// Row count per table, `None` where the table cannot be read.
pub(crate) fn table_counts(db_path: &Path, tables: &[TableSource]) -> Vec<TableCount> {
    let connection = open_database(db_path).ok();

    tables
        .iter()
        .map(|source| {
            let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(&source.table));
            let rows = connection
                .as_ref()
                .and_then(|conn| conn.query_row(&sql, [], |row| row.get(0)).ok());
            TableCount {
                table: source.table.clone(),
                rows,
            }
        })
        .collect()
}
