use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::run::table_counts;
use crate::config::PipelineConfig;

#[derive(Debug, Deserialize)]
struct ManifestSnapshot {
    run_id: Option<String>,
    status: Option<String>,
    updated_at: Option<String>,
}

pub fn run(args: StatusArgs, config: PipelineConfig) -> Result<()> {
    info!(project_root = %args.config.project_root.display(), "status requested");

    let db_path = &config.database_path;
    if db_path.exists() {
        for count in table_counts(db_path, &config.tables) {
            match count.rows {
                Some(rows) => info!(table = %count.table, rows, "table status"),
                None => warn!(table = %count.table, "table missing or unreadable"),
            }
        }
    } else {
        warn!(path = %db_path.display(), "database file missing");
    }

    let reports = &config.reports;
    for path in [
        &reports.aggregation,
        &reports.filter,
        &reports.group_by,
        &reports.join,
        &reports.sorting,
    ] {
        report_status(path)?;
    }

    match config.run_manifest_path.as_deref() {
        Some(path) if path.exists() => {
            let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
            let snapshot: ManifestSnapshot = serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            info!(
                run_id = %snapshot.run_id.unwrap_or_default(),
                status = %snapshot.status.unwrap_or_default(),
                updated_at = %snapshot.updated_at.unwrap_or_default(),
                "loaded last run manifest"
            );
        }
        Some(path) => warn!(path = %path.display(), "run manifest missing"),
        None => {}
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct ReportSummary {
    title: String,
    rows: usize,
}

fn report_status(path: &Path) -> Result<()> {
    match read_report_summary(path)? {
        Some(summary) => info!(
            path = %path.display(),
            title = %summary.title,
            rows = summary.rows,
            "report status"
        ),
        None => warn!(path = %path.display(), "report missing"),
    }
    Ok(())
}

/// Title line and row count of a written report, or `None` when it is absent.
fn read_report_summary(path: &Path) -> Result<Option<ReportSummary>> {
    if !path.exists() {
        return Ok(None);
    }

    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut lines = text.lines();
    let title = lines.next().unwrap_or_default().to_string();
    Ok(Some(ReportSummary {
        title,
        rows: lines.count(),
    }))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::{ReportSummary, read_report_summary, run};
    use crate::cli::{ConfigArgs, StatusArgs};
    use crate::config::PipelineConfig;

    fn status_args(root: &std::path::Path) -> StatusArgs {
        StatusArgs {
            config: ConfigArgs {
                project_root: root.to_path_buf(),
                config_path: None,
            },
        }
    }

    #[test]
    fn report_summary_reads_title_and_counts_rows() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("join_results.txt");
        fs::write(
            &path,
            "JOIN Query Results\n('Song X', 'Artist A')\n('Song Y', 'Artist A')\n",
        )
        .expect("write report");

        let summary = read_report_summary(&path).expect("read report");
        assert_eq!(
            summary,
            Some(ReportSummary {
                title: "JOIN Query Results".to_string(),
                rows: 2,
            })
        );
    }

    #[test]
    fn header_only_report_has_no_rows() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("filter_results.txt");
        fs::write(&path, "FILTER Query Results\n").expect("write report");

        let summary = read_report_summary(&path)
            .expect("read report")
            .expect("report present");
        assert_eq!(summary.rows, 0);
    }

    #[test]
    fn missing_report_is_not_an_error() {
        let temp = TempDir::new().expect("tempdir");
        let summary = read_report_summary(&temp.path().join("absent.txt")).expect("read report");
        assert_eq!(summary, None);
    }

    #[test]
    fn status_of_an_empty_project_succeeds() {
        let temp = TempDir::new().expect("tempdir");
        let config = PipelineConfig::for_root(temp.path());

        run(status_args(temp.path()), config).expect("status on empty project");
    }

    #[test]
    fn unreadable_manifest_is_reported() {
        let temp = TempDir::new().expect("tempdir");
        let config = PipelineConfig::for_root(temp.path());
        let manifest_path = config.run_manifest_path.clone().expect("manifest path");
        fs::create_dir_all(manifest_path.parent().expect("manifest parent")).expect("output dir");
        fs::write(&manifest_path, "not json").expect("write manifest");

        let err = run(status_args(temp.path()), config).expect_err("bad manifest");
        assert!(err.to_string().contains("failed to parse"), "{err}");
    }
}
