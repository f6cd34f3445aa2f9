use std::path::PathBuf;

use crate::config::PipelineConfig;

use super::script::ScriptClass;

/// Named operations run after setup, in execution order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OperationId {
    InsertNewRecords,
    VerifyRecords,
    DeleteRecords,
    UpdateRecords,
    Aggregation,
    Filter,
    GroupBy,
    Join,
    Sorting,
}

impl OperationId {
    pub(crate) const ALL: [Self; 9] = [
        Self::InsertNewRecords,
        Self::VerifyRecords,
        Self::DeleteRecords,
        Self::UpdateRecords,
        Self::Aggregation,
        Self::Filter,
        Self::GroupBy,
        Self::Join,
        Self::Sorting,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::InsertNewRecords => "insert_new_records",
            Self::VerifyRecords => "verify_records",
            Self::DeleteRecords => "delete_records",
            Self::UpdateRecords => "update_records",
            Self::Aggregation => "query_aggregation",
            Self::Filter => "query_filter",
            Self::GroupBy => "query_group_by",
            Self::Join => "query_join",
            Self::Sorting => "query_sorting",
        }
    }

    pub(crate) fn report_title(self) -> Option<&'static str> {
        match self {
            Self::Aggregation => Some("Aggregation Query Results"),
            Self::Filter => Some("Filtered Query Results"),
            Self::GroupBy => Some("GROUP BY Query Results"),
            Self::Join => Some("JOIN Query Results"),
            Self::Sorting => Some("Sorting Query Results"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReportTarget {
    pub path: PathBuf,
    pub title: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OperationAction {
    /// Logs every row of the imported tables.
    Verify,
    Script {
        path: PathBuf,
        class: ScriptClass,
        report: Option<ReportTarget>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Operation {
    pub id: OperationId,
    pub action: OperationAction,
}

#[derive(Debug, Clone)]
pub(crate) struct OperationCatalog {
    operations: Vec<Operation>,
}

impl OperationCatalog {
    pub(crate) fn from_config(config: &PipelineConfig) -> Self {
        let operations = OperationId::ALL
            .into_iter()
            .map(|id| Operation {
                id,
                action: action_for(id, config),
            })
            .collect();

        Self { operations }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.operations.len()
    }
}

fn action_for(id: OperationId, config: &PipelineConfig) -> OperationAction {
    let scripts = &config.scripts;
    let reports = &config.reports;

    let (path, report_path) = match id {
        OperationId::VerifyRecords => return OperationAction::Verify,
        OperationId::InsertNewRecords => (&scripts.insert_new_records, None),
        OperationId::DeleteRecords => (&scripts.delete_records, None),
        OperationId::UpdateRecords => (&scripts.update_records, None),
        OperationId::Aggregation => (&scripts.query_aggregation, Some(&reports.aggregation)),
        OperationId::Filter => (&scripts.query_filter, Some(&reports.filter)),
        OperationId::GroupBy => (&scripts.query_group_by, Some(&reports.group_by)),
        OperationId::Join => (&scripts.query_join, Some(&reports.join)),
        OperationId::Sorting => (&scripts.query_sorting, Some(&reports.sorting)),
    };

    let report = report_path.zip(id.report_title()).map(|(path, title)| ReportTarget {
        path: path.clone(),
        title,
    });
    let class = if report.is_some() {
        ScriptClass::Query
    } else {
        ScriptClass::Mutation
    };

    OperationAction::Script {
        path: path.clone(),
        class,
        report,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{OperationAction, OperationCatalog, OperationId};
    use crate::commands::run::script::ScriptClass;
    use crate::config::PipelineConfig;

    #[test]
    fn catalog_runs_mutations_before_reports() {
        let catalog = OperationCatalog::from_config(&PipelineConfig::default());
        let names: Vec<&str> = catalog.iter().map(|op| op.id.name()).collect();
        assert_eq!(
            names,
            vec![
                "insert_new_records",
                "verify_records",
                "delete_records",
                "update_records",
                "query_aggregation",
                "query_filter",
                "query_group_by",
                "query_join",
                "query_sorting",
            ]
        );
    }

    #[test]
    fn query_operations_are_bound_to_their_report() {
        let catalog = OperationCatalog::from_config(&PipelineConfig::default());
        let group_by = catalog
            .iter()
            .find(|op| op.id == OperationId::GroupBy)
            .expect("group by operation");

        let OperationAction::Script {
            path,
            class,
            report,
        } = &group_by.action
        else {
            panic!("group by should run a script");
        };
        assert_eq!(path, Path::new("sql/query_group_by.sql"));
        assert_eq!(*class, ScriptClass::Query);
        let report = report.as_ref().expect("group by writes a report");
        assert_eq!(report.path, Path::new("output/group_by_results.txt"));
        assert_eq!(report.title, "GROUP BY Query Results");
    }

    #[test]
    fn mutations_have_no_report() {
        let catalog = OperationCatalog::from_config(&PipelineConfig::default());
        let mutations = catalog
            .iter()
            .filter(|op| {
                matches!(
                    op.action,
                    OperationAction::Script {
                        class: ScriptClass::Mutation,
                        report: None,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(mutations, 3);
    }
}
