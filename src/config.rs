//! Resource layout for one pipeline run.
//!
//! Every path the pipeline reads or writes is carried by [`PipelineConfig`],
//! so several pipelines with different layouts can coexist in one process.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::ConfigArgs;
use crate::util::resolve_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSource {
    pub table: String,
    pub resource: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationScripts {
    pub insert_new_records: PathBuf,
    pub delete_records: PathBuf,
    pub update_records: PathBuf,
    pub query_aggregation: PathBuf,
    pub query_filter: PathBuf,
    pub query_group_by: PathBuf,
    pub query_join: PathBuf,
    pub query_sorting: PathBuf,
}

impl Default for OperationScripts {
    fn default() -> Self {
        let sql = Path::new("sql");
        Self {
            insert_new_records: sql.join("insert_new_records.sql"),
            delete_records: sql.join("delete_records.sql"),
            update_records: sql.join("update_records.sql"),
            query_aggregation: sql.join("query_aggregation.sql"),
            query_filter: sql.join("query_filter.sql"),
            query_group_by: sql.join("query_group_by.sql"),
            query_join: sql.join("query_join.sql"),
            query_sorting: sql.join("query_sorting.sql"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOutputs {
    pub aggregation: PathBuf,
    pub filter: PathBuf,
    pub group_by: PathBuf,
    pub join: PathBuf,
    pub sorting: PathBuf,
}

impl Default for ReportOutputs {
    fn default() -> Self {
        let output = Path::new("output");
        Self {
            aggregation: output.join("aggregation_results.txt"),
            filter: output.join("filtered_results.txt"),
            group_by: output.join("group_by_results.txt"),
            join: output.join("join_results.txt"),
            sorting: output.join("sorting_results.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    pub schema_script: PathBuf,
    pub log_path: PathBuf,
    pub run_manifest_path: Option<PathBuf>,
    pub tables: Vec<TableSource>,
    pub scripts: OperationScripts,
    pub reports: ReportOutputs,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let data = Path::new("data");
        Self {
            database_path: PathBuf::from("music_database.db"),
            schema_script: Path::new("sql").join("create_tables.sql"),
            log_path: PathBuf::from("log.txt"),
            run_manifest_path: Some(Path::new("output").join("run_manifest.json")),
            tables: vec![
                TableSource {
                    table: "artists".to_string(),
                    resource: data.join("artists.csv"),
                },
                TableSource {
                    table: "songs".to_string(),
                    resource: data.join("songs.csv"),
                },
            ],
            scripts: OperationScripts::default(),
            reports: ReportOutputs::default(),
        }
    }
}

impl PipelineConfig {
    /// Default layout rooted at `root`.
    pub fn for_root(root: &Path) -> Self {
        Self::default().resolve_against(root)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_slice(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Joins every relative path onto `root`; absolute paths are kept.
    pub fn resolve_against(mut self, root: &Path) -> Self {
        let resolve = |path: &mut PathBuf| *path = resolve_path(root, path.as_path());

        resolve(&mut self.database_path);
        resolve(&mut self.schema_script);
        resolve(&mut self.log_path);
        if let Some(path) = self.run_manifest_path.as_mut() {
            resolve(path);
        }
        for source in &mut self.tables {
            resolve(&mut source.resource);
        }

        let scripts = &mut self.scripts;
        for path in [
            &mut scripts.insert_new_records,
            &mut scripts.delete_records,
            &mut scripts.update_records,
            &mut scripts.query_aggregation,
            &mut scripts.query_filter,
            &mut scripts.query_group_by,
            &mut scripts.query_join,
            &mut scripts.query_sorting,
        ] {
            resolve(path);
        }

        let reports = &mut self.reports;
        for path in [
            &mut reports.aggregation,
            &mut reports.filter,
            &mut reports.group_by,
            &mut reports.join,
            &mut reports.sorting,
        ] {
            resolve(path);
        }

        self
    }

    /// Every file the run reads or writes, in pipeline order.
    pub fn all_paths(&self) -> Vec<&Path> {
        let mut paths = vec![self.schema_script.as_path()];
        paths.extend(self.input_scripts());
        paths.extend(self.tables.iter().map(|source| source.resource.as_path()));
        paths.push(self.database_path.as_path());
        paths.extend([
            self.reports.aggregation.as_path(),
            self.reports.filter.as_path(),
            self.reports.group_by.as_path(),
            self.reports.join.as_path(),
            self.reports.sorting.as_path(),
        ]);
        if let Some(path) = self.run_manifest_path.as_deref() {
            paths.push(path);
        }
        paths
    }

    fn input_scripts(&self) -> [&Path; 8] {
        let scripts = &self.scripts;
        [
            scripts.insert_new_records.as_path(),
            scripts.delete_records.as_path(),
            scripts.update_records.as_path(),
            scripts.query_aggregation.as_path(),
            scripts.query_filter.as_path(),
            scripts.query_group_by.as_path(),
            scripts.query_join.as_path(),
            scripts.query_sorting.as_path(),
        ]
    }

    /// Read-only inputs: the schema, all operation scripts and table resources.
    pub fn input_resources(&self) -> Vec<&Path> {
        let mut paths = vec![self.schema_script.as_path()];
        paths.extend(self.input_scripts());
        paths.extend(self.tables.iter().map(|source| source.resource.as_path()));
        paths
    }
}

pub fn load(args: &ConfigArgs) -> Result<PipelineConfig> {
    let Some(config_path) = args.config_path.as_deref() else {
        return Ok(PipelineConfig::for_root(&args.project_root));
    };

    Ok(PipelineConfig::from_file(config_path)?.resolve_against(&args.project_root))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;

    use super::{PipelineConfig, load};
    use crate::cli::ConfigArgs;

    #[test]
    fn default_layout_matches_project_conventions() {
        let config = PipelineConfig::for_root(Path::new("/srv/music"));
        assert_eq!(
            config.database_path,
            PathBuf::from("/srv/music/music_database.db")
        );
        assert_eq!(
            config.schema_script,
            PathBuf::from("/srv/music/sql/create_tables.sql")
        );
        assert_eq!(
            config.reports.group_by,
            PathBuf::from("/srv/music/output/group_by_results.txt")
        );
        let tables: Vec<&str> = config.tables.iter().map(|t| t.table.as_str()).collect();
        assert_eq!(tables, vec!["artists", "songs"]);
    }

    #[test]
    fn partial_config_file_falls_back_to_defaults() {
        let temp = TempDir::new().expect("tempdir");
        let config_path = temp.path().join("pipeline.json");
        fs::write(
            &config_path,
            r#"{
              "database_path": "db/test.sqlite",
              "run_manifest_path": null,
              "reports": { "join": "/var/reports/join.txt" }
            }"#,
        )
        .expect("write config");

        let args = ConfigArgs {
            project_root: temp.path().to_path_buf(),
            config_path: Some(config_path),
        };
        let config = load(&args).expect("partial config should load");

        assert_eq!(config.database_path, temp.path().join("db/test.sqlite"));
        assert!(config.run_manifest_path.is_none());
        assert_eq!(config.reports.join, PathBuf::from("/var/reports/join.txt"));
        assert_eq!(
            config.reports.sorting,
            temp.path().join("output/sorting_results.txt")
        );
        assert_eq!(
            config.scripts.query_filter,
            temp.path().join("sql/query_filter.sql")
        );
    }

    #[test]
    fn all_paths_lists_inputs_before_outputs() {
        let config = PipelineConfig::default();
        let paths = config.all_paths();
        assert_eq!(paths.first(), Some(&Path::new("sql/create_tables.sql")));
        assert_eq!(paths.last(), Some(&Path::new("output/run_manifest.json")));
        assert_eq!(paths.len(), 1 + 8 + 2 + 1 + 5 + 1);
        assert_eq!(config.input_resources().len(), 11);
    }
}
