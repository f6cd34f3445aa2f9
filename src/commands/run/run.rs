use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::config::PipelineConfig;
use crate::model::{ResourceHash, RunManifest};
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

use super::pipeline::{Pipeline, RunSummary, table_counts};

pub fn run(args: RunArgs, config: PipelineConfig) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    info!(run_id = %run_id, "program started");

    let pipeline = Pipeline::new(config, args.mode, args.on_failure)?;
    let summary = pipeline.execute();

    let manifest = build_manifest(&pipeline, &summary, &args, run_id, started_at);
    if let Some(manifest_path) = pipeline.config().run_manifest_path.as_deref() {
        match write_json_pretty(manifest_path, &manifest) {
            Ok(()) => info!(path = %manifest_path.display(), "wrote run manifest"),
            Err(err) => warn!(path = %manifest_path.display(), error = %err, "failed to write run manifest"),
        }
    }

    info!(status = %manifest.status, "program ended");

    let failed = summary.failed_count();
    if failed > 0 {
        bail!("{failed} of {} pipeline steps failed", summary.steps.len());
    }
    Ok(())
}

pub(super) fn build_manifest(
    pipeline: &Pipeline,
    summary: &RunSummary,
    args: &RunArgs,
    run_id: String,
    started_at: String,
) -> RunManifest {
    let config = pipeline.config();

    RunManifest {
        manifest_version: 1,
        run_id,
        mode: args.mode.as_str().to_string(),
        failure_policy: args.on_failure.as_str().to_string(),
        status: summary.status().to_string(),
        started_at,
        updated_at: now_utc_string(),
        database_path: config.database_path.display().to_string(),
        steps: summary.steps.clone(),
        table_counts: table_counts(&config.database_path, &config.tables),
        source_hashes: hash_resources(&config.input_resources()),
    }
}

fn hash_resources(paths: &[&Path]) -> Vec<ResourceHash> {
    paths
        .iter()
        .filter(|path| path.is_file())
        .filter_map(|path| match sha256_file(path) {
            Ok(sha256) => Some(ResourceHash {
                path: path.display().to_string(),
                sha256,
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to hash resource");
                None
            }
        })
        .collect()
}
