use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use phptags::config::Config;
use phptags::index::NativeTags;
use phptags::lint::{LintSummary, Linter};

use super::{open_store, source_files, source_root};

pub fn lint_project(project: &Path, config: &Config, paths: Vec<PathBuf>, format: &str) -> Result<LintSummary> {
    let tag_config = config.tag_config();
    let native = Arc::new(NativeTags::load(&tag_config)?);
    let mut linter = Linter::new(tag_config, config.lint.clone(), native);
    if config.db_path(project).exists() {
        linter = linter.with_store(open_store(project, config)?);
    } else {
        info!("Project is not indexed; names resolve against each file and the native set only");
    }

    let paths = if paths.is_empty() {
        let mut all = Vec::new();
        for source in &config.project.sources {
            all.extend(source_files(&source_root(project, source), config, source, true)?);
        }
        all
    } else {
        paths
    };

    let summary = linter.lint_paths(&paths);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            for report in &summary.reports {
                for result in &report.results {
                    println!("{}:{}", report.path, result);
                }
            }
            println!(
                "\n{} with errors, {} without errors, {} skipped",
                summary.with_errors, summary.with_no_errors, summary.with_skip
            );
        }
    }
    Ok(summary)
}
