use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use phptags::config::Config;
use phptags::indexer::{TagExtractor, WalkOutcome, WalkStats};

use super::{open_store, source_files, source_root};

pub async fn index_project(project: &Path, config: &Config, rebuild: bool) -> Result<()> {
    let store = open_store(project, config)?;
    println!("phptags indexer v{}", env!("CARGO_PKG_VERSION"));
    println!("Database: {}", store.db_path().display());

    let started = Instant::now();
    let mut total = WalkStats::default();

    for source in &config.project.sources {
        let root = source_root(project, source);
        let root = root
            .canonicalize()
            .with_context(|| format!("Source root {} does not exist", root.display()))?;

        let mut extractor = TagExtractor::new(&store, config.source_tag_config(source))?;
        extractor.begin_search(&root)?;
        if rebuild {
            let removed = extractor.wipe()?;
            info!("Wiped {} tags of {}", removed, root.display());
        }

        // Ctrl-C stops the walk between files; finished files stay indexed
        let cancel = extractor.cancel_flag();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.store(true, Ordering::Relaxed);
            }
        });

        let files = source_files(&root, config, source, false)?;
        println!("\nScanning {} ({} files)", root.display(), files.len());

        let progress = ProgressBar::new(files.len() as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        for (n, path) in files.iter().enumerate() {
            match extractor.walk(path) {
                Ok(WalkOutcome::Cancelled) => {
                    progress.abandon_with_message("cancelled");
                    break;
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to index {}: {:#}", path.display(), e),
            }
            progress.inc(1);
            if n % config.indexing.batch_size == 0 {
                progress.set_message(path.display().to_string());
            }
        }
        progress.finish_and_clear();
        interrupt.abort();

        let stats = extractor.end_search();
        println!(
            "  {} parsed, {} recorded, {} unchanged, {} skipped, {} tags",
            stats.parsed, stats.recorded, stats.unchanged, stats.skipped, stats.tags
        );
        let cancelled = stats.cancelled;
        total.parsed += stats.parsed;
        total.recorded += stats.recorded;
        total.unchanged += stats.unchanged;
        total.skipped += stats.skipped;
        total.tags += stats.tags;
        if cancelled {
            total.cancelled = true;
            println!("Interrupted; run `phptags index` again to resume.");
            break;
        }
    }

    let stats = store.stats()?;
    println!(
        "\nIndexing {} in {:.1}s",
        if total.cancelled { "stopped" } else { "complete" },
        started.elapsed().as_secs_f64()
    );
    println!("Total files: {}", stats.files);
    println!("Total tags: {}", stats.tags);
    Ok(())
}
