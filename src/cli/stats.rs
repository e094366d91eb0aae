use std::path::Path;

use anyhow::Result;

use phptags::config::Config;

use super::open_cache;

pub fn show_stats(project: &Path, config: &Config, detailed: bool) -> Result<()> {
    let cache = open_cache(project, config)?;
    let stats = cache.stats()?;

    println!("phptags statistics v{}", env!("CARGO_PKG_VERSION"));
    println!("Project: {}", project.display());
    println!("Config: {}", if config.project.name != "unnamed-project" { "loaded" } else { "default" });
    println!("Native tags: {}", stats.native_tags);

    let Some(store) = stats.store else {
        println!("\nNot indexed yet. Run `phptags index` first.");
        return Ok(());
    };

    println!("\nIndex Statistics:");
    println!("  Sources: {}", store.sources);
    println!("  Files: {} ({} parsed)", store.files, store.parsed_files);
    println!("  Tags: {}", store.tags);
    println!("  Index size: {:.2} MB", db_size(&config.db_path(project)));

    if let (true, Some(global)) = (detailed, cache.global()) {
        println!("\nSource roots:");
        for source in global.sources()? {
            println!("  {} ({})", source.directory, source.php_extensions.join(", "));
        }
    }

    if detailed && !store.tags_by_type.is_empty() {
        println!("\nTags by type:");
        let mut by_type: Vec<_> = store.tags_by_type.iter().collect();
        by_type.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));
        for (tag_type, count) in by_type {
            println!("  {}: {}", tag_type, count);
        }
    }
    Ok(())
}

fn db_size(db_path: &Path) -> f64 {
    std::fs::metadata(db_path).map(|m| m.len() as f64).unwrap_or(0.0) / (1024.0 * 1024.0)
}
