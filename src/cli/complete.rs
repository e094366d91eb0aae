use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use phptags::config::Config;

use super::{open_cache, print_tag};

/// Completes, or with `definition` resolves, the expression at `offset`
/// of `file` as an editor would for an open buffer
pub fn complete_at(
    project: &Path,
    config: &Config,
    file: &Path,
    offset: usize,
    definition: bool,
    format: &str,
) -> Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let full_path = file.canonicalize().unwrap_or_else(|_| file.to_path_buf());
    let file_id = full_path.to_string_lossy().into_owned();

    let cache = open_cache(project, config)?;
    cache.register_working(&file_id, Some(&full_path), false);
    cache.update_working(&file_id, &text);

    let (variables, tags, duck_typed, error) = if definition {
        let found = cache.get_tags_at_position(&file_id, &text, offset, &[]);
        (Vec::new(), found.tags, found.duck_typed, found.error)
    } else {
        let found = cache.completion_at_position(&file_id, &text, offset, &[]);
        (found.variables, found.tags, found.duck_typed, found.error)
    };

    if format == "json" {
        let output = json!({
            "variables": variables,
            "tags": tags,
            "duck_typed": duck_typed,
            "error": error.as_ref().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(error) = error {
        println!("No matches: {}", error);
        return Ok(());
    }
    for variable in &variables {
        println!("{}", variable);
    }
    if duck_typed {
        println!("(matched by member name across all classes)");
    }
    tags.iter().for_each(print_tag);
    Ok(())
}
