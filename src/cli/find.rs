use std::path::Path;

use anyhow::Result;

use phptags::config::Config;

use super::{open_cache, print_tag};

pub fn find_tags(
    project: &Path,
    config: &Config,
    name: &str,
    exact: bool,
    files: bool,
    dirs: &[String],
    format: &str,
) -> Result<()> {
    let cache = open_cache(project, config)?;

    let tags = if files {
        cache.near_match_files(name, dirs)?
    } else if exact {
        cache.exact_tags(name, dirs)
    } else {
        cache.near_match_tags(name, dirs)
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&tags)?),
        _ if tags.is_empty() => println!("No tags match '{}'", name),
        _ => tags.iter().for_each(print_tag),
    }
    Ok(())
}
