use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use phptags::config::{Config, LoggingConfig};

mod cli;

#[derive(Parser)]
#[command(name = "phptags")]
#[command(version)]
#[command(about = "PHP tag index for completion, jump to definition and lint", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory; `.phptags.toml` is read from here
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every source root of the project
    Index {
        /// Clear each source before walking it
        #[arg(short, long)]
        rebuild: bool,

        /// Keep watching the first source root afterwards
        #[arg(short, long)]
        watch: bool,
    },

    /// Re-index files of a source root as they change
    Watch {
        /// Root to watch (defaults to the first configured source)
        root: Option<PathBuf>,
    },

    /// Check files for syntax errors, unknown identifiers and more
    Lint {
        /// Files to check (defaults to every PHP file of the project)
        paths: Vec<PathBuf>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Look up tags by name
    Find {
        /// Name or prefix, e.g. `MyClass`, `MyClass::work`
        name: String,

        /// Only tags whose key equals the name
        #[arg(short, long)]
        exact: bool,

        /// Match file names instead of tags
        #[arg(long)]
        files: bool,

        /// Restrict results to these directories
        #[arg(long = "dir")]
        dirs: Vec<String>,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Complete or resolve the expression at a position of a file
    Complete {
        file: PathBuf,

        /// Character offset of the cursor
        offset: usize,

        /// Resolve the declaration under the cursor instead of completing
        #[arg(long)]
        definition: bool,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show index statistics
    Stats {
        /// Break tags down by type
        #[arg(long)]
        detailed: bool,
    },

    /// Move the tags of a renamed file or directory
    Rename { from: PathBuf, to: PathBuf },
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = if debug {
                Level::DEBUG.to_string()
            } else if verbose {
                Level::INFO.to_string()
            } else {
                logging.level.clone()
            };
            EnvFilter::new(level)
        }
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match logging.format.as_str() {
        "compact" => builder.compact().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_project_dir(&cli.project);
    init_logging(cli.debug, cli.verbose, &config.logging);
    config.validate()?;
    debug!("phptags {} in {}", env!("CARGO_PKG_VERSION"), cli.project.display());

    match cli.command {
        Commands::Index { rebuild, watch } => {
            cli::index::index_project(&cli.project, &config, rebuild).await?;
            if watch || config.indexing.watch {
                cli::watch::watch_project(&cli.project, &config, None).await?;
            }
        }

        Commands::Watch { root } => {
            cli::watch::watch_project(&cli.project, &config, root).await?;
        }

        Commands::Lint { paths, format } => {
            let summary = cli::lint::lint_project(&cli.project, &config, paths, &format)?;
            if summary.with_errors > 0 {
                std::process::exit(1);
            }
        }

        Commands::Find {
            name,
            exact,
            files,
            dirs,
            format,
        } => {
            cli::find::find_tags(&cli.project, &config, &name, exact, files, &dirs, &format)?;
        }

        Commands::Complete {
            file,
            offset,
            definition,
            format,
        } => {
            cli::complete::complete_at(&cli.project, &config, &file, offset, definition, &format)?;
        }

        Commands::Stats { detailed } => {
            cli::stats::show_stats(&cli.project, &config, detailed)?;
        }

        Commands::Rename { from, to } => {
            cli::rename::rename_path(&cli.project, &config, &from, &to)?;
        }
    }

    Ok(())
}
