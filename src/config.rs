// Configuration management for phptags

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the per-project configuration file
pub const CONFIG_FILE_NAME: &str = ".phptags.toml";

/// Default database file, relative to the project root
pub const DEFAULT_DB_FILE: &str = ".phptags.db";

/// PHP language level; gates version-dependent keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum PhpVersion {
    #[serde(rename = "5.3")]
    Php53,
    #[serde(rename = "5.4")]
    Php54,
    #[serde(rename = "7.0")]
    Php70,
    #[serde(rename = "7.4")]
    Php74,
    #[serde(rename = "8.0")]
    Php80,
    #[default]
    #[serde(rename = "8.1")]
    Php81,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub php: PhpConfig,
    pub indexing: IndexingConfig,
    pub lint: LintConfig,
    pub completion: CompletionConfig,
    pub native: NativeConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub sources: Vec<SourceConfig>,
}

/// One indexed root directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub php_extensions: Vec<String>,
    #[serde(default)]
    pub misc_extensions: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhpConfig {
    pub version: PhpVersion,
    pub short_open_tags: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub db_path: PathBuf,
    pub php_extensions: Vec<String>,
    pub misc_extensions: Vec<String>,
    pub exclude: Vec<String>,
    /// `phptags index` keeps watching once the walk is done
    pub watch: bool,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LintConfig {
    /// Files larger than this many bytes are skipped
    pub max_file_size: u64,
    pub check_uninitialized_variables: bool,
    pub check_unknown_identifiers: bool,
    pub check_call_arity: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub duck_typing: bool,
    pub max_results: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    /// Overrides the bundled native tag asset
    pub asset_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
            sources: vec![],
        }
    }
}

impl Default for PhpConfig {
    fn default() -> Self {
        Self {
            version: PhpVersion::default(),
            short_open_tags: false,
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            php_extensions: vec!["*.php".to_string(), "*.phtml".to_string(), "*.inc".to_string()],
            misc_extensions: vec![
                "*.css".to_string(),
                "*.js".to_string(),
                "*.html".to_string(),
                "*.twig".to_string(),
                "*.json".to_string(),
                "*.xml".to_string(),
                "*.yml".to_string(),
            ],
            exclude: vec![
                "**/.git/**".to_string(),
                "**/.svn/**".to_string(),
                "**/node_modules/**".to_string(),
            ],
            watch: false,
            batch_size: 100,
        }
    }
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            max_file_size: 1024 * 1024,
            check_uninitialized_variables: true,
            check_unknown_identifiers: true,
            check_call_arity: true,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            duck_typing: true,
            max_results: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "full".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            php: PhpConfig::default(),
            indexing: IndexingConfig::default(),
            lint: LintConfig::default(),
            completion: CompletionConfig::default(),
            native: NativeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from project directory
    /// Looks for .phptags.toml in the project root
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> Self {
        let config_path = project_dir.as_ref().join(CONFIG_FILE_NAME);

        let mut config = match Self::from_file(&config_path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", config_path.display());
                config
            }
            Err(e) => {
                tracing::debug!("Could not load config from {}: {}", config_path.display(), e);
                tracing::info!("Using default configuration");
                Self::default()
            }
        };

        if config.project.sources.is_empty() {
            config.project.sources.push(SourceConfig {
                root: project_dir.as_ref().to_path_buf(),
                php_extensions: vec![],
                misc_extensions: vec![],
                exclude: vec![],
            });
        }
        config
    }

    /// Database location for a project directory
    pub fn db_path(&self, project_dir: impl AsRef<Path>) -> PathBuf {
        if self.indexing.db_path.is_absolute() {
            self.indexing.db_path.clone()
        } else {
            project_dir.as_ref().join(&self.indexing.db_path)
        }
    }

    /// The immutable settings handed to the extractor, overlay and cache
    pub fn tag_config(&self) -> TagConfig {
        TagConfig {
            version: self.php.version,
            short_open_tags: self.php.short_open_tags,
            php_extensions: self.indexing.php_extensions.clone(),
            misc_extensions: self.indexing.misc_extensions.clone(),
            exclude: self.indexing.exclude.clone(),
            native_asset: self.native.asset_path.clone(),
            max_results: self.completion.max_results,
            max_file_size: self.lint.max_file_size,
        }
    }

    /// Settings for walking one source; its own extension and exclude
    /// lists replace the project-wide ones when given
    pub fn source_tag_config(&self, source: &SourceConfig) -> TagConfig {
        let mut config = self.tag_config();
        if !source.php_extensions.is_empty() {
            config.php_extensions = source.php_extensions.clone();
        }
        if !source.misc_extensions.is_empty() {
            config.misc_extensions = source.misc_extensions.clone();
        }
        config.exclude.extend(source.exclude.iter().cloned());
        config
    }

    /// Validate configuration values
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.project.name.is_empty() {
            return Err(anyhow::anyhow!("Project name cannot be empty"));
        }

        for source in &self.project.sources {
            if source.root.as_os_str().is_empty() {
                return Err(anyhow::anyhow!("Source root cannot be empty"));
            }
            compile_globs(&source.php_extensions)?;
            compile_globs(&source.misc_extensions)?;
            compile_globs(&source.exclude)?;
        }

        if self.indexing.php_extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one PHP extension pattern is required"));
        }
        compile_globs(&self.indexing.php_extensions)?;
        compile_globs(&self.indexing.misc_extensions)?;
        compile_globs(&self.indexing.exclude)?;

        if self.indexing.batch_size == 0 {
            return Err(anyhow::anyhow!("Batch size must be greater than 0"));
        }

        if self.lint.max_file_size == 0 {
            return Err(anyhow::anyhow!("Lint max file size must be greater than 0"));
        }

        if self.completion.max_results == 0 {
            return Err(anyhow::anyhow!("Completion max results must be greater than 0"));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level));
        }
        let valid_formats = ["full", "compact", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!("Invalid log format: {}", self.logging.format));
        }

        Ok(())
    }
}

/// Settings the core components are constructed with
#[derive(Debug, Clone)]
pub struct TagConfig {
    pub version: PhpVersion,
    pub short_open_tags: bool,
    pub php_extensions: Vec<String>,
    pub misc_extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub native_asset: Option<PathBuf>,
    pub max_results: usize,
    pub max_file_size: u64,
}

impl Default for TagConfig {
    fn default() -> Self {
        Config::default().tag_config()
    }
}

impl TagConfig {
    /// Compiled matchers for deciding what to do with a walked file
    pub fn file_filter(&self) -> anyhow::Result<FileFilter> {
        FileFilter::new(&self.php_extensions, &self.misc_extensions, &self.exclude)
    }
}

/// How a walked file should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Php,
    Misc,
    Ignored,
}

/// Compiled extension and exclude globs
#[derive(Debug, Clone)]
pub struct FileFilter {
    php: GlobSet,
    misc: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new(php: &[String], misc: &[String], exclude: &[String]) -> anyhow::Result<Self> {
        Ok(Self {
            php: compile_globs(php)?,
            misc: compile_globs(misc)?,
            exclude: compile_globs(exclude)?,
        })
    }

    pub fn classify(&self, path: &Path) -> FileClass {
        if self.exclude.is_match(path) {
            return FileClass::Ignored;
        }
        let name = path.file_name().map(Path::new).unwrap_or(path);
        if self.php.is_match(name) {
            FileClass::Php
        } else if self.misc.is_match(name) {
            FileClass::Misc
        } else {
            FileClass::Ignored
        }
    }
}

fn compile_globs(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("Invalid glob pattern '{}': {}", pattern, e))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.project.name, "unnamed-project");
        assert!(config.indexing.php_extensions.contains(&"*.php".to_string()));
        assert_eq!(config.php.version, PhpVersion::Php81);
        assert!(config.completion.duck_typing);
    }

    #[test]
    fn test_file_filter_classifies_by_extension() {
        let filter = TagConfig::default().file_filter().unwrap();

        assert_eq!(filter.classify(Path::new("src/Controller.php")), FileClass::Php);
        assert_eq!(filter.classify(Path::new("views/index.phtml")), FileClass::Php);
        assert_eq!(filter.classify(Path::new("web/site.css")), FileClass::Misc);
        assert_eq!(filter.classify(Path::new("bin/tool.exe")), FileClass::Ignored);
        assert_eq!(filter.classify(Path::new("repo/.git/objects/a.php")), FileClass::Ignored);
        assert_eq!(filter.classify(Path::new("node_modules/x/y.js")), FileClass::Ignored);
    }

    #[test]
    fn test_from_toml() {
        let config: Config = toml::from_str(
            r#"
            [project]
            name = "shop"

            [[project.sources]]
            root = "/srv/shop"
            exclude = ["**/cache/**"]

            [php]
            version = "7.4"

            [indexing]
            watch = true

            [completion]
            duck_typing = false
            "#,
        )
        .unwrap();

        assert_eq!(config.project.name, "shop");
        assert_eq!(config.project.sources.len(), 1);
        assert_eq!(config.php.version, PhpVersion::Php74);
        assert!(!config.completion.duck_typing);
        assert!(config.indexing.watch);
        assert_eq!(config.indexing.batch_size, Config::default().indexing.batch_size);
        assert_eq!(config.completion.max_results, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_project_dir_without_config_gets_root_source() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_project_dir(dir.path());
        assert_eq!(config.project.sources.len(), 1);
        assert_eq!(config.project.sources[0].root, dir.path());
        assert_eq!(config.db_path(dir.path()), dir.path().join(DEFAULT_DB_FILE));
    }

    #[test]
    fn test_source_overrides() {
        let config = Config::default();
        let source = SourceConfig {
            root: PathBuf::from("/srv/legacy"),
            php_extensions: vec!["*.php4".to_string()],
            misc_extensions: vec![],
            exclude: vec!["**/cache/**".to_string()],
        };
        let tags = config.source_tag_config(&source);
        assert_eq!(tags.php_extensions, vec!["*.php4".to_string()]);
        assert_eq!(tags.misc_extensions, config.indexing.misc_extensions);
        assert!(tags.exclude.contains(&"**/.git/**".to_string()));

        let filter = tags.file_filter().unwrap();
        assert_eq!(filter.classify(Path::new("/srv/legacy/a.php4")), FileClass::Php);
        assert_eq!(filter.classify(Path::new("/srv/legacy/a.php")), FileClass::Ignored);
        assert_eq!(filter.classify(Path::new("/srv/legacy/cache/b.php4")), FileClass::Ignored);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        assert!(config.validate().is_ok());

        config.project.name = "".to_string();
        assert!(config.validate().is_err());
        config.project.name = "test".to_string();

        config.indexing.php_extensions = vec!["[".to_string()];
        assert!(config.validate().is_err());
        config.indexing.php_extensions = vec!["*.php".to_string()];

        config.indexing.batch_size = 0;
        assert!(config.validate().is_err());
        config.indexing.batch_size = 100;

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "info".to_string();

        config.completion.max_results = 0;
        assert!(config.validate().is_err());
    }
}
