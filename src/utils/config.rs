use crate::errors::SiftResult;
use console::style;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

static DEFAULT_CONFIG_TOML: &str = include_str!("../../default-vulnsift.conf");

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScannerConfig {
    /// Rule categories to run. Empty means all six.
    pub categories: Vec<String>,

    /// The minimum severity level to report.
    pub min_severity: String,

    /// Statements per matching window.
    pub window_width: usize,

    /// Preceding statements consulted for sanitizer and allow-list checks.
    pub guard_lookbehind: usize,

    /// Collapse overlapping findings of one category.
    pub dedupe: bool,

    /// The maximum file size to scan, in megabytes.
    pub max_file_size_mb: Option<u64>,

    /// File extensions to exclude from scanning.
    pub excluded_extensions: Vec<String>,

    /// Directories to exclude from scanning.
    pub excluded_directories: Vec<String>,

    /// Excluded files
    pub excluded_files: Vec<String>,

    /// Whether to respect the global ignore file or not.
    pub read_global_ignore: bool,

    /// Whether to respect VCS ignore files (`.gitignore`, ..) or not.
    pub read_vcsignore: bool,

    /// Whether to require a `.git` directory to respect gitignore files.
    pub require_git_to_read_vcsignore: bool,

    /// Whether to limit the search to starting file system or not.
    pub one_file_system: bool,

    /// Whether to follow symlinks or not.
    pub follow_symlinks: bool,

    /// Whether to scan hidden files or not.
    pub scan_hidden_files: bool,
}
impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            min_severity: "low".into(),
            window_width: 1,
            guard_lookbehind: 8,
            dedupe: true,
            max_file_size_mb: Some(4),
            excluded_extensions: vec![
                "jpg", "png", "gif", "mp4", "avi", "mkv", "zip", "tar", "gz", "exe", "dll", "so",
                "min.js", "lock",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            excluded_directories: vec![
                "node_modules",
                ".git",
                "target",
                ".vscode",
                ".idea",
                "build",
                "dist",
                "vendor",
            ]
            .into_iter()
            .map(str::to_owned)
            .collect(),
            excluded_files: Vec::new(),
            read_global_ignore: false,
            read_vcsignore: true,
            require_git_to_read_vcsignore: true,
            one_file_system: false,
            follow_symlinks: false,
            scan_hidden_files: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// `console`, `json` or `sarif`.
    pub default_format: String,

    /// Suppress notes and the summary footer on the console.
    pub quiet: bool,

    /// The maximum number of results to show.
    pub max_results: Option<u32>,

    /// Lowest severity that makes the scan exit with status 1.
    pub fail_on: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: "console".into(),
            quiet: false,
            max_results: None,
            fail_on: "high".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PerformanceConfig {
    /// The maximum search depth, or `None` if no maximum search depth should be set.
    ///
    /// A depth of `1` includes all files under the current directory, a depth of `2` also includes
    /// all files under subdirectories of the current directory, etc.
    pub max_depth: Option<usize>,

    /// The maximum number of worker threads to use, or `None` to auto-detect.
    pub worker_threads: Option<usize>,

    /// Paths per batch sent from the walker.
    pub batch_size: usize,

    /// capacity = threads × this
    pub channel_multiplier: usize,

    /// The stack size for Rayon threads, in bytes.
    pub rayon_thread_stack_size: usize,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            worker_threads: None,
            batch_size: 8usize,
            channel_multiplier: 4usize,
            rayon_thread_stack_size: 8 * 1024 * 1024, // 8 MiB
        }
    }
}

/// One `[[rules.custom]]` entry.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CustomRuleConfig {
    pub id: String,
    pub category: String,
    pub severity: String,
    /// Regular expression matched against a statement's source text.
    pub pattern: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub remediation: String,
    #[serde(default)]
    pub case_insensitive: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    pub custom: Vec<CustomRuleConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
    pub rules: RulesConfig,
}

impl Config {
    pub fn load(config_dir: &Path) -> SiftResult<Self> {
        let mut config = Config::default();

        let default_config_path = config_dir.join("vulnsift.conf");
        if !default_config_path.exists() {
            create_example_config(config_dir)?;
        }

        let user_config_path = config_dir.join("vulnsift.local");
        if user_config_path.exists() {
            let user_config_content = fs::read_to_string(&user_config_path)?;
            let user_config: Config = toml::from_str(&user_config_content)?;

            config = merge_configs(config, user_config);

            if !config.output.quiet {
                eprintln!(
                    "{}: Loaded user config from: {}\n",
                    style("note").green().bold(),
                    style(user_config_path.display())
                        .underlined()
                        .white()
                        .bold()
                );
            }
        } else {
            tracing::debug!(
                "using default configuration; create {} to customize",
                user_config_path.display()
            );
        }

        Ok(config)
    }
}

fn create_example_config(config_dir: &Path) -> SiftResult<()> {
    let example_path = config_dir.join("vulnsift.conf");
    if !example_path.exists() {
        fs::write(&example_path, DEFAULT_CONFIG_TOML)?;
        tracing::debug!("Example config created at: {}", example_path.display());
    }
    Ok(())
}

/// Merge user config into default config, preserving defaults where the user didn't
/// supply new exclusions and overriding everything else.
fn merge_configs(mut default: Config, user: Config) -> Config {
    // --- ScannerConfig ---
    default.scanner.categories = user.scanner.categories;
    default.scanner.min_severity = user.scanner.min_severity;
    default.scanner.window_width = user.scanner.window_width;
    default.scanner.guard_lookbehind = user.scanner.guard_lookbehind;
    default.scanner.dedupe = user.scanner.dedupe;
    default.scanner.max_file_size_mb = user.scanner.max_file_size_mb;
    default.scanner.read_global_ignore = user.scanner.read_global_ignore;
    default.scanner.read_vcsignore = user.scanner.read_vcsignore;
    default.scanner.require_git_to_read_vcsignore = user.scanner.require_git_to_read_vcsignore;
    default.scanner.one_file_system = user.scanner.one_file_system;
    default.scanner.follow_symlinks = user.scanner.follow_symlinks;
    default.scanner.scan_hidden_files = user.scanner.scan_hidden_files;

    // Merge exclusion lists (default ⊔ user), then sort & dedupe
    for (into, from) in [
        (
            &mut default.scanner.excluded_extensions,
            user.scanner.excluded_extensions,
        ),
        (
            &mut default.scanner.excluded_directories,
            user.scanner.excluded_directories,
        ),
        (&mut default.scanner.excluded_files, user.scanner.excluded_files),
    ] {
        into.extend(from);
        into.sort_unstable();
        into.dedup();
    }

    // --- OutputConfig ---
    default.output = user.output;

    // --- PerformanceConfig ---
    default.performance = user.performance;

    // --- RulesConfig ---
    default.rules.custom.extend(user.rules.custom);

    default
}

#[test]
fn merge_configs_dedupes_and_keeps_order() {
    let mut default_cfg = Config::default();
    default_cfg.scanner.excluded_extensions = vec!["rs".into(), "toml".into()];

    let mut user_cfg = Config::default();
    user_cfg.scanner.excluded_extensions = vec!["jpg".into(), "rs".into()];

    let merged = merge_configs(default_cfg, user_cfg);

    assert_eq!(
        merged.scanner.excluded_extensions,
        vec!["jpg", "rs", "toml"]
    );
}

#[test]
fn embedded_example_config_parses_to_defaults() {
    let parsed: Config = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
    assert_eq!(parsed.scanner.window_width, 1);
    assert_eq!(parsed.output.fail_on, "high");
    assert!(parsed.rules.custom.is_empty());
}

#[test]
fn load_creates_example_and_reads_user_overrides() {
    let cfg_dir = tempfile::tempdir().unwrap();
    let cfg_path = cfg_dir.path();

    let user_toml = r#"
        [scanner]
        one_file_system = true
        excluded_extensions = ["foo"]
        categories = ["sql-injection"]
        window_width = 3

        [output]
        quiet = true
        fail_on = "critical"

        [[rules.custom]]
        id = "no_debug_endpoint"
        category = "ssrf"
        severity = "medium"
        pattern = "debug\\.internal"
    "#;
    fs::write(cfg_path.join("vulnsift.local"), user_toml).unwrap();

    let cfg = Config::load(cfg_path).expect("Config::load should succeed");

    assert!(cfg_path.join("vulnsift.conf").is_file());

    assert!(cfg.scanner.one_file_system);
    assert!(cfg.output.quiet);
    assert_eq!(cfg.output.fail_on, "critical");
    assert_eq!(cfg.scanner.window_width, 3);
    assert_eq!(cfg.scanner.categories, vec!["sql-injection"]);
    assert!(cfg.scanner.excluded_extensions.contains(&"foo".to_string()));
    assert!(cfg.scanner.excluded_directories.contains(&"node_modules".to_string()));
    assert_eq!(cfg.rules.custom.len(), 1);
    assert_eq!(cfg.rules.custom[0].pattern, r"debug\.internal");

    assert!(!cfg.scanner.follow_symlinks);
}

#[test]
fn malformed_user_config_is_an_error() {
    let cfg_dir = tempfile::tempdir().unwrap();
    fs::write(cfg_dir.path().join("vulnsift.local"), "[scanner\nbroken").unwrap();
    assert!(matches!(
        Config::load(cfg_dir.path()),
        Err(crate::errors::SiftError::Toml(_))
    ));
}
