//! Configuration model.
//!
//! The configuration is assembled once at startup (file, then environment, then CLI flags)
//! and is read-only afterwards.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// AList connection.
    pub alist: AlistConfig,
    /// TMDB connection.
    pub tmdb: TmdbConfig,
    /// Optional OpenAI-compatible assistant.
    pub ai: AiConfig,
    /// Library roots and storage backend.
    pub library: LibraryConfig,
    /// Reconciliation policy.
    pub reconcile: ReconcileConfig,
    /// Cache and ledger locations.
    pub paths: PathsConfig,
}

/// AList configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlistConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub otp_code: Option<String>,
    /// Minimum seconds between read requests.
    pub read_interval: f64,
    /// Minimum seconds between write requests.
    pub write_interval: f64,
    pub retries: u32,
    pub retry_base: f64,
    pub retry_max: f64,
    /// Request timeout in seconds.
    pub timeout: u64,
    pub verify_tls: bool,
    /// Ask AList to refresh the first page of each listing.
    pub refresh: bool,
}

/// TMDB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmdbConfig {
    /// API key (v3) or bearer token (v4).
    pub api_key: Option<String>,
    pub language: String,
    /// Official host or a `/get` style reverse proxy.
    pub base_url: Option<String>,
    pub interval: f64,
    pub timeout: u64,
}

/// AI assistant configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub interval: f64,
    pub timeout: u64,
}

/// Storage backend kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Alist,
    Local,
}

/// Library configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// TV library roots (never point these at movie libraries).
    pub roots: Vec<String>,
    pub backend: Backend,
    /// Base directory for the local backend.
    pub local_root: Option<PathBuf>,
    /// Discover roots when none are configured.
    pub auto_roots: bool,
    /// Storage folders searched during discovery.
    pub root_regex: String,
    /// Category folder names that become roots.
    pub categories: Vec<String>,
    pub roots_cache_ttl_days: u64,
}

/// What to do when a destination name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Append ` (n)` with the first free `n`.
    #[default]
    Suffix,
    /// Abandon the operation and report it.
    Skip,
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "suffix" => Ok(Self::Suffix),
            "skip" => Ok(Self::Skip),
            other => Err(Error::InvalidConfig(format!(
                "unknown conflict policy '{}' (expected suffix or skip)",
                other
            ))),
        }
    }
}

/// Reconciliation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Season folder format, e.g. `S{season:02}` or `Season {season}`.
    pub season_format: String,
    pub default_season: u32,
    pub on_conflict: ConflictPolicy,
    /// Never rename videos that already carry `SxxEyy`.
    pub protect_tagged: bool,
    /// Prefix the series name onto bare `SxxEyy*` names even when protected.
    pub fix_bare_tagged: bool,
    pub rename_series: bool,
    pub rename_files: bool,
    /// Let the assistant guess missing seasons when a season hint exists.
    pub ai_infer_season: bool,
    pub delete_junk: bool,
    /// Overrides the built-in skip-dir pattern.
    pub skip_dir_regex: Option<String>,
    pub max_depth: usize,
}

/// Cache and ledger locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub cache_file: PathBuf,
    /// Discovered roots, keyed by pattern and categories.
    pub roots_cache_file: PathBuf,
    pub state_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for AlistConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: None,
            username: None,
            password: None,
            otp_code: None,
            read_interval: 0.8,
            write_interval: 1.2,
            retries: 5,
            retry_base: 0.8,
            retry_max: 10.0,
            timeout: 30,
            verify_tls: true,
            refresh: false,
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            language: "zh-CN".to_string(),
            base_url: None,
            interval: 0.3,
            timeout: 20,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            interval: 1.2,
            timeout: 60,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            backend: Backend::Alist,
            local_root: None,
            auto_roots: false,
            root_regex: "^OneDrive-".to_string(),
            categories: vec!["电视剧".to_string(), "动漫".to_string()],
            roots_cache_ttl_days: 7,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            season_format: "S{season:02}".to_string(),
            default_season: 1,
            on_conflict: ConflictPolicy::Suffix,
            protect_tagged: false,
            fix_bare_tagged: true,
            rename_series: true,
            rename_files: true,
            ai_infer_season: false,
            delete_junk: true,
            skip_dir_regex: None,
            max_depth: 3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let dir = config_dir();
        Self {
            cache_file: dir.join("tmdb_cache.json"),
            roots_cache_file: dir.join("roots_cache.json"),
            state_file: dir.join("logs").join("state.jsonl"),
            log_dir: dir.join("logs"),
        }
    }
}

impl AiConfig {
    /// The assistant is used only when enabled and a key is present.
    pub fn is_active(&self) -> bool {
        self.enabled && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl Config {
    /// Overlay environment variables on top of the file configuration.
    pub fn apply_env(&mut self) -> Result<()> {
        let env = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = env("ALIST_URL") {
            self.alist.base_url = v;
        }
        if let Some(v) = env("ALIST_TOKEN") {
            self.alist.token = Some(v);
        }
        if let Some(v) = env("ALIST_USER") {
            self.alist.username = Some(v);
        }
        if let Some(v) = env("ALIST_PASS") {
            self.alist.password = Some(v);
        }
        if let Some(v) = env("ALIST_OTP") {
            self.alist.otp_code = Some(v);
        }
        if let Some(v) = env("ALIST_SLEEP_READ").and_then(|v| v.parse().ok()) {
            self.alist.read_interval = v;
        }
        if let Some(v) = env("ALIST_SLEEP_WRITE").and_then(|v| v.parse().ok()) {
            self.alist.write_interval = v;
        }
        if let Some(v) = env("ALIST_RETRIES").and_then(|v| v.parse().ok()) {
            self.alist.retries = v;
        }
        if let Some(v) = env("ALIST_REFRESH") {
            self.alist.refresh = parse_bool(&v);
        }

        if let Some(v) = env("TMDB_KEY").or_else(|| env("TMDB_API_KEY")) {
            self.tmdb.api_key = Some(v);
        }
        if let Some(v) = env("TMDB_LANG") {
            self.tmdb.language = v;
        }
        if let Some(v) = env("TMDB_API_BASE").or_else(|| env("TMDB_BASE_URL")) {
            self.tmdb.base_url = Some(v);
        }

        if let Some(v) = env("AI_BASE_URL") {
            self.ai.base_url = v;
        }
        if let Some(v) = env("AI_API_KEY").or_else(|| env("OPENAI_API_KEY")) {
            self.ai.api_key = Some(v);
        }
        if let Some(v) = env("AI_MODEL") {
            self.ai.model = v;
        }

        if let Some(v) = env("TV_ROOTS") {
            self.library.roots = parse_csv_paths(&v);
        }
        if let Some(v) = env("AUTO_DISCOVER_ROOTS") {
            self.library.auto_roots = parse_bool(&v);
        }
        if let Some(v) = env("DISCOVER_ROOT_REGEX") {
            self.library.root_regex = v;
        }
        if let Some(v) = env("DISCOVER_CATEGORIES") {
            self.library.categories = parse_csv_names(&v);
        }

        if let Some(v) = env("SEASON_FORMAT") {
            self.reconcile.season_format = v;
        }
        if let Some(v) = env("DEFAULT_SEASON") {
            self.reconcile.default_season = v
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("DEFAULT_SEASON={}", v)))?;
        }
        if let Some(v) = env("ON_CONFLICT") {
            self.reconcile.on_conflict = v.parse()?;
        }
        if let Some(v) = env("PROTECT_SXXEYY") {
            self.reconcile.protect_tagged = parse_bool(&v);
        }
        if let Some(v) = env("FIX_BARE_SXXEYY") {
            self.reconcile.fix_bare_tagged = parse_bool(&v);
        }
        if let Some(v) = env("AI_INFER_SEASON") {
            self.reconcile.ai_infer_season = parse_bool(&v);
        }
        if let Some(v) = env("DELETE_ADS") {
            self.reconcile.delete_junk = parse_bool(&v);
        }
        if let Some(v) = env("SKIP_DIR_REGEX") {
            self.reconcile.skip_dir_regex = Some(v);
        }

        Ok(())
    }
}

/// Interpret common truthy spellings.
pub fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

/// Parse a comma-separated list of remote paths.
pub fn parse_csv_paths(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(crate::utils::fs::norm_path)
        .collect()
}

/// Parse a comma-separated list of plain names.
pub fn parse_csv_names(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect()
}

/// Get the configuration directory path.
///
/// `EMBY_RECONCILER_HOME` wins over the platform config directory.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("EMBY_RECONCILER_HOME") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir.trim());
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("emby_reconciler")
}

/// Load configuration from a file (default: `<config dir>/config.toml`).
///
/// A missing file yields the defaults; a malformed file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config_dir().join("config.toml"));

    if !config_path.exists() {
        if path.is_some() {
            return Err(Error::PathNotFound(config_path.display().to_string()));
        }
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(&config_path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.reconcile.season_format, "S{season:02}");
        assert_eq!(config.reconcile.default_season, 1);
        assert_eq!(config.reconcile.on_conflict, ConflictPolicy::Suffix);
        assert!(!config.reconcile.protect_tagged);
        assert!(config.reconcile.fix_bare_tagged);
        assert!(!config.reconcile.ai_infer_season);
        assert_eq!(config.reconcile.max_depth, 3);
        assert_eq!(config.tmdb.language, "zh-CN");
        assert!(!config.ai.is_active());
        assert!(!config.library.auto_roots);
        assert_eq!(config.library.root_regex, "^OneDrive-");
        assert_eq!(config.library.categories, vec!["电视剧", "动漫"]);
        assert_eq!(config.library.roots_cache_ttl_days, 7);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [library]
            roots = ["/od/电视剧"]

            [reconcile]
            on_conflict = "skip"
            season_format = "Season {season}"
            "#,
        )
        .unwrap();
        assert_eq!(config.library.roots, vec!["/od/电视剧".to_string()]);
        assert_eq!(config.reconcile.on_conflict, ConflictPolicy::Skip);
        assert_eq!(config.reconcile.season_format, "Season {season}");
        assert!(config.reconcile.rename_files);
        assert_eq!(config.alist.retries, 5);
    }

    #[test]
    fn test_conflict_policy_from_str() {
        assert_eq!("Suffix".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Suffix);
        assert_eq!(" skip ".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Skip);
        assert!("overwrite".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn test_parse_csv_paths() {
        assert_eq!(
            parse_csv_paths("/a/电视剧, b/动漫/ ,,"),
            vec!["/a/电视剧".to_string(), "/b/动漫".to_string()]
        );
    }

    #[test]
    fn test_parse_csv_names() {
        assert_eq!(parse_csv_names(" 电视剧,动漫 ,,纪录片"), vec!["电视剧", "动漫", "纪录片"]);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("Yes"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("off"));
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tmdb]\nlanguage = \"en-US\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.tmdb.language, "en-US");

        let missing = dir.path().join("missing.toml");
        assert!(load_config(Some(&missing)).is_err());

        std::fs::write(&path, "[tmdb\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
