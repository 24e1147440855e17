//! Configuration management for courtfile using the prefer crate.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::browser::BrowserConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "courtfile.db";

const DEFAULT_PORTAL_URL: &str = "https://office.sud.kz/";
const DEFAULT_LANDING_PATH: &str = "form/proceedings/services.xhtml";

/// Portal endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Root of the portal; opened at the start of every case.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Page that lists the filing services, relative to `base_url`.
    #[serde(default = "default_landing_path")]
    pub landing_path: String,
}

fn default_base_url() -> String {
    DEFAULT_PORTAL_URL.to_string()
}

fn default_landing_path() -> String {
    DEFAULT_LANDING_PATH.to_string()
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            landing_path: default_landing_path(),
        }
    }
}

impl PortalConfig {
    pub fn base(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.base_url)
    }

    /// Absolute URL of the landing page.
    pub fn landing_url(&self) -> Result<Url, url::ParseError> {
        self.base()?.join(&self.landing_path)
    }
}

/// Option values chosen in the classification selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub litigation_kind: String,
    pub instance_level: String,
    pub document_type: String,
    pub proceeding_type: String,
    pub case_category: String,
    pub claim_nature: String,
    pub claim_category: String,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            litigation_kind: "CIVIL".to_string(),
            instance_level: "FIRSTINSTANCE".to_string(),
            document_type: "3".to_string(),
            proceeding_type: "2".to_string(),
            case_category: "27".to_string(),
            claim_nature: "1".to_string(),
            claim_category: "2".to_string(),
        }
    }
}

/// Inclusive range of seconds a randomized pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: f64,
    pub max: f64,
}

impl DelayRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Draw a pause from the range. Negative or inverted bounds collapse
    /// to the lower value.
    pub fn sample(&self) -> Duration {
        let min = self.min.max(0.0);
        let max = self.max.max(0.0);
        let secs = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        Duration::from_secs_f64(secs)
    }
}

/// Randomized pauses between portal interactions.
///
/// The portal throttles clients that act faster than a person would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// After loader waits, selections, uploads and dialog steps.
    pub settle: DelayRange,
    /// After a court has been selected.
    pub court_settle: DelayRange,
    /// After a participant was saved, and between participant retries.
    pub participant: DelayRange,
    /// Before leaving a finished case for the landing page.
    pub cooldown: DelayRange,
    /// After the landing page is back.
    pub landing: DelayRange,
    /// Per-keystroke delay for identifiers and phone numbers.
    pub keystroke_ms: u64,
    /// Per-keystroke delay for email addresses.
    pub email_keystroke_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            settle: DelayRange::new(1.0, 2.0),
            court_settle: DelayRange::new(2.0, 3.0),
            participant: DelayRange::new(1.0, 3.0),
            cooldown: DelayRange::new(10.0, 15.0),
            landing: DelayRange::new(5.0, 7.0),
            keystroke_ms: 50,
            email_keystroke_ms: 60,
        }
    }
}

impl PacingConfig {
    /// No pauses at all; for rehearsals against an in-memory surface.
    pub fn none() -> Self {
        Self {
            settle: DelayRange::zero(),
            court_settle: DelayRange::zero(),
            participant: DelayRange::zero(),
            cooldown: DelayRange::zero(),
            landing: DelayRange::zero(),
            keystroke_ms: 0,
            email_keystroke_ms: 0,
        }
    }

    pub fn keystroke(&self) -> Duration {
        Duration::from_millis(self.keystroke_ms)
    }

    pub fn email_keystroke(&self) -> Duration {
        Duration::from_millis(self.email_keystroke_ms)
    }
}

/// Upper bounds for waits on the portal, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Page loading indicator between wizard stages.
    pub loader: f64,
    /// Participant side-select dialog appearing.
    pub dialog: f64,
    /// Loading indicator inside the participant dialog.
    pub modal_loader: f64,
    /// Asynchronous acknowledgement of a selection.
    pub ajax: f64,
    /// Phone field becoming interactable.
    pub phone_field: f64,
    /// Court selector appearing after a region was chosen.
    pub court: f64,
    /// Loading indicator after document uploads.
    pub upload_loader: f64,
    /// Filing entry control on the landing page.
    pub landing: f64,
    /// Document ready state after navigation.
    pub page_ready: f64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            loader: 100.0,
            dialog: 10.0,
            modal_loader: 15.0,
            ajax: 15.0,
            phone_field: 5.0,
            court: 10.0,
            upload_loader: 60.0,
            landing: 20.0,
            page_ready: 30.0,
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}

impl TimeoutConfig {
    /// Every wait bounded by `value` seconds.
    pub fn uniform(value: f64) -> Self {
        Self {
            loader: value,
            dialog: value,
            modal_loader: value,
            ajax: value,
            phone_field: value,
            court: value,
            upload_loader: value,
            landing: value,
            page_ready: value,
        }
    }

    pub fn loader(&self) -> Duration {
        secs(self.loader)
    }
    pub fn dialog(&self) -> Duration {
        secs(self.dialog)
    }
    pub fn modal_loader(&self) -> Duration {
        secs(self.modal_loader)
    }
    pub fn ajax(&self) -> Duration {
        secs(self.ajax)
    }
    pub fn phone_field(&self) -> Duration {
        secs(self.phone_field)
    }
    pub fn court(&self) -> Duration {
        secs(self.court)
    }
    pub fn upload_loader(&self) -> Duration {
        secs(self.upload_loader)
    }
    pub fn landing(&self) -> Duration {
        secs(self.landing)
    }
    pub fn page_ready(&self) -> Duration {
        secs(self.page_ready)
    }
}

/// Attempt limits for the steps that retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub region_court_attempts: u32,
    pub participant_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            region_court_attempts: 3,
            participant_attempts: 3,
        }
    }
}

/// Everything the filing engine needs to drive one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilingConfig {
    pub portal: PortalConfig,
    pub form: FormConfig,
    pub pacing: PacingConfig,
    pub timeouts: TimeoutConfig,
    pub retries: RetryConfig,
}

impl FilingConfig {
    /// Zero pauses and short timeouts, for in-memory rehearsals.
    pub fn rehearsal() -> Self {
        Self {
            pacing: PacingConfig::none(),
            timeouts: TimeoutConfig::uniform(0.05),
            ..Default::default()
        }
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename, or an absolute path.
    pub database_filename: String,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/courtfile/
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("courtfile");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
        }
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Get the full path to the database.
    pub fn database_path(&self) -> PathBuf {
        // join keeps an absolute database path as-is
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Ensure the data directory and the database's parent exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        if let Some(parent) = self.database_path().parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub form: FormConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub retries: RetryConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers courtfile config files in standard locations.
    pub async fn load() -> Self {
        // Use prefer for file discovery, then parse with serde
        match prefer::load("courtfile").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            // No config file found, use defaults with env overrides
            Err(_) => Self::default_with_env(),
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Apply `COURTFILE_*` and `BROWSER_URL` environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = var("COURTFILE_DATA_DIR") {
            self.data_dir = Some(dir);
        }
        if let Some(db) = var("COURTFILE_DB_PATH") {
            self.database = Some(db);
        }
        if let Some(url) = var("BROWSER_URL") {
            self.browser.remote_url = Some(url);
        }
        if let Some(flag) = var("COURTFILE_HEADLESS") {
            self.browser.headless = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }
        self
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            let expanded = shellexpand::tilde(database);
            settings.database_filename = expanded.into_owned();
        }
    }

    /// The filing engine's slice of the configuration.
    pub fn filing(&self) -> FilingConfig {
        FilingConfig {
            portal: self.portal.clone(),
            form: self.form.clone(),
            pacing: self.pacing.clone(),
            timeouts: self.timeouts.clone(),
            retries: self.retries.clone(),
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Data directory (--data flag).
    pub data: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => match Config::load_from_path(path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using defaults", e);
                Config::default_with_env()
            }
        },
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());
    config.apply_to_settings(&mut settings, &base_dir);

    // --data takes precedence over the config file
    if let Some(data) = options.data {
        settings.data_dir = if data.is_absolute() { data } else { cwd.join(data) };
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_portal_behavior() {
        let config = Config::default();
        assert_eq!(
            config.portal.landing_url().unwrap().as_str(),
            "https://office.sud.kz/form/proceedings/services.xhtml"
        );
        assert_eq!(config.form.case_category, "27");
        assert_eq!(config.timeouts.loader(), Duration::from_secs(100));
        assert_eq!(config.retries.region_court_attempts, 3);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_delay_range_sample_within_bounds() {
        let range = DelayRange::new(0.01, 0.02);
        for _ in 0..20 {
            let d = range.sample();
            assert!(d >= Duration::from_secs_f64(0.01) && d <= Duration::from_secs_f64(0.02));
        }
        assert_eq!(DelayRange::new(3.0, 1.0).sample(), Duration::from_secs(3));
        assert_eq!(DelayRange::zero().sample(), Duration::ZERO);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::parse(
            r#"
            data_dir = "./data"
            [pacing]
            keystroke_ms = 80
            [timeouts]
            loader = 45
            [browser]
            headless = false
            "#,
            "toml",
        )
        .unwrap();
        assert_eq!(config.pacing.keystroke_ms, 80);
        assert_eq!(config.pacing.cooldown, DelayRange::new(10.0, 15.0));
        assert_eq!(config.timeouts.loader(), Duration::from_secs(45));
        assert_eq!(config.timeouts.landing(), Duration::from_secs(20));
        assert!(!config.browser.headless);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("COURTFILE_DB_PATH", "/srv/cases.db"),
            ("BROWSER_URL", "ws://chrome:9222"),
            ("COURTFILE_HEADLESS", "false"),
            ("COURTFILE_DATA_DIR", "  "),
        ]
        .into_iter()
        .collect();

        let config =
            Config::default().with_overrides_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.database.as_deref(), Some("/srv/cases.db"));
        assert_eq!(config.browser.remote_url.as_deref(), Some("ws://chrome:9222"));
        assert!(!config.browser.headless);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_absolute_database_path_wins_over_data_dir() {
        let mut settings = Settings::with_data_dir(PathBuf::from("/var/lib/courtfile"));
        assert_eq!(
            settings.database_path(),
            PathBuf::from("/var/lib/courtfile/courtfile.db")
        );
        settings.database_filename = "/srv/cases.db".to_string();
        assert_eq!(settings.database_path(), PathBuf::from("/srv/cases.db"));
    }

    #[tokio::test]
    async fn test_load_from_path_resolves_relative_data_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("courtfile.yaml");
        std::fs::write(&path, "data_dir: ./state\nretries:\n  participant_attempts: 5\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.retries.participant_attempts, 5);
        assert_eq!(config.retries.region_court_attempts, 3);

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, &config.base_dir().unwrap());
        assert_eq!(settings.data_dir, dir.path().join("./state"));
    }
}
