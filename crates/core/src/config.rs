use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BuildwatchError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub github: GithubConfig,
    pub buildbot: BuildbotConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `BUILDWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("BUILDWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            github: GithubConfig::from_env_profiled(p),
            buildbot: BuildbotConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  storage:     data_dir={}, retention_days={}",
            self.storage.data_dir.display(),
            self.storage.revision_retention_days
        );
        tracing::info!(
            "  github:      url={}, branch={}, token={}",
            self.github.commits_url,
            self.github.branch,
            if self.github.is_authenticated() { "(set)" } else { "(none)" }
        );
        tracing::info!(
            "  buildbot:    url={}, builders={}",
            self.buildbot.base_url,
            self.buildbot.builders_config.display()
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3080),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Revisions older than this are swept. 0 disables the sweeper.
    pub revision_retention_days: u32,
    pub retention_sweep_secs: u64,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
            revision_retention_days: profiled_env_u32(p, "REVISION_RETENTION_DAYS", 90),
            retention_sweep_secs: profiled_env_u64(p, "RETENTION_SWEEP_SECS", 60),
        }
    }

    pub fn cursor_dir(&self) -> PathBuf {
        self.data_dir.join("cursors")
    }

    pub fn revision_dir(&self) -> PathBuf {
        self.data_dir.join("revisions")
    }
}

// ── GitHub ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub commits_url: String,
    pub branch: String,
    pub per_page: u32,
    pub poll_delay_secs: u64,
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl GithubConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            commits_url: profiled_env_or(
                p,
                "GITHUB_COMMITS_URL",
                "https://api.github.com/repos/llvm/llvm-project/commits",
            ),
            branch: profiled_env_or(p, "GITHUB_BRANCH", "main"),
            per_page: profiled_env_u32(p, "GITHUB_PER_PAGE", 30),
            poll_delay_secs: profiled_env_u64(p, "GITHUB_POLL_DELAY_SECS", 30),
            token: profiled_env_opt(p, "GITHUB_TOKEN"),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

// ── Buildbot ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildbotConfig {
    pub base_url: String,
    pub builders_config: PathBuf,
    pub http_timeout_secs: u64,
}

impl BuildbotConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_or(
                p,
                "BUILDBOT_BASE_URL",
                "http://lab.llvm.org:8011/json/builders",
            ),
            builders_config: PathBuf::from(profiled_env_or(
                p,
                "BUILDERS_CONFIG",
                "config/builders.toml",
            )),
            http_timeout_secs: profiled_env_u64(p, "HTTP_TIMEOUT_SECS", 30),
        }
    }
}

// ── Builder list ──────────────────────────────────────────────

/// The set of builders to poll, parsed from `builders.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildersConfig {
    #[serde(default)]
    pub builders: Vec<BuilderSpec>,
}

/// One `[[builders]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderSpec {
    pub name: String,
    /// Index polled first when no cursor has been persisted yet.
    #[serde(default)]
    pub initial_build_id: u64,
    #[serde(default = "default_builder_delay")]
    pub delay_secs: u64,
}

fn default_builder_delay() -> u64 {
    600
}

impl BuildersConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, BuildwatchError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BuildwatchError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), BuildwatchError> {
        if self.builders.is_empty() {
            return Err(BuildwatchError::Config(
                "at least one builder must be configured".into(),
            ));
        }
        let mut seen = HashSet::new();
        for b in &self.builders {
            if b.name.trim().is_empty() {
                return Err(BuildwatchError::Config("builder name must not be empty".into()));
            }
            if !seen.insert(b.name.as_str()) {
                return Err(BuildwatchError::Config(format!(
                    "builder '{}' is configured more than once",
                    b.name
                )));
            }
            if b.delay_secs == 0 {
                return Err(BuildwatchError::Config(format!(
                    "builder '{}' has a zero poll delay",
                    b.name
                )));
            }
        }
        Ok(())
    }
}
