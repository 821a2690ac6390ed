//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.lumen/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::inference::ThinkingConfig;
use crate::inference::providers::{DEFAULT_GEMINI_BASE_URL, DEFAULT_OPENROUTER_BASE_URL};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LumenConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub system_prompt: Option<String>,
    pub system_prompt_file: Option<String>,
    pub suggestions: Option<bool>,
    pub search_grounding: Option<bool>,
    pub thinking_budget: Option<u32>,
    pub include_thoughts: Option<bool>,
    pub max_duration_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LimitsConfig {
    pub max_files: Option<usize>,
    pub max_file_size_mb: Option<u64>,
    pub max_draft_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_PROVIDER: &str = "gemini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_OPENROUTER_MODEL: &str = "google/gemini-2.5-flash-lite";
pub const DEFAULT_MAX_DURATION_SECS: u64 = 30;
pub const DEFAULT_MAX_FILES: usize = 5;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;
pub const DEFAULT_MAX_DRAFT_CHARS: usize = 10_000;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const BYTES_PER_MB: u64 = 1024 * 1024;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

/// Attachment and draft limits enforced at the input boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
    pub max_draft_chars: usize,
}

impl Limits {
    /// The per-file ceiling in whole megabytes, as shown to the user.
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_bytes / BYTES_PER_MB
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_MB * BYTES_PER_MB,
            max_draft_chars: DEFAULT_MAX_DRAFT_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: String,
    pub model_name: String,
    pub system_prompt: String,
    pub suggestions: bool,
    pub search_grounding: bool,
    pub thinking: ThinkingConfig,
    pub max_duration: Duration,
    pub limits: Limits,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.lumen`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".lumen"))
}

/// Returns the path to `~/.lumen/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.lumen/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `LumenConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<LumenConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(LumenConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<LumenConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(LumenConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: LumenConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Lumen Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_provider = "gemini"           # "gemini" or "openrouter"
# default_model = "gemini-2.5-flash-lite"
# system_prompt = "You are a helpful assistant."
# system_prompt_file = "system.md"      # Path relative to ~/.lumen/
# suggestions = true                    # Follow-up questions after each answer
# search_grounding = true               # Web search + URL context tools
# thinking_budget = 8192                # Reasoning token budget (0 disables)
# include_thoughts = true               # Stream reasoning into the chat
# max_duration_secs = 30                # Upper bound on one relay request

# [limits]
# max_files = 5
# max_file_size_mb = 10
# max_draft_chars = 10000

# [gemini]
# api_key = "..."                       # Or set GEMINI_API_KEY env var
# base_url = "https://generativelanguage.googleapis.com/v1beta"

# [openrouter]
# api_key = "sk-or-..."                 # Or set OPENROUTER_API_KEY env var
# base_url = "https://openrouter.ai/api/v1"
"#;

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG_TEMPLATE) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_provider` and `cli_model` are from CLI flags (None = not specified).
pub fn resolve(
    config: &LumenConfig,
    cli_provider: Option<&str>,
    cli_model: Option<&str>,
) -> ResolvedConfig {
    resolve_with_env(config, cli_provider, cli_model, |key| std::env::var(key).ok())
}

/// [`resolve`] with an injectable environment lookup.
pub fn resolve_with_env(
    config: &LumenConfig,
    cli_provider: Option<&str>,
    cli_model: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Provider: CLI → env → config → default
    let provider = cli_provider
        .map(str::to_string)
        .or_else(|| env("LUMEN_PROVIDER"))
        .or_else(|| config.general.default_provider.clone())
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    let provider = canonical_provider(&provider);

    // Model: CLI → env → config → provider default
    let model_name = cli_model
        .map(str::to_string)
        .or_else(|| env("LUMEN_MODEL"))
        .or_else(|| config.general.default_model.clone())
        .unwrap_or_else(|| default_model_for(&provider).to_string());

    let system_prompt = resolve_system_prompt(config, config_dir().as_deref());

    // Gemini API key: env (either name) → config
    let gemini_api_key = env("GEMINI_API_KEY")
        .or_else(|| env("GOOGLE_GENERATIVE_AI_API_KEY"))
        .or_else(|| config.gemini.api_key.clone());
    let gemini_base_url = env("GEMINI_BASE_URL")
        .or_else(|| config.gemini.base_url.clone())
        .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string());

    let openrouter_api_key = env("OPENROUTER_API_KEY")
        .or_else(|| config.openrouter.api_key.clone());
    let openrouter_base_url = env("OPENROUTER_BASE_URL")
        .or_else(|| config.openrouter.base_url.clone())
        .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string());

    let general = &config.general;
    let defaults = Limits::default();
    let limits = Limits {
        max_files: config.limits.max_files.unwrap_or(defaults.max_files),
        max_file_size_bytes: config
            .limits
            .max_file_size_mb
            .map(|mb| mb.saturating_mul(BYTES_PER_MB))
            .unwrap_or(defaults.max_file_size_bytes),
        max_draft_chars: config.limits.max_draft_chars.unwrap_or(defaults.max_draft_chars),
    };
    let thinking_defaults = ThinkingConfig::default();

    ResolvedConfig {
        provider,
        model_name,
        system_prompt,
        suggestions: general.suggestions.unwrap_or(true),
        search_grounding: general.search_grounding.unwrap_or(true),
        thinking: ThinkingConfig {
            budget: general.thinking_budget.unwrap_or(thinking_defaults.budget),
            include_thoughts: general
                .include_thoughts
                .unwrap_or(thinking_defaults.include_thoughts),
        },
        max_duration: Duration::from_secs(
            general.max_duration_secs.unwrap_or(DEFAULT_MAX_DURATION_SECS),
        ),
        limits,
        gemini_api_key,
        gemini_base_url,
        openrouter_api_key,
        openrouter_base_url,
    }
}

/// Lowercases a provider name and folds the hyphenated spelling of OpenRouter.
fn canonical_provider(name: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "open-router" => "openrouter".to_string(),
        other => other.to_string(),
    }
}

fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "openrouter" => DEFAULT_OPENROUTER_MODEL,
        _ => DEFAULT_GEMINI_MODEL,
    }
}

/// Resolves the system prompt: inline wins over file, both win over default.
fn resolve_system_prompt(config: &LumenConfig, dir: Option<&Path>) -> String {
    if let Some(ref prompt) = config.general.system_prompt {
        return prompt.clone();
    }

    // system_prompt_file is relative to ~/.lumen/
    if let (Some(file), Some(dir)) = (&config.general.system_prompt_file, dir) {
        let prompt_path = dir.join(file);
        match fs::read_to_string(&prompt_path) {
            Ok(contents) => {
                let trimmed = contents.trim().to_string();
                if !trimmed.is_empty() {
                    info!("Loaded system prompt from {}", prompt_path.display());
                    return trimmed;
                }
                warn!("System prompt file is empty: {}", prompt_path.display());
            }
            Err(e) => {
                warn!(
                    "Failed to read system prompt file {}: {}",
                    prompt_path.display(),
                    e
                );
            }
        }
    }

    DEFAULT_SYSTEM_PROMPT.to_string()
}
