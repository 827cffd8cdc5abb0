use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::constants;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("API key not found. Make sure ANTHROPIC_API_KEY is set in .env.local")]
    MissingApiKey,
    #[error("Supabase URL or anon key is missing. Set SUPABASE_URL and SUPABASE_ANON_KEY")]
    MissingBackend,
}

/// Settings for the Claude Messages API.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
}

impl ClaudeConfig {
    pub fn api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }
}

impl Default for ClaudeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: constants::ANTHROPIC_API_URL.clone(),
            model: constants::CLAUDE_MODEL.clone(),
            max_tokens: *constants::CLAUDE_MAX_TOKENS,
        }
    }
}

/// Settings for the Supabase auth backend. Both values are required for any
/// auth call; either one missing leaves the app usable but signed out.
#[derive(Debug, Clone, Default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl SupabaseConfig {
    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.anon_key.is_some()
    }

    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        match (self.url.as_deref(), self.anon_key.as_deref()) {
            (Some(url), Some(key)) => Ok((url.trim_end_matches('/'), key)),
            _ => Err(ConfigError::MissingBackend),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub claude: ClaudeConfig,
    pub supabase: SupabaseConfig,
    pub session_file: Option<PathBuf>,
}

/// Loads `.env.local` and then `.env` into the process environment. Values
/// already set win, so the first file to define a key decides it.
pub fn load_env_files() {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(*name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let api_key = first(constants::API_KEY_VARS);
        if api_key.is_none() {
            info!("Claude API key not found in environment");
        }

        let supabase = SupabaseConfig {
            url: first(constants::SUPABASE_URL_VARS),
            anon_key: first(constants::SUPABASE_ANON_KEY_VARS),
        };
        if !supabase.is_configured() {
            info!("Supabase URL or anon key is missing; auth is disabled");
        }

        let session_file = first(&[constants::SESSION_FILE_VAR][..])
            .map(PathBuf::from)
            .or_else(|| {
                first(&["HOME"][..])
                    .map(|home| PathBuf::from(home).join(".promptviz").join("session.json"))
            });

        Self {
            claude: ClaudeConfig {
                api_key,
                ..ClaudeConfig::default()
            },
            supabase,
            session_file,
        }
    }
}
