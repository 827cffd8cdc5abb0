// Defaults for the Claude request, overridable from the environment.

use std::env;

lazy_static::lazy_static! {
    pub static ref ANTHROPIC_API_URL: String = env::var("ANTHROPIC_API_URL").unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string());
    pub static ref CLAUDE_MODEL: String = env::var("CLAUDE_MODEL").unwrap_or_else(|_| "claude-3-haiku-20240307".to_string());
    pub static ref CLAUDE_MAX_TOKENS: u32 = env::var("CLAUDE_MAX_TOKENS")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(4000);
}

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant that provides information in JSON format only. \
No explanations or markdown. Always include a 'citation' field in your JSON response with source information \
when providing factual information. The citation should include source title, author (if available), \
publication date (if available), and URL (if available).";

pub const JSON_INSTRUCTION: &str = "Please format your response as valid JSON only. No markdown, no explanations. \
Always include a \"citation\" field with source information when applicable.";

pub const NON_JSON_NOTE: &str = "Claude returned non-JSON data that couldn't be parsed";

// Environment keys, newest name first. The EXPO_PUBLIC_ names are what the
// mobile build shipped with and are still honoured.
pub const API_KEY_VARS: &[&str] = &["ANTHROPIC_API_KEY", "EXPO_PUBLIC_ANTHROPIC_API_KEY"];
pub const SUPABASE_URL_VARS: &[&str] = &["SUPABASE_URL", "EXPO_PUBLIC_SUPABASE_URL"];
pub const SUPABASE_ANON_KEY_VARS: &[&str] = &["SUPABASE_ANON_KEY", "EXPO_PUBLIC_SUPABASE_ANON_KEY"];
pub const SESSION_FILE_VAR: &str = "PROMPTVIZ_SESSION_FILE";
