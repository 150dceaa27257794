//! Environment-driven configuration
//!
//! Loads an optional `.env` file, then reads `PLANGUARD_*` variables.

use crate::error::ConfigError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_DEADLINE_SECS: u64 = 840;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 9000;
pub const DEFAULT_HOURS_PER_MONTH: f64 = 730.0;

/// How findings affect the run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enforcement {
    /// Always report `passed`; findings are informational
    #[default]
    Advisory,
    /// Report `failed` when a completed run produced a CRITICAL finding
    Mandatory,
}

impl Enforcement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Enforcement::Advisory => "advisory",
            Enforcement::Mandatory => "mandatory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "advisory" => Some(Enforcement::Advisory),
            "mandatory" => Some(Enforcement::Mandatory),
            _ => None,
        }
    }
}

/// Language backend settings; present only when a base URL is configured
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub guardrail_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub region: String,
    pub deadline: Duration,
    pub enforcement: Enforcement,
    pub max_segment_chars: usize,
    pub hours_per_month: f64,
    pub llm: Option<LlmConfig>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            deadline: Duration::from_secs(DEFAULT_DEADLINE_SECS),
            enforcement: Enforcement::Advisory,
            max_segment_chars: DEFAULT_MAX_SEGMENT_CHARS,
            hours_per_month: DEFAULT_HOURS_PER_MONTH,
            llm: None,
        }
    }
}

impl AnalyzerConfig {
    /// Build configuration from the process environment
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` when a numeric or enum variable cannot
    /// be parsed, or when an API key is set but fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_env();

        let region = non_empty_var("PLANGUARD_REGION")
            .or_else(|| non_empty_var("AWS_REGION"))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let deadline_secs: u64 = parse_var("PLANGUARD_DEADLINE_SECS", DEFAULT_DEADLINE_SECS)?;
        let max_segment_chars: usize =
            parse_var("PLANGUARD_MAX_SEGMENT_CHARS", DEFAULT_MAX_SEGMENT_CHARS)?;
        let hours_per_month: f64 = parse_var("PLANGUARD_HOURS_PER_MONTH", DEFAULT_HOURS_PER_MONTH)?;
        if hours_per_month <= 0.0 {
            return Err(invalid("PLANGUARD_HOURS_PER_MONTH", hours_per_month.to_string()));
        }

        let enforcement = match non_empty_var("PLANGUARD_ENFORCEMENT") {
            Some(raw) => Enforcement::from_str(&raw).ok_or_else(|| invalid("PLANGUARD_ENFORCEMENT", raw))?,
            None => Enforcement::default(),
        };

        let llm = match non_empty_var("PLANGUARD_LLM_API_BASE") {
            Some(api_base) => {
                let api_key = non_empty_var("PLANGUARD_LLM_API_KEY");
                if let Some(key) = &api_key {
                    validate_api_key(key)
                        .map_err(|_| invalid("PLANGUARD_LLM_API_KEY", format!("<{} chars>", key.len())))?;
                }
                Some(LlmConfig {
                    api_base,
                    api_key,
                    model: non_empty_var("PLANGUARD_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                    guardrail_id: non_empty_var("PLANGUARD_GUARDRAIL_ID"),
                })
            }
            None => None,
        };

        Ok(Self {
            region,
            deadline: Duration::from_secs(deadline_secs),
            enforcement,
            max_segment_chars,
            hours_per_month,
            llm,
        })
    }
}

/// Load variables from `.env` if one exists; a missing file is fine
pub fn load_env() {
    dotenv::dotenv().ok();
}

/// Validate API key format
///
/// Checks that the key is not empty and is at least 20 characters long.
///
/// # Arguments
/// * `key` - API key to validate
pub fn validate_api_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("API key cannot be empty".to_string());
    }
    if key.len() < 20 {
        return Err(format!(
            "API key appears invalid (too short). Expected >= 20 characters, got {}",
            key.len()
        ));
    }
    Ok(())
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| invalid(key, raw)),
        None => Ok(default),
    }
}

fn invalid(key: &str, value: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.into(),
    }
}
