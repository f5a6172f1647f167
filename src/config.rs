use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

const DEFAULT_MODELS: &str =
    "gpt-4o,claude-3.5-sonnet,claude-3.5-haiku,claude-4-sonnet,gpt-4-turbo,deepseek-r1,gemini-2.5-pro";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid port: {0}")]
    InvalidPort(u32),

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
}

/// Runtime configuration, read once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub debug: bool,

    /// Key inbound callers must present.
    pub api_key: String,
    pub models: Vec<String>,
    /// Appended to every system turn when non-empty.
    pub system_prompt_inject: String,
    pub timeout: Duration,
    /// Character budget for conversation history.
    pub max_input_length: usize,

    pub cursor_api_url: String,
    /// Bearer credential, already normalized by [`clean_token`].
    pub cursor_token: String,
    pub cursor_client_key: String,
    pub cursor_checksum: String,
    pub cursor_version: String,
    pub cursor_timezone: String,
    pub cursor_ghost_mode: bool,
    pub cursor_working_dir: String,
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port: u32 = parse_or(&get, "PORT", 8002);
        let timeout_secs: u64 = parse_or(&get, "TIMEOUT", 120);
        let max_input_length: usize = parse_or(&get, "MAX_INPUT_LENGTH", 200_000);

        let config = Config {
            port: u16::try_from(port)
                .ok()
                .filter(|p| *p != 0)
                .ok_or(ConfigError::InvalidPort(port))?,
            debug: parse_or(&get, "DEBUG", false),
            api_key: string("API_KEY", "sk-cursor2api"),
            models: split_models(&string("MODELS", DEFAULT_MODELS)),
            system_prompt_inject: string("SYSTEM_PROMPT_INJECT", ""),
            timeout: Duration::from_secs(timeout_secs),
            max_input_length,
            cursor_api_url: string("CURSOR_API_URL", "https://api2.cursor.sh"),
            cursor_token: clean_token(&string("CURSOR_TOKEN", "")),
            cursor_client_key: string("CURSOR_CLIENT_KEY", ""),
            cursor_checksum: string("CURSOR_CHECKSUM", ""),
            cursor_version: string("CURSOR_VERSION", "0.48.6"),
            cursor_timezone: string("CURSOR_TIMEZONE", "Asia/Shanghai"),
            cursor_ghost_mode: parse_or(&get, "CURSOR_GHOST_MODE", true),
            cursor_working_dir: string("CURSOR_WORKING_DIR", "/c:/Users/Default"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::NotPositive { field: "TIMEOUT" });
        }
        if self.max_input_length == 0 {
            return Err(ConfigError::NotPositive { field: "MAX_INPUT_LENGTH" });
        }
        if self.cursor_token.is_empty() {
            warn!("CURSOR_TOKEN is not set; chat requests will be rejected until it is provided");
        }
        Ok(())
    }

    pub fn has_cursor_token(&self) -> bool {
        !self.cursor_token.is_empty()
    }

    /// One-line summary safe for logs.
    pub fn redacted_summary(&self) -> String {
        format!(
            "port={} debug={} models={} timeout={}s max_input_length={} cursor_api_url={} \
             cursor_token={} cursor_client_key={} cursor_checksum={} cursor_version={}",
            self.port,
            self.debug,
            self.models.len(),
            self.timeout.as_secs(),
            self.max_input_length,
            self.cursor_api_url,
            mask_secret(&self.cursor_token),
            mask_secret(&self.cursor_client_key),
            mask_secret(&self.cursor_checksum),
            self.cursor_version,
        )
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value for {key}: {raw}, using default: {default}");
            default
        }),
    }
}

fn split_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extracts the usable bearer credential from a pasted session token.
///
/// Session cookies look like `user_XXXX%3A%3A<token>` or `user_XXXX::<token>`;
/// only the part after the last separator is the credential.
pub fn clean_token(raw: &str) -> String {
    let mut token = raw.trim();
    for separator in ["%3A%3A", "::"] {
        if let Some((_, tail)) = token.rsplit_once(separator) {
            token = tail;
        }
    }
    token.trim().to_string()
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    if secret.len() <= 16 || !secret.is_ascii() {
        return "***".to_string();
    }
    format!("{}...{}", &secret[..8], &secret[secret.len() - 4..])
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 8002);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.max_input_length, 200_000);
        assert_eq!(config.cursor_api_url, "https://api2.cursor.sh");
        assert!(config.cursor_ghost_mode);
        assert_eq!(config.cursor_working_dir, "/c:/Users/Default");
        assert_eq!(config.models.first().map(String::as_str), Some("gpt-4o"));
        assert!(!config.has_cursor_token());
    }

    #[test]
    fn overrides_and_model_list_trimming() {
        let config = load(&[
            ("PORT", "9000"),
            ("MODELS", " a , ,b,"),
            ("CURSOR_GHOST_MODE", "false"),
            ("CURSOR_TOKEN", "user_01%3A%3Aeyj.token"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.models, vec!["a".to_string(), "b".to_string()]);
        assert!(!config.cursor_ghost_mode);
        assert_eq!(config.cursor_token, "eyj.token");
    }

    #[test]
    fn unparseable_values_fall_back_to_defaults() {
        let config = load(&[("TIMEOUT", "soon"), ("DEBUG", "maybe")]).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(!config.debug);
    }

    #[test]
    fn validation_errors() {
        assert_eq!(load(&[("PORT", "70000")]).unwrap_err(), ConfigError::InvalidPort(70000));
        assert_eq!(load(&[("PORT", "0")]).unwrap_err(), ConfigError::InvalidPort(0));
        assert_eq!(
            load(&[("TIMEOUT", "0")]).unwrap_err(),
            ConfigError::NotPositive { field: "TIMEOUT" }
        );
        assert_eq!(
            load(&[("MAX_INPUT_LENGTH", "0")]).unwrap_err(),
            ConfigError::NotPositive { field: "MAX_INPUT_LENGTH" }
        );
    }

    #[test]
    fn clean_token_takes_text_after_last_separator() {
        assert_eq!(clean_token("  plain  "), "plain");
        assert_eq!(clean_token("user_1::abc"), "abc");
        assert_eq!(clean_token("user_1%3A%3Aabc"), "abc");
        assert_eq!(clean_token("a::b::c"), "c");
        assert_eq!(clean_token("a%3A%3Ab::c"), "c");
        assert_eq!(clean_token(""), "");
    }

    #[test]
    fn summary_never_contains_raw_secrets() {
        let config = load(&[("CURSOR_TOKEN", "abcdefghijklmnopqrstuvwxyz")]).unwrap();
        let summary = config.redacted_summary();
        assert!(!summary.contains("abcdefghijklmnopqrstuvwxyz"));
        assert!(summary.contains("abcdefgh...wxyz"));
    }
}
