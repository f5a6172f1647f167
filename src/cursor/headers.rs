use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::config::Config;
use crate::errors::AppError;

pub const CLIENT_USER_AGENT: &str = "connect-es/1.6.1";
pub const ENVELOPE_CONTENT_TYPE: &str = "application/connect+proto";

const CONNECT_ACCEPT_ENCODING: &str = "connect-accept-encoding";
const CONNECT_PROTOCOL_VERSION: &str = "connect-protocol-version";
const AMZN_TRACE_ID: &str = "x-amzn-trace-id";
const CLIENT_VERSION: &str = "x-cursor-client-version";
const TIMEZONE: &str = "x-cursor-timezone";
const GHOST_MODE: &str = "x-ghost-mode";
const REQUEST_ID: &str = "x-request-id";
const CLIENT_KEY: &str = "x-client-key";
const CHECKSUM: &str = "x-cursor-checksum";

/// Headers for one StreamChat call. Fails before any I/O when no bearer
/// credential is configured.
pub fn build_headers(config: &Config, trace_id: &str) -> Result<HeaderMap, AppError> {
    if !config.has_cursor_token() {
        return Err(AppError::MissingCredential);
    }

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    headers.insert(AUTHORIZATION, value(&format!("Bearer {}", config.cursor_token))?);
    insert(&mut headers, CONNECT_ACCEPT_ENCODING, "gzip,br")?;
    insert(&mut headers, CONNECT_PROTOCOL_VERSION, "1")?;
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(ENVELOPE_CONTENT_TYPE));
    insert(&mut headers, AMZN_TRACE_ID, &format!("Root={trace_id}"))?;
    insert(&mut headers, CLIENT_VERSION, &config.cursor_version)?;
    insert(&mut headers, TIMEZONE, &config.cursor_timezone)?;
    insert(&mut headers, GHOST_MODE, if config.cursor_ghost_mode { "true" } else { "false" })?;
    insert(&mut headers, REQUEST_ID, trace_id)?;

    if !config.cursor_client_key.is_empty() {
        insert(&mut headers, CLIENT_KEY, &config.cursor_client_key)?;
    }
    if !config.cursor_checksum.is_empty() {
        insert(&mut headers, CHECKSUM, &config.cursor_checksum)?;
    }

    Ok(headers)
}

fn insert(headers: &mut HeaderMap, name: &'static str, raw: &str) -> Result<(), AppError> {
    headers.insert(HeaderName::from_static(name), value(raw)?);
    Ok(())
}

fn value(raw: &str) -> Result<HeaderValue, AppError> {
    HeaderValue::from_str(raw)
        .map_err(|_| AppError::Unexpected("configured header value contains invalid characters".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::config_for;

    fn get<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn required_headers_are_present() {
        let config = config_for("http://localhost", "tok");
        let headers = build_headers(&config, "trace-1").unwrap();

        assert_eq!(get(&headers, "authorization"), Some("Bearer tok"));
        assert_eq!(get(&headers, "connect-protocol-version"), Some("1"));
        assert_eq!(get(&headers, "content-type"), Some(ENVELOPE_CONTENT_TYPE));
        assert_eq!(get(&headers, "x-cursor-client-version"), Some("0.48.6"));
        assert_eq!(get(&headers, "x-cursor-timezone"), Some("Asia/Shanghai"));
        assert_eq!(get(&headers, "x-ghost-mode"), Some("true"));
        assert_eq!(get(&headers, "x-request-id"), Some("trace-1"));
        assert_eq!(get(&headers, "x-amzn-trace-id"), Some("Root=trace-1"));
        assert!(headers.get("x-client-key").is_none());
        assert!(headers.get("x-cursor-checksum").is_none());
    }

    #[test]
    fn optional_headers_follow_config() {
        let mut config = config_for("http://localhost", "tok");
        config.cursor_client_key = "ck".into();
        config.cursor_checksum = "sum".into();
        config.cursor_ghost_mode = false;
        let headers = build_headers(&config, "t").unwrap();

        assert_eq!(get(&headers, "x-client-key"), Some("ck"));
        assert_eq!(get(&headers, "x-cursor-checksum"), Some("sum"));
        assert_eq!(get(&headers, "x-ghost-mode"), Some("false"));
    }

    #[test]
    fn missing_token_is_rejected() {
        let config = config_for("http://localhost", "");
        assert!(matches!(
            build_headers(&config, "t"),
            Err(AppError::MissingCredential)
        ));
    }

    #[test]
    fn control_characters_in_token_are_rejected() {
        let config = config_for("http://localhost", "bad\ntoken");
        assert!(matches!(build_headers(&config, "t"), Err(AppError::Unexpected(_))));
    }
}
