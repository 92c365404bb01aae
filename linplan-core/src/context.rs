use std::fmt;

use anyhow::Context as _;
use url::Url;

use crate::constants::{DEFAULT_PAGE_SIZE, DEFAULT_TIMEOUT_SECS, LINEAR_API_URL, MAX_PAGE_SIZE};

/// Environment context packed in structure
#[derive(Clone)]
pub struct Context {
    // From LINEAR_API_KEY, personal API key sent as the Authorization header
    pub api_key: String,

    // From LINEAR_API_URL, default https://api.linear.app/graphql
    pub api_url: Url,

    // From LINEAR_PAGE_SIZE, issues requested per page, default 100
    pub page_size: u32,

    // From LINEAR_TIMEOUT, HTTP timeout in seconds, default 30
    pub timeout_secs: u64,

    // From LINEAR_DEBUG Debug level: 0-info, 1-debug, 2-trace, default 0
    pub debug: i32,

    // From LINEAR_CTXOUT output all context data (this struct), default false
    pub ctx_out: bool,
}

impl Default for Context {
    fn default() -> Self {
        Context {
            api_key: String::new(),
            // The constant is a valid absolute URL
            api_url: Url::parse(LINEAR_API_URL).expect("default Linear API URL"),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            debug: 0,
            ctx_out: false,
        }
    }
}

// The API key never goes to the logs
impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Context")
            .field("api_key", &api_key)
            .field("api_url", &self.api_url.as_str())
            .field("page_size", &self.page_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("debug", &self.debug)
            .field("ctx_out", &self.ctx_out)
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load context from environment variables, applying `.env` first when present
    pub fn from_env() -> anyhow::Result<Self> {
        // Variables already set in the environment win over `.env`
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load context through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ctx = Self::default();

        if let Some(api_key) = lookup("LINEAR_API_KEY") {
            ctx.api_key = api_key.trim().to_string();
        }

        if let Some(api_url) = lookup("LINEAR_API_URL") {
            ctx.api_url = Url::parse(api_url.trim())
                .with_context(|| format!("LINEAR_API_URL is not a valid URL: {}", api_url))?;
        }

        if let Some(page_size) = lookup("LINEAR_PAGE_SIZE") {
            ctx.page_size = page_size
                .trim()
                .parse::<u32>()
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE);
        }

        if let Some(timeout) = lookup("LINEAR_TIMEOUT") {
            ctx.timeout_secs = timeout.trim().parse().unwrap_or(DEFAULT_TIMEOUT_SECS);
        }

        if let Some(debug) = lookup("LINEAR_DEBUG") {
            ctx.debug = debug.trim().parse().unwrap_or(0);
        }

        ctx.ctx_out = lookup("LINEAR_CTXOUT").is_some();

        Ok(ctx)
    }

    /// Default tracing filter directive for the configured debug level
    pub fn log_level(&self) -> &'static str {
        match self.debug {
            i32::MIN..=0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let ctx = Context::from_lookup(lookup_from(&[])).unwrap();
        assert!(ctx.api_key.is_empty());
        assert_eq!(ctx.api_url.as_str(), LINEAR_API_URL);
        assert_eq!(ctx.page_size, 100);
        assert_eq!(ctx.timeout_secs, 30);
        assert_eq!(ctx.debug, 0);
        assert!(!ctx.ctx_out);
        assert_eq!(ctx.log_level(), "info");
    }

    #[test]
    fn test_overrides() {
        let ctx = Context::from_lookup(lookup_from(&[
            ("LINEAR_API_KEY", " lin_api_123 "),
            ("LINEAR_API_URL", "http://127.0.0.1:9999/graphql"),
            ("LINEAR_PAGE_SIZE", "50"),
            ("LINEAR_TIMEOUT", "5"),
            ("LINEAR_DEBUG", "2"),
            ("LINEAR_CTXOUT", "1"),
        ]))
        .unwrap();
        assert_eq!(ctx.api_key, "lin_api_123");
        assert_eq!(ctx.api_url.as_str(), "http://127.0.0.1:9999/graphql");
        assert_eq!(ctx.page_size, 50);
        assert_eq!(ctx.timeout_secs, 5);
        assert!(ctx.ctx_out);
        assert_eq!(ctx.log_level(), "trace");
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let ctx = Context::from_lookup(lookup_from(&[
            ("LINEAR_PAGE_SIZE", "lots"),
            ("LINEAR_TIMEOUT", "-1"),
            ("LINEAR_DEBUG", "verbose"),
        ]))
        .unwrap();
        assert_eq!(ctx.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(ctx.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(ctx.debug, 0);
    }

    #[test]
    fn test_page_size_is_clamped() {
        let ctx = Context::from_lookup(lookup_from(&[("LINEAR_PAGE_SIZE", "10000")])).unwrap();
        assert_eq!(ctx.page_size, MAX_PAGE_SIZE);
        let ctx = Context::from_lookup(lookup_from(&[("LINEAR_PAGE_SIZE", "0")])).unwrap();
        assert_eq!(ctx.page_size, 1);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let err = Context::from_lookup(lookup_from(&[("LINEAR_API_URL", "not a url")])).unwrap_err();
        assert!(err.to_string().contains("LINEAR_API_URL"));
    }

    #[test]
    fn test_debug_output_hides_key() {
        let ctx = Context::from_lookup(lookup_from(&[("LINEAR_API_KEY", "lin_api_secret")])).unwrap();
        let out = format!("{:?}", ctx);
        assert!(!out.contains("lin_api_secret"));
        assert!(out.contains("<redacted>"));
    }
}
