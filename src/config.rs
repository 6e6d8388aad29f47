use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::errors::ConfigError;

pub const API_URL_VAR: &str = "NEXT_PUBLIC_API_URL";
pub const SUPABASE_URL_VAR: &str = "NEXT_PUBLIC_SUPABASE_URL";
pub const SUPABASE_ANON_KEY_VAR: &str = "NEXT_PUBLIC_SUPABASE_ANON_KEY";
pub const SUPABASE_SERVICE_KEY_VAR: &str = "SUPABASE_SERVICE_KEY";
pub const HTTP_TIMEOUT_VAR: &str = "RAISKET_HTTP_TIMEOUT_SECS";

/// Backend API base URL used when `NEXT_PUBLIC_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Where the chat client sends its requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
    timeout: Option<Duration>,
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: validate_url(API_URL_VAR, base_url)?,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the API settings through `lookup`, falling back to [`DEFAULT_API_URL`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(API_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(&base_url)?;
        config.timeout = timeout_from(&lookup)?;
        Ok(config)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: None,
        }
    }
}

/// Connection parameters for the hosted backend. Both the URL and the public
/// key are mandatory; there is no usable default for either.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    url: String,
    anon_key: String,
    service_key: Option<String>,
    timeout: Option<Duration>,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        let url = validate_url(SUPABASE_URL_VAR, url)?;
        if anon_key.trim().is_empty() {
            return Err(ConfigError::Empty { var: SUPABASE_ANON_KEY_VAR });
        }
        Ok(Self {
            url,
            anon_key: anon_key.trim().to_string(),
            service_key: None,
            timeout: None,
        })
    }

    /// Attaches a service-role key for the admin handle. Blank keys are ignored.
    pub fn with_service_key(mut self, service_key: impl Into<String>) -> Self {
        let key = service_key.into();
        self.service_key = (!key.trim().is_empty()).then(|| key.trim().to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let url = lookup(SUPABASE_URL_VAR).ok_or(ConfigError::Missing { var: SUPABASE_URL_VAR })?;
        let anon_key = lookup(SUPABASE_ANON_KEY_VAR)
            .ok_or(ConfigError::Missing { var: SUPABASE_ANON_KEY_VAR })?;

        let mut config = Self::new(&url, &anon_key)?;
        if let Some(service_key) = lookup(SUPABASE_SERVICE_KEY_VAR) {
            config = config.with_service_key(service_key);
        }
        config.timeout = timeout_from(&lookup)?;
        Ok(config)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    pub fn service_key(&self) -> Option<&str> {
        self.service_key.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

// Keys stay out of logs.
impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .field("service_key", &self.service_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Everything the process needs, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiConfig,
    pub supabase: SupabaseConfig,
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api: ApiConfig::from_lookup(&lookup)?,
            supabase: SupabaseConfig::from_lookup(&lookup)?,
        })
    }
}

fn validate_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty { var });
    }
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(trimmed.trim_end_matches('/').to_string())
        }
        _ => Err(ConfigError::InvalidUrl { var, value: trimmed.to_string() }),
    }
}

fn timeout_from(lookup: &impl Fn(&str) -> Option<String>) -> Result<Option<Duration>, ConfigError> {
    match lookup(HTTP_TIMEOUT_VAR) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| ConfigError::InvalidNumber { var: HTTP_TIMEOUT_VAR, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn api_url_defaults_to_localhost() {
        let config = ApiConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(config.base_url(), "http://localhost:8000/api/v1");
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn api_url_override_drops_trailing_slash() {
        let config =
            ApiConfig::from_lookup(env(&[(API_URL_VAR, "https://api.raisket.mx/api/v1/")])).unwrap();
        assert_eq!(config.base_url(), "https://api.raisket.mx/api/v1");
    }

    #[test]
    fn api_url_must_be_http() {
        let err = ApiConfig::new("ftp://example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { var: API_URL_VAR, .. }));
    }

    #[test]
    fn supabase_requires_url_and_key() {
        let err = SupabaseConfig::from_lookup(env(&[(SUPABASE_ANON_KEY_VAR, "anon")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing { var: SUPABASE_URL_VAR });

        let err = SupabaseConfig::from_lookup(env(&[(SUPABASE_URL_VAR, "https://x.supabase.co")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing { var: SUPABASE_ANON_KEY_VAR });
    }

    #[test]
    fn supabase_rejects_blank_values() {
        assert_eq!(
            SupabaseConfig::new("", "anon").unwrap_err(),
            ConfigError::Empty { var: SUPABASE_URL_VAR }
        );
        assert_eq!(
            SupabaseConfig::new("https://x.supabase.co", "  ").unwrap_err(),
            ConfigError::Empty { var: SUPABASE_ANON_KEY_VAR }
        );
    }

    #[test]
    fn service_key_is_optional_and_redacted() {
        let config = SupabaseConfig::from_lookup(env(&[
            (SUPABASE_URL_VAR, "https://x.supabase.co"),
            (SUPABASE_ANON_KEY_VAR, "anon-secret"),
            (SUPABASE_SERVICE_KEY_VAR, "service-secret"),
        ]))
        .unwrap();
        assert_eq!(config.service_key(), Some("service-secret"));

        let printed = format!("{config:?}");
        assert!(!printed.contains("anon-secret"));
        assert!(!printed.contains("service-secret"));
    }

    #[test]
    fn timeout_must_be_numeric() {
        let err = ApiConfig::from_lookup(env(&[(HTTP_TIMEOUT_VAR, "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let config = ApiConfig::from_lookup(env(&[(HTTP_TIMEOUT_VAR, "15")])).unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn settings_fail_fast_without_backend() {
        let err = Settings::from_lookup(env(&[(API_URL_VAR, "http://localhost:9000")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing { var: SUPABASE_URL_VAR });
    }
}
