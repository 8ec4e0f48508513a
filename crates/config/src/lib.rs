//! Configuration loading, validation, and management for switchyard.
//!
//! Loads configuration from `$SWITCHYARD_CONFIG` (or `./switchyard.toml`)
//! after reading a `.env` file if one exists, then applies environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `switchyard.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Overall per-turn deadline in seconds.
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub delegation: DelegationConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_turn_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("turn_timeout_secs", &self.turn_timeout_secs)
            .field("server", &self.server)
            .field("classifier", &self.classifier)
            .field("context", &self.context)
            .field("delegation", &self.delegation)
            .field("session", &self.session)
            .field("logging", &self.logging)
            .finish()
    }
}

impl std::fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins. `["*"]` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_allowed_origins: default_cors_origins(),
        }
    }
}

/// The intent classifier (OpenAI-compatible chat completions endpoint).
#[derive(Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_classifier_url")]
    pub api_url: String,

    #[serde(default = "default_classifier_model")]
    pub model: String,

    #[serde(default = "default_classifier_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_classifier_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_classifier_model() -> String {
    "gpt-4o-mini".into()
}
fn default_classifier_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_tokens() -> u32 {
    4096
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_classifier_url(),
            model: default_classifier_model(),
            timeout_secs: default_classifier_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// The per-tenant business context lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_endpoint")]
    pub endpoint: String,

    /// Per-request timeout of the lookup.
    #[serde(default = "default_context_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_context_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_context_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Exhausted fetches per tenant before lookups are skipped.
    #[serde(default = "default_context_failure_threshold")]
    pub failure_threshold: u32,

    /// How long a tenant's failure count is remembered.
    #[serde(default = "default_context_failure_reset_secs")]
    pub failure_reset_secs: u64,

    #[serde(default = "default_context_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

fn default_context_endpoint() -> String {
    "https://api.example.com/tenant/context".into()
}
fn default_context_timeout_secs() -> u64 {
    10
}
fn default_context_cache_ttl_secs() -> u64 {
    3600
}
fn default_context_cache_max_entries() -> usize {
    500
}
fn default_context_failure_threshold() -> u32 {
    3
}
fn default_context_failure_reset_secs() -> u64 {
    300
}
fn default_context_max_retries() -> u32 {
    2
}
fn default_backoff_unit_ms() -> u64 {
    1000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            endpoint: default_context_endpoint(),
            timeout_secs: default_context_timeout_secs(),
            cache_ttl_secs: default_context_cache_ttl_secs(),
            cache_max_entries: default_context_cache_max_entries(),
            failure_threshold: default_context_failure_threshold(),
            failure_reset_secs: default_context_failure_reset_secs(),
            max_retries: default_context_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

impl ContextConfig {
    /// Outer guard around a whole fetch: the request timeout plus two seconds
    /// of headroom for the retry bookkeeping.
    pub fn outer_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs + 2)
    }
}

/// Which transport delegated turns use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokerMode {
    Local,
    #[default]
    Remote,
}

impl InvokerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvokerMode::Local => "local",
            InvokerMode::Remote => "remote",
        }
    }
}

impl std::str::FromStr for InvokerMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(InvokerMode::Local),
            "remote" | "mcp" => Ok(InvokerMode::Remote),
            other => Err(ConfigError::ValidationError(format!(
                "delegation.mode must be 'local' or 'remote', got '{other}'"
            ))),
        }
    }
}

/// Delegation to capabilities: breaker, retry, and endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    #[serde(default)]
    pub mode: InvokerMode,

    /// Per-attempt timeout of a capability call.
    #[serde(default = "default_delegation_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_delegation_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff (1, 2, 4, … units).
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,

    #[serde(default)]
    pub capabilities: CapabilityEndpoints,
}

fn default_delegation_timeout_secs() -> u64 {
    30
}
fn default_delegation_max_retries() -> u32 {
    3
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_reset_timeout_secs() -> u64 {
    60
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            mode: InvokerMode::default(),
            timeout_secs: default_delegation_timeout_secs(),
            max_retries: default_delegation_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
            capabilities: CapabilityEndpoints::default(),
        }
    }
}

/// Remote endpoints, one per capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEndpoints {
    #[serde(default = "default_sales_endpoint")]
    pub sales: EndpointConfig,

    #[serde(default = "default_appointment_endpoint")]
    pub appointment: EndpointConfig,

    #[serde(default = "default_booking_endpoint")]
    pub booking: EndpointConfig,
}

fn default_sales_endpoint() -> EndpointConfig {
    EndpointConfig::new("http://localhost:8001/mcp")
}
fn default_appointment_endpoint() -> EndpointConfig {
    EndpointConfig::new("http://localhost:8002/mcp")
}
fn default_booking_endpoint() -> EndpointConfig {
    EndpointConfig::new("http://localhost:8003/mcp")
}

impl Default for CapabilityEndpoints {
    fn default() -> Self {
        Self {
            sales: default_sales_endpoint(),
            appointment: default_appointment_endpoint(),
            booking: default_booking_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            enabled: true,
        }
    }

    /// Enabled and pointing somewhere.
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.url.trim().is_empty()
    }
}

/// Session memory bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session is forgotten.
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Turns kept per session.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_session_ttl_secs() -> u64 {
    7200
}
fn default_max_sessions() -> usize {
    10_000
}
fn default_max_turns() -> usize {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
            max_turns: default_max_turns(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default location.
    ///
    /// Order of precedence (highest first):
    /// 1. `SWITCHYARD_*` environment variables (and `OPENAI_API_KEY`)
    /// 2. the TOML file at `$SWITCHYARD_CONFIG` or `./switchyard.toml`
    /// 3. built-in defaults
    ///
    /// A `.env` file in the working directory or any parent is read first.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Path of the TOML file consulted by [`AppConfig::load`].
    pub fn config_path() -> PathBuf {
        std::env::var("SWITCHYARD_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("switchyard.toml"))
    }

    /// Apply overrides from a key lookup (the process environment in production).
    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, raw: String) -> Result<T, ConfigError> {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::EnvError {
                    key: key.to_string(),
                    value: raw,
                })
        }

        if let Some(v) = lookup("SWITCHYARD_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("SWITCHYARD_PORT") {
            self.server.port = parse("SWITCHYARD_PORT", v)?;
        }
        if let Some(v) = lookup("SWITCHYARD_CORS_ORIGINS") {
            self.server.cors_allowed_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(key) = lookup("SWITCHYARD_CLASSIFIER_API_KEY").or_else(|| lookup("OPENAI_API_KEY"))
        {
            self.classifier.api_key = Some(key);
        }
        if let Some(v) = lookup("SWITCHYARD_CLASSIFIER_URL") {
            self.classifier.api_url = v;
        }
        if let Some(v) = lookup("SWITCHYARD_CLASSIFIER_MODEL") {
            self.classifier.model = v;
        }
        if let Some(v) = lookup("SWITCHYARD_CLASSIFIER_TIMEOUT_SECS") {
            self.classifier.timeout_secs = parse("SWITCHYARD_CLASSIFIER_TIMEOUT_SECS", v)?;
        }

        if let Some(v) = lookup("SWITCHYARD_CONTEXT_ENDPOINT") {
            self.context.endpoint = v;
        }
        if let Some(v) = lookup("SWITCHYARD_CONTEXT_TIMEOUT_SECS") {
            self.context.timeout_secs = parse("SWITCHYARD_CONTEXT_TIMEOUT_SECS", v)?;
        }

        if let Some(v) = lookup("SWITCHYARD_INVOKER_MODE") {
            self.delegation.mode = v.parse()?;
        }
        if let Some(v) = lookup("SWITCHYARD_DELEGATION_TIMEOUT_SECS") {
            self.delegation.timeout_secs = parse("SWITCHYARD_DELEGATION_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("SWITCHYARD_DELEGATION_MAX_RETRIES") {
            self.delegation.max_retries = parse("SWITCHYARD_DELEGATION_MAX_RETRIES", v)?;
        }
        if let Some(v) = lookup("SWITCHYARD_BREAKER_FAILURE_THRESHOLD") {
            self.delegation.failure_threshold = parse("SWITCHYARD_BREAKER_FAILURE_THRESHOLD", v)?;
        }
        if let Some(v) = lookup("SWITCHYARD_BREAKER_RESET_TIMEOUT_SECS") {
            self.delegation.reset_timeout_secs =
                parse("SWITCHYARD_BREAKER_RESET_TIMEOUT_SECS", v)?;
        }
        for (key, endpoint) in [
            ("SWITCHYARD_SALES", &mut self.delegation.capabilities.sales),
            ("SWITCHYARD_APPOINTMENT", &mut self.delegation.capabilities.appointment),
            ("SWITCHYARD_BOOKING", &mut self.delegation.capabilities.booking),
        ] {
            if let Some(v) = lookup(&format!("{key}_URL")) {
                endpoint.url = v;
            }
            if let Some(v) = lookup(&format!("{key}_ENABLED")) {
                endpoint.enabled = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes");
            }
        }

        if let Some(v) = lookup("SWITCHYARD_TURN_TIMEOUT_SECS") {
            self.turn_timeout_secs = parse("SWITCHYARD_TURN_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = lookup("SWITCHYARD_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = lookup("SWITCHYARD_LOG_FORMAT") {
            self.logging.format = match v.trim().to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                _ => {
                    return Err(ConfigError::EnvError {
                        key: "SWITCHYARD_LOG_FORMAT".into(),
                        value: v,
                    });
                }
            };
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("turn_timeout_secs", self.turn_timeout_secs),
            ("classifier.timeout_secs", self.classifier.timeout_secs),
            ("context.timeout_secs", self.context.timeout_secs),
            ("context.cache_ttl_secs", self.context.cache_ttl_secs),
            ("context.failure_reset_secs", self.context.failure_reset_secs),
            ("delegation.timeout_secs", self.delegation.timeout_secs),
            ("delegation.reset_timeout_secs", self.delegation.reset_timeout_secs),
            ("session.ttl_secs", self.session.ttl_secs),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
            }
        }

        let counts = [
            ("context.cache_max_entries", self.context.cache_max_entries),
            ("context.failure_threshold", self.context.failure_threshold as usize),
            ("context.max_retries", self.context.max_retries as usize),
            ("delegation.max_retries", self.delegation.max_retries as usize),
            ("delegation.failure_threshold", self.delegation.failure_threshold as usize),
            ("session.max_sessions", self.session.max_sessions),
            ("session.max_turns", self.session.max_turns),
        ];
        for (name, value) in counts {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
            }
        }

        if !(0.0..=2.0).contains(&self.classifier.temperature) {
            return Err(ConfigError::ValidationError(
                "classifier.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.turn_timeout_secs <= self.context.outer_timeout().as_secs() {
            return Err(ConfigError::ValidationError(format!(
                "turn_timeout_secs ({}) must exceed the context fetch guard ({}s)",
                self.turn_timeout_secs,
                self.context.outer_timeout().as_secs()
            )));
        }

        if self.turn_timeout_secs <= self.classifier.timeout_secs + self.delegation.timeout_secs {
            tracing::warn!(
                turn_timeout_secs = self.turn_timeout_secs,
                classifier_timeout_secs = self.classifier.timeout_secs,
                delegation_timeout_secs = self.delegation.timeout_secs,
                "turn timeout is not larger than classifier + delegation timeouts; slow turns will time out"
            );
        }

        Ok(())
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_secs(self.turn_timeout_secs)
    }

    /// Check if a classifier API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.classifier.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }

    /// Effective configuration as TOML, with secrets replaced.
    pub fn redacted_toml(&self) -> String {
        let mut copy = self.clone();
        if copy.classifier.api_key.is_some() {
            copy.classifier.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&copy).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: default_turn_timeout_secs(),
            server: ServerConfig::default(),
            classifier: ClassifierConfig::default(),
            context: ContextConfig::default(),
            delegation: DelegationConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value for environment variable {key}: '{value}'")]
    EnvError { key: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.session.max_turns, 10);
        assert_eq!(config.delegation.mode, InvokerMode::Remote);
        assert_eq!(config.context.outer_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.delegation.failure_threshold, 5);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
turn_timeout_secs = 90

[delegation]
mode = "local"
max_retries = 2

[delegation.capabilities.booking]
url = ""
enabled = false
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.turn_timeout_secs, 90);
        assert_eq!(config.delegation.mode, InvokerMode::Local);
        assert_eq!(config.delegation.max_retries, 2);
        assert_eq!(config.delegation.reset_timeout_secs, 60);
        assert!(!config.delegation.capabilities.booking.is_usable());
        assert!(config.delegation.capabilities.sales.is_usable());
        assert_eq!(config.context.cache_max_entries, 500);
    }

    #[test]
    fn zero_retries_rejected() {
        let mut config = AppConfig::default();
        config.delegation.max_retries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn turn_timeout_must_exceed_context_guard() {
        let config = AppConfig {
            turn_timeout_secs: 12,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/switchyard.toml")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn load_from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchyard.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9001\n\n[session]\nmax_turns = 4\n",
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.session.max_turns, 4);
        assert_eq!(config.session.ttl_secs, 7200);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("switchyard.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("SWITCHYARD_PORT", "9100"),
                ("OPENAI_API_KEY", "sk-test"),
                ("SWITCHYARD_INVOKER_MODE", "local"),
                ("SWITCHYARD_BOOKING_ENABLED", "false"),
                ("SWITCHYARD_CORS_ORIGINS", "https://a.example, https://b.example"),
                ("SWITCHYARD_LOG_FORMAT", "json"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.classifier.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.delegation.mode, InvokerMode::Local);
        assert!(!config.delegation.capabilities.booking.enabled);
        assert_eq!(config.server.cors_allowed_origins.len(), 2);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn bad_env_value_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("SWITCHYARD_PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("SWITCHYARD_PORT"));
    }

    #[test]
    fn debug_and_toml_redact_api_key() {
        let mut config = AppConfig::default();
        config.classifier.api_key = Some("sk-secret".into());
        assert!(!format!("{config:?}").contains("sk-secret"));
        assert!(!config.redacted_toml().contains("sk-secret"));
        assert!(config.has_api_key());
    }
}
