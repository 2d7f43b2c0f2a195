//! Service configuration.
//!
//! Values come from three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. a YAML file, from `--config <path>` or `BEVERAGE_CONFIG`
//! 3. environment variables (`.env` is loaded first)
//!
//! # Example
//!
//! ```yaml
//! environment: production
//! server:
//!   port: 8080
//! kafka:
//!   brokers: ["redpanda-0:9092", "redpanda-1:9092"]
//!   group_id: beverage-inventor
//! ai_providers:
//!   - name: anthropic
//!     api_key: sk-...
//! resilience:
//!   profiles:
//!     ai_provider:
//!       timeout_ms: 90000
//! ```

use beverage_inventor_collaborators::llm::LlmSettings;
use beverage_inventor_core::{DependencyKind, InventorError};
use beverage_inventor_pipeline::PipelineConfig;
use beverage_inventor_redpanda::dispatch::{DEFAULT_INGREDIENT_TOPIC, DEFAULT_RECIPE_TOPIC};
use beverage_inventor_redpanda::producer::DEFAULT_OUTPUT_TOPIC;
use beverage_inventor_redpanda::{KafkaSecurity, Topics};
use beverage_inventor_resilience::{ProfileOverride, ResilienceProfile, ResilienceRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "BEVERAGE_CONFIG";

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML for this schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value is out of range or missing
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// `CONFIG_ENV` names no known environment
    #[error("unknown environment {0:?}, expected development, staging or production")]
    InvalidEnvironment(String),
}

impl From<ConfigError> for InventorError {
    fn from(err: ConfigError) -> Self {
        Self::invalid_request("config.load", err.to_string())
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Pre-production
    Staging,
    /// Production
    Production,
}

impl Environment {
    /// Name as written in configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Deployment environment
    pub environment: Environment,
    /// HTTP and metrics listeners
    pub server: ServerConfig,
    /// Redpanda connection, topics and consumer tuning
    pub kafka: KafkaConfig,
    /// LLM providers; the first enabled one with a key is used
    pub ai_providers: Vec<AiProviderConfig>,
    /// Beverage storage
    pub database: DatabaseConfig,
    /// Task manager and notifier endpoints
    pub external_services: ExternalServicesConfig,
    /// Log level and format
    pub logging: LoggingConfig,
    /// Pipeline policy
    pub pipeline: PipelineConfig,
    /// Profile overrides and per-operation timeouts
    pub resilience: ResilienceConfig,
    /// Refuse to start when the brokers cannot be reached
    pub strict_boot: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
    /// Port of the dedicated metrics listener
    pub metrics_port: u16,
    /// Time allowed for in-flight work after a shutdown signal
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            metrics_enabled: true,
            metrics_port: 9090,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// HTTP listener address.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] if `host` is not an IP address.
    pub fn http_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.addr(self.port)
    }

    /// Metrics listener address.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] if `host` is not an IP address.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.addr(self.metrics_port)
    }

    /// Graceful shutdown budget.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    fn addr(&self, port: u16) -> Result<SocketAddr, ConfigError> {
        format!("{}:{port}", self.host)
            .parse()
            .map_err(|e| ConfigError::Validation(format!("server.host {:?}: {e}", self.host)))
    }
}

/// Topic names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Inbound recipe requests
    pub recipe_requests: String,
    /// Inbound ingredient discoveries
    pub ingredient_discovered: String,
    /// Outbound beverage events
    pub beverage_events: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            recipe_requests: DEFAULT_RECIPE_TOPIC.to_string(),
            ingredient_discovered: DEFAULT_INGREDIENT_TOPIC.to_string(),
            beverage_events: DEFAULT_OUTPUT_TOPIC.to_string(),
        }
    }
}

impl TopicsConfig {
    /// The inbound pair the consumer subscribes to.
    #[must_use]
    pub fn inbound(&self) -> Topics {
        Topics {
            recipe_requests: self.recipe_requests.clone(),
            ingredient_discovered: self.ingredient_discovered.clone(),
        }
    }
}

/// Redpanda settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// Consumer group id
    pub group_id: String,
    /// Topic names
    pub topics: TopicsConfig,
    /// `earliest` or `latest`
    pub auto_offset_reset: String,
    /// Producer `acks`
    pub producer_acks: String,
    /// Producer linger
    pub batch_timeout_ms: u64,
    /// Producer compression codec
    pub compression: String,
    /// Consumer group session timeout
    pub session_timeout_ms: u64,
    /// Messages buffered per partition
    pub queue_capacity: usize,
    /// Pause before a failed message is dispatched again
    pub redelivery_delay_ms: u64,
    /// Broker probe budget at boot
    pub connect_timeout_ms: u64,
    /// TLS / SASL
    pub security: KafkaSecurity,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            group_id: "beverage-inventor".to_string(),
            topics: TopicsConfig::default(),
            auto_offset_reset: "latest".to_string(),
            producer_acks: "all".to_string(),
            batch_timeout_ms: 10,
            compression: "none".to_string(),
            session_timeout_ms: 6_000,
            queue_capacity: 100,
            redelivery_delay_ms: 5_000,
            connect_timeout_ms: 10_000,
            security: KafkaSecurity::default(),
        }
    }
}

impl KafkaConfig {
    /// Brokers joined for librdkafka's `bootstrap.servers`.
    #[must_use]
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    fn validate(&self) -> Result<(), String> {
        if self.brokers.iter().all(|b| b.trim().is_empty()) {
            return Err("kafka.brokers needs at least one broker".to_string());
        }
        if self.group_id.trim().is_empty() {
            return Err("kafka.group_id is empty".to_string());
        }
        let topics = &self.topics;
        for (field, value) in [
            ("recipe_requests", &topics.recipe_requests),
            ("ingredient_discovered", &topics.ingredient_discovered),
            ("beverage_events", &topics.beverage_events),
        ] {
            if value.trim().is_empty() {
                return Err(format!("kafka.topics.{field} is empty"));
            }
        }
        if !matches!(self.auto_offset_reset.as_str(), "earliest" | "latest") {
            return Err(format!(
                "kafka.auto_offset_reset must be earliest or latest, got {:?}",
                self.auto_offset_reset
            ));
        }
        if self.queue_capacity == 0 {
            return Err("kafka.queue_capacity must be positive".to_string());
        }
        Ok(())
    }
}

/// One LLM provider.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AiProviderConfig {
    /// Display name
    pub name: String,
    /// Whether the provider may be used
    pub enabled: bool,
    /// Endpoint, key and sampling
    #[serde(flatten)]
    pub settings: LlmSettings,
}

impl Default for AiProviderConfig {
    fn default() -> Self {
        Self {
            name: "anthropic".to_string(),
            enabled: true,
            settings: LlmSettings::default(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Storage backend; only `memory` is built in
    pub backend: String,
    /// Timeout of lookups and listings
    pub query_timeout_ms: u64,
    /// Timeout of saves
    pub write_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            query_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
        }
    }
}

/// Endpoints of downstream collaborators. Unset endpoints fall back to
/// logging stand-ins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExternalServicesConfig {
    /// Task manager base URL
    pub task_api_url: Option<String>,
    /// Task manager bearer token
    pub task_api_token: Option<String>,
    /// Slack incoming webhook
    pub slack_webhook_url: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line, human oriented
    #[default]
    Pretty,
    /// Single line, human oriented
    Compact,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(ConfigError::Validation(format!(
                "logging.format must be json, pretty or compact, got {other:?}"
            ))),
        }
    }
}

/// Logging settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `beverage_inventor=debug`
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Resilience overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Per-kind overrides of the built-in profiles
    pub profiles: BTreeMap<DependencyKind, ProfileOverride>,
    /// Per-operation timeouts, e.g. `ai.generate_recipe: 90000`
    pub operation_timeouts_ms: BTreeMap<String, u64>,
}

impl ResilienceConfig {
    /// Built-in profiles with the overrides applied.
    #[must_use]
    pub fn profiles(&self) -> Vec<(DependencyKind, ResilienceProfile)> {
        DependencyKind::ALL
            .into_iter()
            .map(|kind| {
                let base = ResilienceProfile::for_kind(kind);
                let profile = match self.profiles.get(&kind) {
                    Some(overrides) => base.with_overrides(overrides),
                    None => base,
                };
                (kind, profile)
            })
            .collect()
    }

    fn validate(&self) -> Result<(), String> {
        for (kind, profile) in self.profiles() {
            profile
                .validate()
                .map_err(|e| format!("resilience.profiles.{kind}: {e}"))?;
        }
        if let Some((operation, _)) = self.operation_timeouts_ms.iter().find(|(_, ms)| **ms == 0) {
            return Err(format!("resilience.operation_timeouts_ms.{operation} must be positive"));
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// Load defaults, then `path` if given, then the process environment, and validate.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse a YAML document. An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`].
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] for unparsable numbers or booleans,
    /// [`ConfigError::InvalidEnvironment`] for an unknown `CONFIG_ENV`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(env) = get("CONFIG_ENV") {
            self.environment = env.parse()?;
        }
        if let Some(brokers) = get("KAFKA_BROKERS") {
            self.kafka.brokers = brokers
                .split(',')
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(group_id) = get("KAFKA_GROUP_ID") {
            self.kafka.group_id = group_id;
        }
        if let Some(topic) = get("KAFKA_RECIPE_TOPIC") {
            self.kafka.topics.recipe_requests = topic;
        }
        if let Some(topic) = get("KAFKA_INGREDIENT_TOPIC") {
            self.kafka.topics.ingredient_discovered = topic;
        }
        if let Some(topic) = get("KAFKA_OUTPUT_TOPIC") {
            self.kafka.topics.beverage_events = topic;
        }
        if let Some(host) = get("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("SERVER_PORT") {
            self.server.port = parse_var("SERVER_PORT", &port)?;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        let api_key = get("LLM_API_KEY");
        let endpoint = get("LLM_ENDPOINT");
        if api_key.is_some() || endpoint.is_some() {
            if self.ai_providers.is_empty() {
                self.ai_providers.push(AiProviderConfig::default());
            }
            if let Some(provider) = self.ai_providers.first_mut() {
                if let Some(key) = api_key {
                    provider.settings.api_key = key;
                }
                if let Some(url) = endpoint {
                    provider.settings.api_url = url;
                }
            }
        }
        if let Some(url) = get("TASK_API_URL") {
            self.external_services.task_api_url = Some(url);
        }
        if let Some(token) = get("TASK_API_TOKEN") {
            self.external_services.task_api_token = Some(token);
        }
        if let Some(url) = get("SLACK_WEBHOOK_URL") {
            self.external_services.slack_webhook_url = Some(url);
        }
        if let Some(strict) = get("STRICT_BOOT") {
            self.strict_boot = parse_var("STRICT_BOOT", &strict)?;
        }
        Ok(())
    }

    /// Check every section.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".to_string()));
        }
        if self.server.metrics_enabled && self.server.metrics_port == self.server.port {
            return Err(ConfigError::Validation(
                "server.metrics_port must differ from server.port".to_string(),
            ));
        }
        self.server.http_addr()?;
        self.kafka.validate().map_err(ConfigError::Validation)?;
        if self.database.backend != "memory" {
            return Err(ConfigError::Validation(format!(
                "database.backend {:?} is not supported, use memory",
                self.database.backend
            )));
        }
        if self.database.query_timeout_ms == 0 || self.database.write_timeout_ms == 0 {
            return Err(ConfigError::Validation("database timeouts must be positive".to_string()));
        }
        if self.external_services.task_api_url.is_some()
            && self.external_services.task_api_token.is_none()
        {
            return Err(ConfigError::Validation(
                "external_services.task_api_token is required with task_api_url".to_string(),
            ));
        }
        self.pipeline.validate().map_err(ConfigError::Validation)?;
        self.resilience.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }

    /// The first enabled provider that has a key.
    #[must_use]
    pub fn ai_provider(&self) -> Option<&AiProviderConfig> {
        self.ai_providers
            .iter()
            .find(|p| p.enabled && !p.settings.api_key.trim().is_empty())
    }

    /// Resilience registry for this configuration.
    ///
    /// Repository lookups get the database query timeout and saves the
    /// write timeout; explicit per-operation timeouts win over both.
    #[must_use]
    pub fn registry(&self) -> ResilienceRegistry {
        let registry = ResilienceRegistry::with_profiles(self.resilience.profiles());
        let query = Duration::from_millis(self.database.query_timeout_ms);
        registry.set_operation_timeout("repository.find_by_id", query);
        registry.set_operation_timeout("repository.list", query);
        registry.set_operation_timeout(
            "repository.save",
            Duration::from_millis(self.database.write_timeout_ms),
        );
        for (operation, ms) in &self.resilience.operation_timeouts_ms {
            registry.set_operation_timeout(operation.clone(), Duration::from_millis(*ms));
        }
        registry
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Validation(format!("{key}={value:?}: {e}")))
}

/// Configuration path from `--config <path>`, `--config=<path>` or
/// [`CONFIG_PATH_VAR`].
pub fn config_path(
    args: impl IntoIterator<Item = String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<PathBuf> {
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    lookup(CONFIG_PATH_VAR)
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kafka.topics.recipe_requests, "recipe.requests");
        assert_eq!(config.kafka.topics.ingredient_discovered, "ingredient.discovered");
        assert_eq!(config.kafka.topics.beverage_events, "beverage.events");
        assert_eq!(config.server.port, 8080);
        assert!(!config.strict_boot);
    }

    #[test]
    fn test_empty_document_is_defaults() {
        let config = ServiceConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.kafka.group_id, "beverage-inventor");
    }

    #[test]
    fn test_yaml_sections() {
        let config = ServiceConfig::from_yaml(
            r"
environment: production
server:
  port: 9000
kafka:
  brokers: [a:9092, b:9092]
  group_id: inventors
  topics:
    recipe_requests: in.recipes
  security:
    protocol: sasl_ssl
    username: svc
ai_providers:
  - name: primary
    api_key: sk-test
    model: small
  - name: backup
    enabled: false
logging:
  format: json
pipeline:
  adoption_threshold: 80
resilience:
  profiles:
    ai_provider:
      timeout_ms: 90000
      max_attempts: 2
  operation_timeouts_ms:
    ai.generate_recipe: 60000
",
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.kafka.bootstrap_servers(), "a:9092,b:9092");
        assert_eq!(config.kafka.topics.recipe_requests, "in.recipes");
        assert_eq!(config.kafka.topics.beverage_events, "beverage.events");
        assert_eq!(config.kafka.security.username.as_deref(), Some("svc"));
        assert_eq!(config.ai_providers.len(), 2);
        assert_eq!(config.ai_providers[0].settings.model, "small");
        assert!(!config.ai_providers[1].enabled);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!((config.pipeline.adoption_threshold - 80.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());

        let profiles = config.resilience.profiles();
        let (_, ai) = profiles
            .iter()
            .find(|(kind, _)| *kind == DependencyKind::AiProvider)
            .unwrap();
        assert_eq!(ai.timeout, Duration::from_secs(90));
        assert_eq!(ai.retry.max_attempts, 2);

        let registry = config.registry();
        assert_eq!(
            registry.resolve_timeout(None, "ai.generate_recipe", DependencyKind::AiProvider),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_unknown_profile_field_is_a_parse_error() {
        let err = ServiceConfig::from_yaml("resilience:\n  profiles:\n    database:\n      retries: 3\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = ServiceConfig::default();
        config
            .apply_overrides(vars(&[
                ("KAFKA_BROKERS", "r1:9092, r2:9092,"),
                ("KAFKA_GROUP_ID", "override-group"),
                ("KAFKA_OUTPUT_TOPIC", "out"),
                ("SERVER_PORT", "8181"),
                ("LOG_FORMAT", "compact"),
                ("LLM_API_KEY", "sk-env"),
                ("TASK_API_URL", "https://tasks.example.com"),
                ("TASK_API_TOKEN", "t0k"),
                ("STRICT_BOOT", "true"),
                ("CONFIG_ENV", "staging"),
            ]))
            .unwrap();

        assert_eq!(config.kafka.brokers, vec!["r1:9092", "r2:9092"]);
        assert_eq!(config.kafka.group_id, "override-group");
        assert_eq!(config.kafka.topics.beverage_events, "out");
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.ai_provider().unwrap().settings.api_key, "sk-env");
        assert!(config.strict_boot);
        assert_eq!(config.environment, Environment::Staging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_variables_are_ignored() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(vars(&[("KAFKA_GROUP_ID", "  ")])).unwrap();
        assert_eq!(config.kafka.group_id, "beverage-inventor");
    }

    #[test]
    fn test_bad_override_values() {
        let mut config = ServiceConfig::default();
        assert!(matches!(
            config.apply_overrides(vars(&[("SERVER_PORT", "eighty")])),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            config.apply_overrides(vars(&[("CONFIG_ENV", "qa")])),
            Err(ConfigError::InvalidEnvironment(_))
        ));
        assert!(matches!(
            config.apply_overrides(vars(&[("STRICT_BOOT", "maybe")])),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ServiceConfig::default();
        config.kafka.brokers = vec![" ".to_string()];
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.kafka.group_id = String::new();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.kafka.queue_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.database.backend = "postgres".to_string();
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.resilience.profiles.insert(
            DependencyKind::Database,
            ProfileOverride {
                failure_threshold: Some(1.5),
                ..ProfileOverride::default()
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("resilience.profiles.database"));
    }

    #[test]
    fn test_disabled_or_keyless_providers_are_skipped() {
        let mut config = ServiceConfig::default();
        assert!(config.ai_provider().is_none());

        config.ai_providers = vec![
            AiProviderConfig {
                name: "off".to_string(),
                enabled: false,
                settings: LlmSettings {
                    api_key: "sk-off".to_string(),
                    ..LlmSettings::default()
                },
            },
            AiProviderConfig {
                name: "on".to_string(),
                ..AiProviderConfig::default()
            },
        ];
        assert!(config.ai_provider().is_none());

        config.ai_providers[1].settings.api_key = "sk-on".to_string();
        assert_eq!(config.ai_provider().unwrap().name, "on");
    }

    #[test]
    fn test_database_timeouts_map_to_repository_operations() {
        let mut config = ServiceConfig::default();
        config.database.query_timeout_ms = 1_500;
        let registry = config.registry();
        assert_eq!(
            registry.resolve_timeout(None, "repository.find_by_id", DependencyKind::Database),
            Duration::from_millis(1_500)
        );
        assert_eq!(
            registry.resolve_timeout(None, "repository.save", DependencyKind::Database),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_config_path_sources() {
        let none = vars(&[]);
        let args = |a: &[&str]| a.iter().map(ToString::to_string).collect::<Vec<_>>();

        assert_eq!(
            config_path(args(&["--config", "a.yaml"]), &none),
            Some(PathBuf::from("a.yaml"))
        );
        assert_eq!(
            config_path(args(&["--config=b.yaml"]), &none),
            Some(PathBuf::from("b.yaml"))
        );
        assert_eq!(
            config_path(args(&[]), vars(&[(CONFIG_PATH_VAR, "c.yaml")])),
            Some(PathBuf::from("c.yaml"))
        );
        assert_eq!(config_path(args(&[]), &none), None);
    }
}
