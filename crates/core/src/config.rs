use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::classification::AgentName;

/// Process-wide configuration. Built once at startup, validated, then
/// shared read-only; nothing mutates it afterwards.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub agents: AgentsConfig,
    pub llm: LlmConfig,
    pub router: RouterConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// One entry per specialist endpoint. All three required fields must be
/// populated before the process starts serving; a missing field is an
/// initialization-time error, never a runtime one.
#[derive(Clone, Debug, Default)]
pub struct AgentEndpoint {
    pub endpoint: String,
    pub auth_token: SecretString,
    pub agent_id: String,
    pub extra_request_fields: Map<String, Value>,
}

#[derive(Clone, Debug, Default)]
pub struct AgentsConfig {
    pub query: AgentEndpoint,
    pub order: AgentEndpoint,
    pub eco_manager: AgentEndpoint,
    pub subscription: AgentEndpoint,
    pub product_details: AgentEndpoint,
}

/// Static registry entry handed to the classifier (description) and the
/// dispatch table (endpoint).
#[derive(Clone, Debug)]
pub struct HandlerDescriptor {
    pub name: AgentName,
    pub description: &'static str,
    pub endpoint: AgentEndpoint,
}

impl AgentsConfig {
    pub fn get(&self, agent: AgentName) -> &AgentEndpoint {
        match agent {
            AgentName::Query => &self.query,
            AgentName::Order => &self.order,
            AgentName::EcoManager => &self.eco_manager,
            AgentName::Subscription => &self.subscription,
            AgentName::ProductDetails => &self.product_details,
        }
    }

    pub fn descriptors(&self) -> Vec<HandlerDescriptor> {
        AgentName::ALL
            .into_iter()
            .map(|name| HandlerDescriptor {
                name,
                description: name.description(),
                endpoint: self.get(name).clone(),
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub use_default_agent_if_none_identified: bool,
    pub default_agent: AgentName,
    pub max_message_pairs_per_agent: usize,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agents: AgentsConfig::default(),
            llm: LlmConfig {
                api_key: String::new().into(),
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 30,
                max_retries: 2,
            },
            router: RouterConfig {
                use_default_agent_if_none_identified: true,
                default_agent: AgentName::Query,
                max_message_pairs_per_agent: 8,
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 8000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl std::str::FromStr for AgentName {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "query" => Ok(Self::Query),
            "order" => Ok(Self::Order),
            "eco_manager" => Ok(Self::EcoManager),
            "subscription" => Ok(Self::Subscription),
            "product_details" => Ok(Self::ProductDetails),
            other => Err(ConfigError::Validation(format!(
                "unsupported agent name `{other}` (expected query|order|eco_manager|subscription|product_details)"
            ))),
        }
    }
}

impl AppConfig {
    /// defaults → optional TOML file → environment overrides → validation.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("triage.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_from(|key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(agents) = patch.agents {
            apply_agent_patch(&mut self.agents.query, agents.query);
            apply_agent_patch(&mut self.agents.order, agents.order);
            apply_agent_patch(&mut self.agents.eco_manager, agents.eco_manager);
            apply_agent_patch(&mut self.agents.subscription, agents.subscription);
            apply_agent_patch(&mut self.agents.product_details, agents.product_details);
        }

        if let Some(llm) = patch.llm {
            if let Some(api_key_value) = llm.api_key {
                self.llm.api_key = api_key_value.into();
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(router) = patch.router {
            if let Some(use_default) = router.use_default_agent_if_none_identified {
                self.router.use_default_agent_if_none_identified = use_default;
            }
            if let Some(default_agent) = router.default_agent {
                self.router.default_agent = default_agent;
            }
            if let Some(max_pairs) = router.max_message_pairs_per_agent {
                self.router.max_message_pairs_per_agent = max_pairs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    /// Applies environment overrides via a lookup so tests can inject a
    /// map instead of mutating process-global state.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        apply_agent_env(&mut self.agents.query, "QUERY_AGENT", &lookup);
        apply_agent_env(&mut self.agents.order, "ORDER_AGENT", &lookup);
        apply_agent_env(&mut self.agents.eco_manager, "MANAGER_AGENT", &lookup);
        apply_agent_env(&mut self.agents.subscription, "SUBSCRIPTION_AGENT", &lookup);
        apply_agent_env(&mut self.agents.product_details, "PRODUCT_AGENT", &lookup);

        if let Some(api_key) = non_empty(lookup("OPENAI_API_KEY")) {
            self.llm.api_key = api_key.into();
        }
        if let Some(base_url) = non_empty(lookup("TRIAGE_LLM_BASE_URL")) {
            self.llm.base_url = base_url;
        }
        if let Some(model) = non_empty(lookup("TRIAGE_LLM_MODEL")) {
            self.llm.model = model;
        }
        if let Some(bind_address) = non_empty(lookup("TRIAGE_BIND_ADDRESS")) {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = non_empty(lookup("TRIAGE_PORT")) {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                key: "TRIAGE_PORT".to_string(),
                value: port,
            })?;
        }
        if let Some(level) = non_empty(lookup("TRIAGE_LOG_LEVEL")) {
            self.logging.level = level;
        }
        if let Some(format) = non_empty(lookup("TRIAGE_LOG_FORMAT")) {
            self.logging.format = format.parse()?;
        }
        if let Some(max_pairs) = non_empty(lookup("TRIAGE_MAX_MESSAGE_PAIRS")) {
            self.router.max_message_pairs_per_agent =
                max_pairs.parse().map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "TRIAGE_MAX_MESSAGE_PAIRS".to_string(),
                    value: max_pairs,
                })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for descriptor in self.agents.descriptors() {
            let label = descriptor.name.display_name();
            if descriptor.endpoint.endpoint.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{label}: endpoint is required")));
            }
            if descriptor.endpoint.auth_token.expose_secret().trim().is_empty() {
                return Err(ConfigError::Validation(format!("{label}: auth_token is required")));
            }
            if descriptor.endpoint.agent_id.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{label}: agent_id is required")));
            }
        }

        if self.llm.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Validation("llm: api_key is required".to_string()));
        }
        if self.router.max_message_pairs_per_agent == 0 {
            return Err(ConfigError::Validation(
                "router: max_message_pairs_per_agent must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn apply_agent_patch(target: &mut AgentEndpoint, patch: Option<AgentPatch>) {
    let Some(patch) = patch else {
        return;
    };
    if let Some(endpoint) = patch.endpoint {
        target.endpoint = endpoint;
    }
    if let Some(auth_token_value) = patch.auth_token {
        target.auth_token = auth_token_value.into();
    }
    if let Some(agent_id) = patch.agent_id {
        target.agent_id = agent_id;
    }
    if let Some(extra) = patch.extra {
        target.extra_request_fields = extra;
    }
}

// The per-agent variable names are kept from the existing deployments
// (QUERY_AGENT_API_URL, MANAGER_AGENT_AUTH_TOKEN, ...), so a running
// install can switch binaries without re-plumbing its environment.
fn apply_agent_env(
    target: &mut AgentEndpoint,
    prefix: &str,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(endpoint) = non_empty(lookup(&format!("{prefix}_API_URL"))) {
        target.endpoint = endpoint;
    }
    if let Some(auth_token_value) = non_empty(lookup(&format!("{prefix}_AUTH_TOKEN"))) {
        target.auth_token = auth_token_value.into();
    }
    if let Some(agent_id) = non_empty(lookup(&format!("{prefix}_ID"))) {
        target.agent_id = agent_id;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|candidate| !candidate.trim().is_empty())
}

fn resolve_config_path(requested: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = requested {
        return path.exists().then(|| path.to_path_buf());
    }
    let default_path = PathBuf::from("triage.toml");
    default_path.exists().then_some(default_path)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    agents: Option<AgentsPatch>,
    llm: Option<LlmPatch>,
    router: Option<RouterPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentsPatch {
    query: Option<AgentPatch>,
    order: Option<AgentPatch>,
    eco_manager: Option<AgentPatch>,
    subscription: Option<AgentPatch>,
    product_details: Option<AgentPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    endpoint: Option<String>,
    auth_token: Option<String>,
    agent_id: Option<String>,
    extra: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RouterPatch {
    use_default_agent_if_none_identified: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_agent_name")]
    default_agent: Option<AgentName>,
    max_message_pairs_per_agent: Option<usize>,
}

fn deserialize_agent_name<'de, D>(deserializer: D) -> Result<Option<AgentName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| value.parse().map_err(serde::de::Error::custom)).transpose()
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
