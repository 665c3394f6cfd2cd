use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level config (nexus.toml + NEXUS_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NexusConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            bridge: BridgeConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// LLM router settings. Only the `complete_json` capability is assumed of
/// the provider itself; concrete provider wiring lives in `nexus-agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_primary_model")]
    pub primary_model: String,
    #[serde(default = "default_complex_model")]
    pub complex_model: String,
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,
    pub api_key: Option<String>,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            primary_model: default_primary_model(),
            complex_model: default_complex_model(),
            fallback_model: default_fallback_model(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout_secs(),
            api_key: None,
            base_url: default_anthropic_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default = "default_session_window_turns")]
    pub session_window_turns: usize,
    #[serde(default = "default_max_memory_sections")]
    pub max_memory_sections: usize,
    #[serde(default = "default_memory_recent_days")]
    pub memory_recent_days: usize,
    #[serde(default = "default_observation_max_chars")]
    pub observation_max_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            session_window_turns: default_session_window_turns(),
            max_memory_sections: default_max_memory_sections(),
            memory_recent_days: default_memory_recent_days(),
            observation_max_chars: default_observation_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_url")]
    pub ws_url: String,
    #[serde(default)]
    pub shared_secret: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ws_url: default_bridge_url(),
            shared_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            timezone: default_timezone(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    18790
}
fn default_primary_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_complex_model() -> String {
    "claude-opus-4-1".to_string()
}
fn default_fallback_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_max_tokens() -> u32 {
    1200
}
fn default_timeout_secs() -> u64 {
    45
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_max_steps() -> u32 {
    20
}
fn default_session_window_turns() -> usize {
    20
}
fn default_max_memory_sections() -> usize {
    3
}
fn default_memory_recent_days() -> usize {
    5
}
fn default_observation_max_chars() -> usize {
    4000
}
fn default_bridge_url() -> String {
    "ws://127.0.0.1:8765".to_string()
}
fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nexus", home)
}
fn default_timezone() -> String {
    "America/Los_Angeles".to_string()
}

impl NexusConfig {
    /// Load config from a TOML file with NEXUS_* env var overrides.
    ///
    /// Checks `config_path` if given, else `~/.nexus/nexus.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: NexusConfig = Figment::from(figment::providers::Serialized::defaults(
            NexusConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("NEXUS_").split("_"))
        .extract()
        .map_err(|e| crate::error::NexusError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.nexus/nexus.toml", home)
}
