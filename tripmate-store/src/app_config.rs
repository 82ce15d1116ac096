use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use tripmate_shared::Masked;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub chat: ChatConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub access_token: Option<Masked<String>>,
}

fn default_timeout_secs() -> u64 { 10 }

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    pub ws_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 0 disables automatic reconnects
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
}

fn default_connect_timeout_ms() -> u64 { 10_000 }
fn default_reconnect_delay_ms() -> u64 { 5_000 }
fn default_heartbeat_ms() -> u64 { 4_000 }
fn default_history_page_size() -> u32 { 50 }

#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    pub member_id: i64,
    pub nickname: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(Path::new("config"), config::Environment::with_prefix("TRIPMATE").separator("__"))
    }

    /// Layers `default` → `{RUN_MODE}` → `local` from `dir`, then `environment` on top.
    pub fn load_from(dir: &Path, environment: config::Environment) -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let layer = |name: &str| dir.join(name).to_string_lossy().into_owned();

        let s = config::Config::builder()
            .add_source(config::File::with_name(&layer("default")))
            .add_source(config::File::with_name(&layer(&run_mode)).required(false))
            // Not checked in; per-machine token and identity
            .add_source(config::File::with_name(&layer("local")).required(false))
            // Eg.. `TRIPMATE__API__ACCESS_TOKEN=...` sets `api.access_token`
            .add_source(environment)
            .build()?;

        s.try_deserialize()
    }
}
