use serde::Deserialize;
use std::{
    env,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

const DEFAULT_ENV: &str = "dev";
const CONFIG_PATH_VAR: &str = "GUILDVAULT_CONFIG";
const ENV_VAR: &str = "GUILDVAULT_ENV";
const TOKEN_VAR: &str = "GUILDVAULT_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct GuildvaultConfig {
    #[serde(default = "default_prefix")]
    pub command_prefix: String,
    pub discord: DiscordConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    #[serde(default)]
    pub token: String,
    pub proxy: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackupConfig {
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    #[serde(default = "default_restore_deadline_secs")]
    pub restore_deadline_secs: u64,
}

/// Pacing for mutating calls made against a guild during a restore.
#[derive(Debug, Deserialize, Clone)]
pub struct ThrottleConfig {
    /// Minimum spacing between two mutating calls once the burst is spent.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_burst")]
    pub burst: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MetricsConfig {
    pub port: Option<u16>,
}

impl GuildvaultConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl BackupConfig {
    pub fn restore_deadline(&self) -> Duration {
        Duration::from_secs(self.restore_deadline_secs)
    }
}

impl ThrottleConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            export_dir: default_export_dir(),
            restore_deadline_secs: default_restore_deadline_secs(),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            burst: default_burst(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_prefix() -> String {
    String::from("!")
}

fn default_cooldown_ms() -> u64 {
    1000
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_restore_deadline_secs() -> u64 {
    30 * 60
}

fn default_min_interval_ms() -> u64 {
    500
}

fn default_burst() -> u32 {
    1
}

fn default_call_timeout_secs() -> u64 {
    30
}

/// Loads the config for the bot. Panics if the reading the files fails or parsing fails.
pub fn load_config(path: &Path) -> GuildvaultConfig {
    let file = File::open(path);
    assert!(file.is_ok(), "Cannot open JSON config at {:?}", path);
    let reader = BufReader::new(file.unwrap());
    let mut config: GuildvaultConfig = serde_json::from_reader(reader).unwrap();

    if let Ok(token) = env::var(TOKEN_VAR) {
        config.discord.token = token;
    }
    assert!(
        !config.discord.token.is_empty(),
        "No Discord token configured. Set discord.token or {}.",
        TOKEN_VAR
    );
    config
}

pub fn get_config_path() -> Box<Path> {
    if let Ok(path) = env::var(CONFIG_PATH_VAR) {
        return PathBuf::from(path).into_boxed_path();
    }
    let mut buffer: PathBuf = ["/etc", "guildvault"].iter().collect();
    buffer.push(get_environment());
    buffer.into_boxed_path()
}

fn get_environment() -> String {
    env::var(ENV_VAR)
        .unwrap_or_else(|_| String::from(DEFAULT_ENV))
        .to_lowercase()
}
