use crate::attendance::UpsertPolicy;
use crate::discovery::Ipv4Cidr;
use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = ".wifi-attendance";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_ADDRESS_RANGE: &str = "192.168.0.1/24";
const DEFAULT_INTERFACE: &str = "en0";
pub const DEFAULT_SCAN_TIMEOUT_SECONDS: u64 = 10;
pub const MIN_WATCH_INTERVAL_SECONDS: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub address_range: String,
    pub interface: String,
    pub scan_timeout_seconds: u64,
    pub store_endpoint: PathBuf,
    pub upsert_policy: UpsertPolicy,
    pub normalize_mac: bool,
    pub watch_interval_seconds: u64,
    pub api_bind: IpAddr,
    pub api_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            address_range: DEFAULT_ADDRESS_RANGE.to_string(),
            interface: DEFAULT_INTERFACE.to_string(),
            scan_timeout_seconds: DEFAULT_SCAN_TIMEOUT_SECONDS,
            store_endpoint: root.join("db").join("attendance.db"),
            upsert_policy: UpsertPolicy::PreserveOriginalIdentifier,
            normalize_mac: true,
            watch_interval_seconds: 300,
            api_bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            api_port: 7891,
        }
    }
}

impl Config {
    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.scan_timeout_seconds = config.scan_timeout_seconds.max(1);
        config.watch_interval_seconds = config
            .watch_interval_seconds
            .max(MIN_WATCH_INTERVAL_SECONDS);

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        if let Some(parent) = self.store_endpoint.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        Ok(())
    }

    pub fn parse_address_range(&self) -> Result<Ipv4Cidr> {
        self.address_range
            .parse::<Ipv4Cidr>()
            .with_context(|| format!("Invalid address_range setting: {}", self.address_range))
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_seconds.max(1))
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_seconds.max(MIN_WATCH_INTERVAL_SECONDS))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "address_range" => {
                value.parse::<Ipv4Cidr>()?;
                self.address_range = value.trim().to_string();
            }
            "interface" => {
                let interface = value.trim();
                if interface.is_empty() {
                    bail!("interface must not be empty");
                }
                self.interface = interface.to_string();
            }
            "scan_timeout_seconds" => {
                self.scan_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("scan_timeout_seconds must be a number"))?
                    .max(1);
            }
            "store_endpoint" => {
                self.store_endpoint = expand_home(value.trim());
            }
            "upsert_policy" => {
                self.upsert_policy = value.parse::<UpsertPolicy>()?;
            }
            "normalize_mac" => {
                self.normalize_mac = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("normalize_mac must be true/false"))?;
            }
            "watch_interval_seconds" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("watch_interval_seconds must be a number"))?;
                if parsed < MIN_WATCH_INTERVAL_SECONDS {
                    bail!("watch_interval_seconds must be at least {MIN_WATCH_INTERVAL_SECONDS}");
                }
                self.watch_interval_seconds = parsed;
            }
            "api_bind" => {
                self.api_bind = value
                    .trim()
                    .parse::<IpAddr>()
                    .map_err(|_| anyhow!("api_bind must be an IP address, e.g. 0.0.0.0"))?;
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: address_range|scan.range, interface|scan.interface, scan_timeout_seconds|scan.timeout, store_endpoint|store.endpoint, upsert_policy|store.upsert_policy, normalize_mac|store.normalize_mac, watch_interval_seconds|watch.interval, api_bind|api.bind, api_port|api.port"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "address_range" => Some(self.address_range.clone()),
            "interface" => Some(self.interface.clone()),
            "scan_timeout_seconds" => Some(self.scan_timeout_seconds.to_string()),
            "store_endpoint" => Some(self.store_endpoint.display().to_string()),
            "upsert_policy" => Some(self.upsert_policy.to_string()),
            "normalize_mac" => Some(self.normalize_mac.to_string()),
            "watch_interval_seconds" => Some(self.watch_interval_seconds.to_string()),
            "api_bind" => Some(self.api_bind.to_string()),
            "api_port" => Some(self.api_port.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "address_range" | "scan.range" => "address_range",
        "interface" | "scan.interface" => "interface",
        "scan_timeout_seconds" | "scan.timeout" => "scan_timeout_seconds",
        "store_endpoint" | "store.endpoint" => "store_endpoint",
        "upsert_policy" | "store.upsert_policy" => "upsert_policy",
        "normalize_mac" | "store.normalize_mac" => "normalize_mac",
        "watch_interval_seconds" | "watch.interval" => "watch_interval_seconds",
        "api_bind" | "api.bind" => "api_bind",
        "api_port" | "api.port" => "api_port",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
