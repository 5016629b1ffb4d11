use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let Some((key, value)) = parse_env_line(line) else {
            continue;
        };

        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Split a `KEY=value` line, skipping blanks and comments and stripping quotes.
fn parse_env_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let mut value = line[eq_pos + 1..].trim();

    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value = &value[1..value.len() - 1];
    }

    Some((key, value))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub matter: MatterConfig,
    pub bridge: BridgeConfig,
    pub simulation: SimulationConfig,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatterConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub device_name: String,
    pub discriminator: u16,
    pub passcode: u32,
    /// Network interface to bind; auto-detected when unset
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Expose devices as bridged nodes under one aggregator endpoint
    pub aggregate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub enabled: bool,
    /// Seconds between simulated button presses
    pub interval_secs: u64,
    /// Motor tick of simulated blinds
    pub blind_tick_ms: u64,
}

/// One configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// No accessory is attached; the endpoint is exposed regardless
    #[serde(default)]
    pub detached: bool,
    #[serde(flatten)]
    pub kind: DeviceKindConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceKindConfig {
    Light,
    PlugIn,
    Fan,
    Window {
        #[serde(default = "default_travel_ms")]
        time_to_open_ms: u64,
        #[serde(default = "default_travel_ms")]
        time_to_close_ms: u64,
    },
    Button,
}

fn default_travel_ms() -> u64 {
    20_000
}

impl DeviceConfig {
    pub fn new(name: &str, kind: DeviceKindConfig) -> Self {
        Self {
            name: Some(name.to_string()),
            detached: false,
            kind,
        }
    }
}

/// Devices used when no devices file is configured: one of each kind.
pub fn default_devices() -> Vec<DeviceConfig> {
    vec![
        DeviceConfig::new("Living Room Light", DeviceKindConfig::Light),
        DeviceConfig::new("Coffee Machine", DeviceKindConfig::PlugIn),
        DeviceConfig::new("Ceiling Fan", DeviceKindConfig::Fan),
        DeviceConfig::new(
            "Bedroom Blind",
            DeviceKindConfig::Window {
                time_to_open_ms: default_travel_ms(),
                time_to_close_ms: default_travel_ms(),
            },
        ),
        DeviceConfig::new("Wall Button", DeviceKindConfig::Button),
    ]
}

/// Parse a JSON device list. An empty list is rejected.
pub fn parse_devices(json: &str) -> Result<Vec<DeviceConfig>> {
    let devices: Vec<DeviceConfig> = serde_json::from_str(json)?;
    if devices.is_empty() {
        return Err(BridgeError::InvalidDeviceConfig(
            "device list is empty".to_string(),
        ));
    }
    Ok(devices)
}

/// Read a JSON device list from `path`.
pub fn load_devices(path: &Path) -> Result<Vec<DeviceConfig>> {
    let json = fs::read_to_string(path)?;
    parse_devices(&json)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matter: MatterConfig {
                vendor_id: 0xFFF1,
                product_id: 0x8002,
                device_name: "Matter Accessory Bridge".to_string(),
                discriminator: 3840,
                passcode: 20202021,
                interface: None,
            },
            bridge: BridgeConfig { aggregate: true },
            simulation: SimulationConfig {
                enabled: true,
                interval_secs: 30,
                blind_tick_ms: 100,
            },
            devices: default_devices(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("DEVICE_NAME") {
            config.matter.device_name = name;
        }
        if let Ok(discriminator) = std::env::var("MATTER_DISCRIMINATOR")
            && let Ok(d) = discriminator.parse()
        {
            config.matter.discriminator = d;
        }
        if let Ok(passcode) = std::env::var("MATTER_PASSCODE")
            && let Ok(p) = passcode.parse()
        {
            config.matter.passcode = p;
        }
        if let Ok(interface) = std::env::var("MATTER_INTERFACE")
            && !interface.is_empty()
        {
            config.matter.interface = Some(interface);
        }

        // Bridge configuration
        if let Ok(aggregate) = std::env::var("BRIDGE_AGGREGATE")
            && let Some(a) = parse_bool(&aggregate)
        {
            config.bridge.aggregate = a;
        }

        // Simulation configuration
        if let Ok(enabled) = std::env::var("SIMULATION_ENABLED")
            && let Some(e) = parse_bool(&enabled)
        {
            config.simulation.enabled = e;
        }
        if let Ok(interval) = std::env::var("SIMULATION_INTERVAL_SECS")
            && let Ok(i) = interval.parse()
        {
            config.simulation.interval_secs = i;
        }

        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_line() {
        assert_eq!(parse_env_line("A=b c"), Some(("A", "b c")));
        assert_eq!(parse_env_line(" KEY = \"quoted\" "), Some(("KEY", "quoted")));
        assert_eq!(parse_env_line("K='x'"), Some(("K", "x")));
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line(""), None);
        assert_eq!(parse_env_line("NOEQUALS"), None);
        assert_eq!(parse_env_line("Q=\""), Some(("Q", "\"")));
    }

    #[test]
    fn test_parse_devices() {
        let json = r#"[
            {"type": "light", "name": "Hall"},
            {"type": "plug_in"},
            {"type": "window", "name": "Blind", "time_to_open_ms": 1000},
            {"type": "button", "detached": true}
        ]"#;

        let devices = parse_devices(json).unwrap();
        assert_eq!(devices.len(), 4);
        assert_eq!(devices[0], DeviceConfig::new("Hall", DeviceKindConfig::Light));
        assert_eq!(devices[1].name, None);
        assert_eq!(devices[1].kind, DeviceKindConfig::PlugIn);
        assert_eq!(
            devices[2].kind,
            DeviceKindConfig::Window {
                time_to_open_ms: 1000,
                time_to_close_ms: 20_000,
            }
        );
        assert!(devices[3].detached);
    }

    #[test]
    fn test_parse_devices_rejects_unknown_type() {
        assert!(matches!(
            parse_devices(r#"[{"type": "toaster"}]"#),
            Err(BridgeError::SerdeJsonError(_))
        ));
    }

    #[test]
    fn test_parse_devices_rejects_empty_list() {
        assert!(matches!(
            parse_devices("[]"),
            Err(BridgeError::InvalidDeviceConfig(_))
        ));
    }

    #[test]
    fn test_default_config_has_every_kind() {
        let config = Config::default();
        assert!(config.bridge.aggregate);
        assert_eq!(config.devices.len(), 5);
        assert!(config.matter.interface.is_none());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
