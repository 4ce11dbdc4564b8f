//! Transport and scheduler configuration.
//!
//! The defaults are the values Govee devices use on the wire; overriding them
//! is mostly useful for tests and unusual network setups.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Multicast group scan requests are sent to.
pub const MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// Port devices listen on for scan requests.
pub const SCAN_PORT: u16 = 4001;
/// Local port scan responses arrive on.
pub const LISTEN_PORT: u16 = 4002;
/// Port devices accept control commands on.
pub const CONTROL_PORT: u16 = 4003;

/// Settings for the LAN (UDP/JSON) transport and its discovery.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanConfig {
    /// Where the scan request is sent.
    pub scan_addr: SocketAddrV4,
    /// Local port the scan listener binds to.
    pub listen_port: u16,
    /// Device port control commands are sent to.
    pub control_port: u16,
    /// How long a scan collects responses.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub scan_timeout: Duration,
}

impl Default for LanConfig {
    fn default() -> Self {
        LanConfig {
            scan_addr: SocketAddrV4::new(MULTICAST_ADDRESS, SCAN_PORT),
            listen_port: LISTEN_PORT,
            control_port: CONTROL_PORT,
            scan_timeout: Duration::from_millis(5000),
        }
    }
}

/// Settings for Bluetooth LE discovery.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Whether a scan request also searches for Bluetooth devices.
    pub enabled: bool,
    /// Advertised-name prefixes that identify Govee devices.
    pub name_prefixes: Vec<String>,
    /// How long the adapter scans before candidates are offered to the picker.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub scan_window: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        BleConfig {
            enabled: true,
            name_prefixes: vec!["Govee_".to_string(), "ihoment_".to_string()],
            scan_window: Duration::from_secs(5),
        }
    }
}

impl BleConfig {
    /// Whether an advertised name belongs to a Govee device.
    pub fn matches(&self, advertised: &str) -> bool {
        self.name_prefixes
            .iter()
            .any(|prefix| advertised.starts_with(prefix.as_str()))
    }
}

/// Settings for the periodic keep-alive sweep.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepAliveConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub interval: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        KeepAliveConfig {
            interval: Duration::from_secs(2),
        }
    }
}

/// Complete configuration for a [`crate::Controller`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lan: LanConfig,
    pub ble: BleConfig,
    pub keep_alive: KeepAliveConfig,
}

impl Config {
    /// Load a configuration from JSON. Missing fields keep their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use govee_lights_rs::Config;
    ///
    /// let config = Config::from_json(r#"{"lan": {"scan_timeout": 1500}}"#).unwrap();
    /// assert_eq!(config.lan.scan_timeout, Duration::from_millis(1500));
    /// assert_eq!(config.lan.control_port, 4003);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::JsonLoad)
    }
}
