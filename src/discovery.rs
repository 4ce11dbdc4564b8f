//! LAN device discovery via multicast scan.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::LanConfig;
use crate::envelope::{Envelope, LanCommand};
use crate::errors::Error;
use crate::lan::LanLight;
use crate::runtime::{self, AsyncUdpSocket, Instant, UdpSocket};

type Result<T> = std::result::Result<T, Error>;

/// What a Govee device reports about itself in a scan response.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanDescriptor {
    /// Device serial, used as the device id.
    pub device: String,
    pub ip: Ipv4Addr,
    pub sku: String,
    pub ble_version_hard: Option<String>,
    pub ble_version_soft: Option<String>,
    pub wifi_version_hard: Option<String>,
    pub wifi_version_soft: Option<String>,
}

impl LanDescriptor {
    /// A descriptor for a device whose address is already known.
    pub fn new(device: &str, ip: Ipv4Addr, sku: &str) -> Self {
        LanDescriptor {
            device: device.to_string(),
            ip,
            sku: sku.to_string(),
            ble_version_hard: None,
            ble_version_soft: None,
            wifi_version_hard: None,
            wifi_version_soft: None,
        }
    }

    /// Convert this descriptor into a controllable [`LanLight`].
    pub fn into_light(self, config: &LanConfig) -> LanLight {
        LanLight::new(self, config)
    }
}

/// Scan responses collected so far, in order of first appearance.
#[derive(Debug, Default)]
struct ScanResults {
    seen: HashSet<String>,
    devices: Vec<LanDescriptor>,
}

impl ScanResults {
    /// Feed one datagram. Returns `Ok(true)` if it announced a new device,
    /// `Ok(false)` for duplicates and unrelated messages.
    fn accept(&mut self, datagram: &[u8]) -> Result<bool> {
        let envelope = Envelope::from_bytes(datagram)?;
        if envelope.command() != Some(LanCommand::Scan) || envelope.msg.data.is_null() {
            return Ok(false);
        }

        let descriptor: LanDescriptor =
            serde_json::from_value(envelope.msg.data).map_err(Error::JsonLoad)?;
        if !self.seen.insert(descriptor.device.clone()) {
            return Ok(false);
        }

        info!("Discovered LAN device: {} at {}", descriptor.sku, descriptor.ip);
        self.devices.push(descriptor);
        Ok(true)
    }
}

/// Discover Govee devices on the local network.
///
/// Multicasts a single scan request and collects responses until
/// `scan_timeout` has elapsed. Responses are deduplicated by device id and
/// returned in the order they first arrived. Malformed responses are skipped.
///
/// This never fails: bind or send errors, and socket errors while listening,
/// end the scan early with whatever was collected up to that point. Both scan
/// sockets are closed before this function returns.
///
/// # Examples
///
/// ```ignore
/// use std::time::Duration;
/// use govee_lights_rs::{LanConfig, scan_for_devices};
///
/// let devices = scan_for_devices(&LanConfig::default(), Duration::from_secs(5)).await;
/// for device in devices {
///     println!("{} {} at {}", device.device, device.sku, device.ip);
/// }
/// ```
pub async fn scan_for_devices(config: &LanConfig, scan_timeout: Duration) -> Vec<LanDescriptor> {
    let mut results = ScanResults::default();

    if let Err(e) = collect(config, scan_timeout, &mut results).await {
        warn!("LAN scan ended early: {}", e);
    }

    info!("LAN scan completed. Found {} device(s)", results.devices.len());
    results.devices
}

async fn collect(
    config: &LanConfig,
    scan_timeout: Duration,
    results: &mut ScanResults,
) -> Result<()> {
    let listener = UdpSocket::bind_reusable(&format!("0.0.0.0:{}", config.listen_port))
        .await
        .map_err(|e| Error::socket("bind listener", e))?;
    debug!("Listening for LAN devices on port {}", config.listen_port);

    let sender = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| Error::socket("bind sender", e))?;
    sender
        .set_broadcast(true)
        .map_err(|e| Error::socket("set_broadcast", e))?;

    let request = Envelope::scan().to_bytes()?;
    sender
        .send_to(&request, &config.scan_addr.to_string())
        .await
        .map_err(|e| Error::socket("send_to", e))?;
    debug!("Scan request sent to {}", config.scan_addr);

    let start = Instant::now();
    let mut buffer = [0u8; 4096];

    loop {
        let remaining = scan_timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Ok(());
        }

        match runtime::timeout(remaining, listener.recv_from(&mut buffer)).await {
            Ok(Ok((size, addr))) => {
                if let Err(e) = results.accept(&buffer[..size]) {
                    warn!("Error parsing scan response from {}: {}", addr, e);
                }
            }
            Ok(Err(e)) => return Err(Error::socket("recv_from", e)),
            Err(_) => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddrV4;

    use serde_json::json;

    use super::*;

    fn response(device: &str, sku: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "msg": {
                "cmd": "scan",
                "data": {
                    "ip": "192.168.1.23",
                    "device": device,
                    "sku": sku,
                    "bleVersionHard": "3.01.01",
                    "bleVersionSoft": "1.03.01",
                    "wifiVersionHard": "1.00.10",
                    "wifiVersionSoft": "1.02.03"
                }
            }
        }))
        .unwrap()
    }

    /// A port that was free a moment ago.
    fn free_port() -> u16 {
        std::net::UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    #[test]
    fn test_descriptor_fields() {
        let mut results = ScanResults::default();
        assert!(results.accept(&response("1F:80:C5:32:32:36:72:4E", "H618E")).unwrap());
        let descriptor = &results.devices[0];
        assert_eq!(descriptor.device, "1F:80:C5:32:32:36:72:4E");
        assert_eq!(descriptor.ip, Ipv4Addr::new(192, 168, 1, 23));
        assert_eq!(descriptor.sku, "H618E");
        assert_eq!(descriptor.ble_version_hard.as_deref(), Some("3.01.01"));
        assert_eq!(descriptor.wifi_version_soft.as_deref(), Some("1.02.03"));
    }

    #[test]
    fn test_duplicates_keep_first_appearance() {
        let mut results = ScanResults::default();
        assert!(results.accept(&response("a", "H6076")).unwrap());
        assert!(results.accept(&response("b", "H6008")).unwrap());
        assert!(!results.accept(&response("a", "H6199")).unwrap());

        let ids: Vec<_> = results.devices.iter().map(|d| d.device.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(results.devices[0].sku, "H6076");
    }

    #[test]
    fn test_malformed_and_unrelated_messages() {
        let mut results = ScanResults::default();
        assert!(results.accept(b"{not json").is_err());
        assert!(results.accept(br#"{"msg":{"cmd":"scan","data":{"sku":"H6076"}}}"#).is_err());
        assert!(!results.accept(br#"{"msg":{"cmd":"devStatus","data":{"onOff":1}}}"#).unwrap());
        assert!(!results.accept(br#"{"msg":{"cmd":"scan"}}"#).unwrap());
        assert!(results.devices.is_empty());
    }

    #[test]
    fn test_descriptor_serialization_skips_missing_versions() {
        let descriptor = LanDescriptor::new("a", Ipv4Addr::LOCALHOST, "H6076");
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({"device": "a", "ip": "127.0.0.1", "sku": "H6076"})
        );
    }

    #[tokio::test]
    async fn test_scan_times_out_empty_and_releases_sockets() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = LanConfig {
            scan_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, silent.local_addr().unwrap().port()),
            listen_port: free_port(),
            ..LanConfig::default()
        };

        let start = Instant::now();
        let devices = scan_for_devices(&config, Duration::from_millis(50)).await;
        assert!(devices.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(50));

        // The listener port is free again, so the socket was closed.
        UdpSocket::bind(&format!("0.0.0.0:{}", config.listen_port))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scan_collects_deduplicated_responses() {
        let device = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = LanConfig {
            scan_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, device.local_addr().unwrap().port()),
            listen_port: free_port(),
            ..LanConfig::default()
        };
        let reply_to = format!("127.0.0.1:{}", config.listen_port);

        let responder = async {
            let mut buffer = [0u8; 1024];
            let (size, _) = device.recv_from(&mut buffer).await.unwrap();
            let request: serde_json::Value = serde_json::from_slice(&buffer[..size]).unwrap();
            assert_eq!(
                request,
                json!({"msg": {"cmd": "scan", "data": {"account_topic": "reserve"}}})
            );

            for datagram in [
                response("lamp-1", "H6076"),
                b"garbage".to_vec(),
                response("lamp-2", "H6008"),
                response("lamp-1", "H6076"),
            ] {
                device.send_to(&datagram, &reply_to).await.unwrap();
            }
        };

        let (devices, ()) = futures::join!(
            scan_for_devices(&config, Duration::from_millis(300)),
            responder
        );
        let ids: Vec<_> = devices.iter().map(|d| d.device.as_str()).collect();
        assert_eq!(ids, ["lamp-1", "lamp-2"]);
    }

    #[tokio::test]
    async fn test_scan_listens_on_port_shared_with_another_client() {
        let other_client = UdpSocket::bind_reusable("0.0.0.0:0").await.unwrap();
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = LanConfig {
            scan_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, silent.local_addr().unwrap().port()),
            listen_port: other_client.local_addr().unwrap().port(),
            ..LanConfig::default()
        };

        // Returning early would mean the listener could not bind.
        let start = Instant::now();
        let devices = scan_for_devices(&config, Duration::from_millis(100)).await;
        assert!(devices.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_scan_returns_empty_when_listener_port_is_held_exclusively() {
        let taken = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let config = LanConfig {
            listen_port: taken.local_addr().unwrap().port(),
            ..LanConfig::default()
        };
        let devices = scan_for_devices(&config, Duration::from_secs(5)).await;
        assert!(devices.is_empty());
    }
}
