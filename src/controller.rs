//! Request handling between a host application and the device core.
//!
//! The host delivers [`Request`]s and receives [`Event`]s through an
//! [`EventSink`]; how either travels (plugin bus, websocket, channel) is up to
//! the host.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::channel::mpsc::UnboundedSender;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::device::Device;
use crate::discovery::scan_for_devices;
use crate::keep_alive::KeepAlive;
use crate::registry::{DeviceSummary, Registry};
use crate::runtime::Mutex;
use crate::types::Color;

#[cfg(feature = "ble")]
use crate::bluetooth::{DevicePicker, FirstMatch, scan_for_bluetooth_device};

/// A command from the host. Every variant except `Scan` targets a list of
/// device ids; unknown ids are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    Scan,
    Connect { device_ids: Vec<String> },
    SetPower { device_ids: Vec<String>, power: bool },
    SetBrightness { device_ids: Vec<String>, brightness: i32 },
    SetColor { device_ids: Vec<String>, color: Color },
    SetColorTemperature { device_ids: Vec<String>, kelvin: u32 },
    Disconnect { device_ids: Vec<String> },
}

/// Something the host should know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// The full device list, sent after the set of devices or their
    /// connection state changed.
    Devices { devices: Vec<DeviceSummary> },
    /// Sent before and after each discovery attempt.
    ScanStatus { scanning: bool },
    /// One entry per known target device, in request order.
    CommandResult { results: Vec<bool> },
}

/// Where [`Event`]s go.
pub trait EventSink: Send + Sync {
    fn send(&self, event: Event);
}

impl EventSink for UnboundedSender<Event> {
    fn send(&self, event: Event) {
        if let Err(e) = self.unbounded_send(event) {
            debug!("Dropping event, receiver is gone: {}", e);
        }
    }
}

/// Clears the scan flag however the scan ends.
struct ScanGuard<'a>(&'a AtomicBool);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the device registry and the keep-alive timer and turns requests into
/// device operations.
///
/// # Example
///
/// ```ignore
/// let (events, mut received) = futures::channel::mpsc::unbounded();
/// let controller = Controller::new(Config::default(), events);
/// controller.start().await;
/// controller.handle(Request::Scan).await;
/// // ...
/// controller.stop().await;
/// ```
pub struct Controller<S: EventSink> {
    config: Config,
    registry: Arc<Registry>,
    sink: S,
    scanning: AtomicBool,
    keep_alive: Mutex<Option<KeepAlive>>,
    #[cfg(feature = "ble")]
    picker: Box<dyn DevicePicker>,
}

impl<S: EventSink> Controller<S> {
    pub fn new(config: Config, sink: S) -> Self {
        Controller {
            config,
            registry: Arc::new(Registry::new()),
            sink,
            scanning: AtomicBool::new(false),
            keep_alive: Mutex::new(None),
            #[cfg(feature = "ble")]
            picker: Box::new(FirstMatch),
        }
    }

    /// Use `picker` to choose among discovered Bluetooth devices.
    #[cfg(feature = "ble")]
    pub fn with_picker(mut self, picker: impl DevicePicker + 'static) -> Self {
        self.picker = Box::new(picker);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Start the keep-alive timer. Does nothing if it is already running.
    pub async fn start(&self) {
        let mut keep_alive = self.keep_alive.lock().await;
        if keep_alive.is_none() {
            *keep_alive = Some(KeepAlive::start(
                Arc::clone(&self.registry),
                self.config.keep_alive.interval,
            ));
        }
    }

    /// Stop the keep-alive timer, then disconnect and forget every device.
    pub async fn stop(&self) {
        if let Some(mut keep_alive) = self.keep_alive.lock().await.take() {
            keep_alive.stop().await;
        }
        self.registry.disconnect_all().await;
        info!("Controller stopped");
    }

    pub async fn handle(&self, request: Request) {
        match request {
            Request::Scan => self.scan().await,
            Request::Connect { device_ids } => {
                self.registry
                    .apply_to_all(&device_ids, |device| device.connect())
                    .await;
                self.send_device_list().await;
            }
            Request::SetPower { device_ids, power } => {
                let results = self
                    .registry
                    .apply_to_all(&device_ids, |device| device.set_power(power))
                    .await;
                self.sink.send(Event::CommandResult { results });
            }
            Request::SetBrightness {
                device_ids,
                brightness,
            } => {
                let results = self
                    .registry
                    .apply_to_all(&device_ids, |device| device.set_brightness(brightness))
                    .await;
                self.sink.send(Event::CommandResult { results });
            }
            Request::SetColor { device_ids, color } => {
                let results = self
                    .registry
                    .apply_to_all(&device_ids, |device| device.set_color(color))
                    .await;
                self.sink.send(Event::CommandResult { results });
            }
            Request::SetColorTemperature { device_ids, kelvin } => {
                let results = self
                    .registry
                    .apply_to_all(&device_ids, |device| device.set_color_temperature(kelvin))
                    .await;
                self.sink.send(Event::CommandResult { results });
            }
            Request::Disconnect { device_ids } => {
                self.registry.remove_and_disconnect(&device_ids).await;
                self.send_device_list().await;
            }
        }
    }

    /// Search both transports, Bluetooth first.
    pub async fn scan(&self) {
        #[cfg(feature = "ble")]
        if self.config.ble.enabled {
            self.scan_bluetooth().await;
        }
        self.scan_lan().await;
    }

    /// Run a LAN scan and register what it finds. Ignored while any other
    /// scan is running.
    pub async fn scan_lan(&self) {
        let Some(_guard) = self.begin_scan("LAN") else {
            return;
        };

        let lan = &self.config.lan;
        let devices = scan_for_devices(lan, lan.scan_timeout)
            .await
            .into_iter()
            .map(|descriptor| Arc::new(descriptor.into_light(lan)) as Arc<dyn Device>)
            .collect();
        self.register(devices).await;
        self.sink.send(Event::ScanStatus { scanning: false });
    }

    /// Run a Bluetooth scan and register the device the picker chose.
    /// Ignored while any other scan is running.
    #[cfg(feature = "ble")]
    pub async fn scan_bluetooth(&self) {
        let Some(_guard) = self.begin_scan("Bluetooth") else {
            return;
        };

        let devices = scan_for_bluetooth_device(&self.config.ble, self.picker.as_ref())
            .await
            .map(|light| Arc::new(light) as Arc<dyn Device>)
            .into_iter()
            .collect();
        self.register(devices).await;
        self.sink.send(Event::ScanStatus { scanning: false });
    }

    fn begin_scan(&self, transport: &str) -> Option<ScanGuard<'_>> {
        if self.scanning.swap(true, Ordering::SeqCst) {
            info!("Already scanning for devices, ignoring {} scan", transport);
            return None;
        }
        info!("Scanning for Govee {} devices...", transport);
        self.sink.send(Event::ScanStatus { scanning: true });
        Some(ScanGuard(&self.scanning))
    }

    async fn register(&self, devices: Vec<Arc<dyn Device>>) {
        if devices.is_empty() {
            info!("No devices found");
            return;
        }
        for device in devices {
            self.registry.insert(device).await;
        }
        self.send_device_list().await;
    }

    async fn send_device_list(&self) {
        let devices = self.registry.summaries().await;
        self.sink.send(Event::Devices { devices });
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use futures::channel::mpsc::{UnboundedReceiver, unbounded};
    use serde_json::json;

    use super::*;
    use crate::device::testing::FakeDevice;
    use crate::runtime;

    fn drain(events: &mut UnboundedReceiver<Event>) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(Some(event)) = events.try_next() {
            drained.push(event);
        }
        drained
    }

    fn free_port() -> u16 {
        std::net::UdpSocket::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    /// LAN-only config whose scan request goes to a local port nobody answers on.
    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.ble.enabled = false;
        config.lan.scan_addr = SocketAddrV4::new(Ipv4Addr::LOCALHOST, free_port());
        config.lan.listen_port = free_port();
        config.lan.scan_timeout = Duration::from_millis(100);
        config.keep_alive.interval = Duration::from_millis(20);
        config
    }

    async fn controller_with(
        devices: &[&Arc<FakeDevice>],
    ) -> (Controller<UnboundedSender<Event>>, UnboundedReceiver<Event>) {
        let (sink, events) = unbounded();
        let controller = Controller::new(quiet_config(), sink);
        for device in devices {
            controller
                .registry()
                .insert(Arc::clone(device) as Arc<dyn Device>)
                .await;
        }
        (controller, events)
    }

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_value(json!({
            "type": "setColor",
            "payload": {"deviceIds": ["a", "b"], "color": {"r": 1, "g": 2, "b": 3}}
        }))
        .unwrap();
        assert_eq!(
            request,
            Request::SetColor {
                device_ids: vec!["a".to_string(), "b".to_string()],
                color: Color::rgb(1, 2, 3),
            }
        );

        let scan: Request = serde_json::from_value(json!({"type": "scan"})).unwrap();
        assert_eq!(scan, Request::Scan);
    }

    #[test]
    fn test_event_wire_format() {
        assert_eq!(
            serde_json::to_value(Event::ScanStatus { scanning: true }).unwrap(),
            json!({"type": "scanStatus", "payload": {"scanning": true}})
        );
        assert_eq!(
            serde_json::to_value(Event::CommandResult {
                results: vec![true, false]
            })
            .unwrap(),
            json!({"type": "commandResult", "payload": {"results": [true, false]}})
        );
    }

    #[tokio::test]
    async fn test_commands_report_results() {
        let a = Arc::new(FakeDevice::connected("a"));
        let b = Arc::new(FakeDevice::new("b"));
        let (controller, mut events) = controller_with(&[&a, &b]).await;

        controller
            .handle(Request::SetBrightness {
                device_ids: vec!["a".into(), "missing".into(), "b".into()],
                brightness: 30,
            })
            .await;
        controller
            .handle(Request::SetColorTemperature {
                device_ids: vec!["a".into()],
                kelvin: 3000,
            })
            .await;

        assert_eq!(
            drain(&mut events),
            vec![
                Event::CommandResult {
                    results: vec![true, false]
                },
                Event::CommandResult {
                    results: vec![true]
                },
            ]
        );
        assert_eq!(a.calls(), ["brightness 30", "kelvin 3000"]);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_publish_device_list() {
        let a = Arc::new(FakeDevice::new("a"));
        let b = Arc::new(FakeDevice::new("b"));
        b.fail_connect.store(true, Ordering::SeqCst);
        let (controller, mut events) = controller_with(&[&a, &b]).await;

        controller
            .handle(Request::Connect {
                device_ids: vec!["a".into(), "b".into()],
            })
            .await;
        let summary = |id: &str, connected| DeviceSummary {
            id: id.to_string(),
            name: format!("fake {id}"),
            connected,
        };
        assert_eq!(
            drain(&mut events),
            vec![Event::Devices {
                devices: vec![summary("a", true), summary("b", false)]
            }]
        );

        controller
            .handle(Request::Disconnect {
                device_ids: vec!["a".into()],
            })
            .await;
        assert_eq!(
            drain(&mut events),
            vec![Event::Devices {
                devices: vec![summary("b", false)]
            }]
        );
        assert!(!a.is_connected());
    }

    #[tokio::test]
    async fn test_scan_reports_status_around_empty_result() {
        let (controller, mut events) = controller_with(&[]).await;

        controller.handle(Request::Scan).await;

        assert_eq!(
            drain(&mut events),
            vec![
                Event::ScanStatus { scanning: true },
                Event::ScanStatus { scanning: false },
            ]
        );
        assert!(!controller.is_scanning());
    }

    #[tokio::test]
    async fn test_second_scan_is_ignored_while_scanning() {
        let (controller, mut events) = controller_with(&[]).await;

        let second = async {
            runtime::sleep(Duration::from_millis(20)).await;
            assert!(controller.is_scanning());
            controller.scan_lan().await;
        };
        futures::join!(controller.scan_lan(), second);

        assert_eq!(
            drain(&mut events),
            vec![
                Event::ScanStatus { scanning: true },
                Event::ScanStatus { scanning: false },
            ]
        );
        assert!(!controller.is_scanning());
    }

    #[tokio::test]
    async fn test_stop_halts_keep_alive_and_disconnects_everything() {
        let a = Arc::new(FakeDevice::connected("a"));
        let (controller, _events) = controller_with(&[&a]).await;

        controller.start().await;
        runtime::sleep(Duration::from_millis(70)).await;
        controller.stop().await;

        assert!(a.keep_alives.load(Ordering::SeqCst) >= 1);
        assert!(!a.is_connected());
        assert!(controller.registry().is_empty().await);

        let probes = a.keep_alives.load(Ordering::SeqCst);
        runtime::sleep(Duration::from_millis(60)).await;
        assert_eq!(a.keep_alives.load(Ordering::SeqCst), probes);
    }
}
