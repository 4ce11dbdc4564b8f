//! Device control over Bluetooth LE.
//!
//! Govee BLE lights expose a single write-without-response characteristic
//! that accepts the 20-byte frames built in [`crate::packet`].

use std::fmt::Display;

use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, error, info, warn};

use crate::config::BleConfig;
use crate::device::{ConnectionState, Device, StateCell};
use crate::errors::Error;
use crate::packet::{CHARACTERISTIC_UUID, Packet, SERVICE_UUID};
use crate::runtime::{self, BoxFuture, Mutex};
use crate::types::{Brightness, Color};

type Result<T> = std::result::Result<T, Error>;

/// A device offered to a [`DevicePicker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleCandidate {
    /// The peripheral's platform id, not its hardware address.
    pub id: String,
    /// Name the device advertises, e.g. `Govee_H6001_1A2B`.
    pub advertised_name: String,
}

/// Chooses which of the discovered Govee devices to add.
///
/// This stands in for the platform's interactive device chooser: returning
/// `None` means the selection was dismissed.
pub trait DevicePicker: Send + Sync {
    fn pick(&self, candidates: &[BleCandidate]) -> Option<usize>;
}

/// Picks the first matching device, if any.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstMatch;

impl DevicePicker for FirstMatch {
    fn pick(&self, candidates: &[BleCandidate]) -> Option<usize> {
        if candidates.is_empty() { None } else { Some(0) }
    }
}

/// Derive the display name from an advertised name.
///
/// `Govee_H6001_1A2B` becomes `H6001`. Names without an underscore are kept
/// as they are.
pub fn clean_name(advertised: &str) -> &str {
    advertised.split('_').nth(1).unwrap_or(advertised)
}

/// A Govee light controlled over Bluetooth LE.
#[derive(Debug)]
pub struct BluetoothLight {
    id: String,
    name: String,
    peripheral: Peripheral,
    state: StateCell,
    characteristic: Mutex<Option<Characteristic>>,
}

impl BluetoothLight {
    pub fn new(peripheral: Peripheral, id: &str, advertised_name: &str) -> Self {
        let name = clean_name(advertised_name).to_string();
        debug!("Device name original: {} cleaned: {}", advertised_name, name);
        BluetoothLight {
            id: id.to_string(),
            name,
            peripheral,
            state: StateCell::new(),
            characteristic: Mutex::new(None),
        }
    }

    async fn open(&self) -> bool {
        if self.is_connected() {
            debug!("Device {} is already connected", self.name);
            return true;
        }

        self.state.set(ConnectionState::Connecting);
        match self.resolve_characteristic().await {
            Ok(characteristic) => {
                *self.characteristic.lock().await = Some(characteristic);
                self.state.set(ConnectionState::Connected);
                info!("Connected to device {}", self.name);
                true
            }
            Err(e) => {
                warn!("Failed to connect to device {}: {}", self.name, e);
                if let Err(e) = self.peripheral.disconnect().await {
                    debug!("Cleanup after failed connect to {}: {}", self.name, e);
                }
                self.state.set(ConnectionState::Disconnected);
                false
            }
        }
    }

    async fn resolve_characteristic(&self) -> Result<Characteristic> {
        self.peripheral.connect().await?;
        self.peripheral.discover_services().await?;

        let service = self
            .peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == SERVICE_UUID)
            .ok_or_else(|| Error::service_not_found(&self.name, SERVICE_UUID))?;

        service
            .characteristics
            .into_iter()
            .find(|c| c.uuid == CHARACTERISTIC_UUID)
            .ok_or_else(|| Error::characteristic_not_found(&self.name, CHARACTERISTIC_UUID))
    }

    async fn close(&self) {
        if !self.is_connected() {
            return;
        }

        info!("Disconnecting device {}", self.name);
        if !self.send_packet(Packet::power(false)).await {
            debug!("Could not power off device {} before disconnect", self.name);
        }

        self.characteristic.lock().await.take();
        if let Err(e) = self.peripheral.disconnect().await {
            debug!("GATT disconnect from {} failed: {}", self.name, e);
        }
        self.state.set(ConnectionState::Disconnected);
    }

    /// Seal and write one frame. The checksum is recomputed on every call.
    async fn send_packet(&self, mut packet: Packet) -> bool {
        let guard = self.characteristic.lock().await;
        let Some(characteristic) = guard.as_ref().filter(|_| self.is_connected()) else {
            debug!("Device {} is not connected", self.name);
            return false;
        };

        match self
            .peripheral
            .write(characteristic, packet.seal(), WriteType::WithoutResponse)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Error sending packet to device {}: {}", self.name, e);
                false
            }
        }
    }
}

impl Device for BluetoothLight {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }

    fn connect(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.open())
    }

    fn disconnect(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.close())
    }

    fn set_power(&self, on: bool) -> BoxFuture<'_, bool> {
        Box::pin(self.send_packet(Packet::power(on)))
    }

    fn set_brightness(&self, brightness: i32) -> BoxFuture<'_, bool> {
        Box::pin(self.send_packet(Packet::brightness(Brightness::ble(brightness))))
    }

    fn set_color(&self, color: Color) -> BoxFuture<'_, bool> {
        Box::pin(self.send_packet(Packet::color(color)))
    }

    /// BLE lights have no temperature command; the color is approximated.
    fn set_color_temperature(&self, kelvin: u32) -> BoxFuture<'_, bool> {
        self.set_color(Color::from_kelvin(kelvin))
    }

    fn keep_alive(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.send_packet(Packet::keep_alive()))
    }
}

/// Get the default Bluetooth adapter.
async fn adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(Error::NoAdapter)
}

/// Look for Govee BLE lights and let `picker` choose one.
///
/// Yields at most one device per call, or `None` when nothing matched, the
/// picker declined, or the Bluetooth stack failed.
///
/// # Examples
///
/// ```ignore
/// use govee_lights_rs::{BleConfig, FirstMatch, scan_for_bluetooth_device};
///
/// if let Some(light) = scan_for_bluetooth_device(&BleConfig::default(), &FirstMatch).await {
///     println!("found {}", light.name());
/// }
/// ```
pub async fn scan_for_bluetooth_device(
    config: &BleConfig,
    picker: &dyn DevicePicker,
) -> Option<BluetoothLight> {
    match find_device(config, picker).await {
        Ok(Some(light)) => {
            info!("Discovered Bluetooth device: {} ({})", light.name, light.id);
            Some(light)
        }
        Ok(None) => {
            info!("No Bluetooth device selected");
            None
        }
        Err(e) => {
            error!("Error scanning for Bluetooth devices: {}", e);
            None
        }
    }
}

async fn find_device(
    config: &BleConfig,
    picker: &dyn DevicePicker,
) -> Result<Option<BluetoothLight>> {
    let adapter = adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    runtime::sleep(config.scan_window).await;
    let peripherals = adapter.peripherals().await;
    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop BLE scan: {}", e);
    }

    let mut advertised = Vec::new();
    for peripheral in peripherals? {
        let name = peripheral.properties().await?.and_then(|props| props.local_name);
        let id = peripheral.id();
        advertised.push((peripheral, id, name));
    }
    let found = matching_candidates(config, advertised);

    let candidates: Vec<_> = found.iter().map(|(_, c)| c.clone()).collect();
    let Some(index) = picker.pick(&candidates) else {
        return Ok(None);
    };

    Ok(found
        .into_iter()
        .nth(index)
        .map(|(peripheral, c)| BluetoothLight::new(peripheral, &c.id, &c.advertised_name)))
}

/// Pair every peripheral advertising a Govee name with the candidate the
/// picker gets to see.
fn matching_candidates<P, I: Display>(
    config: &BleConfig,
    advertised: impl IntoIterator<Item = (P, I, Option<String>)>,
) -> Vec<(P, BleCandidate)> {
    advertised
        .into_iter()
        .filter_map(|(peripheral, id, name)| {
            let advertised_name = name.filter(|n| config.matches(n))?;
            let candidate = BleCandidate {
                id: id.to_string(),
                advertised_name,
            };
            Some((peripheral, candidate))
        })
        .collect()
}
