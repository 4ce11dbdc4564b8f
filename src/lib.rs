//! # govee_lights_rs
//!
//! An async Rust library for controlling Govee smart lights over Bluetooth LE
//! and the local network.
//!
//! Devices of both transports are registered with a [`Controller`], which
//! discovers them, fans commands out to them and keeps their connections
//! alive. A host application drives it with [`Request`]s and receives
//! [`Event`]s back through an [`EventSink`].
//!
//! ## Quick Start
//!
//! ```ignore
//! use futures::StreamExt;
//! use govee_lights_rs::{Color, Config, Controller, Event, Request};
//!
//! async fn make_everything_red() {
//!     let (events, mut received) = futures::channel::mpsc::unbounded();
//!     let controller = Controller::new(Config::default(), events);
//!     controller.start().await;
//!
//!     controller.handle(Request::Scan).await;
//!     let ids: Vec<String> = controller
//!         .registry()
//!         .summaries()
//!         .await
//!         .into_iter()
//!         .map(|device| device.id)
//!         .collect();
//!
//!     controller.handle(Request::Connect { device_ids: ids.clone() }).await;
//!     controller
//!         .handle(Request::SetColor { device_ids: ids, color: Color::rgb(255, 0, 0) })
//!         .await;
//!
//!     while let Ok(Some(event)) = received.try_next() {
//!         println!("{event:?}");
//!     }
//!     controller.stop().await;
//! }
//! ```
//!
//! ## Transports
//!
//! - **LAN**: JSON over UDP. Devices answer a multicast scan on
//!   `239.255.255.250:4001` with a reply to port 4002 and take commands on
//!   port 4003. See [`LanLight`] and [`scan_for_devices`].
//! - **Bluetooth LE**: fixed 20-byte frames written to a single GATT
//!   characteristic. See [`Packet`] and, with the `ble` feature,
//!   `BluetoothLight`.
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime
//! - `ble` (default): Bluetooth LE support through `btleplug`; requires
//!   `runtime-tokio`
//!
//! Exactly one runtime feature must be enabled. For example, a LAN-only build
//! on smol:
//!
//! ```toml
//! [dependencies]
//! govee-lights-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! ```

#[cfg(feature = "ble")]
mod bluetooth;
mod config;
mod controller;
mod device;
mod discovery;
mod envelope;
mod errors;
mod keep_alive;
mod lan;
mod packet;
mod registry;
pub mod runtime;
mod types;

// Re-export public API
#[cfg(feature = "ble")]
pub use bluetooth::{
    BleCandidate, BluetoothLight, DevicePicker, FirstMatch, clean_name, scan_for_bluetooth_device,
};
pub use config::{BleConfig, Config, KeepAliveConfig, LanConfig};
pub use controller::{Controller, Event, EventSink, Request};
pub use device::{ConnectionState, Device};
pub use discovery::{LanDescriptor, scan_for_devices};
pub use envelope::{Envelope, LanCommand, Message};
pub use errors::Error;
pub use keep_alive::KeepAlive;
pub use lan::LanLight;
pub use packet::{CHARACTERISTIC_UUID, Packet, SERVICE_UUID};
pub use registry::{DeviceSummary, Registry};
pub use types::{Brightness, Color, Kelvin};
