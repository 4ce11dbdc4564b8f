//! Device control over the Govee LAN API (UDP/JSON).

use std::net::Ipv4Addr;

use log::{debug, info, warn};

use crate::config::LanConfig;
use crate::device::{ConnectionState, Device, StateCell};
use crate::discovery::LanDescriptor;
use crate::envelope::Envelope;
use crate::errors::Error;
use crate::runtime::{AsyncUdpSocket, BoxFuture, Mutex, UdpSocket};
use crate::types::{Brightness, Color, Kelvin};

type Result<T> = std::result::Result<T, Error>;

/// A Govee light controlled through the LAN API.
///
/// While connected the light owns one UDP socket bound to an ephemeral port;
/// it is released on [`Device::disconnect`]. Commands are fire-and-forget: a
/// send accepted by the local network stack counts as success.
///
/// # Example
///
/// ```ignore
/// let light = LanLight::new(descriptor, &LanConfig::default());
/// if light.connect().await {
///     light.set_color(Color::rgb(255, 0, 0)).await;
/// }
/// ```
#[derive(Debug)]
pub struct LanLight {
    descriptor: LanDescriptor,
    control_port: u16,
    state: StateCell,
    socket: Mutex<Option<UdpSocket>>,
}

impl LanLight {
    pub fn new(descriptor: LanDescriptor, config: &LanConfig) -> Self {
        info!("LAN device created: {} at {}", descriptor.sku, descriptor.ip);
        LanLight {
            descriptor,
            control_port: config.control_port,
            state: StateCell::new(),
            socket: Mutex::new(None),
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.descriptor.ip
    }

    pub fn sku(&self) -> &str {
        &self.descriptor.sku
    }

    /// Everything the device reported about itself when it was discovered.
    pub fn descriptor(&self) -> &LanDescriptor {
        &self.descriptor
    }

    async fn open(&self) -> bool {
        if self.is_connected() {
            debug!("Device {} is already connected", self.name());
            return true;
        }

        self.state.set(ConnectionState::Connecting);
        match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => {
                *self.socket.lock().await = Some(socket);
                self.state.set(ConnectionState::Connected);
                info!("Socket bound for device {}", self.name());
                true
            }
            Err(e) => {
                self.state.set(ConnectionState::Disconnected);
                warn!(
                    "Failed to connect to device {}: {}",
                    self.name(),
                    Error::socket("bind", e)
                );
                false
            }
        }
    }

    async fn close(&self) {
        if !self.is_connected() {
            return;
        }

        info!("Disconnecting LAN device {}", self.name());
        if !self.send_command(&Envelope::turn(false)).await {
            debug!("Could not power off device {} before disconnect", self.name());
        }

        // Dropping the socket closes it.
        self.socket.lock().await.take();
        self.state.set(ConnectionState::Disconnected);
    }

    /// Send one envelope to the device's control port.
    async fn send_command(&self, envelope: &Envelope) -> bool {
        match self.try_send(envelope).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Error sending command to {}: {}", self.name(), e);
                false
            }
        }
    }

    async fn try_send(&self, envelope: &Envelope) -> Result<()> {
        let guard = self.socket.lock().await;
        let socket = guard
            .as_ref()
            .ok_or_else(|| Error::NotConnected(self.id().to_string()))?;
        let bytes = envelope.to_bytes()?;
        let target = format!("{}:{}", self.descriptor.ip, self.control_port);
        socket
            .send_to(&bytes, &target)
            .await
            .map_err(|e| Error::socket("send_to", e))?;
        debug!("Sent {} to {}", envelope.msg.cmd, target);
        Ok(())
    }

    async fn command(&self, envelope: Envelope) -> bool {
        if !self.is_connected() {
            debug!("Device {} is not connected", self.name());
            return false;
        }
        self.send_command(&envelope).await
    }
}

impl Device for LanLight {
    fn id(&self) -> &str {
        &self.descriptor.device
    }

    fn name(&self) -> &str {
        &self.descriptor.sku
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
        Box::pin(self.command(Envelope::turn(on)))
    }

    fn set_brightness(&self, brightness: i32) -> BoxFuture<'_, bool> {
        Box::pin(self.command(Envelope::brightness(Brightness::lan(brightness))))
    }

    fn set_color(&self, color: Color) -> BoxFuture<'_, bool> {
        Box::pin(self.command(Envelope::color(color)))
    }

    fn set_color_temperature(&self, kelvin: u32) -> BoxFuture<'_, bool> {
        Box::pin(self.command(Envelope::color_temperature(Kelvin::clamp(kelvin))))
    }

    /// Liveness is inferred from a successful send; replies are never read.
    fn keep_alive(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.command(Envelope::dev_status()))
    }
}
