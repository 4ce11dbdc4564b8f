//! The capability set shared by every transport.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::runtime::BoxFuture;
use crate::types::Color;

/// Connection lifecycle of a device handle.
///
/// `Connecting` is only observable while a `connect()` call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, Display)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectionState {
    fn create(value: u8) -> Option<Self> {
        ConnectionState::iter().find(|state| *state as u8 == value)
    }
}

/// Lock-free holder for a [`ConnectionState`], so state can be read without
/// awaiting a transport lock.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        StateCell(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::create(self.0.load(Ordering::SeqCst))
            .unwrap_or(ConnectionState::Disconnected)
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// A controllable light, independent of how it is reached.
///
/// Every operation is total: failures are logged by the implementation and
/// surface as `false`, never as an error or a panic. Operations other than
/// `connect` return `false` without doing any I/O while the device is not
/// connected.
///
/// Methods return boxed futures so handles of different transports can live
/// side by side as `Arc<dyn Device>`.
pub trait Device: Send + Sync {
    /// Stable identifier, unique among the handles of a registry.
    fn id(&self) -> &str;

    /// Human-readable label.
    fn name(&self) -> &str;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Establish the transport. Returns `true` straight away when already
    /// connected.
    fn connect(&self) -> BoxFuture<'_, bool>;

    /// Power the device off if possible, then release the transport.
    /// Repeated calls are no-ops.
    fn disconnect(&self) -> BoxFuture<'_, ()>;

    fn set_power(&self, on: bool) -> BoxFuture<'_, bool>;

    /// Set brightness in percent; out-of-range values are clamped per transport.
    fn set_brightness(&self, brightness: i32) -> BoxFuture<'_, bool>;

    fn set_color(&self, color: Color) -> BoxFuture<'_, bool>;

    fn set_color_temperature(&self, kelvin: u32) -> BoxFuture<'_, bool>;

    /// Send the transport's liveness probe.
    fn keep_alive(&self) -> BoxFuture<'_, bool>;
}
