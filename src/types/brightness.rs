//! Brightness levels.

use serde::{Deserialize, Serialize};

/// A brightness percentage, already clamped for a particular transport.
///
/// The BLE and LAN protocols disagree on the lowest accepted level: BLE
/// devices take 0, the LAN API starts at 1.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Brightness {
    const MAX: u8 = 100;
    const BLE_MIN: u8 = 0;
    const LAN_MIN: u8 = 1;

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Clamp a requested level to the BLE range (0-100).
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lights_rs::Brightness;
    ///
    /// assert_eq!(Brightness::ble(-10).value(), 0);
    /// assert_eq!(Brightness::ble(150).value(), 100);
    /// ```
    pub fn ble(requested: i32) -> Self {
        Self::clamped(requested, Self::BLE_MIN)
    }

    /// Clamp a requested level to the LAN range (1-100).
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lights_rs::Brightness;
    ///
    /// assert_eq!(Brightness::lan(-10).value(), 1);
    /// assert_eq!(Brightness::lan(150).value(), 100);
    /// ```
    pub fn lan(requested: i32) -> Self {
        Self::clamped(requested, Self::LAN_MIN)
    }

    fn clamped(requested: i32, min: u8) -> Self {
        let value = requested.clamp(i32::from(min), i32::from(Self::MAX));
        Brightness { value: value as u8 }
    }
}
