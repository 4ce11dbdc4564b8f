//! Color temperature control.

use serde::{Deserialize, Serialize};

/// Color temperature in Kelvin as accepted by the LAN API (2000K to 9000K).
///
/// Lower values produce warmer (more yellow/orange) light, while higher
/// values produce cooler (more blue) light.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Kelvin {
    pub(crate) kelvin: u32,
}

impl Kelvin {
    const MIN: u32 = 2000;
    const MAX: u32 = 9000;

    /// Get the kelvin value.
    pub fn kelvin(&self) -> u32 {
        self.kelvin
    }

    /// Clamp a requested temperature into the supported range.
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lights_rs::Kelvin;
    ///
    /// assert_eq!(Kelvin::clamp(500).kelvin(), 2000);
    /// assert_eq!(Kelvin::clamp(4000).kelvin(), 4000);
    /// assert_eq!(Kelvin::clamp(99999).kelvin(), 9000);
    /// ```
    pub fn clamp(requested: u32) -> Self {
        Kelvin {
            kelvin: requested.clamp(Self::MIN, Self::MAX),
        }
    }
}
