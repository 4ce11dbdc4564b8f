//! RGB colors and the color-temperature model.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::Error;

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    #[serde(rename = "r")]
    pub(crate) red: u8,
    #[serde(rename = "g")]
    pub(crate) green: u8,
    #[serde(rename = "b")]
    pub(crate) blue: u8,
}

impl Color {
    /// Create a color with the given RGB values.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Approximate the color of a blackbody radiator at `kelvin`.
    ///
    /// Used by transports without a native color-temperature command.
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lights_rs::Color;
    ///
    /// assert_eq!(Color::from_kelvin(6600), Color::rgb(255, 255, 255));
    ///
    /// let warm = Color::from_kelvin(2700);
    /// assert_eq!(warm.red(), 255);
    /// assert!(warm.blue() < warm.green());
    /// ```
    pub fn from_kelvin(kelvin: u32) -> Self {
        let temp = f64::from(kelvin) / 100.0;

        let red = if temp <= 66.0 {
            255.0
        } else {
            329.698727446 * (temp - 60.0).powf(-0.1332047592)
        };

        let green = if temp <= 66.0 {
            99.4708025861 * temp.ln() - 161.1195681661
        } else {
            288.1221695283 * (temp - 60.0).powf(-0.0755148492)
        };

        let blue = if temp >= 66.0 {
            255.0
        } else if temp <= 19.0 {
            0.0
        } else {
            138.5177312231 * (temp - 10.0).ln() - 305.0447927307
        };

        Self::rgb(channel(red), channel(green), channel(blue))
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }
}

/// Clamp to the channel range and round to the nearest integer.
fn channel(value: f64) -> u8 {
    value.clamp(0.0, 255.0).round() as u8
}

impl FromStr for Color {
    type Err = Error;

    /// Parse from comma-separated string (e.g., "255,128,0").
    fn from_str(s: &str) -> Result<Self, Error> {
        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidColorString(s.to_string()))?;
        match parts[..] {
            [red, green, blue] => Ok(Self::rgb(red, green, blue)),
            _ => Err(Error::InvalidColorString(s.to_string())),
        }
    }
}
