//! Command framing for the Bluetooth LE transport.
//!
//! Every BLE command is a fixed 20-byte frame:
//!
//! | byte   | meaning                     |
//! |--------|-----------------------------|
//! | 0      | opcode                      |
//! | 1      | sub-opcode                  |
//! | 2..=18 | payload, zero padded        |
//! | 19     | XOR of bytes 0..=18         |

use uuid::Uuid;

use crate::types::{Brightness, Color};

/// GATT service carrying the control characteristic.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0a0b0c0d1910);
/// Characteristic that accepts command frames.
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x00010203_0405_0607_0809_0a0b0c0d2b11);

const KEEP_ALIVE: u8 = 0xaa;
const COMMAND: u8 = 0x33;

const SUB_KEEP_ALIVE: u8 = 0x01;
const SUB_POWER: u8 = 0x01;
const SUB_BRIGHTNESS: u8 = 0x04;
const SUB_COLOR: u8 = 0x05;

const COLOR_MODE_MANUAL: u8 = 0x0d;

/// A single BLE command frame.
///
/// The checksum byte is only written by [`Packet::seal`], which the transport
/// calls right before each write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    bytes: [u8; Packet::LEN],
}

impl Packet {
    pub const LEN: usize = 20;
    const PAYLOAD_LEN: usize = Self::LEN - 3;

    fn new(opcode: u8, sub_opcode: u8, payload: &[u8]) -> Self {
        debug_assert!(payload.len() <= Self::PAYLOAD_LEN);
        let mut bytes = [0u8; Self::LEN];
        bytes[0] = opcode;
        bytes[1] = sub_opcode;
        bytes[2..2 + payload.len()].copy_from_slice(payload);
        Packet { bytes }
    }

    pub fn keep_alive() -> Self {
        Self::new(KEEP_ALIVE, SUB_KEEP_ALIVE, &[])
    }

    pub fn power(on: bool) -> Self {
        Self::new(COMMAND, SUB_POWER, &[u8::from(on)])
    }

    pub fn brightness(brightness: Brightness) -> Self {
        Self::new(COMMAND, SUB_BRIGHTNESS, &[brightness.value()])
    }

    pub fn color(color: Color) -> Self {
        Self::new(
            COMMAND,
            SUB_COLOR,
            &[COLOR_MODE_MANUAL, color.red(), color.green(), color.blue()],
        )
    }

    /// XOR of every byte except the trailing checksum slot.
    pub fn checksum(&self) -> u8 {
        self.bytes[..Self::LEN - 1]
            .iter()
            .fold(0, |acc, byte| acc ^ byte)
    }

    /// Overwrite the last byte with a freshly computed checksum and return the
    /// frame ready for transmission.
    pub fn seal(&mut self) -> &[u8; Packet::LEN] {
        self.bytes[Self::LEN - 1] = self.checksum();
        &self.bytes
    }
}
