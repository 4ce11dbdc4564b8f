use std::string::FromUtf8Error;

/// All error types that can occur inside the transports.
///
/// These never cross the [`crate::Device`] boundary: device operations log
/// them and report `false` instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to serialize data to JSON.
    #[error("failed to dump json: {0:?}")]
    JsonDump(serde_json::Error),

    /// Failed to deserialize JSON data.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// A UDP datagram contained invalid UTF-8.
    #[error("utf8 decoding error: {0:?}")]
    Utf8Decode(FromUtf8Error),

    /// The operation needs a connected device.
    #[error("device {0} is not connected")]
    NotConnected(String),

    /// No Bluetooth adapter is available on this host.
    #[error("no bluetooth adapter found")]
    NoAdapter,

    /// The control service is missing from the device's GATT table.
    #[error("service {service} not found on device {device}")]
    ServiceNotFound { device: String, service: uuid::Uuid },

    /// The control characteristic is missing from the control service.
    #[error("characteristic {characteristic} not found on device {device}")]
    CharacteristicNotFound {
        device: String,
        characteristic: uuid::Uuid,
    },

    /// The platform Bluetooth stack reported an error.
    #[cfg(feature = "ble")]
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Failed to parse a [`crate::Color`] from a string.
    #[error("invalid color string: {0}")]
    InvalidColorString(String),
}

impl Error {
    /// Create a new socket error
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    /// Create a new service not found error
    pub fn service_not_found(device: &str, service: uuid::Uuid) -> Self {
        Error::ServiceNotFound {
            device: device.to_string(),
            service,
        }
    }

    /// Create a new characteristic not found error
    pub fn characteristic_not_found(device: &str, characteristic: uuid::Uuid) -> Self {
        Error::CharacteristicNotFound {
            device: device.to_string(),
            characteristic,
        }
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
