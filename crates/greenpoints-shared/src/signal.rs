//! GP-Bin device protocol.
//!
//! A bin notifies one [`DETECTION_SIGNAL`] byte per detected bottle over its
//! BLE characteristic. A bridge may batch several notifications into one
//! payload; every byte must be a detection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DETECTION_SIGNAL, DEVICE_NAME_PREFIX, MAX_UNITS_PER_CREDIT};
use crate::error::SignalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignalKind {
    Detection = DETECTION_SIGNAL,
}

impl SignalKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            DETECTION_SIGNAL => Some(Self::Detection),
            _ => None,
        }
    }
}

/// Decode a raw payload into the number of detected units.
pub fn decode_signal(payload: &[u8]) -> Result<u64, SignalError> {
    if payload.is_empty() {
        return Err(SignalError::Empty);
    }
    let max = usize::try_from(MAX_UNITS_PER_CREDIT).unwrap_or(usize::MAX);
    if payload.len() > max {
        return Err(SignalError::TooManyDetections {
            count: payload.len(),
            max,
        });
    }

    let mut units = 0u64;
    for &b in payload {
        match SignalKind::from_byte(b) {
            Some(SignalKind::Detection) => units += 1,
            None => return Err(SignalError::UnknownByte(b)),
        }
    }
    Ok(units)
}

/// Advertised name of a bin, e.g. `GP-Bin-Node-01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceName(String);

impl DeviceName {
    pub fn new(raw: impl Into<String>) -> Result<Self, SignalError> {
        let raw = raw.into();
        let name = raw.trim();
        let valid_tail = name
            .strip_prefix(DEVICE_NAME_PREFIX)
            .map(|tail| {
                tail.len() <= 64
                    && tail
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
            })
            .unwrap_or(false);
        if !valid_tail {
            return Err(SignalError::BadDeviceName {
                prefix: DEVICE_NAME_PREFIX,
            });
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceName {
    type Error = SignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceName> for String {
    fn from(name: DeviceName) -> Self {
        name.0
    }
}
