use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Opaque 8-byte version stamp of an object's last known persisted state.
///
/// The cache never interprets a serial. Coordinators typically encode a
/// transaction timestamp; all-zero means "never stored".
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Serial([u8; 8]);

impl Serial {
    /// Width of a serial in bytes.
    pub const LEN: usize = 8;

    /// The all-zero serial.
    pub const ZERO: Serial = Serial([0u8; 8]);

    /// Create a serial from its raw bytes.
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Create a serial from a byte slice, rejecting anything not 8 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; 8] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: Self::LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Create a serial from an integer (big-endian encoding).
    pub const fn from_u64(value: u64) -> Self {
        Self(value.to_be_bytes())
    }

    /// The integer value of this serial.
    pub fn as_u64(&self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Returns `true` if this is the all-zero serial.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 8]
    }

    /// The raw 8 bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Serial({})", self.to_hex())
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<&[u8]> for Serial {
    type Error = TypeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}
