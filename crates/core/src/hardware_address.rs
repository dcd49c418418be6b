//! Canonical network hardware (MAC) address.
//!
//! The canonical form is six uppercase hexadecimal pairs joined by colons,
//! e.g. `AA:BB:CC:DD:EE:FF`. Accepted inputs:
//!
//! - colon-separated pairs (`aa:bb:cc:dd:ee:ff`)
//! - dash-separated pairs (`aa-bb-cc-dd-ee-ff`)
//! - twelve contiguous hex digits (`AABBCCDDEEFF`)
//!
//! Either case is accepted. Mixed separators, other separators (dots,
//! spaces) and any pair count other than six are rejected.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

const OCTETS: usize = 6;

/// A normalized six-octet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareAddress([u8; OCTETS]);

impl ValueObject for HardwareAddress {}

impl HardwareAddress {
    pub fn from_octets(octets: [u8; OCTETS]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; OCTETS] {
        self.0
    }

    /// Parse and normalize a raw address as reported by the device source.
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(DomainError::invalid_hardware_address("empty address"));
        }

        let has_colon = input.contains(':');
        let has_dash = input.contains('-');

        let pairs: Vec<&str> = match (has_colon, has_dash) {
            (true, true) => {
                return Err(DomainError::invalid_hardware_address(format!(
                    "mixed separators in {input:?}"
                )));
            }
            (true, false) => input.split(':').collect(),
            (false, true) => input.split('-').collect(),
            (false, false) => {
                if input.len() != OCTETS * 2 || !input.is_ascii() {
                    return Err(DomainError::invalid_hardware_address(format!(
                        "expected 12 hex digits, got {input:?}"
                    )));
                }
                (0..OCTETS).map(|i| &input[i * 2..i * 2 + 2]).collect()
            }
        };

        if pairs.len() != OCTETS {
            return Err(DomainError::invalid_hardware_address(format!(
                "expected {OCTETS} pairs, got {} in {input:?}",
                pairs.len()
            )));
        }

        let mut octets = [0u8; OCTETS];
        for (slot, pair) in octets.iter_mut().zip(pairs) {
            if pair.len() != 2 || !pair.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(DomainError::invalid_hardware_address(format!(
                    "bad pair {pair:?} in {input:?}"
                )));
            }
            *slot = u8::from_str_radix(pair, 16)
                .map_err(|e| DomainError::invalid_hardware_address(e.to_string()))?;
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for HardwareAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for HardwareAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HardwareAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
