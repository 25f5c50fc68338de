// Bluetooth device address (identity key for every device record)

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Normalized MAC address: six uppercase hex octets joined by `:`
///
/// Accepted input forms:
/// - `aa:bb:cc:dd:ee:ff` / `AA-BB-CC-DD-EE-FF` (one separator used throughout)
/// - `aabbccddeeff` (bare hex digits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = || DomainError::InvalidMac(input.to_string());

        let digits: String = match trimmed.len() {
            12 => trimmed.to_string(),
            17 => {
                let sep = trimmed.as_bytes()[2];
                if sep != b':' && sep != b'-' {
                    return Err(invalid());
                }
                let mut out = String::with_capacity(12);
                for (i, c) in trimmed.chars().enumerate() {
                    if i % 3 == 2 {
                        if c as u32 != sep as u32 {
                            return Err(invalid());
                        }
                    } else {
                        out.push(c);
                    }
                }
                out
            }
            _ => return Err(invalid()),
        };

        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            let pair = digits.get(i * 2..i * 2 + 2).ok_or_else(invalid)?;
            if !pair.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

/// Normalize a MAC string into canonical form
///
/// Idempotent: `normalize_mac(&normalize_mac(x)?) == normalize_mac(x)`
pub fn normalize_mac(input: &str) -> Result<String> {
    MacAddress::parse(input).map(|mac| mac.to_string())
}

/// Check MAC format without allocating a canonical string
pub fn is_valid_mac(input: &str) -> bool {
    MacAddress::parse(input).is_ok()
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for MacAddress {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        MacAddress::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercase_colon() {
        assert_eq!(
            normalize_mac("aa:bb:cc:dd:ee:ff").unwrap(),
            "AA:BB:CC:DD:EE:FF"
        );
    }

    #[test]
    fn test_normalize_dash_and_bare_forms() {
        assert_eq!(
            normalize_mac("0a-1B-2c-3D-4e-5F").unwrap(),
            "0A:1B:2C:3D:4E:5F"
        );
        assert_eq!(normalize_mac("001122aabbcc").unwrap(), "00:11:22:AA:BB:CC");
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in [
            "aa:bb:cc:dd:ee:ff",
            "AA-BB-CC-DD-EE-FF",
            "aabbccddeeff",
            " 01:23:45:67:89:ab ",
        ] {
            let once = normalize_mac(input).unwrap();
            let twice = normalize_mac(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_rejects_malformed() {
        for input in [
            "",
            "AA:BB:CC:DD:EE",
            "AA:BB:CC:DD:EE:FF:00",
            "AA:BB-CC:DD:EE:FF",
            "GG:BB:CC:DD:EE:FF",
            "AA.BB.CC.DD.EE.FF",
            "aabbccddeefg",
            "all",
        ] {
            assert!(
                matches!(MacAddress::parse(input), Err(DomainError::InvalidMac(_))),
                "accepted {input:?}"
            );
        }
    }

    #[test]
    fn test_serde_uses_canonical_string() {
        let mac = MacAddress::parse("aa:bb:cc:dd:ee:ff").unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"AA:BB:CC:DD:EE:FF\"");

        let back: MacAddress = serde_json::from_str("\"aa-bb-cc-dd-ee-ff\"").unwrap();
        assert_eq!(back, mac);
    }
}
