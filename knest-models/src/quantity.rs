//! Resource quantities with unit suffixes (`4Gi`, `512Mi`, `2G`)
//!
//! Only whole-byte quantities are accepted. Values are normalised to the
//! largest suffix that divides them evenly, so `4096Mi` and `4Gi` print the
//! same way.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ModelError;

const BINARY_SUFFIXES: [(&str, u128); 6] = [
    ("Ei", 1 << 60),
    ("Pi", 1 << 50),
    ("Ti", 1 << 40),
    ("Gi", 1 << 30),
    ("Mi", 1 << 20),
    ("Ki", 1 << 10),
];

const DECIMAL_SUFFIXES: [(&str, u128); 6] = [
    ("E", 1_000_000_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("T", 1_000_000_000_000),
    ("G", 1_000_000_000),
    ("M", 1_000_000),
    ("k", 1_000),
];

/// Which suffix family a quantity was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuantityFormat {
    BinarySi,
    DecimalSi,
}

/// A size with a unit suffix
#[derive(Debug, Clone, Copy)]
pub struct Quantity {
    value: u64,
    format: QuantityFormat,
}

impl Quantity {
    /// Quantity of `value` bytes expressed with binary suffixes
    pub fn from_bytes(value: u64) -> Self {
        Self {
            value,
            format: QuantityFormat::BinarySi,
        }
    }

    /// Quantity of `value` gibibytes
    pub fn gibibytes(value: u64) -> Self {
        Self::from_bytes(value << 30)
    }

    pub fn bytes(&self) -> u64 {
        self.value
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Quantity {}

impl FromStr for Quantity {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ModelError::InvalidQuantity {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, suffix) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(invalid("missing numeric value"));
        }

        let (multiplier, format) = match suffix {
            "" => (1, QuantityFormat::DecimalSi),
            other => BINARY_SUFFIXES
                .iter()
                .find(|(name, _)| *name == other)
                .map(|(_, m)| (*m, QuantityFormat::BinarySi))
                .or_else(|| {
                    DECIMAL_SUFFIXES
                        .iter()
                        .find(|(name, _)| *name == other)
                        .map(|(_, m)| (*m, QuantityFormat::DecimalSi))
                })
                .ok_or_else(|| invalid("unknown unit suffix"))?,
        };

        let (whole, fraction) = match number.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("missing numeric value"));
        }
        if fraction.contains('.') {
            return Err(invalid("malformed number"));
        }

        let overflow = || invalid("value too large");
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let mut total = whole.checked_mul(multiplier).ok_or_else(overflow)?;

        if !fraction.is_empty() {
            if fraction.len() > 18 {
                return Err(invalid("too many fractional digits"));
            }
            let digits: u128 = fraction.parse().map_err(|_| invalid("malformed number"))?;
            let scale = 10u128.pow(fraction.len() as u32);
            let scaled = digits.checked_mul(multiplier).ok_or_else(overflow)?;
            if scaled % scale != 0 {
                return Err(invalid("not a whole number of bytes"));
            }
            total = total.checked_add(scaled / scale).ok_or_else(overflow)?;
        }

        let value = u64::try_from(total).map_err(|_| overflow())?;
        Ok(Self { value, format })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = u128::from(self.value);
        if value == 0 {
            return f.write_str("0");
        }

        if self.format == QuantityFormat::BinarySi {
            if let Some((suffix, m)) = BINARY_SUFFIXES.iter().find(|(_, m)| value % m == 0) {
                return write!(f, "{}{}", value / m, suffix);
            }
        }

        match DECIMAL_SUFFIXES.iter().find(|(_, m)| value % m == 0) {
            Some((suffix, m)) => write!(f, "{}{}", value / m, suffix),
            None => write!(f, "{}", value),
        }
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
