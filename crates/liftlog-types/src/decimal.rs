//! Fixed-point decimal with two fractional digits.
//!
//! Weights and distances are stored and aggregated as integer hundredths so
//! that `80.25 kg` stays `80.25 kg` through SQLite, sums and averages. The
//! only floating point conversion happens at the JSON boundary, where a value
//! with at most two fractional digits round-trips exactly through the
//! shortest `f64` representation.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest magnitude (in hundredths) that survives the JSON `f64` boundary exactly.
const MAX_EXACT_HUNDREDTHS: i64 = 1 << 53;

/// Error returned when text cannot be read as a two-digit decimal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFixedError {
    #[error("empty decimal")]
    Empty,
    #[error("invalid decimal '{0}'")]
    Invalid(String),
    #[error("decimal out of range '{0}'")]
    OutOfRange(String),
}

/// A signed decimal with exactly two fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed2(i64);

impl Fixed2 {
    pub const ZERO: Fixed2 = Fixed2(0);

    /// Build from a raw count of hundredths.
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    /// Build from a whole number.
    pub const fn from_units(units: i64) -> Self {
        Self(units * 100)
    }

    /// Raw count of hundredths (the stored representation).
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    /// Round an `f64` to two digits, half away from zero.
    ///
    /// Rounds the shortest decimal text of `value` rather than the binary
    /// value, so `80.555` gives `80.56`. Returns `None` for non-finite or
    /// out-of-range input.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // `Display` for f64 never uses exponent notation.
        value.to_string().parse().ok()
    }

    /// Nearest `f64`, for serialization only.
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Divide by a count, rounding half away from zero. `None` when `count` is zero.
    pub fn div_round(&self, count: i64) -> Option<Self> {
        if count == 0 {
            return None;
        }
        let q = self.0 / count;
        let r = self.0 % count;
        let bump = if (r.abs() * 2) >= count.abs() {
            if (self.0 < 0) ^ (count < 0) { -1 } else { 1 }
        } else {
            0
        };
        Some(Self(q + bump))
    }

    /// Round to a whole number, half away from zero.
    pub fn round_units(&self) -> i64 {
        let q = self.0 / 100;
        if (self.0 % 100).abs() >= 50 {
            q + self.0.signum()
        } else {
            q
        }
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl Add for Fixed2 {
    type Output = Fixed2;

    fn add(self, rhs: Self) -> Self::Output {
        Fixed2(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Fixed2 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Fixed2::ZERO, |acc, x| acc + x)
    }
}

impl fmt::Display for Fixed2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Fixed2 {
    type Err = ParseFixedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseFixedError::Empty);
        }

        let (negative, body) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty())
            || !all_digits(int_part)
            || !all_digits(frac_part)
        {
            return Err(ParseFixedError::Invalid(s.to_string()));
        }

        let units: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| ParseFixedError::OutOfRange(s.to_string()))?
        };

        let frac_bytes = frac_part.as_bytes();
        let digit = |i: usize| frac_bytes.get(i).map(|b| (b - b'0') as i64).unwrap_or(0);
        let mut hundredths = digit(0) * 10 + digit(1);
        if digit(2) >= 5 {
            hundredths += 1;
        }

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(hundredths))
            .filter(|v| *v < MAX_EXACT_HUNDREDTHS)
            .ok_or_else(|| ParseFixedError::OutOfRange(s.to_string()))?;

        Ok(Self(if negative { -total } else { total }))
    }
}

impl Serialize for Fixed2 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_i64(self.0 / 100)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

struct Fixed2Visitor;

impl<'de> Visitor<'de> for Fixed2Visitor {
    type Value = Fixed2;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Fixed2, E> {
        v.checked_mul(100)
            .map(Fixed2)
            .ok_or_else(|| E::custom("decimal out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Fixed2, E> {
        i64::try_from(v)
            .map_err(|_| E::custom("decimal out of range"))
            .and_then(|v| self.visit_i64(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Fixed2, E> {
        Fixed2::from_f64(v).ok_or_else(|| E::custom("decimal out of range"))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Fixed2, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Fixed2 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(Fixed2Visitor)
    }
}
