// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt, ops::Div, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

pub const KIB: u64 = 1024;
pub const MIB: u64 = KIB * 1024;
pub const GIB: u64 = MIB * 1024;
pub const TIB: u64 = GIB * 1024;

/// A byte size that renders and parses in human-readable units.
///
/// Stored as a plain byte count; `Display` picks the largest unit that
/// divides the value cleanly enough to stay readable ("1.5MiB", "8KiB").
/// Serialized through its string form so configuration files can say
/// `"10MB"` instead of `10485760`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReadableSize(pub u64);

impl ReadableSize {
    #[must_use]
    pub const fn kb(count: u64) -> Self { Self(count * KIB) }

    #[must_use]
    pub const fn mb(count: u64) -> Self { Self(count * MIB) }

    #[must_use]
    pub const fn gb(count: u64) -> Self { Self(count * GIB) }

    #[must_use]
    pub const fn as_bytes(self) -> u64 { self.0 }

    #[must_use]
    pub const fn as_mb(self) -> u64 { self.0 / MIB }
}

impl Div<u64> for ReadableSize {
    type Output = Self;

    fn div(self, rhs: u64) -> Self { Self(self.0 / rhs) }
}

impl From<ReadableSize> for u64 {
    fn from(size: ReadableSize) -> Self { size.0 }
}

impl fmt::Display for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.0;
        if bytes == 0 {
            return write!(f, "0B");
        }
        let (value, unit) = if bytes % TIB == 0 {
            (bytes / TIB, "TiB")
        } else if bytes % GIB == 0 {
            (bytes / GIB, "GiB")
        } else if bytes % MIB == 0 {
            (bytes / MIB, "MiB")
        } else if bytes % KIB == 0 {
            (bytes / KIB, "KiB")
        } else if bytes >= GIB {
            #[allow(clippy::cast_precision_loss)]
            return write!(f, "{:.2}GiB", bytes as f64 / GIB as f64);
        } else if bytes >= MIB {
            #[allow(clippy::cast_precision_loss)]
            return write!(f, "{:.2}MiB", bytes as f64 / MIB as f64);
        } else if bytes >= KIB {
            #[allow(clippy::cast_precision_loss)]
            return write!(f, "{:.2}KiB", bytes as f64 / KIB as f64);
        } else {
            (bytes, "B")
        };
        write!(f, "{value}{unit}")
    }
}

impl FromStr for ReadableSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("empty size string".to_string());
        }

        let split_at = trimmed
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split_at);
        let number: f64 = number
            .parse()
            .map_err(|_| format!("invalid size number in {trimmed:?}"))?;

        let multiplier = match unit.trim() {
            "" | "B" | "b" => 1,
            "K" | "KB" | "KiB" | "k" | "kb" => KIB,
            "M" | "MB" | "MiB" | "m" | "mb" => MIB,
            "G" | "GB" | "GiB" | "g" | "gb" => GIB,
            "T" | "TB" | "TiB" | "t" | "tb" => TIB,
            other => return Err(format!("unknown size unit {other:?} in {trimmed:?}")),
        };

        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        Ok(Self((number * multiplier as f64) as u64))
    }
}

impl Serialize for ReadableSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ReadableSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeVisitor;

        impl de::Visitor<'_> for SizeVisitor {
            type Value = ReadableSize;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a size string like \"10MB\" or a byte count")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ReadableSize(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        assert_eq!(ReadableSize::kb(8).as_bytes(), 8 * 1024);
        assert_eq!(ReadableSize::mb(1).as_bytes(), 1024 * 1024);
        assert_eq!(ReadableSize::gb(2).as_bytes(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_display() {
        assert_eq!(ReadableSize(0).to_string(), "0B");
        assert_eq!(ReadableSize(512).to_string(), "512B");
        assert_eq!(ReadableSize::kb(8).to_string(), "8KiB");
        assert_eq!(ReadableSize::mb(100).to_string(), "100MiB");
        // Exact KiB multiples stay in KiB; only irregular sizes go fractional.
        assert_eq!(ReadableSize(1024 * 1024 + 512 * 1024).to_string(), "1536KiB");
        assert_eq!(ReadableSize(1024 * 1024 + 100).to_string(), "1.00MiB");
    }

    #[test]
    fn test_parse() {
        assert_eq!("128".parse::<ReadableSize>().unwrap(), ReadableSize(128));
        assert_eq!("8KiB".parse::<ReadableSize>().unwrap(), ReadableSize::kb(8));
        assert_eq!("10MB".parse::<ReadableSize>().unwrap(), ReadableSize::mb(10));
        assert_eq!("1.5M".parse::<ReadableSize>().unwrap(), ReadableSize(1536 * 1024));
        assert!("abc".parse::<ReadableSize>().is_err());
        assert!("10XB".parse::<ReadableSize>().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let size = ReadableSize::mb(16);
        let json = serde_json::to_string(&size).unwrap();
        assert_eq!(json, "\"16MiB\"");
        let back: ReadableSize = serde_json::from_str(&json).unwrap();
        assert_eq!(back, size);

        let from_int: ReadableSize = serde_json::from_str("4096").unwrap();
        assert_eq!(from_int, ReadableSize::kb(4));
    }
}
