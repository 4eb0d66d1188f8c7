//! Common utility types shared across models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Partition alignment boundary (1 MiB) - standard for modern disks
pub const DEFAULT_ALIGNMENT_MIB: u64 = 1;

/// A size expressed in mebibytes.
///
/// Plan files may spell sizes either as a bare integer (MiB) or as a string with a
/// unit suffix: `"4096"`, `"512M"`, `"2GB"`, `"4GiB"`, `"1T"`. Decimal and binary
/// suffixes are treated alike (`2GB` == `2GiB`), matching how installer prompts
/// present them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "SizeRepr", into = "u64")]
pub struct SizeMib(pub u64);

impl SizeMib {
    pub const fn new(mib: u64) -> Self {
        Self(mib)
    }

    pub const fn gib(gib: u64) -> Self {
        Self(gib * 1024)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<SizeMib> for u64 {
    fn from(value: SizeMib) -> Self {
        value.0
    }
}

impl fmt::Display for SizeMib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MiB", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeParseError(pub String);

impl fmt::Display for SizeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid size '{}'", self.0)
    }
}

impl std::error::Error for SizeParseError {}

impl FromStr for SizeMib {
    type Err = SizeParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| SizeParseError(input.to_string()))?;

        let unit = unit.trim().to_ascii_uppercase();
        let unit = unit
            .strip_suffix("IB")
            .or_else(|| unit.strip_suffix('B'))
            .unwrap_or(&unit);

        let mib = match unit {
            "" | "M" => Some(value),
            "K" => (value % 1024 == 0).then_some(value / 1024),
            "G" => value.checked_mul(1024),
            "T" => value.checked_mul(1024 * 1024),
            _ => None,
        };

        mib.map(SizeMib)
            .ok_or_else(|| SizeParseError(input.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Mib(u64),
    Text(String),
}

impl TryFrom<SizeRepr> for SizeMib {
    type Error = SizeParseError;

    fn try_from(value: SizeRepr) -> Result<Self, Self::Error> {
        match value {
            SizeRepr::Mib(mib) => Ok(SizeMib(mib)),
            SizeRepr::Text(text) => text.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SizeMib;

    #[test]
    fn parses_installer_style_sizes() {
        assert_eq!("2GB".parse::<SizeMib>().unwrap(), SizeMib(2048));
        assert_eq!("4GiB".parse::<SizeMib>().unwrap(), SizeMib(4096));
        assert_eq!("512M".parse::<SizeMib>().unwrap(), SizeMib(512));
        assert_eq!("4096".parse::<SizeMib>().unwrap(), SizeMib(4096));
        assert_eq!("1T".parse::<SizeMib>().unwrap(), SizeMib(1024 * 1024));
        assert_eq!(" 8 G ".parse::<SizeMib>().unwrap(), SizeMib(8192));
    }

    #[test]
    fn rejects_unknown_units() {
        assert!("12 parsecs".parse::<SizeMib>().is_err());
        assert!("GB".parse::<SizeMib>().is_err());
    }

    #[test]
    fn kibibytes_must_fill_whole_mebibytes() {
        assert_eq!("2048K".parse::<SizeMib>().unwrap(), SizeMib(2));
        assert!("1536K".parse::<SizeMib>().is_err());
        assert!("512KiB".parse::<SizeMib>().is_err());
    }

    #[test]
    fn deserializes_from_integer_or_string() {
        #[derive(serde::Deserialize)]
        struct Holder {
            size: SizeMib,
        }

        let numeric: Holder = toml::from_str("size = 1024").unwrap();
        let text: Holder = toml::from_str("size = \"2GB\"").unwrap();
        assert_eq!(numeric.size, SizeMib(1024));
        assert_eq!(text.size, SizeMib(2048));
    }
}
