//! Quality tiers understood by the enhancement service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Resolution tier requested from the enhancement service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityLevel {
    /// Standard resolution
    #[default]
    #[serde(rename = "1K")]
    Standard,

    /// 2K output
    #[serde(rename = "2K")]
    High,

    /// 4K output
    #[serde(rename = "4K")]
    Ultra,
}

impl QualityLevel {
    /// All tiers, lowest first.
    pub const ALL: [QualityLevel; 3] = [Self::Standard, Self::High, Self::Ultra];

    /// Wire label (`"1K"`, `"2K"` or `"4K"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "1K",
            Self::High => "2K",
            Self::Ultra => "4K",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognised quality label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown quality level '{0}' (expected 1K, 2K or 4K)")]
pub struct ParseQualityError(pub String);

impl FromStr for QualityLevel {
    type Err = ParseQualityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "1K" => Ok(Self::Standard),
            "2K" => Ok(Self::High),
            "4K" => Ok(Self::Ultra),
            _ => Err(ParseQualityError(s.to_string())),
        }
    }
}
