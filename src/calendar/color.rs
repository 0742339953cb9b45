use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const DEFAULT_COLOR: &str = "#0000ff";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Color(String);

impl Color {
    pub fn parse(value: &str) -> Option<Self> {
        static HEX_COLOR_RE: OnceLock<Regex> = OnceLock::new();
        let pattern = HEX_COLOR_RE.get_or_init(|| {
            Regex::new(r"^#([0-9a-fA-F]{6}|[0-9a-fA-F]{3})$")
                .expect("invalid hex color regex")
        });

        let trimmed = value.trim();
        if !pattern.is_match(trimmed) {
            return None;
        }

        let digits = trimmed[1..].to_ascii_lowercase();
        if digits.len() == 3 {
            let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
            Some(Self(format!("#{}", expanded)))
        } else {
            Some(Self(format!("#{}", digits)))
        }
    }

    pub fn parse_or_default(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Self(DEFAULT_COLOR.to_string())
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| Self::parse_or_default(&s)).unwrap_or_default())
    }
}
