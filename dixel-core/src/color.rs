//! Cell colors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An RGBA cell color.
///
/// Any color with zero alpha is the transparent sentinel: constructors
/// normalize it to [`Color::TRANSPARENT`] so that equality between empty
/// cells never depends on leftover RGB channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel (0 = empty cell).
    pub a: u8,
}

impl Color {
    /// The empty-cell sentinel.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// Opaque white.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Create an opaque color.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with alpha, normalizing zero alpha to the sentinel.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        if a == 0 {
            Self::TRANSPARENT
        } else {
            Self { r, g, b, a }
        }
    }

    /// Build from a 4-byte RGBA pixel.
    #[must_use]
    pub const fn from_bytes(px: [u8; 4]) -> Self {
        Self::rgba(px[0], px[1], px[2], px[3])
    }

    /// The color as a 4-byte RGBA pixel.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Whether this is the empty-cell sentinel.
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        self.a == 0
    }
}

/// Error returned when parsing a hex color fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid hex color: {0}")]
pub struct ParseColorError(String);

impl FromStr for Color {
    type Err = ParseColorError;

    /// Parse `#RRGGBB` or `#RRGGBBAA` (the leading `#` is optional).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(ParseColorError(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ParseColorError(s.to_string()))
        };
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Self::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02X}{:02X}{:02X}{:02X}",
                self.r, self.g, self.b, self.a
            )
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ParseColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_alpha_normalizes_to_sentinel() {
        assert_eq!(Color::rgba(10, 20, 30, 0), Color::TRANSPARENT);
        assert_eq!(Color::from_bytes([1, 2, 3, 0]), Color::TRANSPARENT);
        assert!(Color::default().is_transparent());
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!("#FF8000".parse::<Color>(), Ok(Color::rgb(255, 128, 0)));
        assert_eq!("ff800080".parse::<Color>(), Ok(Color::rgba(255, 128, 0, 128)));
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_serde() {
        let color = Color::rgba(1, 2, 3, 4);
        let json = serde_json::to_string(&color).expect("serialize");
        assert_eq!(json, "\"#01020304\"");
        let back: Color = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, color);
        assert_eq!(Color::WHITE.to_string(), "#FFFFFF");
    }
}
