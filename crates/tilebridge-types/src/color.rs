use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 24-bit RGB color as exchanged with the guest.
///
/// The guest passes colors as a packed `0xRRGGBB` integer. Bits above the
/// low 24 are discarded on construction. The value `0` is reserved by the
/// render protocol to mean "empty cell".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(u32);

/// A CSS-style color string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected a color of the form #rrggbb, got `{0}`")]
pub struct ParseColorError(pub String);

impl Color {
    pub const EMPTY: Self = Self(0);

    /// Wrap a packed `0xRRGGBB` value.
    pub const fn from_raw(value: u32) -> Self {
        Self(value & 0x00ff_ffff)
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved "empty" color.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Six lowercase hex digits, zero-padded (`5` → `000005`).
    pub fn hex(self) -> String {
        format!("{:06x}", self.0)
    }

    /// The CSS form, `#` followed by [`Self::hex`].
    pub fn css(self) -> String {
        format!("#{}", self.hex())
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color(#{:06x})", self.0)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('#')
            .filter(|d| d.len() == 6)
            .ok_or_else(|| ParseColorError(s.to_string()))?;
        u32::from_str_radix(digits, 16)
            .map(Self::from_raw)
            .map_err(|_| ParseColorError(s.to_string()))
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
        color.css()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_is_zero_padded() {
        assert_eq!(Color::from_raw(5).hex(), "000005");
        assert_eq!(Color::from_raw(0x00ff00).hex(), "00ff00");
        assert_eq!(Color::from_raw(0xffffff).hex(), "ffffff");
    }

    #[test]
    fn test_high_bits_are_discarded() {
        assert_eq!(Color::from_raw(0x0112_3456).raw(), 0x123456);
    }

    #[test]
    fn test_components() {
        let c = Color::from_raw(0x102030);
        assert_eq!((c.r(), c.g(), c.b()), (0x10, 0x20, 0x30));
        assert_eq!(Color::rgb(0x10, 0x20, 0x30), c);
    }

    #[test]
    fn test_parse_css() {
        assert_eq!("#001717".parse::<Color>().unwrap(), Color::from_raw(0x001717));
        assert!("001717".parse::<Color>().is_err());
        assert!("#00171".parse::<Color>().is_err());
        assert!("#zz1717".parse::<Color>().is_err());
    }

    #[test]
    fn test_empty() {
        assert!(Color::EMPTY.is_empty());
        assert!(!Color::from_raw(1).is_empty());
    }
}
