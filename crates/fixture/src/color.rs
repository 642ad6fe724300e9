use std::fmt;

use crate::error::{FixtureError, Result};

/// Default per-channel tolerance for color comparisons.
pub const COLOR_TOLERANCE: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 128, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB` or `#RRGGBB`, case-insensitive.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(FixtureError::InvalidColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| FixtureError::InvalidColor(hex.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Every channel within `tolerance` of `other`.
    pub fn is_near(&self, other: Rgb, tolerance: u8) -> bool {
        self.r.abs_diff(other.r) <= tolerance
            && self.g.abs_diff(other.g) <= tolerance
            && self.b.abs_diff(other.b) <= tolerance
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_hash() {
        assert_eq!(Rgb::from_hex("#FF0000").unwrap(), Rgb::RED);
        assert_eq!(Rgb::from_hex("0000ff").unwrap(), Rgb::BLUE);
        assert_eq!(Rgb::from_hex("  #ffffff ").unwrap().to_string(), "ffffff");
    }

    #[test]
    fn rejects_bad_input() {
        for bad in ["", "#fff", "gg0000", "#12345678", "ééé"] {
            assert!(
                matches!(Rgb::from_hex(bad), Err(FixtureError::InvalidColor(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn tolerance_is_per_channel() {
        let red = Rgb::from_hex("fe0a05").unwrap();
        assert!(red.is_near(Rgb::RED, COLOR_TOLERANCE));
        assert!(!Rgb::new(230, 0, 0).is_near(Rgb::RED, COLOR_TOLERANCE));
        assert!(Rgb::new(235, 0, 0).is_near(Rgb::RED, COLOR_TOLERANCE));
    }
}
