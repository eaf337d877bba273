use std::fmt;

use image::Rgba;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

/// Packed `0xAARRGGBB` color, non-premultiplied.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Argb(pub u32);

impl Argb {
    pub const TRANSPARENT: Self = Self(0);
    pub const BLACK: Self = Self(0xFF00_0000);
    pub const WHITE: Self = Self(0xFFFF_FFFF);

    pub const fn from_components(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    pub const fn is_transparent(self) -> bool {
        self.0 == 0
    }

    pub const fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.red(), self.green(), self.blue(), self.alpha()])
    }

    /// Parse `#AARRGGBB` or `#RRGGBB` (leading `#` optional).
    pub fn parse_hex(raw: &str) -> Option<Self> {
        let digits = raw.trim().trim_start_matches('#');
        let value = u32::from_str_radix(digits, 16).ok()?;
        match digits.len() {
            8 => Some(Self(value)),
            6 => Some(Self(0xFF00_0000 | value)),
            _ => None,
        }
    }
}

impl fmt::Debug for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl fmt::Display for Argb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl<'de> Deserialize<'de> for Argb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ArgbVisitor)
    }
}

struct ArgbVisitor;

impl<'de> Visitor<'de> for ArgbVisitor {
    type Value = Argb;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a color as \"#AARRGGBB\", \"#RRGGBB\" or a 32-bit integer")
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u32::try_from(value)
            .map(Argb)
            .map_err(|_| E::custom(format!("color {value} does not fit in 32 bits")))
    }

    fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        u32::try_from(value)
            .map(Argb)
            .map_err(|_| E::custom(format!("color {value} does not fit in 32 bits")))
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Argb::parse_hex(value).ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
    }
}
