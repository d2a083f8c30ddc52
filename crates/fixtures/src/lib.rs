use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod fixture_library;

pub use fixture_library::{FixtureDefinition, FixtureLibrary, LibraryError};

/// Logical grid position of one fixture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Coordinate { x, y }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((x, y): (i32, i32)) -> Self {
        Coordinate { x, y }
    }
}

/// Channel layout variants understood by the patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProfileKind {
    Rgb,
    Grb,
    Rgbw,
}

impl ProfileKind {
    pub fn channel_count(&self) -> usize {
        match self {
            ProfileKind::Rgb | ProfileKind::Grb => 3,
            ProfileKind::Rgbw => 4,
        }
    }

    /// Channel types in wire order.
    pub fn channel_layout(&self) -> &'static [ChannelType] {
        match self {
            ProfileKind::Rgb => &[ChannelType::Red, ChannelType::Green, ChannelType::Blue],
            ProfileKind::Grb => &[ChannelType::Green, ChannelType::Red, ChannelType::Blue],
            ProfileKind::Rgbw => &[
                ChannelType::Red,
                ChannelType::Green,
                ChannelType::Blue,
                ChannelType::White,
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Rgb => "RGB",
            ProfileKind::Grb => "GRB",
            ProfileKind::Rgbw => "RGBW",
        }
    }

    /// A fresh, all-zero profile of this kind.
    pub fn profile(&self) -> FixtureProfile {
        match self {
            ProfileKind::Rgb => FixtureProfile::rgb(),
            ProfileKind::Grb => FixtureProfile::grb(),
            ProfileKind::Rgbw => FixtureProfile::rgbw(),
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rgb" => Ok(ProfileKind::Rgb),
            "grb" => Ok(ProfileKind::Grb),
            "rgbw" => Ok(ProfileKind::Rgbw),
            _ => Err(format!("Unknown profile type: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
    Red,
    Green,
    Blue,
    White,
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChannelType::Red => write!(f, "Red"),
            ChannelType::Green => write!(f, "Green"),
            ChannelType::Blue => write!(f, "Blue"),
            ChannelType::White => write!(f, "White"),
        }
    }
}

/// Current channel values of a fixture, tagged by layout.
///
/// `encode` and `decode` convert between the stored colour and the order the fixture expects the
/// bytes on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixtureProfile {
    Rgb { red: u8, green: u8, blue: u8 },
    Grb { red: u8, green: u8, blue: u8 },
    Rgbw { red: u8, green: u8, blue: u8, white: u8 },
}

impl FixtureProfile {
    pub fn rgb() -> Self {
        FixtureProfile::Rgb {
            red: 0,
            green: 0,
            blue: 0,
        }
    }

    pub fn grb() -> Self {
        FixtureProfile::Grb {
            red: 0,
            green: 0,
            blue: 0,
        }
    }

    pub fn rgbw() -> Self {
        FixtureProfile::Rgbw {
            red: 0,
            green: 0,
            blue: 0,
            white: 0,
        }
    }

    pub fn kind(&self) -> ProfileKind {
        match self {
            FixtureProfile::Rgb { .. } => ProfileKind::Rgb,
            FixtureProfile::Grb { .. } => ProfileKind::Grb,
            FixtureProfile::Rgbw { .. } => ProfileKind::Rgbw,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.kind().channel_count()
    }

    /// Channel values in wire order.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            FixtureProfile::Rgb { red, green, blue } => vec![red, green, blue],
            FixtureProfile::Grb { red, green, blue } => vec![green, red, blue],
            FixtureProfile::Rgbw {
                red,
                green,
                blue,
                white,
            } => vec![red, green, blue, white],
        }
    }

    /// Set channel values from wire order.
    ///
    /// Bytes past the channel count are ignored; a short buffer only updates the leading channels.
    pub fn decode(&mut self, data: &[u8]) {
        match self {
            FixtureProfile::Rgb { red, green, blue } => {
                for (slot, value) in [red, green, blue].into_iter().zip(data) {
                    *slot = *value;
                }
            }
            FixtureProfile::Grb { red, green, blue } => {
                for (slot, value) in [green, red, blue].into_iter().zip(data) {
                    *slot = *value;
                }
            }
            FixtureProfile::Rgbw {
                red,
                green,
                blue,
                white,
            } => {
                for (slot, value) in [red, green, blue, white].into_iter().zip(data) {
                    *slot = *value;
                }
            }
        }
    }

    /// Set the colour channels, leaving white untouched on RGBW fixtures.
    pub fn set_color(&mut self, r: u8, g: u8, b: u8) {
        match self {
            FixtureProfile::Rgb { red, green, blue }
            | FixtureProfile::Grb { red, green, blue }
            | FixtureProfile::Rgbw {
                red, green, blue, ..
            } => {
                *red = r;
                *green = g;
                *blue = b;
            }
        }
    }

    /// No-op on fixtures without a white channel.
    pub fn set_white(&mut self, w: u8) {
        if let FixtureProfile::Rgbw { white, .. } = self {
            *white = w;
        }
    }

    pub fn color(&self) -> Color {
        match *self {
            FixtureProfile::Rgb { red, green, blue }
            | FixtureProfile::Grb { red, green, blue }
            | FixtureProfile::Rgbw {
                red, green, blue, ..
            } => Color {
                r: red,
                g: green,
                b: blue,
            },
        }
    }
}

impl Default for FixtureProfile {
    fn default() -> Self {
        FixtureProfile::rgb()
    }
}

// Color representation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }

        let r = u8::from_str_radix(&digits[0..2], 16).ok()?;
        let g = u8::from_str_radix(&digits[2..4], 16).ok()?;
        let b = u8::from_str_radix(&digits[4..6], 16).ok()?;

        Some(Color { r, g, b })
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn lerp(&self, target: &Color, t: f32) -> Self {
        Color {
            r: Self::lerp_component(self.r, target.r, t),
            g: Self::lerp_component(self.g, target.g, t),
            b: Self::lerp_component(self.b, target.b, t),
        }
    }

    fn lerp_component(start: u8, end: u8, t: f32) -> u8 {
        let t = t.clamp(0.0, 1.0);
        let start_f = start as f32;
        let end_f = end as f32;
        (start_f + (end_f - start_f) * t).round() as u8
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
