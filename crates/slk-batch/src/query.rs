//! Linear-referencing queries and carriageway sets

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Queries spanning less than this many kilometres are padded
pub const MIN_SPAN_KM: f64 = 0.001;

/// Padding added to each end of a too-short query (10 m in total)
pub const SPAN_PADDING_KM: f64 = 0.005;

/// A set of carriageways of a (possibly divided) road
///
/// Every non-empty combination of Left, Right and Single has a variant, named by its
/// letters in sorted order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Carriageway {
    L,
    R,
    S,
    LR,
    LS,
    RS,
    #[default]
    LRS,
}

impl Carriageway {
    pub const ALL: [Carriageway; 7] = [
        Carriageway::L,
        Carriageway::R,
        Carriageway::S,
        Carriageway::LR,
        Carriageway::LS,
        Carriageway::RS,
        Carriageway::LRS,
    ];

    /// Wire bitmask: `L = 0b100`, `S = 0b010`, `R = 0b001`
    pub const fn bits(self) -> u8 {
        match self {
            Carriageway::L => 0b100,
            Carriageway::R => 0b001,
            Carriageway::S => 0b010,
            Carriageway::LR => 0b101,
            Carriageway::LS => 0b110,
            Carriageway::RS => 0b011,
            Carriageway::LRS => 0b111,
        }
    }

    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|cwy| cwy.bits() == bits)
    }

    /// Sorted letters naming this set
    pub const fn as_str(self) -> &'static str {
        match self {
            Carriageway::L => "L",
            Carriageway::R => "R",
            Carriageway::S => "S",
            Carriageway::LR => "LR",
            Carriageway::LS => "LS",
            Carriageway::RS => "RS",
            Carriageway::LRS => "LRS",
        }
    }

    /// Parse any spelling of a carriageway set
    ///
    /// Letters are uppercased, deduplicated and sorted before lookup, so `"rl"` and
    /// `"LRL"` both give [`Carriageway::LR`]. Anything unrecognised gives
    /// [`Carriageway::LRS`].
    pub fn parse_lenient(text: &str) -> Self {
        let mut letters: Vec<char> = text.chars().flat_map(char::to_uppercase).collect();
        letters.sort_unstable();
        letters.dedup();
        let key: String = letters.into_iter().collect();

        Self::ALL
            .into_iter()
            .find(|cwy| cwy.as_str() == key)
            .unwrap_or(Carriageway::LRS)
    }

    /// Check if every carriageway in `other` is also in `self`
    pub const fn contains(self, other: Carriageway) -> bool {
        self.bits() & other.bits() == other.bits()
    }
}

impl fmt::Display for Carriageway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Carriageway {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

impl From<&str> for Carriageway {
    fn from(text: &str) -> Self {
        Self::parse_lenient(text)
    }
}

impl From<String> for Carriageway {
    fn from(text: String) -> Self {
        Self::parse_lenient(&text)
    }
}

impl From<Carriageway> for String {
    fn from(cwy: Carriageway) -> Self {
        cwy.as_str().to_string()
    }
}

/// One road range to georeference
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearReferenceQuery {
    /// Road number, at most 255 bytes of UTF-8
    pub road: String,
    pub slk_from: f32,
    pub slk_to: f32,
    /// Perpendicular offset; positive values are to the left in the direction of increasing SLK
    #[serde(default)]
    pub offset: f32,
    #[serde(default, rename = "cwy", alias = "carriageway")]
    pub carriageway: Carriageway,
}

/// A query after normalisation, exactly as it goes on the wire
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedQuery {
    pub road: String,
    pub slk_min: f32,
    pub slk_max: f32,
    pub offset: f32,
    pub carriageway: Carriageway,
}

impl LinearReferenceQuery {
    pub fn new(road: impl Into<String>, slk_from: f32, slk_to: f32) -> Self {
        Self {
            road: road.into(),
            slk_from,
            slk_to,
            offset: 0.0,
            carriageway: Carriageway::LRS,
        }
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_carriageway(mut self, carriageway: Carriageway) -> Self {
        self.carriageway = carriageway;
        self
    }

    /// Normalise for encoding
    ///
    /// Reversed ranges are swapped, ranges shorter than [`MIN_SPAN_KM`] are padded by
    /// [`SPAN_PADDING_KM`] at each end so they still resolve to visible geometry, and
    /// the offset is scaled by `offset_multiplier`.
    pub fn normalized(&self, offset_multiplier: f64) -> EncodedQuery {
        let mut from = f64::from(self.slk_from);
        let mut to = f64::from(self.slk_to);
        if to < from {
            std::mem::swap(&mut from, &mut to);
        }
        if (to - from).abs() < MIN_SPAN_KM {
            from -= SPAN_PADDING_KM;
            to += SPAN_PADDING_KM;
        }

        EncodedQuery {
            road: self.road.clone(),
            slk_min: from as f32,
            slk_max: to as f32,
            offset: (f64::from(self.offset) * offset_multiplier) as f32,
            carriageway: self.carriageway,
        }
    }
}
