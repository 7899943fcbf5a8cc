//! Placement of a rendered layer inside its destination canvas.
//!
//! A layer is either anchored to one of nine compass positions (plus margins)
//! or dropped at a manual pixel coordinate. Manual coordinates are used as-is,
//! so they may place the layer partially or fully outside the canvas.

use std::fmt;
use std::str::FromStr;

use super::WatermarkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAlign {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAlign {
    Left,
    Center,
    Right,
}

/// One of the nine two-character compass codes (`tl`, `cc`, `br`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorCode {
    pub vertical: VerticalAlign,
    pub horizontal: HorizontalAlign,
}

impl AnchorCode {
    pub const ALL: [&'static str; 9] = ["tl", "tc", "tr", "cl", "cc", "cr", "bl", "bc", "br"];

    pub fn new(vertical: VerticalAlign, horizontal: HorizontalAlign) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }
}

impl FromStr for AnchorCode {
    type Err = WatermarkError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let lowered = code.trim().to_ascii_lowercase();
        let invalid = || WatermarkError::InvalidAnchorSpec(code.to_string());

        let mut chars = lowered.chars();
        let (Some(row), Some(col), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(invalid());
        };

        let vertical = match row {
            't' => VerticalAlign::Top,
            'c' => VerticalAlign::Center,
            'b' => VerticalAlign::Bottom,
            _ => return Err(invalid()),
        };
        let horizontal = match col {
            'l' => HorizontalAlign::Left,
            'c' => HorizontalAlign::Center,
            'r' => HorizontalAlign::Right,
            _ => return Err(invalid()),
        };

        Ok(Self::new(vertical, horizontal))
    }
}

impl fmt::Display for AnchorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = match self.vertical {
            VerticalAlign::Top => 't',
            VerticalAlign::Center => 'c',
            VerticalAlign::Bottom => 'b',
        };
        let col = match self.horizontal {
            HorizontalAlign::Left => 'l',
            HorizontalAlign::Center => 'c',
            HorizontalAlign::Right => 'r',
        };
        write!(f, "{row}{col}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Symbolic(AnchorCode),
    Manual { x: i32, y: i32 },
}

impl Anchor {
    /// Parse a symbolic anchor code.
    pub fn parse(code: &str) -> Result<Self, WatermarkError> {
        code.parse().map(Anchor::Symbolic)
    }
}

/// An anchor together with the margins applied to symbolic placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub anchor: Anchor,
    pub margin_x: i32,
    pub margin_y: i32,
}

impl Placement {
    pub fn new(anchor: Anchor, margin_x: i32, margin_y: i32) -> Self {
        Self {
            anchor,
            margin_x,
            margin_y,
        }
    }

    pub fn manual(x: i32, y: i32) -> Self {
        Self::new(Anchor::Manual { x, y }, 0, 0)
    }

    /// Compute the top-left coordinate of a payload inside a container.
    pub fn solve(&self, container: (u32, u32), payload: (u32, u32)) -> (i32, i32) {
        match self.anchor {
            Anchor::Manual { x, y } => (x, y),
            Anchor::Symbolic(code) => {
                let (container_w, container_h) = (container.0 as i64, container.1 as i64);
                let (payload_w, payload_h) = (payload.0 as i64, payload.1 as i64);
                let (margin_x, margin_y) = (self.margin_x as i64, self.margin_y as i64);

                let x = match code.horizontal {
                    HorizontalAlign::Left => margin_x,
                    HorizontalAlign::Center => (container_w - payload_w) / 2,
                    HorizontalAlign::Right => container_w - payload_w - margin_x,
                };
                let y = match code.vertical {
                    VerticalAlign::Top => margin_y,
                    VerticalAlign::Center => (container_h - payload_h) / 2,
                    VerticalAlign::Bottom => container_h - payload_h - margin_y,
                };

                (clamp_coordinate(x), clamp_coordinate(y))
            }
        }
    }
}

fn clamp_coordinate(value: i64) -> i32 {
    value.clamp(0, i32::MAX as i64) as i32
}
