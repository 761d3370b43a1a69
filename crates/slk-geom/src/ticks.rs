//! Distance-calibrated tick marks along screen-space polylines
//!
//! A road segment rendered on screen is a pixel-space polyline that represents a known
//! real-world SLK range. Ticks are placed at global multiples of the minor interval so
//! that adjacent segments line up across their shared boundary.

use crate::MeasuredPolyline;
use std::f64::consts::{FRAC_PI_2, PI};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Half-length in pixels of a major tick (drawn this far to each side of the line)
const MAJOR_TICK_HALF_LENGTH_PX: f64 = 6.0;

/// Half-length in pixels of a minor tick
const MINOR_TICK_HALF_LENGTH_PX: f64 = 2.0;

/// Slack allowed when deciding whether the final tick sits on the polyline's end point
const END_TOLERANCE_PX: f64 = 1e-6;

/// Relative slack when deciding whether a value already sits on an interval multiple
const ALIGN_TOLERANCE: f64 = 1e-9;

/// Which carriageway a rendered line belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CarriagewaySide {
    Left,
    Right,
    Single,
}

/// Horizontal anchoring of a tick label
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TextAlign {
    Left,
    Right,
}

/// Spacing of ticks for one zoom band
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickSpacing {
    /// Real-world distance between consecutive ticks
    pub minor_interval: f64,
    /// Every `major_count`-th tick is a labelled major tick
    pub major_count: u32,
    /// Decimal places used when formatting labels
    pub decimal_places: usize,
}

/// Chooses tick spacing from the map resolution
pub struct TickSchedule;

impl TickSchedule {
    /// Spacing for a map resolution given in map units per pixel
    pub fn for_resolution(resolution: f64) -> TickSpacing {
        let (minor_interval, major_count, decimal_places) = if resolution < 0.3 {
            (0.001, 10, 2)
        } else if resolution < 1.4 {
            (0.01, 10, 1)
        } else if resolution < 4.0 {
            (0.1, 5, 1)
        } else if resolution < 15.0 {
            (1.0, 1, 0)
        } else if resolution < 80.0 {
            (10.0, 1, 0)
        } else {
            (50.0, 1, 0)
        };

        TickSpacing {
            minor_interval,
            major_count,
            decimal_places,
        }
    }
}

/// A single tick draw command
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TickMark {
    /// End points of the tick, perpendicular to the line
    pub segment: (crate::Vector2, crate::Vector2),
    /// Formatted SLK value, present on labelled major ticks only
    pub label: Option<String>,
    /// Direction of the line at the tick in radians
    pub rotation: f64,
    pub major: bool,
}

/// Where and how to draw a tick label
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabelPlacement {
    pub text: String,
    pub rotation: f64,
    pub align: TextAlign,
}

impl TickMark {
    /// Label text, rotation and alignment such that text is never upside-down
    pub fn label_placement(&self) -> Option<LabelPlacement> {
        let text = self.label.clone()?;

        let mut rotation = self.rotation + FRAC_PI_2;
        let mut align = TextAlign::Left;
        if rotation.abs() > FRAC_PI_2 {
            rotation += PI;
            align = TextAlign::Right;
        }

        Some(LabelPlacement {
            text,
            rotation,
            align,
        })
    }
}

/// Generates tick marks for a pixel-space polyline covering `[slk_from, slk_to]`
#[derive(Clone, Debug)]
pub struct TickGenerator {
    slk_from: f64,
    slk_to: f64,
    spacing: TickSpacing,
    canvas_width: f64,
    canvas_height: f64,
    side: Option<CarriagewaySide>,
}

/// Distance from `value` forward to the next multiple of `interval` (zero if already on one)
fn distance_to_next_multiple(value: f64, interval: f64) -> f64 {
    let distance = interval - value.rem_euclid(interval);
    if distance >= interval * (1.0 - ALIGN_TOLERANCE) {
        0.0
    } else {
        distance
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TickGenerator {
    /// Create a generator with an unbounded canvas and no carriageway side
    pub fn new(slk_from: f64, slk_to: f64, spacing: TickSpacing) -> Self {
        Self {
            slk_from,
            slk_to,
            spacing,
            canvas_width: f64::INFINITY,
            canvas_height: f64::INFINITY,
            side: None,
        }
    }

    /// Only emit ticks inside `[0, width] x [0, height]`
    pub fn with_canvas(mut self, width: f64, height: f64) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    /// Set the carriageway the line belongs to; right carriageways get no labels
    pub fn with_side(mut self, side: CarriagewaySide) -> Self {
        self.side = Some(side);
        self
    }

    fn in_canvas(&self, point: crate::Vector2) -> bool {
        !(point.x < 0.0
            || point.x > self.canvas_width
            || point.y < 0.0
            || point.y > self.canvas_height)
    }

    /// Generate tick marks along `polyline`
    ///
    /// Returns no ticks when the polyline, the SLK range or the interval is empty.
    pub fn generate(&self, polyline: &MeasuredPolyline) -> Vec<TickMark> {
        let mut ticks = Vec::new();

        let length_px = polyline.magnitude();
        let length_real = self.slk_to - self.slk_from;
        let minor_interval = self.spacing.minor_interval;
        let major_count = u64::from(self.spacing.major_count.max(1));

        if !(length_px > 0.0 && length_real > 0.0 && minor_interval > 0.0) {
            tracing::debug!(
                length_px,
                slk_from = self.slk_from,
                slk_to = self.slk_to,
                minor_interval,
                "No ticks to generate"
            );
            return ticks;
        }

        let scale = length_px / length_real;
        let minor_interval_px = minor_interval * scale;
        if !(minor_interval_px > 0.0 && minor_interval_px.is_finite()) {
            return ticks;
        }

        let to_first_tick = distance_to_next_multiple(self.slk_from, minor_interval);
        // Global index of the first tick decides which local indices land on major multiples
        let first_index = ((self.slk_from + to_first_tick) / minor_interval).round() as i64;
        let major_phase = (-first_index).rem_euclid(major_count as i64) as u64;

        let initial_offset_px = to_first_tick * scale;
        let labels_enabled = self.side != Some(CarriagewaySide::Right);
        let last_index = polyline
            .segments()
            .iter()
            .rposition(|segment| !segment.is_degenerate())
            .unwrap_or(0);

        let mut tick_index: u64 = 0;
        let mut current_offset_px = initial_offset_px;
        let mut len_so_far_px = 0.0;

        for (index, segment) in polyline.segments().iter().enumerate() {
            if segment.is_degenerate() {
                continue;
            }

            let len_after_segment = len_so_far_px + segment.length();
            let unit = segment.vector().divide(segment.length());
            let rotation = unit.direction();
            let perpendicular = unit.left();

            let end_px = len_after_segment + END_TOLERANCE_PX;
            while current_offset_px < len_after_segment
                || (index == last_index && current_offset_px <= end_px)
            {
                let major = tick_index % major_count == major_phase;
                let half_length = if major {
                    MAJOR_TICK_HALF_LENGTH_PX
                } else {
                    MINOR_TICK_HALF_LENGTH_PX
                };

                let base = segment.a() + unit.scale(current_offset_px - len_so_far_px);
                if self.in_canvas(base) {
                    let label = (major && labels_enabled).then(|| {
                        let value =
                            tick_index as f64 * minor_interval + to_first_tick + self.slk_from;
                        format!("{:.*}", self.spacing.decimal_places, value)
                    });
                    ticks.push(TickMark {
                        segment: (
                            base - perpendicular.scale(half_length),
                            base + perpendicular.scale(half_length),
                        ),
                        label,
                        rotation,
                        major,
                    });
                }

                tick_index += 1;
                current_offset_px = tick_index as f64 * minor_interval_px + initial_offset_px;
            }

            len_so_far_px = len_after_segment;
        }

        ticks
    }
}
