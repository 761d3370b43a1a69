//! Measured polyline storage and fractional-distance operations
//!
//! This module provides the `MeasuredPolyline` struct: an ordered list of measured
//! segments with a cached total length. Every position argument is a fraction of the
//! total length, which is how SLK ranges map onto geometry returned by the
//! georeferencing service.

use crate::{MeasuredSegment, Vector2};
use geo::LineString;
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cross products smaller than this are treated as parallel when joining offset segments
const PARALLEL_EPSILON: f64 = 1e-8;

/// An ordered, continuous list of measured segments
///
/// Consecutive segments share endpoints (`segments[i].b() == segments[i + 1].a()`).
/// This holds by construction and is not re-validated.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasuredPolyline {
    segments: Vec<MeasuredSegment>,
    /// Cached sum of segment lengths
    total_length: f64,
}

/// How two consecutive offset segments relate at their joint
#[derive(Clone, Copy, Debug, PartialEq)]
enum JoinClass {
    /// Directions are (nearly) parallel; no miter can be computed
    Parallel,
    /// The lines cross within both segments
    BothInRange(Vector2),
    /// The lines cross beyond both segments
    BothOutOfRange {
        point: Vector2,
        /// The crossing lies past the end of the first segment rather than before its start
        first_beyond_end: bool,
    },
    /// The lines cross within one segment but not the other
    Mixed,
}

/// Vertices to emit at a joint
#[derive(Clone, Copy, Debug, PartialEq)]
enum Join {
    /// Use the first segment's end point
    Shared(Vector2),
    /// Use the intersection point
    Miter(Vector2),
    /// Use both raw endpoints
    Bevel(Vector2, Vector2),
}

impl JoinClass {
    fn classify(first: &MeasuredSegment, second: &MeasuredSegment) -> Self {
        if first.vector().cross(second.vector()).abs() < PARALLEL_EPSILON {
            return JoinClass::Parallel;
        }

        let Some(hit) = first.intersect(second) else {
            return JoinClass::Parallel;
        };

        let first_in_range = (0.0..=1.0).contains(&hit.t_self);
        let second_in_range = (0.0..=1.0).contains(&hit.t_other);

        match (first_in_range, second_in_range) {
            (true, true) => JoinClass::BothInRange(hit.point),
            (false, false) => JoinClass::BothOutOfRange {
                point: hit.point,
                first_beyond_end: hit.t_self > 1.0,
            },
            _ => JoinClass::Mixed,
        }
    }

    fn join(self, first: &MeasuredSegment, second: &MeasuredSegment) -> Join {
        match self {
            JoinClass::Parallel => Join::Shared(first.b()),
            JoinClass::BothInRange(point) => Join::Miter(point),
            JoinClass::BothOutOfRange {
                point,
                first_beyond_end: true,
            } => Join::Miter(point),
            JoinClass::BothOutOfRange {
                first_beyond_end: false,
                ..
            }
            | JoinClass::Mixed => Join::Bevel(first.b(), second.a()),
        }
    }
}

impl MeasuredPolyline {
    /// Create an empty polyline
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a polyline from a sequence of points
    ///
    /// Fewer than two points yields an empty polyline with zero length.
    pub fn from_points<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Vector2>,
    {
        let points: Vec<Vector2> = points.into_iter().map(Into::into).collect();
        if points.len() < 2 {
            return Self::empty();
        }

        let segments = points
            .windows(2)
            .map(|pair| MeasuredSegment::new(pair[0], pair[1]))
            .collect();
        Self::from_segments(segments)
    }

    /// Build a polyline from a `geo` line string
    pub fn from_line_string(line_string: &LineString<f64>) -> Self {
        Self::from_points(line_string.coords().copied())
    }

    fn from_segments(segments: Vec<MeasuredSegment>) -> Self {
        let total_length = segments.iter().map(MeasuredSegment::length).sum();
        Self {
            segments,
            total_length,
        }
    }

    #[inline]
    pub fn segments(&self) -> &[MeasuredSegment] {
        &self.segments
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total length of all segments
    ///
    /// This is O(1) as the value is cached during construction.
    #[inline]
    pub fn magnitude(&self) -> f64 {
        self.total_length
    }

    /// Segment start points followed by the final end point
    pub fn to_points(&self) -> Vec<Vector2> {
        let Some(last) = self.segments.last() else {
            return Vec::new();
        };
        let mut points: Vec<Vector2> = self.segments.iter().map(MeasuredSegment::a).collect();
        points.push(last.b());
        points
    }

    /// Vertices as `[x, y]` pairs
    pub fn to_coords(&self) -> Vec<[f64; 2]> {
        self.to_points().into_iter().map(Into::into).collect()
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        LineString::new(self.to_points().into_iter().map(Into::into).collect())
    }

    /// Vertices as `[x, y, m]` triples, with the measure distributed by length
    ///
    /// The first vertex carries `from_measure` and the last exactly `to_measure`.
    pub fn to_measured_coords(&self, from_measure: f64, to_measure: f64) -> Vec<[f64; 3]> {
        let Some(last) = self.segments.last() else {
            return Vec::new();
        };

        let scale = if self.total_length > 0.0 {
            (to_measure - from_measure) / self.total_length
        } else {
            0.0
        };

        let mut measure = from_measure;
        let mut result = Vec::with_capacity(self.segments.len() + 1);
        for segment in &self.segments {
            result.push([segment.a().x, segment.a().y, measure]);
            measure += segment.length() * scale;
        }
        result.push([last.b().x, last.b().y, to_measure]);
        result
    }

    /// Point at `fraction` of the total length
    ///
    /// Fractions at or below zero give the first vertex. Fractions above one are not
    /// clamped; the scan never reaches them and falls through to the last vertex.
    /// Returns `None` for an empty polyline.
    pub fn interpolate(&self, fraction: f64) -> Option<Vector2> {
        let first = self.segments.first()?;
        if fraction <= 0.0 {
            return Some(first.a());
        }

        let target = self.total_length * fraction;
        let mut len_so_far = 0.0;
        for segment in &self.segments {
            len_so_far += segment.length();
            if len_so_far >= target {
                if segment.is_degenerate() {
                    return Some(segment.b());
                }
                let unit = segment.vector().divide(segment.length());
                return Some(segment.b() - unit.scale(len_so_far - target));
            }
        }

        self.segments.last().map(MeasuredSegment::b)
    }

    /// Angle of the segment containing `fraction` of the total length
    ///
    /// Returns `0.0` when no segment contains the position, including for an empty
    /// polyline. Some renderers rely on this default instead of an error.
    pub fn direction(&self, fraction: f64) -> f64 {
        let target = self.total_length * fraction;
        let mut len_so_far = 0.0;
        for segment in &self.segments {
            len_so_far += segment.length();
            if len_so_far >= target {
                return segment.direction();
            }
        }
        0.0
    }

    /// Split at `fraction` of the total length
    ///
    /// A new vertex is inserted at the exact cut point unless the cut falls on an
    /// existing vertex. `fraction <= 0` gives `(None, whole)` and `fraction >= 1` gives
    /// `(whole, None)`.
    pub fn cut(&self, fraction: f64) -> (Option<Self>, Option<Self>) {
        #[cfg(feature = "profiling")]
        profiling::scope!("polyline::cut");

        let distance_along = self.total_length * fraction;
        if distance_along <= 0.0 {
            return (None, Some(self.clone()));
        }
        if distance_along >= self.total_length {
            return (Some(self.clone()), None);
        }

        let mut remaining = distance_along;
        for (index, segment) in self.segments.iter().enumerate() {
            if remaining <= 0.0 {
                // Cut lands exactly on the vertex between index - 1 and index
                return (
                    Some(Self::from_segments(self.segments[..index].to_vec())),
                    Some(Self::from_segments(self.segments[index..].to_vec())),
                );
            }

            if remaining < segment.length() {
                let unit = segment.vector().divide(segment.length());
                let cut_point = segment.a() + unit.scale(remaining);

                let mut before = self.segments[..index].to_vec();
                before.push(MeasuredSegment::with_length(
                    segment.a(),
                    cut_point,
                    remaining,
                ));

                let mut after = Vec::with_capacity(self.segments.len() - index);
                after.push(MeasuredSegment::with_length(
                    cut_point,
                    segment.b(),
                    segment.length() - remaining,
                ));
                after.extend_from_slice(&self.segments[index + 1..]);

                return (
                    Some(Self::from_segments(before)),
                    Some(Self::from_segments(after)),
                );
            }

            remaining -= segment.length();
        }

        // Rounding left a sliver past the last vertex
        (Some(self.clone()), None)
    }

    /// Split into the parts before `start`, between `start` and `end`, and after `end`
    ///
    /// The second cut is made on the remainder, so `end` is re-normalised against the
    /// remaining length. If nothing remains after the first cut the last two parts are
    /// `None`.
    pub fn cut_twice(&self, start: f64, end: f64) -> (Option<Self>, Option<Self>, Option<Self>) {
        let (before, rest) = self.cut(start);
        let Some(rest) = rest else {
            return (before, None, None);
        };

        let start = start.max(0.0);
        let (middle, after) = rest.cut((end - start) / (1.0 - start));
        (before, middle, after)
    }

    /// Each segment shifted sideways by `distance` (positive = left)
    ///
    /// Zero-length segments have no direction and are skipped.
    pub fn offset_segments(&self, distance: f64) -> Vec<MeasuredSegment> {
        self.segments
            .iter()
            .filter_map(|segment| match segment.offset(distance) {
                Ok(shifted) => Some(shifted),
                Err(err) => {
                    tracing::trace!("Skipping segment while offsetting: {err}");
                    None
                }
            })
            .collect()
    }

    /// Parallel curve at perpendicular `distance` (positive = left)
    ///
    /// Consecutive shifted segments are stitched at each joint: nearly parallel
    /// segments share an endpoint, crossing segments are mitered and segments whose
    /// miter would point the wrong way get a bevel. Returns `None` for an empty
    /// polyline.
    pub fn offset(&self, distance: f64) -> Option<Vec<Vector2>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("polyline::offset");

        let shifted = self.offset_segments(distance);
        let first = shifted.first()?;
        let last = shifted.last()?;

        let mut points = Vec::with_capacity(shifted.len() + 1);
        points.push(first.a());

        for pair in shifted.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            match JoinClass::classify(current, next).join(current, next) {
                Join::Shared(point) | Join::Miter(point) => points.push(point),
                Join::Bevel(end, start) => {
                    points.push(end);
                    points.push(start);
                }
            }
        }

        points.push(last.b());
        Some(points)
    }
}

/// Offset many independent polylines in parallel
///
/// Results are returned in input order.
pub fn offset_all(polylines: &[MeasuredPolyline], distance: f64) -> Vec<Option<Vec<Vector2>>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("polyline::offset_all");

    polylines
        .par_iter()
        .map(|polyline| polyline.offset(distance))
        .collect()
}
