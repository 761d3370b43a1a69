//! SLK Geometry - Measured Polylines for Linear-Referenced Roads
//!
//! This library provides the geometry engine used to draw road segments located by
//! straight line kilometre (SLK) ranges. Geometry arrives from the georeferencing service
//! as plain coordinate lists; this crate annotates it with segment lengths so it can be
//! cut, offset and decorated with distance-calibrated tick marks in screen space.
//!
//! # Architecture
//!
//! - **[`Vector2`]**: Copyable 2D value type with the arithmetic the engine needs
//! - **[`MeasuredSegment`]**: A line segment with its length computed once at construction
//! - **[`MeasuredPolyline`]**: Ordered measured segments plus total length; interpolation,
//!   cutting and parallel offsetting
//! - **[`TickGenerator`]**: Regularly spaced, globally aligned tick marks along a pixel-space
//!   polyline
//! - **[`TickSchedule`]**: Picks a tick spacing appropriate for the current map resolution
//!
//! All types are immutable values. Transforms return new instances, so independent
//! polylines can be processed in parallel (see [`polyline::offset_all`]).

mod polyline;
mod segment;
mod ticks;
mod vector;

// Public API exports
pub use polyline::{MeasuredPolyline, offset_all};
pub use segment::{Intersection, MeasuredSegment};
pub use ticks::{
    CarriagewaySide, LabelPlacement, TextAlign, TickGenerator, TickMark, TickSchedule,
    TickSpacing,
};
pub use vector::Vector2;

/// Error types for the geometry engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GeomError {
    /// A zero-length vector cannot be normalised
    #[error("Degenerate vector: cannot normalise a zero-length vector")]
    DegenerateVector,
}

pub type Result<T> = std::result::Result<T, GeomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn(f64, f64) -> Vector2 = Vector2::new;
        let _: fn(Vector2, Vector2) -> MeasuredSegment = MeasuredSegment::new;
        let _: fn(f64) -> TickSpacing = TickSchedule::for_resolution;
    }

    #[test]
    fn test_error_display() {
        let message = GeomError::DegenerateVector.to_string();
        assert!(message.contains("zero-length"));
    }
}
