//! Measured line segments

use crate::{Result, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A straight line segment annotated with its length
///
/// The length is computed once at construction and never changes. Zero-length
/// segments are legal; anything dividing by [`MeasuredSegment::length`] must check
/// for them first.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasuredSegment {
    a: Vector2,
    b: Vector2,
    length: f64,
}

/// Where two segments' supporting lines cross
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intersection {
    /// The crossing point
    pub point: Vector2,
    /// Parametric position along the first segment (0 = start, 1 = end)
    pub t_self: f64,
    /// Parametric position along the second segment
    pub t_other: f64,
}

impl MeasuredSegment {
    /// Create a segment from `a` to `b`, measuring it
    pub fn new(a: Vector2, b: Vector2) -> Self {
        Self {
            a,
            b,
            length: a.distance_to(b),
        }
    }

    /// Create a segment whose length is already known
    ///
    /// Used when splitting a segment, where the length of each piece falls out of
    /// the split distance.
    pub(crate) fn with_length(a: Vector2, b: Vector2, length: f64) -> Self {
        Self { a, b, length }
    }

    #[inline]
    pub fn a(&self) -> Vector2 {
        self.a
    }

    #[inline]
    pub fn b(&self) -> Vector2 {
        self.b
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Check if the segment has zero length
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.length == 0.0
    }

    /// The displacement from `a` to `b`
    #[inline]
    pub fn vector(&self) -> Vector2 {
        self.b - self.a
    }

    /// Angle of the segment from the positive x axis in radians
    #[inline]
    pub fn direction(&self) -> f64 {
        self.vector().direction()
    }

    /// Copy of this segment shifted sideways by `distance` (positive = left)
    pub fn offset(&self, distance: f64) -> Result<Self> {
        let shift = self.vector().left().unit()?.scale(distance);
        Ok(Self::with_length(self.a + shift, self.b + shift, self.length))
    }

    /// Intersect the infinite lines through this segment and `other`
    ///
    /// Returns `None` only when the cross product of the two directions is exactly
    /// zero. Near-parallel segments still produce a (possibly distant) point, so
    /// callers needing a tolerance must apply it themselves. Parameters outside
    /// `[0, 1]` mean the crossing lies on a line's extension rather than on the
    /// segment itself.
    pub fn intersect(&self, other: &MeasuredSegment) -> Option<Intersection> {
        let ab = self.vector();
        let cd = other.vector();

        let ab_cross_cd = ab.cross(cd);
        if ab_cross_cd == 0.0 {
            return None;
        }

        let ac = other.a - self.a;
        let t_self = ac.cross(cd) / ab_cross_cd;
        let t_other = -ab.cross(ac) / ab_cross_cd;

        Some(Intersection {
            point: self.a + ab.scale(t_self),
            t_self,
            t_other,
        })
    }
}
