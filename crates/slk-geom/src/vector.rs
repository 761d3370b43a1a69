//! Two-dimensional vector value type

use crate::{GeomError, Result};
use std::ops::{Add, Div, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A point or displacement in the plane
///
/// Used both for projected map coordinates and for pixel coordinates; the engine
/// does not care which space it is working in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Multiply both components by `k`
    #[inline]
    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    /// Divide both components by `k`
    ///
    /// No check is made for `k == 0`; callers dividing by a segment length must
    /// guard against degenerate segments first.
    #[inline]
    pub fn divide(self, k: f64) -> Self {
        Self::new(self.x / k, self.y / k)
    }

    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Scalar 2D cross product (`x1*y2 - y1*x2`)
    #[inline]
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    #[inline]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Normalise to unit length
    ///
    /// Fails with [`GeomError::DegenerateVector`] when the vector has zero length.
    pub fn unit(self) -> Result<Self> {
        let length = self.length();
        if length == 0.0 {
            return Err(GeomError::DegenerateVector);
        }
        Ok(self.divide(length))
    }

    /// Rotate 90° anticlockwise
    #[inline]
    pub fn left(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotate 90° clockwise
    #[inline]
    pub fn right(self) -> Self {
        Self::new(self.y, -self.x)
    }

    /// Angle from the positive x axis in radians, in `(-π, π]`
    #[inline]
    pub fn direction(self) -> f64 {
        self.y.atan2(self.x)
    }

    #[inline]
    pub fn distance_to(self, other: Self) -> f64 {
        (other - self).length()
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}

impl Div<f64> for Vector2 {
    type Output = Vector2;

    #[inline]
    fn div(self, rhs: f64) -> Self {
        self.divide(rhs)
    }
}

impl From<geo::Coord<f64>> for Vector2 {
    fn from(coord: geo::Coord<f64>) -> Self {
        Self::new(coord.x, coord.y)
    }
}

impl From<Vector2> for geo::Coord<f64> {
    fn from(v: Vector2) -> Self {
        geo::Coord { x: v.x, y: v.y }
    }
}

impl From<[f64; 2]> for Vector2 {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Vector2> for [f64; 2] {
    fn from(v: Vector2) -> Self {
        [v.x, v.y]
    }
}

impl From<(f64, f64)> for Vector2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}
