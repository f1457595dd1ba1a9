//! Axis-aligned hit boxes for the play area
//!
//! Overlap is inclusive on every edge: touching counts as a catch.

use glam::Vec2;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// From top-left corner and size
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    #[inline]
    pub fn top(&self) -> f32 {
        self.min.y
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.max.y
    }

    pub fn center_x(&self) -> f32 {
        (self.min.x + self.max.x) * 0.5
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.bottom() >= other.top()
            && self.top() <= other.bottom()
            && self.max.x >= other.min.x
            && self.min.x <= other.max.x
    }
}
