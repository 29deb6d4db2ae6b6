//! Page-normalized geometry.
//!
//! Every coordinate here is measured in unscaled page units with the origin at
//! the top-left corner of the page. Zoom is applied only when drawing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for PagePoint {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle. Valid rectangles have positive extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle spanned by two opposite corners, in any order.
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self { x: a.x.min(b.x), y: a.y.min(b.y), width: (b.x - a.x).abs(), height: (b.y - a.y).abs() }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// True when both sides are strictly larger than `min_side`.
    pub fn exceeds(&self, min_side: f32) -> bool {
        self.width > min_side && self.height > min_side
    }
}

/// Ordered list of points drawn in one pointer-down/up cycle.
pub type Stroke = Vec<PagePoint>;
