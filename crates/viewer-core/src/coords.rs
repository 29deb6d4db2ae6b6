//! Conversion between device pixels and page-normalized coordinates.
//!
//! Both directions are pure functions. The overlay's bounding box moves with
//! scrolling and resizing, so callers pass a fresh [`OverlayBounds`] with every
//! pointer event instead of caching one.

use crate::CanvasError;
use doc_model::{PagePoint, PageRect};

/// Position in device/viewport pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePoint {
    pub x: f32,
    pub y: f32,
}

impl DevicePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Bounding box of the overlay surface in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlayBounds {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl OverlayBounds {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    pub fn contains(&self, point: DevicePoint) -> bool {
        point.x >= self.left
            && point.y >= self.top
            && point.x <= self.left + self.width
            && point.y <= self.top + self.height
    }
}

/// Page-units-to-pixels ratio. Always positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Scale(f32);

impl Scale {
    pub const IDENTITY: Scale = Scale(1.0);

    pub fn new(value: f32) -> Result<Self, CanvasError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(CanvasError::InvalidScale(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

pub fn to_page(device: DevicePoint, bounds: OverlayBounds, scale: Scale) -> PagePoint {
    PagePoint::new((device.x - bounds.left) / scale.0, (device.y - bounds.top) / scale.0)
}

/// Overlay-local pixel position of a page point.
pub fn to_device(page: PagePoint, scale: Scale) -> DevicePoint {
    DevicePoint::new(page.x * scale.0, page.y * scale.0)
}

pub fn rect_to_device(rect: PageRect, scale: Scale) -> DeviceRect {
    DeviceRect {
        x: rect.x * scale.0,
        y: rect.y * scale.0,
        width: rect.width * scale.0,
        height: rect.height * scale.0,
    }
}
