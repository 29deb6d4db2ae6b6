//! CPU rasterizer for the overlay, backed by a `tiny_skia` pixmap.

use crate::coords::{DevicePoint, DeviceRect};
use crate::render::{Fill, PixelSize, StrokeStyle, Surface};
use doc_model::Color;
use image::{Rgba, RgbaImage};
use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// Overlay surface. Stays empty until the first resize to a non-zero size.
#[derive(Debug, Clone, Default)]
pub struct RasterSurface {
    pixmap: Option<Pixmap>,
}

impl RasterSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> PixelSize {
        self.pixmap
            .as_ref()
            .map(|pixmap| PixelSize { width: pixmap.width(), height: pixmap.height() })
            .unwrap_or(PixelSize { width: 0, height: 0 })
    }

    /// Straight-alpha copy of the current pixels.
    pub fn to_image(&self) -> RgbaImage {
        let Some(pixmap) = &self.pixmap else {
            return RgbaImage::new(0, 0);
        };

        let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
        for (target, pixel) in image.pixels_mut().zip(pixmap.pixels()) {
            let color = pixel.demultiply();
            *target = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
        }
        image
    }

    pub fn into_image(self) -> RgbaImage {
        self.to_image()
    }
}

fn paint(color: Color, opacity: f32) -> Paint<'static> {
    let alpha = (color.a as f32 * opacity.clamp(0.0, 1.0)).round() as u8;

    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, alpha);
    paint.anti_alias = true;
    paint
}

impl Surface for RasterSurface {
    fn resize(&mut self, size: PixelSize) {
        if self.size() != size {
            self.pixmap = Pixmap::new(size.width, size.height);
        }
    }

    fn clear(&mut self) {
        if let Some(pixmap) = &mut self.pixmap {
            pixmap.fill(tiny_skia::Color::TRANSPARENT);
        }
    }

    fn stroke_path(&mut self, points: &[DevicePoint], style: StrokeStyle) {
        let Some(pixmap) = &mut self.pixmap else {
            return;
        };
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        if rest.is_empty() || style.width <= 0.0 {
            return;
        }

        let mut builder = PathBuilder::new();
        builder.move_to(first.x, first.y);
        for point in rest {
            builder.line_to(point.x, point.y);
        }
        let Some(path) = builder.finish() else {
            return;
        };

        let stroke = Stroke {
            width: style.width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &paint(style.color, 1.0), &stroke, Transform::identity(), None);
    }

    fn fill_rect(&mut self, rect: DeviceRect, fill: Fill) {
        let Some(pixmap) = &mut self.pixmap else {
            return;
        };
        let Some(rect) = Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) else {
            return;
        };

        pixmap.fill_rect(rect, &paint(fill.color, fill.opacity), Transform::identity(), None);
    }
}
