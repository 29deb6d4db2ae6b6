//! Overlay render pipeline.
//!
//! The pipeline subscribes to a fixed set of [`Signal`]s. The canvas notifies it
//! after every state change and it repaints synchronously: resize to the
//! rendered page, clear, committed annotations, session strokes, live preview.
//! Later draws land on top of earlier ones.

use crate::coords::{rect_to_device, to_device, DevicePoint, DeviceRect, Scale};
use crate::tool::InProgress;
use doc_model::{Annotation, AnnotationGeometry, CanvasPreferences, Color, PagePoint, Stroke, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// Round-capped, round-joined stroke. Width is in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    pub color: Color,
    pub opacity: f32,
}

/// Drawable layer placed over the rendered page.
pub trait Surface {
    fn resize(&mut self, size: PixelSize);
    fn clear(&mut self);
    fn stroke_path(&mut self, points: &[DevicePoint], style: StrokeStyle);
    fn fill_rect(&mut self, rect: DeviceRect, fill: Fill);
}

/// Source of the rendered page the overlay aligns to.
///
/// Layout belongs to the page renderer, so the size is asked for on every
/// redraw. `None` means the page has not been rendered yet.
pub trait PageRenderer {
    fn rendered_page_size(&self, page_number: u32, scale: Scale) -> Option<PixelSize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    PageAnnotations,
    InProgress,
    Tool,
    Scale,
    Page,
}

/// Snapshot of everything a redraw reads.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub page_number: u32,
    pub scale: Scale,
    pub tool: Tool,
    pub annotations: Vec<&'a Annotation>,
    pub session_strokes: &'a [Stroke],
    pub in_progress: Option<&'a InProgress>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub redraws: u64,
    /// Redraws skipped because the page surface was not ready.
    pub skipped: u64,
}

#[derive(Debug, Clone)]
pub struct RenderPipeline {
    prefs: CanvasPreferences,
    stats: RenderStats,
}

impl RenderPipeline {
    pub fn new(prefs: CanvasPreferences) -> Self {
        Self { prefs, stats: RenderStats::default() }
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Every signal repaints the whole overlay. Returns whether a frame was painted.
    pub fn notify<P, S>(&mut self, signal: Signal, frame: &Frame<'_>, page: &P, surface: &mut S) -> bool
    where
        P: PageRenderer + ?Sized,
        S: Surface + ?Sized,
    {
        tracing::trace!(?signal, page = frame.page_number, "redraw requested");
        self.redraw(frame, page, surface)
    }

    pub fn redraw<P, S>(&mut self, frame: &Frame<'_>, page: &P, surface: &mut S) -> bool
    where
        P: PageRenderer + ?Sized,
        S: Surface + ?Sized,
    {
        let Some(size) = page.rendered_page_size(frame.page_number, frame.scale) else {
            tracing::debug!(page = frame.page_number, "page surface not ready, skipping redraw");
            self.stats.skipped += 1;
            return false;
        };

        surface.resize(size);
        surface.clear();

        for annotation in &frame.annotations {
            self.draw_annotation(annotation, frame.scale, surface);
        }

        let active = StrokeStyle { color: self.prefs.active_color, width: self.pen_width(frame.scale) };

        if frame.tool == Tool::Pen {
            for stroke in frame.session_strokes {
                draw_stroke(stroke, frame.scale, active, surface);
            }
        }

        match frame.in_progress {
            Some(InProgress::Pen { points }) => draw_stroke(points, frame.scale, active, surface),
            Some(preview @ InProgress::Highlight { .. }) => {
                if let Some(rect) = preview.preview_rect() {
                    let fill =
                        Fill { color: self.prefs.highlight_color, opacity: self.prefs.highlight_opacity };
                    surface.fill_rect(rect_to_device(rect, frame.scale), fill);
                }
            }
            None => {}
        }

        self.stats.redraws += 1;
        true
    }

    fn draw_annotation<S>(&self, annotation: &Annotation, scale: Scale, surface: &mut S)
    where
        S: Surface + ?Sized,
    {
        match annotation.geometry() {
            AnnotationGeometry::Pen { strokes } => {
                let style = StrokeStyle { color: annotation.color(), width: self.pen_width(scale) };
                for stroke in strokes {
                    draw_stroke(stroke, scale, style, surface);
                }
            }
            AnnotationGeometry::Highlight { rects } => {
                let fill = Fill { color: annotation.color(), opacity: self.prefs.highlight_opacity };
                for rect in rects {
                    surface.fill_rect(rect_to_device(*rect, scale), fill);
                }
            }
        }
    }

    fn pen_width(&self, scale: Scale) -> f32 {
        self.prefs.pen_width * scale.get()
    }
}

// Single points are taps and draw nothing.
fn draw_stroke<S>(points: &[PagePoint], scale: Scale, style: StrokeStyle, surface: &mut S)
where
    S: Surface + ?Sized,
{
    if points.len() < 2 {
        return;
    }

    let device: Vec<DevicePoint> = points.iter().map(|point| to_device(*point, scale)).collect();
    surface.stroke_path(&device, style);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DrawCommand, RecordingSurface};
    use doc_model::PageRect;

    struct FixedPage(Option<(f32, f32)>);

    impl PageRenderer for FixedPage {
        fn rendered_page_size(&self, _page_number: u32, scale: Scale) -> Option<PixelSize> {
            self.0.map(|(w, h)| PixelSize {
                width: (w * scale.get()).round() as u32,
                height: (h * scale.get()).round() as u32,
            })
        }
    }

    fn frame<'a>(annotations: Vec<&'a Annotation>, scale: f32) -> Frame<'a> {
        Frame {
            page_number: 1,
            scale: Scale::new(scale).expect("valid scale"),
            tool: Tool::None,
            annotations,
            session_strokes: &[],
            in_progress: None,
        }
    }

    #[test]
    fn draw_order_is_resize_clear_then_annotations() {
        let pen = Annotation::pen(1, Color::RED, vec![vec![PagePoint::new(1.0, 1.0), PagePoint::new(2.0, 2.0)]])
            .expect("pen should build");
        let highlight =
            Annotation::highlight(1, Color::YELLOW, vec![PageRect::new(0.0, 0.0, 10.0, 10.0)])
                .expect("highlight should build");

        let mut pipeline = RenderPipeline::new(CanvasPreferences::default());
        let mut surface = RecordingSurface::new();

        assert!(pipeline.redraw(&frame(vec![&pen, &highlight], 1.0), &FixedPage(Some((612.0, 792.0))), &mut surface));

        let commands = surface.commands();
        assert_eq!(commands[0], DrawCommand::Resize(PixelSize { width: 612, height: 792 }));
        assert_eq!(commands[1], DrawCommand::Clear);
        assert!(matches!(commands[2], DrawCommand::Stroke { .. }));
        assert_eq!(
            commands[3],
            DrawCommand::FillRect {
                rect: DeviceRect { x: 0.0, y: 0.0, width: 10.0, height: 10.0 },
                fill: Fill { color: Color::YELLOW, opacity: 0.3 },
            }
        );
        assert_eq!(commands.len(), 4);
    }

    #[test]
    fn every_signal_repaints() {
        let mut pipeline = RenderPipeline::new(CanvasPreferences::default());
        let mut surface = RecordingSurface::new();
        let page = FixedPage(Some((100.0, 100.0)));

        let signals =
            [Signal::PageAnnotations, Signal::InProgress, Signal::Tool, Signal::Scale, Signal::Page];
        for signal in signals {
            assert!(pipeline.notify(signal, &frame(vec![], 1.0), &page, &mut surface));
        }

        assert_eq!(pipeline.stats().redraws, signals.len() as u64);
    }

    #[test]
    fn missing_page_surface_is_a_silent_no_op() {
        let mut pipeline = RenderPipeline::new(CanvasPreferences::default());
        let mut surface = RecordingSurface::new();

        assert!(!pipeline.redraw(&frame(vec![], 1.0), &FixedPage(None), &mut surface));
        assert!(surface.commands().is_empty());
        assert_eq!(pipeline.stats(), RenderStats { redraws: 0, skipped: 1 });
    }

    #[test]
    fn pen_width_scales_with_zoom() {
        let pen = Annotation::pen(1, Color::BLUE, vec![vec![PagePoint::new(0.0, 0.0), PagePoint::new(4.0, 0.0)]])
            .expect("pen should build");

        let mut pipeline = RenderPipeline::new(CanvasPreferences::default());
        let mut surface = RecordingSurface::new();
        pipeline.redraw(&frame(vec![&pen], 1.5), &FixedPage(Some((100.0, 100.0))), &mut surface);

        let strokes = surface.strokes();
        assert_eq!(strokes.len(), 1);
        assert_eq!(strokes[0].1.width, 3.0);
        assert_eq!(strokes[0].0, vec![DevicePoint::new(0.0, 0.0), DevicePoint::new(6.0, 0.0)]);
    }

    #[test]
    fn single_point_strokes_are_not_drawn() {
        let pen = Annotation::pen(1, Color::BLUE, vec![vec![PagePoint::new(3.0, 3.0)]])
            .expect("pen should build");

        let mut pipeline = RenderPipeline::new(CanvasPreferences::default());
        let mut surface = RecordingSurface::new();
        pipeline.redraw(&frame(vec![&pen], 1.0), &FixedPage(Some((10.0, 10.0))), &mut surface);

        assert!(surface.strokes().is_empty());
    }

    #[test]
    fn session_strokes_render_only_with_pen_tool() {
        let session = vec![vec![PagePoint::new(0.0, 0.0), PagePoint::new(1.0, 1.0)]];
        let page = FixedPage(Some((10.0, 10.0)));
        let mut pipeline = RenderPipeline::new(CanvasPreferences::default());

        let mut with_pen = RecordingSurface::new();
        let pen_frame = Frame { tool: Tool::Pen, session_strokes: &session, ..frame(vec![], 1.0) };
        pipeline.redraw(&pen_frame, &page, &mut with_pen);
        assert_eq!(with_pen.strokes().len(), 1);
        assert_eq!(with_pen.strokes()[0].1.color, CanvasPreferences::default().active_color);

        let mut with_highlight = RecordingSurface::new();
        let highlight_frame = Frame { tool: Tool::Highlight, session_strokes: &session, ..frame(vec![], 1.0) };
        pipeline.redraw(&highlight_frame, &page, &mut with_highlight);
        assert!(with_highlight.strokes().is_empty());
    }

    #[test]
    fn highlight_preview_is_drawn_last() {
        let stroke = InProgress::Highlight { anchor: PagePoint::new(10.0, 10.0), current: PagePoint::new(4.0, 30.0) };
        let highlight =
            Annotation::highlight(1, Color::GREEN, vec![PageRect::new(0.0, 0.0, 10.0, 10.0)])
                .expect("highlight should build");

        let mut pipeline = RenderPipeline::new(CanvasPreferences::default());
        let mut surface = RecordingSurface::new();
        let preview = Frame { tool: Tool::Highlight, in_progress: Some(&stroke), ..frame(vec![&highlight], 2.0) };
        pipeline.redraw(&preview, &FixedPage(Some((50.0, 50.0))), &mut surface);

        assert_eq!(
            surface.commands().last(),
            Some(&DrawCommand::FillRect {
                rect: DeviceRect { x: 8.0, y: 20.0, width: 12.0, height: 40.0 },
                fill: Fill { color: Color::YELLOW, opacity: 0.3 },
            })
        );
    }
}
