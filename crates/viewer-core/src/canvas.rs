//! The annotation canvas: pointer input in, committed annotations out.
//!
//! Pointer events go through the tool machine after being normalized to page
//! units. Every state change notifies the render pipeline, which repaints the
//! overlay before the handler returns. A finished gesture yields a
//! [`NewAnnotation`] for the host to persist; the canvas does not wait on it.

use crate::coords::{to_page, DevicePoint, OverlayBounds, Scale};
use crate::render::{Frame, PageRenderer, PixelSize, RenderPipeline, RenderStats, Signal, Surface};
use crate::store::{AnnotationStore, ReloadSummary};
use crate::tool::{Completed, GestureOutcome, InProgress, ToolMachine};
use crate::CanvasError;
use doc_model::{
    Annotation, AnnotationRecord, CanvasPreferences, DocumentId, NewAnnotation, ReaderState,
    Stroke, Tool,
};

pub struct AnnotationCanvas<P, S> {
    document_id: DocumentId,
    prefs: CanvasPreferences,
    page_renderer: P,
    surface: S,
    machine: ToolMachine,
    store: AnnotationStore,
    // Pen strokes finished since the last tool or page change.
    session_strokes: Vec<Stroke>,
    page_number: u32,
    scale: Scale,
    pipeline: RenderPipeline,
}

impl<P, S> AnnotationCanvas<P, S>
where
    P: PageRenderer,
    S: Surface,
{
    pub fn new(document_id: DocumentId, prefs: CanvasPreferences, page_renderer: P, surface: S) -> Self {
        Self {
            document_id,
            prefs,
            page_renderer,
            surface,
            machine: ToolMachine::new(prefs.min_highlight_size),
            store: AnnotationStore::new(),
            session_strokes: Vec::new(),
            page_number: 1,
            scale: Scale::IDENTITY,
            pipeline: RenderPipeline::new(prefs),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn tool(&self) -> Tool {
        self.machine.tool()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn cursor(&self) -> &'static str {
        self.machine.tool().cursor()
    }

    pub fn in_progress(&self) -> Option<&InProgress> {
        self.machine.in_progress()
    }

    pub fn session_strokes(&self) -> &[Stroke] {
        &self.session_strokes
    }

    /// The Page Annotation Set for the displayed page, derived on each call.
    pub fn page_annotations(&self) -> Vec<&Annotation> {
        self.store.page_annotations(self.page_number)
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Pixel size of the rendered page under the overlay, once it exists.
    pub fn page_size(&self) -> Option<PixelSize> {
        self.page_renderer.rendered_page_size(self.page_number, self.scale)
    }

    pub fn render_stats(&self) -> RenderStats {
        self.pipeline.stats()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        if self.machine.select_tool(tool) {
            self.session_strokes.clear();
            self.notify(Signal::Tool);
        }
    }

    pub fn set_page(&mut self, page_number: u32) -> Result<(), CanvasError> {
        if page_number == 0 {
            return Err(CanvasError::InvalidPage(page_number));
        }
        if page_number == self.page_number {
            return Ok(());
        }

        if self.machine.cancel() {
            tracing::debug!(from = self.page_number, to = page_number, "page changed mid-gesture");
        }
        self.session_strokes.clear();
        self.page_number = page_number;
        self.notify(Signal::Page);
        Ok(())
    }

    pub fn set_scale(&mut self, scale: Scale) {
        if scale != self.scale {
            self.scale = scale;
            self.notify(Signal::Scale);
        }
    }

    /// Pulls tool, page and scale from the externally owned controls.
    pub fn sync_reader(&mut self, reader: &ReaderState) -> Result<(), CanvasError> {
        self.set_tool(reader.tool);
        self.set_page(reader.current_page)?;
        self.set_scale(Scale::new(reader.scale)?);
        Ok(())
    }

    /// Replaces committed annotations with the result of the listing call.
    pub fn replace_annotations(&mut self, records: &[AnnotationRecord]) -> ReloadSummary {
        let summary = self.store.replace_from_records(records);
        self.notify(Signal::PageAnnotations);
        summary
    }

    pub fn pointer_down(&mut self, at: DevicePoint, bounds: OverlayBounds) {
        let point = to_page(at, bounds, self.scale);
        if self.machine.pointer_down(point) {
            self.notify(Signal::InProgress);
        }
    }

    pub fn pointer_move(&mut self, at: DevicePoint, bounds: OverlayBounds) {
        let point = to_page(at, bounds, self.scale);
        if self.machine.pointer_move(point) {
            self.notify(Signal::InProgress);
        }
    }

    /// Ends the gesture. Returns the creation request when it produced markup.
    pub fn pointer_up(
        &mut self,
        at: DevicePoint,
        bounds: OverlayBounds,
    ) -> Result<Option<NewAnnotation>, CanvasError> {
        let point = to_page(at, bounds, self.scale);

        let completed = match self.machine.pointer_up(point) {
            GestureOutcome::NotDragging => return Ok(None),
            GestureOutcome::Discarded(reason) => {
                tracing::debug!(?reason, page = self.page_number, "gesture discarded");
                self.notify(Signal::InProgress);
                return Ok(None);
            }
            GestureOutcome::Committed(completed) => completed,
        };

        let built = match completed {
            Completed::Pen(stroke) => {
                Annotation::pen(self.page_number, self.prefs.pen_color, vec![stroke.clone()]).map(
                    |annotation| {
                        self.session_strokes.push(stroke);
                        annotation
                    },
                )
            }
            Completed::Highlight(rect) => {
                Annotation::highlight(self.page_number, self.prefs.highlight_color, vec![rect])
            }
        };
        let request = built
            .and_then(|annotation| NewAnnotation::from_annotation(self.document_id, &annotation));

        // Clear the preview before reporting a failed build.
        let request = match request {
            Ok(request) => request,
            Err(error) => {
                tracing::warn!(%error, page = self.page_number, "gesture produced no valid annotation");
                self.notify(Signal::InProgress);
                return Err(error.into());
            }
        };

        tracing::info!(
            document = %self.document_id,
            kind = %request.kind,
            page = request.page_number,
            "annotation committed"
        );

        self.notify(Signal::InProgress);
        Ok(Some(request))
    }

    /// Pointer left the overlay. A drag in flight stops without committing.
    pub fn pointer_leave(&mut self) {
        if self.machine.pointer_leave() {
            tracing::debug!(page = self.page_number, "pointer left overlay mid-gesture");
            self.notify(Signal::InProgress);
        }
    }

    /// Repaints regardless of what changed, e.g. once the page renderer is ready.
    pub fn redraw(&mut self) -> bool {
        let frame = Frame {
            page_number: self.page_number,
            scale: self.scale,
            tool: self.machine.tool(),
            annotations: self.store.page_annotations(self.page_number),
            session_strokes: &self.session_strokes,
            in_progress: self.machine.in_progress(),
        };
        self.pipeline.redraw(&frame, &self.page_renderer, &mut self.surface)
    }

    fn notify(&mut self, signal: Signal) -> bool {
        let frame = Frame {
            page_number: self.page_number,
            scale: self.scale,
            tool: self.machine.tool(),
            annotations: self.store.page_annotations(self.page_number),
            session_strokes: &self.session_strokes,
            in_progress: self.machine.in_progress(),
        };
        self.pipeline.notify(signal, &frame, &self.page_renderer, &mut self.surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::DeviceRect;
    use crate::recording::{DrawCommand, RecordingSurface};
    use crate::render::{Fill, PixelSize};
    use doc_model::{AnnotationGeometry, AnnotationId, AnnotationKind, Color, PagePoint, PageRect};
    use std::cell::Cell;

    /// Letter-sized page that can be toggled between rendered and not ready.
    struct LetterPage {
        ready: Cell<bool>,
    }

    impl PageRenderer for LetterPage {
        fn rendered_page_size(&self, _page_number: u32, scale: Scale) -> Option<PixelSize> {
            self.ready.get().then(|| PixelSize {
                width: (612.0 * scale.get()).round() as u32,
                height: (792.0 * scale.get()).round() as u32,
            })
        }
    }

    type TestCanvas = AnnotationCanvas<LetterPage, RecordingSurface>;

    fn canvas() -> TestCanvas {
        AnnotationCanvas::new(
            DocumentId(42),
            CanvasPreferences::default(),
            LetterPage { ready: Cell::new(true) },
            RecordingSurface::new(),
        )
    }

    fn at(x: f32, y: f32) -> DevicePoint {
        DevicePoint::new(x, y)
    }

    fn origin() -> OverlayBounds {
        OverlayBounds::new(0.0, 0.0, 612.0, 792.0)
    }

    fn draw(canvas: &mut TestCanvas, points: &[(f32, f32)]) -> Option<NewAnnotation> {
        let bounds = origin();
        let (first, rest) = points.split_first().expect("at least one point");
        canvas.pointer_down(at(first.0, first.1), bounds);
        for (x, y) in rest {
            canvas.pointer_move(at(*x, *y), bounds);
        }
        let last = points.last().expect("at least one point");
        canvas.pointer_up(at(last.0, last.1), bounds).expect("pointer up should not fail")
    }

    fn record(id: u64, request: &NewAnnotation) -> AnnotationRecord {
        AnnotationRecord {
            id: AnnotationId(id),
            document_id: request.document_id,
            kind: request.kind,
            page_number: request.page_number,
            payload: request.payload.clone(),
            created_at: 0,
        }
    }

    fn stroked_points(surface: &RecordingSurface) -> Vec<Vec<DevicePoint>> {
        surface.strokes().into_iter().map(|(points, _)| points).collect()
    }

    #[test]
    fn failed_annotation_build_clears_the_preview() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);
        let bounds = origin();

        canvas.pointer_down(at(10.0, 10.0), bounds);
        canvas.pointer_move(at(f32::NAN, 20.0), bounds);
        assert_eq!(canvas.surface().strokes().len(), 1);
        let redraws = canvas.render_stats().redraws;

        let err = canvas.pointer_up(at(30.0, 30.0), bounds).expect_err("NaN point should fail");
        assert!(matches!(
            err,
            CanvasError::Annotation(doc_model::AnnotationError::InvalidPoint { index: 0 })
        ));
        assert!(canvas.in_progress().is_none());
        assert!(canvas.session_strokes().is_empty());
        assert_eq!(canvas.render_stats().redraws, redraws + 1);
        assert!(canvas.surface().strokes().is_empty());
    }

    #[test]
    fn pen_round_trip_keeps_page_units_and_rescales_on_render() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);

        let request = draw(&mut canvas, &[(10.0, 10.0), (20.0, 10.0), (20.0, 20.0)])
            .expect("pen stroke should commit");

        let stored = Annotation::from_payload(&request.payload).expect("payload should decode");
        let expected: Stroke =
            vec![PagePoint::new(10.0, 10.0), PagePoint::new(20.0, 10.0), PagePoint::new(20.0, 20.0)];
        assert_eq!(stored.geometry(), &AnnotationGeometry::Pen { strokes: vec![expected] });

        canvas.set_tool(Tool::None);
        canvas.replace_annotations(&[record(1, &request)]);
        canvas.set_scale(Scale::new(2.0).expect("valid scale"));

        assert_eq!(
            stroked_points(canvas.surface()),
            vec![vec![at(20.0, 20.0), at(40.0, 20.0), at(40.0, 40.0)]]
        );
        assert_eq!(canvas.surface().size(), Some(PixelSize { width: 1224, height: 1584 }));
    }

    #[test]
    fn rendering_at_two_scales_differs_by_their_ratio() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);
        let pen = draw(&mut canvas, &[(3.0, 7.0), (11.0, 19.0), (31.0, 5.0)]).expect("pen commits");
        canvas.set_tool(Tool::Highlight);
        let highlight = draw(&mut canvas, &[(100.0, 100.0), (180.0, 140.0)]).expect("highlight commits");
        canvas.set_tool(Tool::None);
        canvas.replace_annotations(&[record(1, &pen), record(2, &highlight)]);

        let (s1, s2) = (0.75_f32, 1.5_f32);
        canvas.set_scale(Scale::new(s1).expect("valid scale"));
        let first = canvas.surface().clone();
        canvas.set_scale(Scale::new(s2).expect("valid scale"));
        let second = canvas.surface().clone();

        let ratio = s2 / s1;
        for (a, b) in stroked_points(&first)[0].iter().zip(&stroked_points(&second)[0]) {
            assert!((a.x * ratio - b.x).abs() < 1e-4);
            assert!((a.y * ratio - b.y).abs() < 1e-4);
        }
        let (rect_a, _) = first.fills()[0];
        let (rect_b, _) = second.fills()[0];
        assert!((rect_a.width * ratio - rect_b.width).abs() < 1e-4);
        assert!((rect_a.y * ratio - rect_b.y).abs() < 1e-4);

        // Stored geometry is untouched by zooming.
        assert_eq!(
            canvas.page_annotations()[1].geometry(),
            &AnnotationGeometry::Highlight { rects: vec![PageRect::new(100.0, 100.0, 80.0, 40.0)] }
        );
    }

    #[test]
    fn pen_tap_commits_nothing() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);

        assert_eq!(draw(&mut canvas, &[(50.0, 50.0)]), None);
        assert!(canvas.session_strokes().is_empty());
        assert!(canvas.in_progress().is_none());
    }

    #[test]
    fn highlight_needs_to_exceed_five_page_units() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Highlight);

        assert_eq!(draw(&mut canvas, &[(10.0, 10.0), (13.0, 13.0)]), None);

        let request = draw(&mut canvas, &[(10.0, 10.0), (16.0, 16.0)]).expect("6x6 commits");
        assert_eq!(request.kind, AnnotationKind::Highlight);
        let stored = Annotation::from_payload(&request.payload).expect("payload should decode");
        assert_eq!(
            stored.geometry(),
            &AnnotationGeometry::Highlight { rects: vec![PageRect::new(10.0, 10.0, 6.0, 6.0)] }
        );
        assert_eq!(stored.color(), Color::YELLOW);
    }

    #[test]
    fn threshold_is_measured_in_page_units_not_pixels() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Highlight);
        canvas.set_scale(Scale::new(2.0).expect("valid scale"));

        // 8 device pixels at 2x zoom is 4 page units.
        assert_eq!(draw(&mut canvas, &[(10.0, 10.0), (18.0, 18.0)]), None);
        assert!(draw(&mut canvas, &[(10.0, 10.0), (22.0, 22.0)]).is_some());
    }

    #[test]
    fn switching_tools_keeps_exactly_one_active() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);
        canvas.pointer_down(at(5.0, 5.0), origin());
        canvas.pointer_move(at(25.0, 25.0), origin());

        canvas.set_tool(Tool::Highlight);
        assert_eq!(canvas.tool(), Tool::Highlight);
        assert!(canvas.in_progress().is_none());

        // The stale pen drag cannot complete after the switch.
        assert_eq!(canvas.pointer_up(at(30.0, 30.0), origin()).expect("no error"), None);

        let request = draw(&mut canvas, &[(0.0, 0.0), (40.0, 40.0)]).expect("highlight commits");
        let stored = Annotation::from_payload(&request.payload).expect("payload should decode");
        assert_eq!(request.kind, AnnotationKind::Highlight);
        assert_eq!(stored.kind(), AnnotationKind::Highlight);
    }

    #[test]
    fn annotations_from_other_pages_are_not_in_the_page_set() {
        let mut canvas = canvas();
        canvas.set_page(2).expect("page 2 is valid");
        canvas.set_tool(Tool::Highlight);
        let on_page_two = draw(&mut canvas, &[(0.0, 0.0), (50.0, 50.0)]).expect("commits");
        assert_eq!(on_page_two.page_number, 2);

        canvas.replace_annotations(&[record(1, &on_page_two)]);
        assert_eq!(canvas.page_annotations().len(), 1);

        canvas.set_page(1).expect("page 1 is valid");
        assert!(canvas.page_annotations().is_empty());
        assert!(canvas.surface().fills().is_empty());
    }

    #[test]
    fn page_change_mid_stroke_discards_everything() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);
        draw(&mut canvas, &[(1.0, 1.0), (9.0, 9.0)]).expect("first stroke commits");
        canvas.pointer_down(at(10.0, 10.0), origin());
        canvas.pointer_move(at(40.0, 40.0), origin());

        canvas.set_page(2).expect("page 2 is valid");

        assert!(canvas.in_progress().is_none());
        assert!(canvas.session_strokes().is_empty());
        assert_eq!(canvas.pointer_up(at(40.0, 40.0), origin()).expect("no error"), None);
    }

    #[test]
    fn each_pen_stroke_emits_only_itself() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);

        draw(&mut canvas, &[(0.0, 0.0), (10.0, 0.0)]).expect("first stroke commits");
        let second = draw(&mut canvas, &[(0.0, 20.0), (10.0, 20.0)]).expect("second stroke commits");

        let stored = Annotation::from_payload(&second.payload).expect("payload should decode");
        let AnnotationGeometry::Pen { strokes } = stored.geometry() else {
            panic!("expected pen geometry");
        };
        assert_eq!(strokes.len(), 1);
        assert_eq!(canvas.session_strokes().len(), 2);

        // Both session strokes stay visible in the active color.
        let active = CanvasPreferences::default().active_color;
        let strokes = canvas.surface().strokes();
        assert_eq!(strokes.len(), 2);
        assert!(strokes.iter().all(|(_, style)| style.color == active));
    }

    #[test]
    fn leaving_the_overlay_stops_the_stroke_without_committing() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Pen);
        canvas.pointer_down(at(1.0, 1.0), origin());
        canvas.pointer_move(at(50.0, 50.0), origin());

        canvas.pointer_leave();
        canvas.pointer_move(at(60.0, 60.0), origin());

        assert!(canvas.in_progress().is_none());
        assert_eq!(canvas.pointer_up(at(60.0, 60.0), origin()).expect("no error"), None);
        assert!(canvas.surface().strokes().is_empty());
    }

    #[test]
    fn pointer_coordinates_follow_the_overlay_origin() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Highlight);
        canvas.set_scale(Scale::new(0.5).expect("valid scale"));

        let scrolled = OverlayBounds::new(200.0, -100.0, 306.0, 396.0);
        canvas.pointer_down(at(210.0, -90.0), scrolled);
        let request = canvas
            .pointer_up(at(230.0, -70.0), scrolled)
            .expect("no error")
            .expect("highlight commits");

        let stored = Annotation::from_payload(&request.payload).expect("payload should decode");
        assert_eq!(
            stored.geometry(),
            &AnnotationGeometry::Highlight { rects: vec![PageRect::new(20.0, 20.0, 40.0, 40.0)] }
        );
    }

    #[test]
    fn live_highlight_preview_repaints_on_every_move() {
        let mut canvas = canvas();
        canvas.set_tool(Tool::Highlight);
        canvas.pointer_down(at(10.0, 10.0), origin());
        canvas.pointer_move(at(30.0, 20.0), origin());
        canvas.pointer_move(at(40.0, 50.0), origin());

        assert_eq!(
            canvas.surface().commands().last(),
            Some(&DrawCommand::FillRect {
                rect: DeviceRect { x: 10.0, y: 10.0, width: 30.0, height: 40.0 },
                fill: Fill { color: Color::YELLOW, opacity: 0.3 },
            })
        );
        assert_eq!(canvas.surface().fills().len(), 1);
    }

    #[test]
    fn unready_page_skips_redraw_until_next_change() {
        let mut canvas = canvas();
        canvas.page_renderer.ready.set(false);
        canvas.set_tool(Tool::Pen);
        assert_eq!(canvas.render_stats().redraws, 0);
        assert!(canvas.render_stats().skipped >= 1);

        canvas.page_renderer.ready.set(true);
        canvas.set_scale(Scale::new(1.2).expect("valid scale"));
        assert_eq!(canvas.render_stats().redraws, 1);
    }

    #[test]
    fn reader_state_drives_tool_page_and_scale() {
        let mut canvas = canvas();
        let reader = ReaderState { current_page: 3, page_count: 5, scale: 1.5, tool: Tool::Pen };

        canvas.sync_reader(&reader).expect("reader state is valid");
        assert_eq!(canvas.tool(), Tool::Pen);
        assert_eq!(canvas.page_number(), 3);
        assert_eq!(canvas.scale().get(), 1.5);
        assert_eq!(canvas.cursor(), "crosshair");

        assert!(matches!(canvas.set_page(0), Err(CanvasError::InvalidPage(0))));
    }
}
