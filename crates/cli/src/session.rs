//! Host side of the annotation canvas.
//!
//! Owns the reader controls, hands committed annotations to storage and
//! reloads the canvas from the listing call after each successful create.

use doc_model::{apply_reader_action, AnnotationKind, NewAnnotation, ReaderAction, ReaderState, Tool};
use pdf_engine::PageSize;
use serde::{Deserialize, Serialize};
use storage::AnnotationService;
use viewer_core::{
    AnnotationCanvas, CanvasError, DevicePoint, OverlayBounds, PageRenderer, PixelSize, Scale,
    Surface,
};

/// Page sizes reported by the PDF engine, exposed to the canvas.
#[derive(Debug, Clone)]
pub struct EnginePages {
    sizes: Vec<PageSize>,
}

impl EnginePages {
    pub fn new(sizes: Vec<PageSize>) -> Self {
        Self { sizes }
    }

    pub fn page_count(&self) -> u32 {
        self.sizes.len() as u32
    }
}

impl PageRenderer for EnginePages {
    fn rendered_page_size(&self, page_number: u32, scale: Scale) -> Option<PixelSize> {
        let index = page_number.checked_sub(1)? as usize;
        let (width, height) = self.sizes.get(index)?.pixel_size(scale.get());
        Some(PixelSize { width, height })
    }
}

/// Top-left corner of the overlay in the coordinate space of the script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Origin {
    pub left: f32,
    pub top: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GestureScript {
    #[serde(default)]
    pub origin: Origin,
    pub steps: Vec<Step>,
}

/// One recorded input. Pointer positions are device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "step", rename_all = "lowercase")]
pub enum Step {
    Tool { tool: Tool },
    Page { page: u32 },
    Scale { scale: f32 },
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up { x: f32, y: f32 },
    Leave,
}

/// A creation request that storage refused. The markup is not retried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: AnnotationKind,
    pub page_number: u32,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawSummary {
    pub committed: usize,
    pub discarded: usize,
    pub notices: Vec<Notice>,
}

pub struct DrawSession<'a, A, S> {
    canvas: AnnotationCanvas<EnginePages, S>,
    service: &'a A,
    reader: ReaderState,
    origin: Origin,
    summary: DrawSummary,
}

impl<'a, A, S> DrawSession<'a, A, S>
where
    A: AnnotationService,
    S: Surface,
{
    /// Opens the canvas on page 1 and loads the document's stored annotations.
    pub fn start(
        canvas: AnnotationCanvas<EnginePages, S>,
        service: &'a A,
        page_count: u32,
    ) -> Result<Self, CanvasError> {
        let mut session = Self {
            canvas,
            service,
            reader: ReaderState::with_page_count(page_count),
            origin: Origin::default(),
            summary: DrawSummary::default(),
        };
        session.canvas.sync_reader(&session.reader)?;
        session.reload();
        Ok(session)
    }

    pub fn canvas(&self) -> &AnnotationCanvas<EnginePages, S> {
        &self.canvas
    }

    pub fn reader(&self) -> &ReaderState {
        &self.reader
    }

    pub fn run(&mut self, script: &GestureScript) -> Result<(), CanvasError> {
        self.origin = script.origin;
        for step in &script.steps {
            self.apply(*step)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, step: Step) -> Result<(), CanvasError> {
        match step {
            Step::Tool { tool } => self.control(ReaderAction::SelectTool(tool))?,
            Step::Page { page } => self.control(ReaderAction::SetPage(page))?,
            Step::Scale { scale } => self.control(ReaderAction::SetScale(scale))?,
            Step::Down { x, y } => self.canvas.pointer_down(DevicePoint::new(x, y), self.bounds()),
            Step::Move { x, y } => self.canvas.pointer_move(DevicePoint::new(x, y), self.bounds()),
            Step::Up { x, y } => self.pointer_up(DevicePoint::new(x, y))?,
            Step::Leave => {
                if self.canvas.in_progress().is_some() {
                    self.summary.discarded += 1;
                }
                self.canvas.pointer_leave();
            }
        }
        Ok(())
    }

    pub fn finish(self) -> (DrawSummary, AnnotationCanvas<EnginePages, S>) {
        (self.summary, self.canvas)
    }

    // Tool and page changes drop a drag in flight; count it like a leave.
    fn control(&mut self, action: ReaderAction) -> Result<(), CanvasError> {
        let was_dragging = self.canvas.in_progress().is_some();

        apply_reader_action(&mut self.reader, action);
        self.canvas.sync_reader(&self.reader)?;

        if was_dragging && self.canvas.in_progress().is_none() {
            self.summary.discarded += 1;
        }
        Ok(())
    }

    fn pointer_up(&mut self, at: DevicePoint) -> Result<(), CanvasError> {
        let was_dragging = self.canvas.in_progress().is_some();

        match self.canvas.pointer_up(at, self.bounds())? {
            Some(request) => self.persist(&request),
            None if was_dragging => self.summary.discarded += 1,
            None => {}
        }
        Ok(())
    }

    fn persist(&mut self, request: &NewAnnotation) {
        match self.service.create(request) {
            Ok(id) => {
                tracing::debug!(id = id.0, "annotation created");
                self.summary.committed += 1;
                self.reload();
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    kind = %request.kind,
                    page = request.page_number,
                    "failed to save annotation"
                );
                self.summary.notices.push(Notice {
                    kind: request.kind,
                    page_number: request.page_number,
                    message: error.to_string(),
                });
            }
        }
    }

    // A failed listing leaves the previous collection in place.
    fn reload(&mut self) {
        let document_id = self.canvas.document_id();
        match self.service.list(document_id) {
            Ok(records) => {
                let summary = self.canvas.replace_annotations(&records);
                if summary.dropped > 0 {
                    tracing::warn!(dropped = summary.dropped, "skipped malformed annotations");
                }
            }
            Err(error) => tracing::warn!(%error, document = %document_id, "failed to list annotations"),
        }
    }

    fn bounds(&self) -> OverlayBounds {
        let size = self.canvas.page_size().unwrap_or(PixelSize { width: 0, height: 0 });
        OverlayBounds::new(self.origin.left, self.origin.top, size.width as f32, size.height as f32)
    }
}
