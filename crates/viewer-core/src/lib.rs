//! Annotation overlay for a rendered PDF page.
//!
//! Pointer input is normalized to page units ([`coords`]), interpreted by the
//! tool state machine ([`tool`]), and painted by the render pipeline
//! ([`render`]) on top of the committed annotations held in [`store`].
//! [`canvas::AnnotationCanvas`] wires the pieces together.

pub mod canvas;
pub mod coords;
pub mod raster;
pub mod recording;
pub mod render;
pub mod store;
pub mod tool;

pub use canvas::AnnotationCanvas;
pub use coords::{to_device, to_page, DevicePoint, DeviceRect, OverlayBounds, Scale};
pub use raster::RasterSurface;
pub use recording::{DrawCommand, RecordingSurface};
pub use render::{
    Fill, Frame, PageRenderer, PixelSize, RenderPipeline, RenderStats, Signal,
    StrokeStyle, Surface,
};
pub use store::{AnnotationStore, ReloadSummary};
pub use tool::{Completed, DiscardReason, Gesture, GestureOutcome, InProgress, ToolMachine};

#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("scale must be positive and finite, got {0}")]
    InvalidScale(f32),
    #[error("page numbers are 1-based, got {0}")]
    InvalidPage(u32),
    #[error(transparent)]
    Annotation(#[from] doc_model::AnnotationError),
}
