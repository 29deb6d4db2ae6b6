//! Shared data model for slide annotations and the reader controls.

pub mod annotation;
pub mod geometry;
pub mod preferences;
pub mod reader;

pub use annotation::{
    Annotation, AnnotationError, AnnotationGeometry, AnnotationId, AnnotationKind,
    AnnotationRecord, Color, DocumentId, NewAnnotation,
};
pub use geometry::{PagePoint, PageRect, Stroke};
pub use preferences::{CanvasPreferences, PreferencesError};
pub use reader::{apply_reader_action, ReaderAction, ReaderState, Tool};
