//! Annotation records and their transport payload.
//!
//! The persistence layer stores geometry as an opaque string. The payload is a
//! JSON object shaped like
//! `{"type":"pen","pageNumber":2,"color":"#3b82f6","paths":[[{"x":1,"y":2}]]}`
//! for pen markup or with a `"rects"` array for highlights.

use crate::geometry::{PagePoint, PageRect, Stroke};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum AnnotationError {
    #[error("page numbers are 1-based, got {0}")]
    InvalidPageNumber(u32),
    #[error("invalid color {0:?}")]
    InvalidColor(String),
    #[error("{kind} payload carries no geometry")]
    MissingGeometry { kind: AnnotationKind },
    #[error("payload type {declared} does not match its geometry")]
    KindMismatch { declared: AnnotationKind },
    #[error("rectangle {index} has a negative or non-finite extent")]
    InvalidRect { index: usize },
    #[error("stroke {index} contains a non-finite point")]
    InvalidPoint { index: usize },
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AnnotationId(pub u64);

/// RGBA color, written as `#rrggbb` (or `#rrggbbaa` when not opaque).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLUE: Color = Color { r: 0x3b, g: 0x82, b: 0xf6, a: 255 };
    pub const YELLOW: Color = Color { r: 255, g: 255, b: 0, a: 255 };
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const GREEN: Color = Color { r: 0, g: 128, b: 0, a: 255 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0, a: 255 };

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    fn named(name: &str) -> Option<Self> {
        let color = match name.to_ascii_lowercase().as_str() {
            "blue" => Self::BLUE,
            "yellow" => Self::YELLOW,
            "red" => Self::RED,
            "green" => Self::GREEN,
            "black" => Self::BLACK,
            _ => return None,
        };
        Some(color)
    }
}

impl FromStr for Color {
    type Err = AnnotationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || AnnotationError::InvalidColor(value.to_owned());

        let Some(hex) = value.strip_prefix('#') else {
            return Self::named(value).ok_or_else(invalid);
        };

        if !hex.is_ascii() {
            return Err(invalid());
        }

        let channel = |index: usize| {
            hex.get(index..index + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(invalid)
        };

        match hex.len() {
            6 => Ok(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Self { r: channel(0)?, g: channel(2)?, b: channel(4)?, a: channel(6)? }),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for Color {
    type Error = AnnotationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Highlight,
    Pen,
}

impl AnnotationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Highlight => "highlight",
            Self::Pen => "pen",
        }
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationGeometry {
    Pen { strokes: Vec<Stroke> },
    Highlight { rects: Vec<PageRect> },
}

impl AnnotationGeometry {
    pub fn kind(&self) -> AnnotationKind {
        match self {
            Self::Pen { .. } => AnnotationKind::Pen,
            Self::Highlight { .. } => AnnotationKind::Highlight,
        }
    }

    fn validate(&self) -> Result<(), AnnotationError> {
        match self {
            Self::Pen { strokes } => {
                if let Some(index) =
                    strokes.iter().position(|stroke| !stroke.iter().all(PagePoint::is_finite))
                {
                    return Err(AnnotationError::InvalidPoint { index });
                }
            }
            Self::Highlight { rects } => {
                if let Some(index) = rects.iter().position(|rect| !rect.is_valid()) {
                    return Err(AnnotationError::InvalidRect { index });
                }
            }
        }
        Ok(())
    }
}

/// Committed markup. Never mutated once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    page_number: u32,
    color: Color,
    geometry: AnnotationGeometry,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payload {
    #[serde(rename = "type")]
    kind: AnnotationKind,
    page_number: u32,
    color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paths: Option<Vec<Stroke>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rects: Option<Vec<PageRect>>,
}

impl Annotation {
    pub fn new(
        page_number: u32,
        color: Color,
        geometry: AnnotationGeometry,
    ) -> Result<Self, AnnotationError> {
        if page_number == 0 {
            return Err(AnnotationError::InvalidPageNumber(page_number));
        }
        geometry.validate()?;

        Ok(Self { page_number, color, geometry })
    }

    pub fn pen(page_number: u32, color: Color, strokes: Vec<Stroke>) -> Result<Self, AnnotationError> {
        Self::new(page_number, color, AnnotationGeometry::Pen { strokes })
    }

    pub fn highlight(
        page_number: u32,
        color: Color,
        rects: Vec<PageRect>,
    ) -> Result<Self, AnnotationError> {
        Self::new(page_number, color, AnnotationGeometry::Highlight { rects })
    }

    pub fn kind(&self) -> AnnotationKind {
        self.geometry.kind()
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn geometry(&self) -> &AnnotationGeometry {
        &self.geometry
    }

    pub fn to_payload(&self) -> Result<String, AnnotationError> {
        let (paths, rects) = match &self.geometry {
            AnnotationGeometry::Pen { strokes } => (Some(strokes.clone()), None),
            AnnotationGeometry::Highlight { rects } => (None, Some(rects.clone())),
        };

        let payload =
            Payload { kind: self.kind(), page_number: self.page_number, color: self.color, paths, rects };

        Ok(serde_json::to_string(&payload)?)
    }

    pub fn from_payload(payload: &str) -> Result<Self, AnnotationError> {
        let payload: Payload = serde_json::from_str(payload)?;

        let geometry = match (payload.kind, payload.paths, payload.rects) {
            (AnnotationKind::Pen, Some(strokes), None) => AnnotationGeometry::Pen { strokes },
            (AnnotationKind::Highlight, None, Some(rects)) => AnnotationGeometry::Highlight { rects },
            (kind, None, None) => return Err(AnnotationError::MissingGeometry { kind }),
            (declared, _, _) => return Err(AnnotationError::KindMismatch { declared }),
        };

        Self::new(payload.page_number, payload.color, geometry)
    }
}

/// Input of the annotation creation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnnotation {
    pub document_id: DocumentId,
    pub kind: AnnotationKind,
    pub page_number: u32,
    pub payload: String,
}

impl NewAnnotation {
    pub fn from_annotation(
        document_id: DocumentId,
        annotation: &Annotation,
    ) -> Result<Self, AnnotationError> {
        Ok(Self {
            document_id,
            kind: annotation.kind(),
            page_number: annotation.page_number(),
            payload: annotation.to_payload()?,
        })
    }
}

/// One row returned by the annotation listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    pub document_id: DocumentId,
    pub kind: AnnotationKind,
    pub page_number: u32,
    pub payload: String,
    pub created_at: i64,
}

impl AnnotationRecord {
    pub fn decode(&self) -> Result<Annotation, AnnotationError> {
        Annotation::from_payload(&self.payload)
    }
}
