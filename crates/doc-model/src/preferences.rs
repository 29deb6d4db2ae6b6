use crate::annotation::Color;
use serde::{Deserialize, Serialize};

/// Drawing defaults for the annotation overlay. Lengths are in page units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasPreferences {
    pub pen_width: f32,
    pub pen_color: Color,
    pub highlight_color: Color,
    pub highlight_opacity: f32,
    /// Highlights must be strictly wider and taller than this to be kept.
    pub min_highlight_size: f32,
    /// Color of strokes drawn in the current session that are not yet listed back.
    pub active_color: Color,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PreferencesError {
    #[error("pen_width must be positive and finite, got {0}")]
    PenWidth(f32),
    #[error("highlight_opacity must be within 0..=1, got {0}")]
    HighlightOpacity(f32),
    #[error("min_highlight_size must be finite and not negative, got {0}")]
    MinHighlightSize(f32),
}

impl CanvasPreferences {
    /// Rejects values that would let degenerate markup through or draw nothing.
    pub fn validate(&self) -> Result<(), PreferencesError> {
        if !(self.pen_width.is_finite() && self.pen_width > 0.0) {
            return Err(PreferencesError::PenWidth(self.pen_width));
        }
        if !(0.0..=1.0).contains(&self.highlight_opacity) {
            return Err(PreferencesError::HighlightOpacity(self.highlight_opacity));
        }
        if !(self.min_highlight_size.is_finite() && self.min_highlight_size >= 0.0) {
            return Err(PreferencesError::MinHighlightSize(self.min_highlight_size));
        }
        Ok(())
    }
}

impl Default for CanvasPreferences {
    fn default() -> Self {
        Self {
            pen_width: 2.0,
            pen_color: Color::BLUE,
            highlight_color: Color::YELLOW,
            highlight_opacity: 0.3,
            min_highlight_size: 5.0,
            active_color: Color::BLUE,
        }
    }
}
