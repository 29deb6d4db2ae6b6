use serde::{Deserialize, Serialize};

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 2.0;
pub const SCALE_STEP: f32 = 0.1;

/// Markup tool picked in the toolbar. Exactly one value is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    None,
    Highlight,
    Pen,
}

impl Tool {
    pub fn cursor(self) -> &'static str {
        match self {
            Self::None => "default",
            Self::Highlight => "text",
            Self::Pen => "crosshair",
        }
    }
}

/// Values owned by the page navigator, zoom control and tool selector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReaderState {
    pub current_page: u32,
    pub page_count: u32,
    pub scale: f32,
    pub tool: Tool,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self { current_page: 1, page_count: 1, scale: 1.0, tool: Tool::None }
    }
}

impl ReaderState {
    pub fn with_page_count(page_count: u32) -> Self {
        Self { page_count: page_count.max(1), ..Self::default() }
    }

    pub fn has_previous_page(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next_page(&self) -> bool {
        self.current_page < self.page_count
    }

    pub fn zoom_percent(&self) -> u16 {
        (self.scale * 100.0).round() as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReaderAction {
    SetPage(u32),
    NextPage,
    PreviousPage,
    SetScale(f32),
    ZoomIn,
    ZoomOut,
    SelectTool(Tool),
}

pub fn apply_reader_action(state: &mut ReaderState, action: ReaderAction) {
    match action {
        ReaderAction::SetPage(page) => {
            state.current_page = page.clamp(1, state.page_count.max(1));
        }
        ReaderAction::NextPage => {
            state.current_page = (state.current_page + 1).min(state.page_count.max(1));
        }
        ReaderAction::PreviousPage => {
            state.current_page = state.current_page.saturating_sub(1).max(1);
        }
        ReaderAction::SetScale(scale) => {
            if scale.is_finite() {
                state.scale = clamp_scale(scale);
            }
        }
        ReaderAction::ZoomIn => state.scale = clamp_scale(state.scale + SCALE_STEP),
        ReaderAction::ZoomOut => state.scale = clamp_scale(state.scale - SCALE_STEP),
        ReaderAction::SelectTool(tool) => state.tool = tool,
    }
}

// Keeps repeated 0.1 steps from drifting (0.1 + 0.2 != 0.3).
fn clamp_scale(scale: f32) -> f32 {
    ((scale * 100.0).round() / 100.0).clamp(MIN_SCALE, MAX_SCALE)
}
