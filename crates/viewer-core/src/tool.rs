//! Tool state machine.
//!
//! The active [`Tool`] is chosen from outside. While a tool is active the
//! machine is either idle or dragging; a drag owns the in-progress stroke and
//! the stroke never outlives it.

use doc_model::{PagePoint, PageRect, Stroke, Tool};

/// Stroke being drawn while the pointer is held down.
#[derive(Debug, Clone, PartialEq)]
pub enum InProgress {
    Pen { points: Vec<PagePoint> },
    Highlight { anchor: PagePoint, current: PagePoint },
}

impl InProgress {
    pub fn preview_rect(&self) -> Option<PageRect> {
        match self {
            Self::Highlight { anchor, current } => Some(PageRect::from_corners(*anchor, *current)),
            Self::Pen { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Gesture {
    #[default]
    Idle,
    Dragging(InProgress),
}

/// Geometry produced by a completed gesture, ready to become an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum Completed {
    Pen(Stroke),
    Highlight(PageRect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// A pen tap with fewer than two points.
    TooFewPoints,
    /// A highlight drag not larger than the minimum size on both axes.
    BelowMinimumSize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GestureOutcome {
    Committed(Completed),
    Discarded(DiscardReason),
    /// Pointer-up without a preceding pointer-down on the overlay.
    NotDragging,
}

#[derive(Debug, Clone)]
pub struct ToolMachine {
    tool: Tool,
    gesture: Gesture,
    min_highlight_size: f32,
}

impl ToolMachine {
    /// A negative or NaN minimum is treated as zero, so empty highlights never commit.
    pub fn new(min_highlight_size: f32) -> Self {
        Self {
            tool: Tool::None,
            gesture: Gesture::Idle,
            min_highlight_size: min_highlight_size.max(0.0),
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn gesture(&self) -> &Gesture {
        &self.gesture
    }

    pub fn in_progress(&self) -> Option<&InProgress> {
        match &self.gesture {
            Gesture::Dragging(stroke) => Some(stroke),
            Gesture::Idle => None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.gesture, Gesture::Dragging(_))
    }

    /// Switches tools, dropping any stroke in flight. Returns false when the
    /// tool was already selected.
    pub fn select_tool(&mut self, tool: Tool) -> bool {
        if self.tool == tool {
            return false;
        }

        self.tool = tool;
        self.gesture = Gesture::Idle;
        true
    }

    /// Forces the idle state without committing. Returns true if a stroke was dropped.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.gesture = Gesture::Idle;
        was_dragging
    }

    pub fn pointer_down(&mut self, point: PagePoint) -> bool {
        if self.is_dragging() {
            return false;
        }

        let stroke = match self.tool {
            Tool::None => return false,
            Tool::Pen => InProgress::Pen { points: vec![point] },
            Tool::Highlight => InProgress::Highlight { anchor: point, current: point },
        };

        self.gesture = Gesture::Dragging(stroke);
        true
    }

    pub fn pointer_move(&mut self, point: PagePoint) -> bool {
        match &mut self.gesture {
            Gesture::Dragging(InProgress::Pen { points }) => {
                points.push(point);
                true
            }
            Gesture::Dragging(InProgress::Highlight { current, .. }) => {
                *current = point;
                true
            }
            Gesture::Idle => false,
        }
    }

    pub fn pointer_up(&mut self, point: PagePoint) -> GestureOutcome {
        let Gesture::Dragging(stroke) = std::mem::take(&mut self.gesture) else {
            return GestureOutcome::NotDragging;
        };

        match stroke {
            InProgress::Pen { points } if points.len() >= 2 => {
                GestureOutcome::Committed(Completed::Pen(points))
            }
            InProgress::Pen { .. } => GestureOutcome::Discarded(DiscardReason::TooFewPoints),
            InProgress::Highlight { anchor, .. } => {
                let rect = PageRect::from_corners(anchor, point);
                if rect.exceeds(self.min_highlight_size) {
                    GestureOutcome::Committed(Completed::Highlight(rect))
                } else {
                    GestureOutcome::Discarded(DiscardReason::BelowMinimumSize)
                }
            }
        }
    }

    /// Pointer left the overlay mid-drag: stop the gesture without committing.
    pub fn pointer_leave(&mut self) -> bool {
        self.cancel()
    }
}
