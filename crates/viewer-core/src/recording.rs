use crate::coords::{DevicePoint, DeviceRect};
use crate::render::{Fill, PixelSize, StrokeStyle, Surface};

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Resize(PixelSize),
    Clear,
    Stroke { points: Vec<DevicePoint>, style: StrokeStyle },
    FillRect { rect: DeviceRect, fill: Fill },
}

/// Surface that remembers the commands of the most recent frame.
///
/// `clear` wipes earlier commands the same way it wipes pixels, so after a
/// redraw the log describes exactly what is on screen.
#[derive(Debug, Default, Clone)]
pub struct RecordingSurface {
    size: Option<PixelSize>,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> Option<PixelSize> {
        self.size
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn strokes(&self) -> Vec<(Vec<DevicePoint>, StrokeStyle)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::Stroke { points, style } => Some((points.clone(), *style)),
                _ => None,
            })
            .collect()
    }

    pub fn fills(&self) -> Vec<(DeviceRect, Fill)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::FillRect { rect, fill } => Some((*rect, *fill)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, size: PixelSize) {
        self.size = Some(size);
        self.commands.clear();
        self.commands.push(DrawCommand::Resize(size));
    }

    fn clear(&mut self) {
        self.commands.retain(|command| matches!(command, DrawCommand::Resize(_)));
        self.commands.push(DrawCommand::Clear);
    }

    fn stroke_path(&mut self, points: &[DevicePoint], style: StrokeStyle) {
        self.commands.push(DrawCommand::Stroke { points: points.to_vec(), style });
    }

    fn fill_rect(&mut self, rect: DeviceRect, fill: Fill) {
        self.commands.push(DrawCommand::FillRect { rect, fill });
    }
}
