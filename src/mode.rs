//! Interaction modes and the object-flag policy they imply

use egui::{Color32, CursorIcon};

use crate::scene::{ObjectFlags, ObjectRole};

/// The tool picked in the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Pan,
    Brush,
}

/// What the brush tool does with a finished stroke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    #[default]
    Paint,
    Erase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    #[default]
    Select,
    Pan,
    Paint,
    Erase,
}

impl InteractionMode {
    pub fn from_tool(tool: Tool, mask: MaskMode) -> Self {
        match (tool, mask) {
            (Tool::Select, _) => InteractionMode::Select,
            (Tool::Pan, _) => InteractionMode::Pan,
            (Tool::Brush, MaskMode::Paint) => InteractionMode::Paint,
            (Tool::Brush, MaskMode::Erase) => InteractionMode::Erase,
        }
    }

    /// Inverse of [`InteractionMode::from_tool`]; non-brush modes keep `mask`
    pub fn to_tool(self, mask: MaskMode) -> (Tool, MaskMode) {
        match self {
            InteractionMode::Select => (Tool::Select, mask),
            InteractionMode::Pan => (Tool::Pan, mask),
            InteractionMode::Paint => (Tool::Brush, MaskMode::Paint),
            InteractionMode::Erase => (Tool::Brush, MaskMode::Erase),
        }
    }

    pub fn is_drawing(self) -> bool {
        matches!(self, InteractionMode::Paint | InteractionMode::Erase)
    }
}

/// Selectable/evented flags for an object with `role` under `mode`.
/// Visibility is left untouched.
pub fn derive_flags(mode: InteractionMode, role: ObjectRole, visible: bool) -> ObjectFlags {
    let interactive = mode == InteractionMode::Select
        && matches!(role, ObjectRole::BaseImage | ObjectRole::CommittedImage);
    ObjectFlags {
        visible,
        selectable: interactive,
        evented: interactive,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushStyle {
    pub width: f32,
    pub color: Color32,
}

/// Cursor and brush the canvas should show for a mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolPresentation {
    pub cursor: CursorIcon,
    pub brush: Option<BrushStyle>,
    pub drawing: bool,
}

pub fn presentation(mode: InteractionMode, paint_brush: BrushStyle) -> ToolPresentation {
    match mode {
        InteractionMode::Select => ToolPresentation {
            cursor: CursorIcon::Default,
            brush: None,
            drawing: false,
        },
        InteractionMode::Pan => ToolPresentation {
            cursor: CursorIcon::Grab,
            brush: None,
            drawing: false,
        },
        InteractionMode::Paint => ToolPresentation {
            cursor: CursorIcon::Crosshair,
            brush: Some(paint_brush),
            drawing: true,
        },
        InteractionMode::Erase => ToolPresentation {
            cursor: CursorIcon::Crosshair,
            brush: Some(BrushStyle {
                width: paint_brush.width,
                color: Color32::TRANSPARENT,
            }),
            drawing: true,
        },
    }
}
