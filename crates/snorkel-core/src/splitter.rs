//! Draggable handle between the map pane and the control panel.
//!
//! Horizontal resize only. A drag snapshots the layout at pointer-down and
//! every move is computed against that snapshot, so neither pane can be
//! dragged below zero width.

#[derive(Clone, Copy, Debug, Default, PartialEq)]
/// Pixel layout of the two panes and the handle between them.
pub struct SplitLayout {
    pub handle_offset: f64,
    pub first_width: f64,
    pub second_width: f64,
}

#[derive(Clone, Copy, Debug)]
struct DragSnapshot {
    start_x: f64,
    layout: SplitLayout,
}

#[derive(Debug, Default)]
pub struct PanelSplitter {
    layout: SplitLayout,
    drag: Option<DragSnapshot>,
}

impl PanelSplitter {
    pub fn new(layout: SplitLayout) -> Self {
        Self { layout, drag: None }
    }

    pub fn layout(&self) -> SplitLayout {
        self.layout
    }

    /// Replace the layout, e.g. after the window itself was resized.
    pub fn set_layout(&mut self, layout: SplitLayout) {
        self.layout = layout;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Pointer-down on the handle.
    pub fn begin_drag(&mut self, pointer_x: f64) {
        self.drag = Some(DragSnapshot {
            start_x: pointer_x,
            layout: self.layout,
        });
    }

    /// Pointer-move anywhere in the document. Ignored when no drag is active.
    pub fn drag_to(&mut self, pointer_x: f64) -> SplitLayout {
        if let Some(snapshot) = self.drag {
            self.layout = resize(snapshot.layout, pointer_x - snapshot.start_x);
        }
        self.layout
    }

    /// Pointer-up anywhere in the document.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }
}

/// Apply a horizontal drag of `delta` pixels to `origin`.
pub fn resize(origin: SplitLayout, delta: f64) -> SplitLayout {
    let delta = delta.max(-origin.first_width).min(origin.second_width);
    SplitLayout {
        handle_offset: origin.handle_offset + delta,
        first_width: origin.first_width + delta,
        second_width: origin.second_width - delta,
    }
}
