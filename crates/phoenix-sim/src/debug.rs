//! Debug rendering and input interfaces.
//!
//! Both are external collaborators: the core draws through
//! [`DebugRenderer`] and reads pointer/keyboard state through
//! [`DebugState`], but never depends on a concrete implementation.
//! Coordinates are world-space fixed-point; the embedding maps them to the
//! screen.

use phoenix_core::Color;
use phoenix_fixed::{Distance, Vec2};

/// Sink for debug geometry, in world coordinates.
pub trait DebugRenderer {
    fn draw_circle(&mut self, center: Vec2, radius: Distance, color: Color);
    fn draw_line(&mut self, start: Vec2, end: Vec2, color: Color);
    fn draw_lines(&mut self, points: &[Vec2], color: Color) {
        for pair in points.windows(2) {
            self.draw_line(pair[0], pair[1], color);
        }
    }
    fn draw_rect(&mut self, min: Vec2, max: Vec2, color: Color);
    fn draw_debug_text(&mut self, position: Vec2, text: &str, color: Color);

    /// A stable palette color for a small index.
    fn get_color(&self, index: usize) -> Color {
        Color::indexed(index)
    }
}

/// Input state exposed to debug handlers.
pub trait DebugState {
    fn key_down(&self, key: u32) -> bool;
    fn key_up(&self, key: u32) -> bool {
        !self.key_down(key)
    }
    fn mouse_button_down(&self, button: u32) -> bool;
    fn mouse_button_up(&self, button: u32) -> bool {
        !self.mouse_button_down(button)
    }
    fn world_mouse_pos(&self) -> Vec2;
}

/// A renderer that records draw calls; used by tests and headless runs.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub circles: Vec<(Vec2, Distance, Color)>,
    pub lines: Vec<(Vec2, Vec2, Color)>,
    pub rects: Vec<(Vec2, Vec2, Color)>,
    pub texts: Vec<(Vec2, String, Color)>,
}

impl DebugRenderer for RecordingRenderer {
    fn draw_circle(&mut self, center: Vec2, radius: Distance, color: Color) {
        self.circles.push((center, radius, color));
    }
    fn draw_line(&mut self, start: Vec2, end: Vec2, color: Color) {
        self.lines.push((start, end, color));
    }
    fn draw_rect(&mut self, min: Vec2, max: Vec2, color: Color) {
        self.rects.push((min, max, color));
    }
    fn draw_debug_text(&mut self, position: Vec2, text: &str, color: Color) {
        self.texts.push((position, text.to_owned(), color));
    }
}

/// An input state with nothing pressed; used by tests and headless runs.
#[derive(Debug, Default)]
pub struct NullDebugState;

impl DebugState for NullDebugState {
    fn key_down(&self, _key: u32) -> bool {
        false
    }
    fn mouse_button_down(&self, _button: u32) -> bool {
        false
    }
    fn world_mouse_pos(&self) -> Vec2 {
        Vec2::ZERO
    }
}
