//! Keyboard and mouse mapping for one frame

use macroquad::prelude::*;
use shared::Heading;

/// Everything the player asked for during one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub mouse: (f32, f32),
    /// Driving direction held this frame
    pub drive: Option<Heading>,
    pub place: bool,
    pub remove: bool,
    /// Wheel notches, positive zooms in
    pub zoom: f32,
    /// Middle-drag offset since the last frame
    pub pan: Option<(f32, f32)>,
    pub rotate: bool,
    pub spawn_vehicle: bool,
    pub toggle_follow: bool,
    /// Palette slot picked with the number keys
    pub select: Option<usize>,
    pub cycle_block: bool,
}

const SLOT_KEYS: [KeyCode; 9] = [
    KeyCode::Key1,
    KeyCode::Key2,
    KeyCode::Key3,
    KeyCode::Key4,
    KeyCode::Key5,
    KeyCode::Key6,
    KeyCode::Key7,
    KeyCode::Key8,
    KeyCode::Key9,
];

/// Picks the driving direction from the held keys. Only one direction is
/// taken per tick, in A, D, W, S order.
pub fn heading_from_keys(a: bool, d: bool, w: bool, s: bool) -> Option<Heading> {
    if a {
        Some(Heading::UpLeft)
    } else if d {
        Some(Heading::DownRight)
    } else if w {
        Some(Heading::UpRight)
    } else if s {
        Some(Heading::DownLeft)
    } else {
        None
    }
}

/// Wheel deltas differ between platforms; only the direction counts.
fn wheel_notches(wheel_y: f32) -> f32 {
    if wheel_y > 0.0 {
        1.0
    } else if wheel_y < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Samples macroquad's input state once per frame
pub struct InputManager {
    // Mouse position at the previous frame of a middle drag
    drag_from: Option<(f32, f32)>,
}

impl InputManager {
    pub fn new() -> Self {
        Self { drag_from: None }
    }

    pub fn update(&mut self) -> FrameInput {
        let mouse = mouse_position();

        let drive = heading_from_keys(
            is_key_down(KeyCode::A),
            is_key_down(KeyCode::D),
            is_key_down(KeyCode::W),
            is_key_down(KeyCode::S),
        );

        let pan = if is_mouse_button_down(MouseButton::Middle) {
            let delta = self
                .drag_from
                .map(|(x, y)| (mouse.0 - x, mouse.1 - y));
            self.drag_from = Some(mouse);
            delta
        } else {
            self.drag_from = None;
            None
        };

        let (_, wheel_y) = mouse_wheel();

        FrameInput {
            mouse,
            drive,
            place: is_mouse_button_pressed(MouseButton::Left),
            remove: is_mouse_button_pressed(MouseButton::Right),
            zoom: wheel_notches(wheel_y),
            pan,
            rotate: is_key_pressed(KeyCode::R),
            spawn_vehicle: is_key_pressed(KeyCode::V),
            toggle_follow: is_key_pressed(KeyCode::F),
            select: SLOT_KEYS.iter().position(|key| is_key_pressed(*key)),
            cycle_block: is_key_pressed(KeyCode::Tab),
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(input_manager.drag_from.is_none());
    }

    #[test]
    fn test_heading_from_keys() {
        assert_eq!(heading_from_keys(false, false, false, false), None);
        assert_eq!(heading_from_keys(true, false, false, false), Some(Heading::UpLeft));
        assert_eq!(heading_from_keys(false, true, false, false), Some(Heading::DownRight));
        assert_eq!(heading_from_keys(false, false, true, false), Some(Heading::UpRight));
        assert_eq!(heading_from_keys(false, false, false, true), Some(Heading::DownLeft));
    }

    #[test]
    fn test_first_key_wins() {
        assert_eq!(heading_from_keys(true, true, true, true), Some(Heading::UpLeft));
        assert_eq!(heading_from_keys(false, true, true, false), Some(Heading::DownRight));
        assert_eq!(heading_from_keys(false, false, true, true), Some(Heading::UpRight));
    }

    #[test]
    fn test_wheel_notches() {
        assert_eq!(wheel_notches(0.0), 0.0);
        assert_eq!(wheel_notches(120.0), 1.0);
        assert_eq!(wheel_notches(-0.5), -1.0);
    }

    #[test]
    fn test_frame_input_default_is_idle() {
        let frame = FrameInput::default();
        assert!(frame.drive.is_none());
        assert!(!frame.place && !frame.remove);
        assert_eq!(frame.zoom, 0.0);
    }
}
