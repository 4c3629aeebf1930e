//! Client-local view of the map: rotation, zoom, pan and vehicle follow

use shared::{IsoProjection, Rotation, VehiclePose};

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;
/// Zoom change per wheel notch.
pub const ZOOM_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    map_size: usize,
    pub rotation: Rotation,
    pub zoom: f32,
    pub cam_x: f32,
    pub cam_y: f32,
    pub follow: bool,
}

impl Camera {
    /// Puts the top corner of the map at the horizontal centre of the screen.
    pub fn new(map_size: usize, screen_width: f32) -> Self {
        Self {
            map_size,
            rotation: Rotation::R0,
            zoom: 1.0,
            cam_x: screen_width / 2.0,
            cam_y: 100.0,
            follow: false,
        }
    }

    pub fn map_size(&self) -> usize {
        self.map_size
    }

    /// Keeps the view but switches to a map of another size.
    pub fn set_map_size(&mut self, map_size: usize) {
        self.map_size = map_size;
    }

    pub fn projection(&self) -> IsoProjection {
        IsoProjection {
            rotation: self.rotation,
            zoom: self.zoom,
            cam_x: self.cam_x,
            cam_y: self.cam_y,
            ..IsoProjection::new(self.map_size)
        }
    }

    pub fn rotate(&mut self) {
        self.rotation = self.rotation.next();
    }

    /// Zooms by `notches` wheel steps, keeping the point under the cursor
    /// in place.
    pub fn zoom_at(&mut self, mouse_x: f32, mouse_y: f32, notches: f32) {
        let old = self.zoom;
        self.zoom = (self.zoom + notches * ZOOM_STEP).clamp(MIN_ZOOM, MAX_ZOOM);
        let ratio = self.zoom / old;
        self.cam_x = mouse_x - (mouse_x - self.cam_x) * ratio;
        self.cam_y = mouse_y - (mouse_y - self.cam_y) * ratio;
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.cam_x += dx;
        self.cam_y += dy;
    }

    pub fn toggle_follow(&mut self) {
        self.follow = !self.follow;
    }

    /// Shifts the view so `pose` sits at the screen centre.
    pub fn centre_on(&mut self, pose: &VehiclePose, screen_width: f32, screen_height: f32) {
        let (x, y) = self.projection().point_to_screen(pose.r, pose.c, pose.z);
        self.cam_x += screen_width / 2.0 - x;
        self.cam_y += screen_height / 2.0 - y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::Heading;

    #[test]
    fn test_camera_creation() {
        let camera = Camera::new(30, 1024.0);
        assert_eq!(camera.rotation, Rotation::R0);
        assert_approx_eq!(camera.cam_x, 512.0);
        assert_approx_eq!(camera.zoom, 1.0);
        assert!(!camera.follow);
        assert_eq!(camera.projection().size, 30);
    }

    #[test]
    fn test_rotation_cycles() {
        let mut camera = Camera::new(10, 800.0);
        for expected in [Rotation::R1, Rotation::R2, Rotation::R3, Rotation::R0] {
            camera.rotate();
            assert_eq!(camera.rotation, expected);
        }
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::new(10, 800.0);
        camera.zoom_at(0.0, 0.0, 100.0);
        assert_approx_eq!(camera.zoom, MAX_ZOOM);
        camera.zoom_at(0.0, 0.0, -100.0);
        assert_approx_eq!(camera.zoom, MIN_ZOOM);
    }

    #[test]
    fn test_zoom_keeps_cursor_anchor() {
        let mut camera = Camera::new(10, 800.0);
        let (mx, my) = (300.0, 250.0);
        let before = camera.projection().screen_to_grid(mx, my);

        camera.zoom_at(mx, my, 3.0);
        assert_approx_eq!(camera.zoom, 1.3, 1e-5);
        assert_eq!(camera.projection().screen_to_grid(mx, my), before);

        camera.zoom_at(mx, my, -7.0);
        assert_eq!(camera.projection().screen_to_grid(mx, my), before);
    }

    #[test]
    fn test_pan_moves_picks() {
        let mut camera = Camera::new(10, 800.0);
        let (x, y) = camera.projection().point_to_screen(2.5, 2.5, 0.0);
        camera.pan(32.0, 16.0);
        assert_eq!(camera.projection().pick(x + 32.0, y + 16.0), Some((2, 2)));
    }

    #[test]
    fn test_centre_on_vehicle() {
        let mut camera = Camera::new(10, 800.0);
        camera.rotate();
        camera.zoom_at(0.0, 0.0, 5.0);
        camera.toggle_follow();
        assert!(camera.follow);

        let pose = VehiclePose::new(4.5, 6.5, 1.0, Heading::UpRight);
        camera.centre_on(&pose, 800.0, 600.0);

        let (x, y) = camera.projection().point_to_screen(pose.r, pose.c, pose.z);
        assert_approx_eq!(x, 400.0, 1e-3);
        assert_approx_eq!(y, 300.0, 1e-3);
    }
}
