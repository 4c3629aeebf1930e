//! Grid to screen mapping for the isometric view
//!
//! Everything here is pure. A cell is anchored at the top vertex of its
//! diamond; elevation lifts the anchor straight up by `z_step` pixels per
//! level. Picking ignores elevation and resolves to the ground footprint.

use crate::{TILE_H, TILE_W, Z_STEP};

/// Absorbs float error when a screen point sits exactly on a cell vertex.
const PICK_EPSILON: f32 = 1e-4;

/// One of the four 90 degree view rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    R0,
    R1,
    R2,
    R3,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [Rotation::R0, Rotation::R1, Rotation::R2, Rotation::R3];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        match self {
            Rotation::R0 => 0,
            Rotation::R1 => 1,
            Rotation::R2 => 2,
            Rotation::R3 => 3,
        }
    }

    /// Next rotation clockwise, wrapping after `R3`.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() as usize + 1) % 4]
    }
}

/// Remaps a logical cell onto the screen-facing axes.
///
/// `r` and `c` must be inside `[0, size)`.
pub fn rotate_grid(r: usize, c: usize, size: usize, rotation: Rotation) -> (usize, usize) {
    debug_assert!(r < size && c < size);
    match rotation {
        Rotation::R0 => (r, c),
        Rotation::R1 => (c, size - 1 - r),
        Rotation::R2 => (size - 1 - r, size - 1 - c),
        Rotation::R3 => (size - 1 - c, r),
    }
}

/// Inverse of [`rotate_grid`]. Works on signed cells so that picks outside
/// the grid stay outside after un-rotation.
pub fn unrotate_grid(rr: i32, cc: i32, size: usize, rotation: Rotation) -> (i32, i32) {
    let last = size as i32 - 1;
    match rotation {
        Rotation::R0 => (rr, cc),
        Rotation::R1 => (last - cc, rr),
        Rotation::R2 => (last - rr, last - cc),
        Rotation::R3 => (cc, last - rr),
    }
}

/// [`rotate_grid`] for continuous positions such as vehicles.
pub fn rotate_point(r: f32, c: f32, size: usize, rotation: Rotation) -> (f32, f32) {
    let last = size as f32 - 1.0;
    match rotation {
        Rotation::R0 => (r, c),
        Rotation::R1 => (c, last - r),
        Rotation::R2 => (last - r, last - c),
        Rotation::R3 => (last - c, r),
    }
}

/// Rotates a continuous position so that it stays inside its cell: cell
/// `(r, c)` covers `[r, r + 1) x [c, c + 1)` before and after.
pub fn rotate_position(r: f32, c: f32, size: usize, rotation: Rotation) -> (f32, f32) {
    let size = size as f32;
    match rotation {
        Rotation::R0 => (r, c),
        Rotation::R1 => (c, size - r),
        Rotation::R2 => (size - r, size - c),
        Rotation::R3 => (size - c, r),
    }
}

/// Projection parameters for one frame: grid size, view rotation, tile
/// metrics, zoom and pan offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsoProjection {
    pub size: usize,
    pub rotation: Rotation,
    pub tile_w: f32,
    pub tile_h: f32,
    pub z_step: f32,
    pub zoom: f32,
    pub cam_x: f32,
    pub cam_y: f32,
}

impl IsoProjection {
    /// Standard tile metrics, no rotation, zoom 1 and no pan.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            rotation: Rotation::R0,
            tile_w: TILE_W,
            tile_h: TILE_H,
            z_step: Z_STEP,
            zoom: 1.0,
            cam_x: 0.0,
            cam_y: 0.0,
        }
    }

    /// Screen position of the anchor of grid point `(r, c)` at elevation `z`.
    pub fn grid_to_screen(&self, r: f32, c: f32, z: f32) -> (f32, f32) {
        let (rr, cc) = rotate_point(r, c, self.size, self.rotation);
        self.project(rr, cc, z)
    }

    /// Screen position of a continuous position such as a vehicle. Cell
    /// `(r, c)` spans `[r, r + 1) x [c, c + 1)` under every rotation, so a
    /// point keeps its place inside the diamond of its cell.
    pub fn point_to_screen(&self, r: f32, c: f32, z: f32) -> (f32, f32) {
        let (rr, cc) = rotate_position(r, c, self.size, self.rotation);
        self.project(rr, cc, z)
    }

    /// Projects a point that is already on the rotated axes.
    pub fn project(&self, rr: f32, cc: f32, z: f32) -> (f32, f32) {
        let x = (rr - cc) * (self.tile_w / 2.0) * self.zoom + self.cam_x;
        let y = (rr + cc) * (self.tile_h / 2.0) * self.zoom + self.cam_y
            - z * self.z_step * self.zoom;
        (x, y)
    }

    /// Ground cell under a screen point. Floors in rotated space before
    /// un-rotating, so the result may lie outside the grid.
    pub fn screen_to_grid(&self, x: f32, y: f32) -> (i32, i32) {
        let tx = (x - self.cam_x) / self.zoom;
        let ty = (y - self.cam_y) / self.zoom;
        let a = ty / (self.tile_h / 2.0);
        let b = tx / (self.tile_w / 2.0);
        let rr = ((a + b) / 2.0 + PICK_EPSILON).floor() as i32;
        let cc = ((a - b) / 2.0 + PICK_EPSILON).floor() as i32;
        unrotate_grid(rr, cc, self.size, self.rotation)
    }

    /// [`Self::screen_to_grid`] restricted to cells inside the grid.
    pub fn pick(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let (r, c) = self.screen_to_grid(x, y);
        let size = self.size as i32;
        if (0..size).contains(&r) && (0..size).contains(&c) {
            Some((r as usize, c as usize))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::collections::HashSet;

    fn projections(size: usize) -> Vec<IsoProjection> {
        let mut out = Vec::new();
        for rotation in Rotation::ALL {
            for (zoom, cam_x, cam_y) in [(1.0, 512.0, 100.0), (0.5, -37.5, 12.25), (1.7, 3.0, -80.0)] {
                out.push(IsoProjection {
                    rotation,
                    zoom,
                    cam_x,
                    cam_y,
                    ..IsoProjection::new(size)
                });
            }
        }
        out
    }

    #[test]
    fn test_rotation_cycle() {
        assert_eq!(Rotation::R0.next(), Rotation::R1);
        assert_eq!(Rotation::R3.next(), Rotation::R0);
        assert_eq!(Rotation::from_index(2), Some(Rotation::R2));
        assert_eq!(Rotation::from_index(4), None);
    }

    #[test]
    fn test_rotate_grid_fixed_cases() {
        assert_eq!(rotate_grid(0, 1, 3, Rotation::R0), (0, 1));
        assert_eq!(rotate_grid(0, 1, 3, Rotation::R1), (1, 2));
        assert_eq!(rotate_grid(0, 1, 3, Rotation::R2), (2, 1));
        assert_eq!(rotate_grid(0, 1, 3, Rotation::R3), (1, 0));
    }

    #[test]
    fn test_rotations_are_bijections() {
        let size = 7;
        for rotation in Rotation::ALL {
            let mut seen = HashSet::new();
            for r in 0..size {
                for c in 0..size {
                    let (rr, cc) = rotate_grid(r, c, size, rotation);
                    assert!(rr < size && cc < size);
                    seen.insert((rr, cc));

                    let back = unrotate_grid(rr as i32, cc as i32, size, rotation);
                    assert_eq!(back, (r as i32, c as i32));
                }
            }
            assert_eq!(seen.len(), size * size);
        }
    }

    #[test]
    fn test_quarter_turn_composition() {
        let size = 5;
        for r in 0..size {
            for c in 0..size {
                let twice = {
                    let (a, b) = rotate_grid(r, c, size, Rotation::R1);
                    rotate_grid(a, b, size, Rotation::R1)
                };
                assert_eq!(twice, rotate_grid(r, c, size, Rotation::R2));

                let mut p = (r, c);
                for _ in 0..4 {
                    p = rotate_grid(p.0, p.1, size, Rotation::R1);
                }
                assert_eq!(p, (r, c));
            }
        }
    }

    #[test]
    fn test_rotate_point_matches_grid_on_vertices() {
        for rotation in Rotation::ALL {
            let (rr, cc) = rotate_grid(2, 4, 6, rotation);
            let (fr, fc) = rotate_point(2.0, 4.0, 6, rotation);
            assert_approx_eq!(fr, rr as f32);
            assert_approx_eq!(fc, cc as f32);
        }
    }

    #[test]
    fn test_grid_to_screen_formula() {
        let projection = IsoProjection {
            cam_x: 100.0,
            cam_y: 50.0,
            zoom: 2.0,
            ..IsoProjection::new(10)
        };
        let (x, y) = projection.grid_to_screen(3.0, 1.0, 2.0);
        assert_approx_eq!(x, (3.0 - 1.0) * 32.0 * 2.0 + 100.0);
        assert_approx_eq!(y, (3.0 + 1.0) * 16.0 * 2.0 + 50.0 - 2.0 * 24.0 * 2.0);
    }

    #[test]
    fn test_screen_to_grid_round_trip() {
        let size = 9;
        for projection in projections(size) {
            for r in 0..size {
                for c in 0..size {
                    let (x, y) = projection.grid_to_screen(r as f32, c as f32, 0.0);
                    assert_eq!(
                        projection.screen_to_grid(x, y),
                        (r as i32, c as i32),
                        "rotation {:?} zoom {}",
                        projection.rotation,
                        projection.zoom
                    );
                }
            }
        }
    }

    #[test]
    fn test_pick_inside_diamond() {
        let size = 6;
        for projection in projections(size) {
            for r in 0..size {
                for c in 0..size {
                    let (x, y) = projection.grid_to_screen(r as f32, c as f32, 0.0);
                    let centre_y = y + projection.tile_h / 2.0 * projection.zoom;
                    assert_eq!(projection.pick(x, centre_y), Some((r, c)));
                }
            }
        }
    }

    #[test]
    fn test_points_stay_in_their_cell() {
        let size = 5;
        for projection in projections(size) {
            for r in 0..size {
                for c in 0..size {
                    for (fr, fc) in [(0.5, 0.5), (0.2, 0.7), (0.9, 0.1)] {
                        let (x, y) =
                            projection.point_to_screen(r as f32 + fr, c as f32 + fc, 0.0);
                        assert_eq!(projection.pick(x, y), Some((r, c)));
                    }
                }
            }
        }
    }

    #[test]
    fn test_pick_ignores_elevation() {
        let projection = IsoProjection::new(8);
        let (x, y) = projection.grid_to_screen(4.0, 4.0, 3.0);
        let (gx, gy) = projection.grid_to_screen(4.0, 4.0, 0.0);
        assert_ne!(projection.pick(x, y + 1.0), projection.pick(gx, gy + 1.0));
        assert_eq!(projection.pick(gx, gy + 1.0), Some((4, 4)));
    }

    #[test]
    fn test_pick_outside_grid() {
        let projection = IsoProjection {
            cam_x: 400.0,
            cam_y: 100.0,
            ..IsoProjection::new(5)
        };
        // Just above the top vertex of cell (0, 0).
        assert_eq!(projection.pick(400.0, 99.0), None);
        assert_eq!(projection.screen_to_grid(400.0, 99.0), (-1, -1));

        for rotation in Rotation::ALL {
            let rotated = IsoProjection {
                rotation,
                ..projection
            };
            assert_eq!(rotated.pick(-5000.0, -5000.0), None);
            assert_eq!(rotated.pick(5000.0, 5000.0), None);
        }
    }
}
