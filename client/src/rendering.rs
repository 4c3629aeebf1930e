use crate::camera::Camera;
use macroquad::prelude::*;
use shared::{
    rotate_grid, rotate_position, IsoProjection, TileClassifier, TileKind, VehiclePose, World,
    GROUND_BLOCK,
};

#[derive(Debug, Clone)]
pub struct HudInfo<'a> {
    pub client_id: Option<u32>,
    pub online: bool,
    pub selected_block: &'a str,
    pub remote_players: usize,
    pub follow: bool,
}

/// One thing to draw, ordered back to front by `depth`.
enum Sprite<'a> {
    Layer { r: usize, c: usize, z: usize, blocks: &'a [String] },
    Vehicle { pose: VehiclePose, local: bool },
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render<'a, T>(
        &mut self,
        world: &World,
        tiles: &T,
        camera: &Camera,
        vehicles: impl Iterator<Item = (VehiclePose, bool)>,
        hovered: Option<(usize, usize)>,
        hud: HudInfo<'a>,
    ) where
        T: TileClassifier + ?Sized,
    {
        self.width = screen_width();
        self.height = screen_height();
        clear_background(Color::from_rgba(178, 235, 244, 255));

        let projection = camera.projection();
        let size = world.size();

        let mut sprites: Vec<(f32, Sprite)> = Vec::new();
        for r in 0..size {
            for c in 0..size {
                let Some(cell) = world.cell(r, c) else {
                    continue;
                };
                let (rr, cc) = rotate_grid(r, c, size, projection.rotation);
                for (z, blocks) in cell.layers().iter().enumerate() {
                    let depth = (rr + cc) as f32 + z as f32 * 0.1;
                    sprites.push((depth, Sprite::Layer { r, c, z, blocks }));
                }
            }
        }
        for (pose, local) in vehicles {
            let (rr, cc) = rotate_position(pose.r, pose.c, size, projection.rotation);
            let depth = (rr + cc).floor() + pose.z * 0.1 + 0.07;
            sprites.push((depth, Sprite::Vehicle { pose, local }));
        }
        sprites.sort_by(|a, b| a.0.total_cmp(&b.0));

        for (_, sprite) in &sprites {
            match sprite {
                Sprite::Layer { r, c, z, blocks } => {
                    for block in blocks.iter() {
                        let color = block_color(block, tiles.classify(block));
                        self.draw_block(&projection, *r, *c, *z, color);
                    }
                }
                Sprite::Vehicle { pose, local } => self.draw_vehicle(&projection, pose, *local),
            }
        }

        if let Some((r, c)) = hovered {
            self.draw_cursor(&projection, r, c);
        }

        self.draw_hud(&hud);
    }

    /// Draws one block as a box whose top face is the cell diamond at `z`.
    fn draw_block(&self, projection: &IsoProjection, r: usize, c: usize, z: usize, color: Color) {
        let [top, right, bottom, left] = diamond(projection, r, c, z as f32);
        let drop = vec2(0.0, projection.z_step * projection.zoom);

        // Sides first so the top face covers their shared edges
        let shade = |k: f32| Color::new(color.r * k, color.g * k, color.b * k, color.a);
        draw_triangle(left, bottom, bottom + drop, shade(0.75));
        draw_triangle(left, left + drop, bottom + drop, shade(0.75));
        draw_triangle(bottom, right, right + drop, shade(0.6));
        draw_triangle(bottom, bottom + drop, right + drop, shade(0.6));

        draw_triangle(top, right, bottom, color);
        draw_triangle(top, left, bottom, color);

        if projection.zoom >= 0.5 {
            let outline = Color::from_rgba(0, 0, 0, 60);
            draw_line(top.x, top.y, right.x, right.y, 1.0, outline);
            draw_line(top.x, top.y, left.x, left.y, 1.0, outline);
        }
    }

    fn draw_vehicle(&self, projection: &IsoProjection, pose: &VehiclePose, local: bool) {
        let (x, y) = projection.point_to_screen(pose.r, pose.c, pose.z);
        let w = projection.tile_w * 0.3 * projection.zoom;
        let h = projection.tile_h * 0.3 * projection.zoom;
        let color = if local {
            Color::from_rgba(230, 50, 50, 255)
        } else {
            Color::from_rgba(40, 90, 220, 255)
        };

        draw_rectangle(x - w / 2.0, y - h, w, h, color);
        draw_rectangle_lines(x - w / 2.0, y - h, w, h, 1.5, WHITE);

        // Facing marker on the screen-space side the vehicle heads to
        let (dr, dc) = pose.heading.delta();
        let (tx, ty) = projection.point_to_screen(pose.r + dr * 0.4, pose.c + dc * 0.4, pose.z);
        draw_line(x, y - h / 2.0, tx, ty - h / 2.0, 2.0, YELLOW);
    }

    fn draw_cursor(&self, projection: &IsoProjection, r: usize, c: usize) {
        let [top, right, bottom, left] = diamond(projection, r, c, 0.0);
        for (a, b) in [(top, right), (right, bottom), (bottom, left), (left, top)] {
            draw_line(a.x, a.y, b.x, b.y, 2.0, YELLOW);
        }
    }

    fn draw_hud(&self, hud: &HudInfo) {
        let status = match (hud.online, hud.client_id) {
            (true, Some(id)) => format!("Online as client {}", id),
            _ => "Offline".to_string(),
        };
        let lines = [
            status,
            format!("Block: {}", hud.selected_block),
            format!("Other vehicles: {}", hud.remote_players),
            format!("Follow: {}", if hud.follow { "on" } else { "off" }),
        ];

        draw_rectangle(10.0, 10.0, 230.0, 100.0, Color::from_rgba(0, 0, 0, 140));
        for (i, line) in lines.iter().enumerate() {
            draw_text(line, 20.0, 32.0 + i as f32 * 22.0, 20.0, WHITE);
        }

        draw_rectangle(
            0.0,
            self.height - 30.0,
            self.width,
            30.0,
            Color::from_rgba(255, 255, 255, 160),
        );
        draw_text(
            "LMB build  RMB remove  R rotate  V car  F follow  1-9/Tab block",
            10.0,
            self.height - 12.0,
            18.0,
            DARKGRAY,
        );
    }
}

/// Screen corners (top, right, bottom, left) of the diamond of cell
/// `(r, c)` lifted to elevation `z`, whatever the rotation.
fn diamond(projection: &IsoProjection, r: usize, c: usize, z: f32) -> [Vec2; 4] {
    let (rr, cc) = rotate_grid(r, c, projection.size, projection.rotation);
    let corner = |dr: f32, dc: f32| {
        let (x, y) = projection.project(rr as f32 + dr, cc as f32 + dc, z);
        vec2(x, y)
    };
    [corner(0.0, 0.0), corner(1.0, 0.0), corner(1.0, 1.0), corner(0.0, 1.0)]
}

/// Flat colour for a block identifier, by class with a stable tint per id.
fn block_color(block: &str, kind: TileKind) -> Color {
    if block == GROUND_BLOCK {
        return Color::from_rgba(96, 170, 70, 255);
    }
    let tint = block
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    let jitter = (tint % 40) as u8;
    match kind {
        TileKind::Road => Color::from_rgba(80 + jitter, 80 + jitter, 90 + jitter, 255),
        TileKind::Ramp => Color::from_rgba(200, 140 + jitter, 60, 255),
        TileKind::Overpass => Color::from_rgba(170 + jitter, 170 + jitter, 180, 255),
        TileKind::Plain => Color::from_rgba(
            120 + (tint % 100) as u8,
            100 + ((tint / 100) % 100) as u8,
            90 + ((tint / 10_000) % 100) as u8,
            255,
        ),
    }
}
