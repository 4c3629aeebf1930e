//! Vehicle movement over the stacked-tile world

use crate::tiles::{TileClassifier, TileKind};
use crate::world::World;
use crate::{CLIMB_LIMIT, EDGE_MARGIN, HEIGHT_EASING, OVERPASS_CLEARANCE, VEHICLE_SPEED};
use serde::{Deserialize, Serialize};

/// Facing of a vehicle, named after its screen direction at rotation 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Heading {
    UpLeft,
    UpRight,
    DownLeft,
    #[default]
    DownRight,
}

impl Heading {
    /// Grid step `(dr, dc)` of one unit of travel in this direction.
    pub fn delta(self) -> (f32, f32) {
        match self {
            Heading::UpLeft => (-1.0, 0.0),
            Heading::DownRight => (1.0, 0.0),
            Heading::UpRight => (0.0, -1.0),
            Heading::DownLeft => (0.0, 1.0),
        }
    }

    /// Short tag used by sprite sets (`ul`, `ur`, `dl`, `dr`).
    pub fn tag(self) -> &'static str {
        match self {
            Heading::UpLeft => "ul",
            Heading::UpRight => "ur",
            Heading::DownLeft => "dl",
            Heading::DownRight => "dr",
        }
    }
}

/// Continuous position and facing, as reported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehiclePose {
    pub r: f32,
    pub c: f32,
    pub z: f32,
    pub heading: Heading,
}

impl VehiclePose {
    pub fn new(r: f32, c: f32, z: f32, heading: Heading) -> Self {
        Self { r, c, z, heading }
    }

    pub fn is_finite(&self) -> bool {
        self.r.is_finite() && self.c.is_finite() && self.z.is_finite()
    }
}

/// Result of one simulation tick, for callers that care why a vehicle
/// did or did not move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub target_z: f32,
    pub accepted: bool,
}

/// A locally driven vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub pose: VehiclePose,
    pub speed: f32,
}

impl Vehicle {
    pub fn new(r: f32, c: f32, z: f32) -> Self {
        Self {
            pose: VehiclePose::new(r, c, z, Heading::default()),
            speed: VEHICLE_SPEED,
        }
    }

    /// Advances the vehicle by one tick.
    ///
    /// With no input the vehicle holds its cell but keeps easing toward the
    /// height of the tile under it. A move is taken only onto a roadway or
    /// flat ground and only if the height difference is climbable;
    /// otherwise the vehicle stays where it was.
    pub fn tick<T>(&mut self, input: Option<Heading>, world: &World, tiles: &T) -> TickReport
    where
        T: TileClassifier + ?Sized,
    {
        let (mut nr, mut nc) = (self.pose.r, self.pose.c);
        if let Some(heading) = input {
            let (dr, dc) = heading.delta();
            nr += dr * self.speed;
            nc += dc * self.speed;
            self.pose.heading = heading;
        }

        // Probe where the vehicle would actually end up, not past the edge
        let max = world.size() as f32 - EDGE_MARGIN;
        nr = nr.clamp(0.0, max);
        nc = nc.clamp(0.0, max);

        let (tz, blocks) = world.probe(nr, nc);
        let kinds: Vec<TileKind> = blocks.iter().map(|b| tiles.classify(b)).collect();
        let has_road = kinds.iter().any(|k| k.is_roadway());
        let has_ramp = kinds.contains(&TileKind::Ramp);
        let has_overpass = kinds.contains(&TileKind::Overpass);

        let target_z = if has_ramp {
            tz + 1.0
        } else if has_overpass {
            if self.pose.z >= OVERPASS_CLEARANCE {
                tz + 1.0
            } else {
                0.0
            }
        } else {
            tz
        };

        let accepted = (has_road || tz == 0.0) && (target_z - self.pose.z).abs() <= CLIMB_LIMIT;
        if accepted {
            self.pose.r = nr;
            self.pose.c = nc;
            self.pose.z += (target_z - self.pose.z) * HEIGHT_EASING;
        }

        self.pose.r = self.pose.r.clamp(0.0, max);
        self.pose.c = self.pose.c.clamp(0.0, max);

        TickReport { target_z, accepted }
    }
}
