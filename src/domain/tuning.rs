/// Gameplay tuning for the simulation and generated map.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct PhysicsTuning {
    /// Duration of one fixed sub-step in seconds.
    pub time_step: f32,

    /// Upper bound for a single frame delta, limits catch-up after a stall.
    pub max_frame_time: f32,

    /// Impulse a working conveyor applies to a touching body every sub-step.
    pub conveyor_impulse: f32,
}

impl Default for PhysicsTuning {
    fn default() -> Self {
        Self {
            time_step: 1.0 / 60.0,
            max_frame_time: 0.25,
            conveyor_impulse: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Edge length of the player in tiles.
    pub size: f32,

    /// Divisor applied to the size for the physics hitbox half extent.
    /// 2.0 would be 1:1; the hitbox is kept slightly smaller.
    pub hitbox_scale: f32,

    /// Movement speed in tiles per second for unit input.
    pub speed: f32,

    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            size: 1.0,
            hitbox_scale: 2.08,
            speed: 5.0,
            density: 0.5,
            friction: 0.4,
            restitution: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MapTuning {
    /// Map edge length in tiles; the map is centered on the origin.
    pub size: i32,

    /// Radius around the origin kept free of generated blocks.
    pub clear_radius: i32,

    /// Maximum spawn offset from the origin, in tiles.
    pub spawn_spread: i32,

    /// Chance of a rock on a stone tile outside the clear zone.
    pub rock_chance: f64,

    pub noise_frequency: f64,
}

impl Default for MapTuning {
    fn default() -> Self {
        Self {
            size: 64,
            clear_radius: 8,
            spawn_spread: 2,
            rock_chance: 0.35,
            noise_frequency: 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorldTuning {
    pub physics: PhysicsTuning,
    pub player: PlayerTuning,
    pub map: MapTuning,
}
