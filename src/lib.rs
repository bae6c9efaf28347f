//! Pocket Eight - browser 8-ball pool against an AI opponent
//!
//! Core modules:
//! - `sim`: Deterministic game logic (turn machine, rules, AI shot selection)
//! - `physics`: Table simulation behind a rapier2d boundary
//! - `audio`: Procedural Web Audio sound effects
//! - `settings`: Difficulty and audio preferences

#[cfg(target_arch = "wasm32")]
pub mod audio;
pub mod physics;
pub mod settings;
pub mod sim;

pub use settings::Settings;
pub use sim::{Difficulty, GameState};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz, matches the browser frame budget)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// Table proportions, relative to table width
    pub const BALL_RADIUS_FRAC: f32 = 0.025;
    pub const POCKET_RADIUS_FRAC: f32 = 0.0375;
    pub const WALL_BORDER_FRAC: f32 = 0.05;
    /// The kitchen: the left quarter of the table, where the cue ball
    /// may be placed for the break
    pub const KITCHEN_FRAC: f32 = 0.25;

    /// A ball slower than this counts as at rest (units per tick)
    pub const STILLNESS_THRESHOLD: f32 = 0.1;
    /// Velocity decay standing in for felt friction
    pub const FELT_DAMPING: f32 = 0.8;
    /// Ball-to-ball and ball-to-cushion bounciness
    pub const BALL_RESTITUTION: f32 = 0.95;

    /// Seconds a player gets to commit a shot
    pub const TURN_SECONDS: u32 = 15;
    /// Seconds the AI "thinks" before shooting
    pub const AI_THINK_SECONDS: f32 = 1.5;
    /// Seconds the foul banner stays up
    pub const FOUL_BANNER_SECONDS: f32 = 3.0;

    /// Cue velocity per unit of shot force (units per second)
    pub const SHOT_SPEED: f32 = 1200.0;
    /// Baseline force of an uncharged human shot
    pub const SHOT_FORCE_BASE: f32 = 0.2;
    /// Additional force at a fully charged power meter
    pub const SHOT_FORCE_RANGE: f32 = 0.5;
}

/// Unit vector for an angle in radians
#[inline]
pub fn unit_from_angle(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Unsigned angle between two directions, in [0, π]
///
/// Degenerate (zero-length) inputs yield 0 rather than NaN.
#[inline]
pub fn cut_angle(a: Vec2, b: Vec2) -> f32 {
    let len = a.length() * b.length();
    if len <= f32::EPSILON {
        return 0.0;
    }
    (a.dot(b) / len).clamp(-1.0, 1.0).acos()
}
