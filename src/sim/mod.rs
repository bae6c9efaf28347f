//! Deterministic game logic
//!
//! Everything rule-shaped lives here. This module must stay pure and
//! deterministic:
//! - Fixed timestep only
//! - Seeded RNG only, owned by the state
//! - No rendering or platform dependencies; the UI talks through queued
//!   input events and receives game events back

pub mod ai;
pub mod rules;
pub mod state;
pub mod tick;

pub use ai::{ShotPick, choose_shot, cue_impulse_for, shot_score};
pub use rules::{ShotOutcome, ShotReport, resolve_shot};
pub use state::{BallGroup, Difficulty, Foul, GameEvent, GameState, InputEvent, TurnPhase};
pub use tick::tick;
