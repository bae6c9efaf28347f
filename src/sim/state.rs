//! Game state and core rule types
//!
//! One [`GameState`] per match, owned by the caller and passed explicitly to
//! the turn loop. No ambient singletons.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consts::*;
use crate::physics::BallId;

/// AI strength; also scales the AI's shot force and scoring noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" | "med" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Upper bound of the uniform noise added to each shot score.
    /// Lower noise means more consistently optimal play.
    pub fn noise_span(&self) -> f32 {
        match self {
            Difficulty::Easy => 200.0,
            Difficulty::Medium => 100.0,
            Difficulty::Hard => 50.0,
        }
    }

    /// Force of the AI's cue strike
    pub fn shot_force(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.3,
            Difficulty::Medium => 0.4,
            Difficulty::Hard => 0.5,
        }
    }
}

/// The ball category a player must clear before the eight ball
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallGroup {
    Solid,
    Stripe,
}

impl BallGroup {
    pub fn opposite(self) -> Self {
        match self {
            BallGroup::Solid => BallGroup::Stripe,
            BallGroup::Stripe => BallGroup::Solid,
        }
    }

    pub fn of(striped: bool) -> Self {
        if striped {
            BallGroup::Stripe
        } else {
            BallGroup::Solid
        }
    }

    /// True for numbered, non-eight balls of this group
    pub fn contains(self, ball: BallId) -> bool {
        ball.is_object_ball() && ball.is_striped() == (self == BallGroup::Stripe)
    }
}

impl fmt::Display for BallGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BallGroup::Solid => write!(f, "solids"),
            BallGroup::Stripe => write!(f, "stripes"),
        }
    }
}

/// Rule violations; each passes the turn, none ends the game by itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Foul {
    CueBallPocketed,
    EightBallEarly,
    WrongBallPocketed,
    TimeOut,
}

impl fmt::Display for Foul {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Foul::CueBallPocketed => write!(f, "Cue ball pocketed"),
            Foul::EightBallEarly => write!(f, "8-ball pocketed early"),
            Foul::WrongBallPocketed => write!(f, "Wrong ball pocketed"),
            Foul::TimeOut => write!(f, "Time ran out"),
        }
    }
}

/// Where the match stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Waiting for the human to drop the cue ball in the kitchen
    AwaitingBreakPlacement,
    /// A player is lining up a shot; the turn clock runs
    Aiming,
    /// Balls in motion; waiting for the table to settle
    ShotInFlight,
    /// The table settled; the shot is judged exactly once
    Resolving,
    /// Terminal; nothing ticks anymore
    GameOver,
}

/// Discrete messages from the UI into the rule engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    CueBallPlaced(Vec2),
    ShotCommitted { angle: f32, power: f32 },
    DifficultyChanged(Difficulty),
}

/// One-way notifications out to the UI and audio layers
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    TurnStarted { player_turn: bool },
    Foul(Foul),
    /// Count of object balls that dropped this shot (one pocket sound)
    BallsPocketed(usize),
    BallHit,
    GameEnded(String),
}

/// Complete match state, mutated only by the turn loop and rules
#[derive(Debug, Clone)]
pub struct GameState {
    /// Match seed for reproducibility
    pub seed: u64,
    /// Shared RNG: rack shuffle, AI noise, fallback shot direction
    pub rng: Pcg32,
    pub phase: TurnPhase,
    /// True while the human is shooting
    pub player_turn: bool,
    /// Turn clock, in ticks; only decremented while `Aiming`
    pub timer_ticks: u32,
    /// Remaining AI think delay before its shot, in ticks
    pub ai_think_ticks: u32,
    pub player_group: Option<BallGroup>,
    pub ai_group: Option<BallGroup>,
    pub difficulty: Difficulty,
    /// Most recent foul, surfaced on the banner
    pub foul: Option<Foul>,
    /// Terminal message once the game is over
    pub outcome: Option<String>,
}

impl GameState {
    pub fn new(seed: u64, difficulty: Difficulty) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            phase: TurnPhase::AwaitingBreakPlacement,
            player_turn: true,
            timer_ticks: turn_ticks(),
            ai_think_ticks: 0,
            player_group: None,
            ai_group: None,
            difficulty,
            foul: None,
            outcome: None,
        }
    }

    /// True once the cue ball has been placed
    pub fn started(&self) -> bool {
        self.phase != TurnPhase::AwaitingBreakPlacement
    }

    pub fn shot_in_progress(&self) -> bool {
        self.phase == TurnPhase::ShotInFlight
    }

    pub fn game_over(&self) -> bool {
        self.phase == TurnPhase::GameOver
    }

    /// Whole seconds left on the turn clock, for the HUD
    pub fn timer_seconds(&self) -> u32 {
        (self.timer_ticks as f32 * SIM_DT).ceil() as u32
    }

    /// Group of whoever is shooting right now
    pub fn shooter_group(&self) -> Option<BallGroup> {
        if self.player_turn {
            self.player_group
        } else {
            self.ai_group
        }
    }

    /// Assign groups from the first legally pocketed ball. The shooter takes
    /// that ball's group; the opponent the complement. Idempotent: once set,
    /// later pocketings never change the assignment.
    pub fn assign_groups(&mut self, first_striped: bool) {
        if self.player_group.is_some() {
            return;
        }
        let shooter = BallGroup::of(first_striped);
        let (player, ai) = if self.player_turn {
            (shooter, shooter.opposite())
        } else {
            (shooter.opposite(), shooter)
        };
        self.player_group = Some(player);
        self.ai_group = Some(ai);
        log::info!("groups assigned: player {}, ai {}", player, ai);
    }

    /// Reset per-turn clocks; called on every entry into `Aiming` so a stale
    /// countdown can never fire for a turn that already advanced
    pub fn begin_turn(&mut self) {
        self.phase = TurnPhase::Aiming;
        self.timer_ticks = turn_ticks();
        self.ai_think_ticks = if self.player_turn {
            0
        } else {
            (AI_THINK_SECONDS / SIM_DT) as u32
        };
    }

    pub fn pass_turn(&mut self) {
        self.player_turn = !self.player_turn;
    }

    pub fn end_game(&mut self, message: String) {
        self.phase = TurnPhase::GameOver;
        self.outcome = Some(message);
    }
}

/// Length of the turn clock in ticks
pub fn turn_ticks() -> u32 {
    TURN_SECONDS * (1.0 / SIM_DT) as u32
}
