//! Shot resolution
//!
//! Runs exactly once per settled shot and decides, in order: scratch foul,
//! eight-ball win/loss, group assignment from the first pocketed ball,
//! right/wrong-ball continuation, or a bare turn pass. Every shot yields
//! exactly one [`ShotOutcome`], never zero and never more than one.

use crate::physics::BallId;
use crate::sim::state::{Foul, GameState};

/// What the table reported for one shot
#[derive(Debug, Clone, Default)]
pub struct ShotReport {
    pub cue_pocketed: bool,
    /// Object balls that dropped, in capture order (cue excluded)
    pub pocketed: Vec<BallId>,
    /// Balls of the shooter's assigned group still on the table after the
    /// shot; meaningless while groups are unassigned
    pub shooter_group_left: usize,
}

impl ShotReport {
    /// Split a raw pocket drain into cue flag and object balls
    pub fn from_drain(drained: Vec<BallId>, shooter_group_left: usize) -> Self {
        let cue_pocketed = drained.contains(&BallId::Cue);
        let pocketed = drained.into_iter().filter(|b| *b != BallId::Cue).collect();
        Self {
            cue_pocketed,
            pocketed,
            shooter_group_left,
        }
    }
}

/// The single result of resolving a shot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShotOutcome {
    /// The shooter made a ball of their own group and shoots again
    Continue,
    /// The turn goes to the opponent
    Pass,
    /// Terminal, with the message to surface
    GameOver(String),
}

/// Judge one settled shot. Mutates group assignment and the foul field;
/// the caller applies the outcome to the turn order.
pub fn resolve_shot(state: &mut GameState, report: &ShotReport) -> ShotOutcome {
    state.foul = None;

    // A scratch ends the turn outright; no type or win logic this resolution.
    if report.cue_pocketed {
        state.foul = Some(Foul::CueBallPocketed);
        log::info!("foul: cue ball pocketed");
        return ShotOutcome::Pass;
    }

    // The eight ball decides the game: legal only once the shooter's own
    // group is cleared. Sinking it any earlier (the break included) loses.
    if report.pocketed.iter().any(|b| b.is_eight()) {
        let cleared = state.shooter_group().is_some() && report.shooter_group_left == 0;
        if !cleared {
            state.foul = Some(Foul::EightBallEarly);
        }
        let shooter_won = cleared;
        let message = match (shooter_won, state.player_turn) {
            (true, true) | (false, false) => "You win!",
            (true, false) => "AI wins!",
            (false, true) => "You lose!",
        };
        log::info!("eight ball down, shooter_won={}", shooter_won);
        return ShotOutcome::GameOver(message.to_string());
    }

    if report.pocketed.is_empty() {
        return ShotOutcome::Pass;
    }

    // First legal pocketing fixes the groups; the shooter takes the type of
    // the first ball down.
    if state.shooter_group().is_none() {
        state.assign_groups(report.pocketed[0].is_striped());
    }
    let Some(group) = state.shooter_group() else {
        // Unreachable: assignment above always succeeds with a non-empty drain
        return ShotOutcome::Pass;
    };

    // Whoever is shooting at resolution time is evaluated for continuation.
    if report.pocketed.iter().any(|&b| group.contains(b)) {
        ShotOutcome::Continue
    } else {
        state.foul = Some(Foul::WrongBallPocketed);
        log::info!("foul: no ball of the shooter's group was made");
        ShotOutcome::Pass
    }
}
