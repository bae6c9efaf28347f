//! Fixed timestep turn loop
//!
//! Single logical thread: one tick drives input draining, the turn clock,
//! the AI, physics stepping and shot resolution. Waiting is expressed as
//! phase state, never as blocking.

use std::collections::VecDeque;

use crate::consts::*;
use crate::physics::{BallId, PoolWorld};
use crate::sim::ai::{candidate_balls, choose_shot, cue_impulse_for, random_impulse};
use crate::sim::rules::{ShotOutcome, ShotReport, resolve_shot};
use crate::sim::state::{Foul, GameEvent, GameState, InputEvent, TurnPhase};
use crate::unit_from_angle;

/// Advance the match by one fixed timestep.
///
/// Drains queued UI input, then runs whichever phase is active. Returned
/// events are one-way notifications for the UI and audio layers.
pub fn tick(
    state: &mut GameState,
    world: &mut PoolWorld,
    inputs: &mut VecDeque<InputEvent>,
    dt: f32,
) -> Vec<GameEvent> {
    let mut events = Vec::new();

    // Terminal: drop input on the floor, mutate nothing
    if state.game_over() {
        inputs.clear();
        return events;
    }

    while let Some(event) = inputs.pop_front() {
        match event {
            InputEvent::DifficultyChanged(level) => {
                state.difficulty = level;
                log::info!("difficulty set to {}", level.as_str());
            }
            InputEvent::CueBallPlaced(pos) if state.phase == TurnPhase::AwaitingBreakPlacement => {
                // Break placement is only legal inside the kitchen
                if pos.x <= world.width() * KITCHEN_FRAC && world.place_cue_ball(pos) {
                    state.begin_turn();
                    events.push(GameEvent::TurnStarted {
                        player_turn: state.player_turn,
                    });
                }
            }
            InputEvent::ShotCommitted { angle, power }
                if state.phase == TurnPhase::Aiming && state.player_turn =>
            {
                let force = SHOT_FORCE_BASE + (power.clamp(0.0, 100.0) / 100.0) * SHOT_FORCE_RANGE;
                // The cue is struck away from the aim direction, as if the
                // stick were drawn back through it
                world.apply_impulse(BallId::Cue, -unit_from_angle(angle) * force * SHOT_SPEED);
                state.phase = TurnPhase::ShotInFlight;
            }
            // Anything else is out of phase and ignored
            _ => {}
        }
    }

    match state.phase {
        // Nothing moves until the cue ball is on the table
        TurnPhase::AwaitingBreakPlacement => {}

        TurnPhase::Aiming => {
            if !state.player_turn {
                if state.ai_think_ticks > 0 {
                    state.ai_think_ticks -= 1;
                } else {
                    take_ai_shot(state, world);
                    state.phase = TurnPhase::ShotInFlight;
                }
            }

            // The countdown only runs while still aiming; committing a shot
            // or passing the turn re-arms it, so a stale expiry cannot fire
            if state.phase == TurnPhase::Aiming {
                state.timer_ticks = state.timer_ticks.saturating_sub(1);
                if state.timer_ticks == 0 {
                    state.foul = Some(Foul::TimeOut);
                    events.push(GameEvent::Foul(Foul::TimeOut));
                    state.pass_turn();
                    state.begin_turn();
                    events.push(GameEvent::TurnStarted {
                        player_turn: state.player_turn,
                    });
                }
            }
        }

        TurnPhase::ShotInFlight => {
            world.step(dt);
            if world.take_hits() > 0 {
                events.push(GameEvent::BallHit);
            }
            // Settledness is read strictly after the step that produced it;
            // pocket events were queued during stepping and stay queued until
            // resolution drains them. The phase change is the one-shot settle
            // latch: it can only fire once per shot.
            if world.all_settled() {
                state.phase = TurnPhase::Resolving;
            }
        }

        TurnPhase::Resolving => {
            let drained = world.pocketed_since();
            let shooter_left = state
                .shooter_group()
                .map(|group| {
                    world
                        .live_object_balls()
                        .iter()
                        .filter(|(id, _)| group.contains(*id))
                        .count()
                })
                .unwrap_or(0);
            let report = ShotReport::from_drain(drained, shooter_left);

            let outcome = resolve_shot(state, &report);

            if !report.pocketed.is_empty() {
                events.push(GameEvent::BallsPocketed(report.pocketed.len()));
            }
            if let Some(foul) = state.foul {
                events.push(GameEvent::Foul(foul));
            }
            if report.cue_pocketed && !matches!(outcome, ShotOutcome::GameOver(_)) {
                // Ball in hand for the incoming player, at the head spot
                let spot = world.head_spot();
                world.respawn_cue_ball(spot);
            }

            match outcome {
                ShotOutcome::Continue => {
                    state.begin_turn();
                    events.push(GameEvent::TurnStarted {
                        player_turn: state.player_turn,
                    });
                }
                ShotOutcome::Pass => {
                    state.pass_turn();
                    state.begin_turn();
                    events.push(GameEvent::TurnStarted {
                        player_turn: state.player_turn,
                    });
                }
                ShotOutcome::GameOver(message) => {
                    state.end_game(message.clone());
                    events.push(GameEvent::GameEnded(message));
                }
            }
        }

        TurnPhase::GameOver => {}
    }

    events
}

/// Pick and strike the AI's shot. Falls back to a random-direction poke when
/// the table offers nothing to aim at.
fn take_ai_shot(state: &mut GameState, world: &mut PoolWorld) {
    let Some(cue) = world.cue_position() else {
        log::warn!("AI turn without a cue ball on the table");
        return;
    };
    let live = world.live_object_balls();
    let candidates = candidate_balls(&live, state.ai_group);
    let impulse = match choose_shot(
        cue,
        &candidates,
        world.pockets(),
        state.difficulty,
        &mut state.rng,
    ) {
        Some(pick) => {
            log::debug!("ai aims ball {} at pocket {}", pick.ball, pick.pocket);
            cue_impulse_for(cue, pick.ball_pos, state.difficulty.shot_force())
        }
        None => random_impulse(&mut state.rng),
    };
    world.apply_impulse(BallId::Cue, impulse);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::Difficulty;
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup(seed: u64) -> (GameState, PoolWorld, VecDeque<InputEvent>) {
        let state = GameState::new(seed, Difficulty::Medium);
        let mut rng = Pcg32::seed_from_u64(seed);
        let world = PoolWorld::new(800.0, 400.0, &mut rng).unwrap();
        (state, world, VecDeque::new())
    }

    fn run_until_turn_change(
        state: &mut GameState,
        world: &mut PoolWorld,
        inputs: &mut VecDeque<InputEvent>,
        max_ticks: usize,
    ) -> Vec<GameEvent> {
        let mut all = Vec::new();
        for _ in 0..max_ticks {
            all.extend(tick(state, world, inputs, SIM_DT));
            if state.phase == TurnPhase::Aiming || state.game_over() {
                break;
            }
        }
        all
    }

    #[test]
    fn placement_outside_the_kitchen_is_ignored() {
        let (mut state, mut world, mut inputs) = setup(1);
        inputs.push_back(InputEvent::CueBallPlaced(Vec2::new(600.0, 200.0)));
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        assert_eq!(state.phase, TurnPhase::AwaitingBreakPlacement);
        assert!(!state.started());
    }

    #[test]
    fn kitchen_placement_starts_the_match() {
        let (mut state, mut world, mut inputs) = setup(1);
        inputs.push_back(InputEvent::CueBallPlaced(Vec2::new(150.0, 200.0)));
        let events = tick(&mut state, &mut world, &mut inputs, SIM_DT);
        assert_eq!(state.phase, TurnPhase::Aiming);
        assert!(state.started());
        assert!(events.contains(&GameEvent::TurnStarted { player_turn: true }));
        let cue = world.cue_position().unwrap();
        assert!((cue - Vec2::new(150.0, 200.0)).length() < 1e-3);
    }

    #[test]
    fn timeout_fouls_and_passes_without_a_shot() {
        // Scenario: the countdown expires while aiming
        let (mut state, mut world, mut inputs) = setup(2);
        inputs.push_back(InputEvent::CueBallPlaced(Vec2::new(150.0, 200.0)));
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        state.timer_ticks = 2;
        let mut events = tick(&mut state, &mut world, &mut inputs, SIM_DT);
        events.extend(tick(&mut state, &mut world, &mut inputs, SIM_DT));
        assert!(events.contains(&GameEvent::Foul(Foul::TimeOut)));
        assert!(!state.player_turn, "turn passed to the AI");
        assert_eq!(state.phase, TurnPhase::Aiming);
        // No impulse was ever applied: the table is still at rest
        assert!(world.all_settled());
    }

    #[test]
    fn committed_shot_flies_and_resolves_exactly_once() {
        let (mut state, mut world, mut inputs) = setup(3);
        inputs.push_back(InputEvent::CueBallPlaced(Vec2::new(150.0, 200.0)));
        tick(&mut state, &mut world, &mut inputs, SIM_DT);

        // Aim right at the rack (aim angle points backward per the cue model)
        inputs.push_back(InputEvent::ShotCommitted {
            angle: std::f32::consts::PI,
            power: 80.0,
        });
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        assert_eq!(state.phase, TurnPhase::ShotInFlight);

        let events = run_until_turn_change(&mut state, &mut world, &mut inputs, 20_000);
        // Exactly one turn boundary came out of the resolution
        let boundaries = events
            .iter()
            .filter(|e| matches!(e, GameEvent::TurnStarted { .. } | GameEvent::GameEnded(_)))
            .count();
        assert_eq!(boundaries, 1);
        assert!(state.phase == TurnPhase::Aiming || state.game_over());
    }

    #[test]
    fn ai_shoots_after_its_think_delay() {
        let (mut state, mut world, mut inputs) = setup(4);
        inputs.push_back(InputEvent::CueBallPlaced(Vec2::new(150.0, 200.0)));
        tick(&mut state, &mut world, &mut inputs, SIM_DT);

        // Hand the turn to the AI
        state.pass_turn();
        state.begin_turn();
        assert!(state.ai_think_ticks > 0);
        let think = state.ai_think_ticks as usize;
        for _ in 0..think {
            tick(&mut state, &mut world, &mut inputs, SIM_DT);
            assert_eq!(state.phase, TurnPhase::Aiming, "still thinking");
        }
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        assert_eq!(state.phase, TurnPhase::ShotInFlight);
    }

    #[test]
    fn difficulty_change_applies_mid_match() {
        let (mut state, mut world, mut inputs) = setup(5);
        inputs.push_back(InputEvent::DifficultyChanged(Difficulty::Hard));
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        assert_eq!(state.difficulty, Difficulty::Hard);
    }

    #[test]
    fn game_over_is_terminal() {
        let (mut state, mut world, mut inputs) = setup(6);
        state.end_game("You win!".into());
        inputs.push_back(InputEvent::CueBallPlaced(Vec2::new(150.0, 200.0)));
        inputs.push_back(InputEvent::ShotCommitted {
            angle: 0.0,
            power: 50.0,
        });
        let events = tick(&mut state, &mut world, &mut inputs, SIM_DT);
        assert!(events.is_empty());
        assert!(inputs.is_empty(), "terminal state drops queued input");
        assert_eq!(state.phase, TurnPhase::GameOver);
        assert_eq!(state.outcome.as_deref(), Some("You win!"));
    }

    #[test]
    fn shot_during_ai_turn_is_dropped() {
        let (mut state, mut world, mut inputs) = setup(7);
        inputs.push_back(InputEvent::CueBallPlaced(Vec2::new(150.0, 200.0)));
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        state.pass_turn();
        state.begin_turn();

        inputs.push_back(InputEvent::ShotCommitted {
            angle: 0.0,
            power: 100.0,
        });
        tick(&mut state, &mut world, &mut inputs, SIM_DT);
        // The human cannot shoot for the AI; the table must still be at rest
        assert!(world.all_settled());
        assert_eq!(state.phase, TurnPhase::Aiming);
    }
}
