//! AI shot selection
//!
//! Scores every (ball, pocket) pair the AI could plausibly play and strikes
//! the cue at the winner. The noise term is drawn from the match RNG so a
//! seeded game replays the same "mistakes".

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use crate::consts::*;
use crate::physics::{BallId, Pocket};
use crate::sim::state::{BallGroup, Difficulty};
use crate::{cut_angle, unit_from_angle};

/// A chosen (ball, pocket) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotPick {
    pub ball: BallId,
    pub ball_pos: Vec2,
    pub pocket: usize,
    pub score: f32,
}

/// Deterministic desirability of cutting `ball` into `pocket` from `cue`.
///
/// Shorter cue travel, shorter object-ball travel and a straighter cut all
/// score higher.
pub fn shot_score(cue: Vec2, ball: Vec2, pocket: Vec2) -> f32 {
    let cue_to_ball = ball - cue;
    let ball_to_pocket = pocket - ball;
    1000.0
        - 2.0 * cue_to_ball.length()
        - 3.0 * ball_to_pocket.length()
        - 100.0 * cut_angle(cue_to_ball, ball_to_pocket)
}

/// The balls the AI may aim at: its own group while any remain, otherwise
/// the eight ball (covers both "not yet assigned" and "group cleared")
pub fn candidate_balls(
    live: &[(BallId, Vec2)],
    group: Option<BallGroup>,
) -> Vec<(BallId, Vec2)> {
    let own: Vec<(BallId, Vec2)> = match group {
        Some(g) => live.iter().copied().filter(|(id, _)| g.contains(*id)).collect(),
        None => Vec::new(),
    };
    if !own.is_empty() {
        return own;
    }
    live.iter().copied().filter(|(id, _)| id.is_eight()).collect()
}

/// Pick the best-scoring pair, difficulty noise included. Candidates are
/// visited in ball order, pockets in table order; the first pair seen wins
/// ties. `None` when there is nothing to aim at.
pub fn choose_shot(
    cue: Vec2,
    candidates: &[(BallId, Vec2)],
    pockets: &[Pocket],
    difficulty: Difficulty,
    rng: &mut Pcg32,
) -> Option<ShotPick> {
    let mut best: Option<ShotPick> = None;
    for &(ball, ball_pos) in candidates {
        for (index, pocket) in pockets.iter().enumerate() {
            let noise = rng.random_range(0.0..difficulty.noise_span());
            let score = shot_score(cue, ball_pos, pocket.pos) + noise;
            if best.map(|b| score > b.score).unwrap_or(true) {
                best = Some(ShotPick {
                    ball,
                    ball_pos,
                    pocket: index,
                    score,
                });
            }
        }
    }
    best
}

/// Velocity change for the cue ball aimed at `target`.
///
/// The direction points from the target ball back through the cue ball. This
/// is the simplified aim model: pocket choice lives in the scoring, not in
/// the impulse vector.
pub fn cue_impulse_for(cue: Vec2, target: Vec2, force: f32) -> Vec2 {
    -(target - cue).normalize_or_zero() * force * SHOT_SPEED
}

/// Fallback when no candidate exists: a shot in a uniform random direction
/// at easy force. Recovery, not a failure.
pub fn random_impulse(rng: &mut Pcg32) -> Vec2 {
    let angle = rng.random_range(0.0..std::f32::consts::TAU);
    unit_from_angle(angle) * 0.3 * SHOT_SPEED
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn pockets() -> Vec<Pocket> {
        [
            Vec2::new(40.0, 20.0),
            Vec2::new(760.0, 20.0),
            Vec2::new(400.0, 20.0),
            Vec2::new(40.0, 380.0),
            Vec2::new(760.0, 380.0),
            Vec2::new(400.0, 380.0),
        ]
        .into_iter()
        .map(|pos| Pocket { pos, radius: 30.0 })
        .collect()
    }

    #[test]
    fn straight_short_shot_beats_long_cut() {
        // Dead-straight and close
        let near = shot_score(
            Vec2::new(100.0, 200.0),
            Vec2::new(200.0, 200.0),
            Vec2::new(300.0, 200.0),
        );
        // Same pocket but a long, angled attempt
        let far = shot_score(
            Vec2::new(100.0, 350.0),
            Vec2::new(600.0, 100.0),
            Vec2::new(300.0, 200.0),
        );
        assert!(near > far);
    }

    #[test]
    fn choose_shot_is_deterministic_for_a_seed() {
        let candidates = vec![
            (BallId::Ball(2), Vec2::new(500.0, 180.0)),
            (BallId::Ball(5), Vec2::new(320.0, 260.0)),
            (BallId::Ball(7), Vec2::new(640.0, 90.0)),
        ];
        let cue = Vec2::new(180.0, 200.0);
        let mut rng_a = Pcg32::seed_from_u64(1234);
        let mut rng_b = Pcg32::seed_from_u64(1234);
        let a = choose_shot(cue, &candidates, &pockets(), Difficulty::Easy, &mut rng_a);
        let b = choose_shot(cue, &candidates, &pockets(), Difficulty::Easy, &mut rng_b);
        assert_eq!(a, b);
        assert!(a.is_some());
    }

    #[test]
    fn empty_candidates_yield_none() {
        let mut rng = Pcg32::seed_from_u64(5);
        let pick = choose_shot(
            Vec2::new(100.0, 100.0),
            &[],
            &pockets(),
            Difficulty::Hard,
            &mut rng,
        );
        assert!(pick.is_none());
    }

    #[test]
    fn candidates_fall_back_to_the_eight_ball() {
        let live = vec![
            (BallId::Ball(8), Vec2::new(600.0, 200.0)),
            (BallId::Ball(12), Vec2::new(300.0, 100.0)),
        ];
        // Unassigned: only the eight qualifies
        let unassigned = candidate_balls(&live, None);
        assert_eq!(unassigned, vec![(BallId::Ball(8), Vec2::new(600.0, 200.0))]);
        // Assigned with the group cleared off the table: eight again
        let cleared = candidate_balls(&live, Some(BallGroup::Solid));
        assert_eq!(cleared.len(), 1);
        assert!(cleared[0].0.is_eight());
        // Assigned with a group ball present: aim at the group
        let stripes = candidate_balls(&live, Some(BallGroup::Stripe));
        assert_eq!(stripes, vec![(BallId::Ball(12), Vec2::new(300.0, 100.0))]);
    }

    #[test]
    fn impulse_pulls_away_from_the_target() {
        let cue = Vec2::new(200.0, 200.0);
        let target = Vec2::new(500.0, 200.0);
        let impulse = cue_impulse_for(cue, target, 0.5);
        assert!(impulse.x < 0.0, "impulse points back through the cue");
        assert!((impulse.length() - 0.5 * SHOT_SPEED).abs() < 0.01);
    }

    #[test]
    fn degenerate_aim_is_a_zero_impulse() {
        let pos = Vec2::new(100.0, 100.0);
        assert_eq!(cue_impulse_for(pos, pos, 0.5), Vec2::ZERO);
    }

    #[test]
    fn random_impulse_has_fixed_force() {
        let mut rng = Pcg32::seed_from_u64(9);
        for _ in 0..16 {
            let v = random_impulse(&mut rng);
            assert!((v.length() - 0.3 * SHOT_SPEED).abs() < 0.01);
        }
    }

    proptest! {
        /// Pulling the cue straight back along the aim line only drops the score
        #[test]
        fn score_decreases_with_cue_distance(
            theta in 0.0f32..std::f32::consts::TAU,
            d_near in 30.0f32..200.0,
            extra in 5.0f32..300.0,
        ) {
            let ball = Vec2::new(500.0, 250.0);
            let pocket = Vec2::new(780.0, 250.0);
            let dir = unit_from_angle(theta);
            let near = shot_score(ball - dir * d_near, ball, pocket);
            let far = shot_score(ball - dir * (d_near + extra), ball, pocket);
            prop_assert!(near > far);
        }

        /// Moving the pocket farther along the same line only drops the score
        #[test]
        fn score_decreases_with_pocket_distance(
            d_near in 30.0f32..200.0,
            extra in 5.0f32..300.0,
        ) {
            let cue = Vec2::new(100.0, 250.0);
            let ball = Vec2::new(400.0, 250.0);
            let dir = Vec2::new(1.0, 0.0);
            let near = shot_score(cue, ball, ball + dir * d_near);
            let far = shot_score(cue, ball, ball + dir * (d_near + extra));
            prop_assert!(near > far);
        }

        /// A wider cut angle at equal distances only drops the score
        #[test]
        fn score_decreases_with_cut_angle(
            a_small in 0.0f32..1.0,
            widen in 0.05f32..1.5,
        ) {
            let cue = Vec2::new(100.0, 250.0);
            let ball = Vec2::new(400.0, 250.0);
            let reach = 150.0;
            let straight = shot_score(cue, ball, ball + unit_from_angle(a_small) * reach);
            let cut = shot_score(cue, ball, ball + unit_from_angle(a_small + widen) * reach);
            prop_assert!(straight > cut);
        }
    }
}
