//! Monte Carlo estimate of how many hallways a player walks before clearing
//! the building, used to size the variant pool.

use std::collections::BTreeSet;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimatorParams {
    /// Hallways after which the player gives up.
    pub rage_quit_count: u32,
    /// Correct answers in a row needed to clear the building.
    pub level_count: u32,
    /// Chance of answering an unseen hallway correctly.
    pub success_probability: f64,
    /// Chance of answering a hallway seen before correctly.
    pub success_probability_with_memory: f64,
    /// Distinct hallways in the game.
    pub max_hall_number: u32,
    pub iterations: u32,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            rage_quit_count: 1_000,
            level_count: 5,
            success_probability: 0.75,
            success_probability_with_memory: 0.9,
            max_hall_number: 15,
            iterations: 10_000,
        }
    }
}

/// Hallways walked in one playthrough. A wrong answer sends the player back
/// to the top; the count includes the hallway the game ends on.
pub fn walk_until_clear<R: Rng>(rng: &mut R, params: &EstimatorParams) -> u32 {
    let mut level = 0;
    let mut walked = 0;
    while level < params.level_count && walked < params.rage_quit_count {
        if rng.gen::<f64>() < params.success_probability {
            level += 1;
        } else {
            level = 0;
        }
        walked += 1;
    }
    walked + 1
}

/// Same playthrough for a player who remembers every hallway already seen
/// and answers those with `memory_probability`.
pub fn walk_until_clear_with_memory<R: Rng>(
    rng: &mut R,
    params: &EstimatorParams,
    memory_probability: f64,
) -> u32 {
    let mut level = 0;
    let mut walked = 0;
    let mut seen = BTreeSet::new();
    let halls = params.max_hall_number.max(1);
    while level < params.level_count && walked < params.rage_quit_count {
        let draw = rng.gen::<f64>();
        let hall = rng.gen_range(1..=halls);
        let probability = if seen.insert(hall) {
            params.success_probability
        } else {
            memory_probability
        };
        if draw < probability {
            level += 1;
        } else {
            level = 0;
        }
        walked += 1;
    }
    walked + 1
}

/// Expected floor reached in a single attempt: reaching floor `i` takes
/// `i - 1` successes followed by a miss.
pub fn expected_single_attempt_depth(level_count: u32, success_probability: f64) -> f64 {
    (1..=level_count)
        .map(|depth| {
            f64::from(depth)
                * success_probability.powi(depth as i32 - 1)
                * (1.0 - success_probability)
        })
        .sum()
}

#[derive(Debug, Clone, Serialize)]
pub struct EstimateReport {
    pub params: EstimatorParams,
    pub seed: u64,
    pub single_attempt_depth: f64,
    pub mean_hallways: f64,
    pub mean_hallways_perfect_memory: f64,
    pub mean_hallways_with_memory: f64,
}

fn mean<F>(iterations: u32, mut sample: F) -> f64
where
    F: FnMut() -> u32,
{
    let iterations = iterations.max(1);
    let total: u64 = (0..iterations).map(|_| u64::from(sample())).sum();
    total as f64 / f64::from(iterations)
}

pub fn estimate(params: EstimatorParams, seed: u64) -> EstimateReport {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mean_hallways = mean(params.iterations, || walk_until_clear(&mut rng, &params));
    let mean_hallways_perfect_memory = mean(params.iterations, || {
        walk_until_clear_with_memory(&mut rng, &params, 1.0)
    });
    let mean_hallways_with_memory = mean(params.iterations, || {
        walk_until_clear_with_memory(&mut rng, &params, params.success_probability_with_memory)
    });
    EstimateReport {
        params,
        seed,
        single_attempt_depth: expected_single_attempt_depth(
            params.level_count,
            params.success_probability,
        ),
        mean_hallways,
        mean_hallways_perfect_memory,
        mean_hallways_with_memory,
    }
}
