//! Bayesian Knowledge Tracing pathways.
//!
//! Each child update is one observation of the student's answer. The
//! posterior probability that the skill is learned is updated from the
//! observation, then advanced by the learning transition. The pathway exits
//! once the student holds mastery for `maintain_for` observations in a row,
//! completes every walkable, or runs out of observations. An exited pathway
//! stays complete for the rest of the attempt; later observations still
//! update the posterior but never award again.

use tally_core::{
  clamp_unit,
  courseware::{BktConfig, CoursewareElement},
  progress::{BktProgress, Completion, Progress, ProgressDetail},
};

use super::{ChildUpdate, MasteryAward, Step, mean};

/// The probabilities after one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
  /// Posterior given the observation, before learning.
  pub p_ln_given_obs: f64,
  pub p_ln:           f64,
  pub p_correct:      f64,
}

/// Fold one observation into the prior `p`.
pub fn observe(p: f64, correct: bool, config: &BktConfig) -> Observation {
  let (slip, guess) = (config.p_slip, config.p_guess);
  let (numerator, denominator) = if correct {
    let hit = p * (1.0 - slip);
    (hit, hit + (1.0 - p) * guess)
  } else {
    let miss = p * slip;
    (miss, miss + (1.0 - p) * (1.0 - guess))
  };
  let p_ln_given_obs = if denominator == 0.0 { p } else { numerator / denominator };

  let p_ln = p_ln_given_obs + (1.0 - p_ln_given_obs) * config.p_transit;
  let p_correct = p_ln * (1.0 - slip) + (1.0 - p_ln) * guess;
  Observation { p_ln_given_obs, p_ln, p_correct }
}

pub(super) fn step(
  config: &BktConfig,
  walkables: &[CoursewareElement],
  previous: Option<&Progress>,
  update: &ChildUpdate,
) -> Step {
  let mut state = match previous.map(|p| &p.detail) {
    Some(ProgressDetail::Bkt(state)) => state.clone(),
    _ => BktProgress::default(),
  };
  let already_exited = previous.is_some_and(|p| p.completion.is_completed());

  let prior = if state.observations == 0 { config.p_l0 } else { state.p_ln };
  let obs = observe(prior, update.correctness.is_correct(), config);
  state.p_ln_minus_given_actual = obs.p_ln_given_obs;
  state.p_ln = obs.p_ln;
  state.p_correct = obs.p_correct;
  state.observations += 1;
  state.mastered_streak = if obs.p_ln >= config.mastery_threshold {
    state.mastered_streak + 1
  } else {
    0
  };

  let child = update.element.element_id;
  state
    .child_walkable_completion_values
    .insert(child, update.completion.value);
  state
    .child_walkable_completion_confidences
    .insert(child, update.completion.confidence);
  if update.completion.is_completed() {
    state.completed_walkables.insert(child);
    state.in_progress_element_id = None;
  } else {
    state.in_progress_element_id = Some(child);
  }

  let all_completed = walkables
    .iter()
    .all(|w| state.completed_walkables.contains(&w.element_id));
  let mastered = state.mastered_streak >= config.maintain_for.max(1);
  let out_of_observations =
    config.exit_after > 0 && state.observations >= config.exit_after;

  let completion = if already_exited || mastered || all_completed || out_of_observations {
    Completion::COMPLETE
  } else {
    let n = walkables.len();
    let completed_share = walkables
      .iter()
      .filter(|w| state.completed_walkables.contains(&w.element_id))
      .count() as f64
      / n.max(1) as f64;
    let confidence = mean(
      walkables.iter().map(|w| {
        state
          .child_walkable_completion_confidences
          .get(&w.element_id)
          .copied()
          .unwrap_or(0.0)
      }),
      n,
    );
    Completion::new(completed_share, confidence)
  };

  let p_correct = state.p_correct;
  let mut step = Step::after(ProgressDetail::Bkt(state), completion, previous);
  if step.exited {
    step.awards = config
      .competency
      .iter()
      .map(|&item| MasteryAward { item, value: clamp_unit(p_correct) })
      .collect();
  }
  step
}
