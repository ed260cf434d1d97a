use tally_core::{
  courseware::CoursewareElement,
  progress::{Completion, Progress, ProgressDetail, RandomProgress},
};

use super::{ChildUpdate, Step};

/// How many completed walkables end a random pathway.
fn exit_count(exit_after: u32, walkable_count: usize) -> usize {
  match usize::try_from(exit_after) {
    Ok(n) if n > 0 && n <= walkable_count => n,
    _ => walkable_count,
  }
}

/// Random pathways exit once `exit_after` distinct walkables are complete.
/// Until then an incomplete child contributes its partial completion.
pub(super) fn step(
  exit_after: u32,
  walkables: &[CoursewareElement],
  previous: Option<&Progress>,
  update: &ChildUpdate,
) -> Step {
  let mut state = match previous.map(|p| &p.detail) {
    Some(ProgressDetail::Random(state)) => state.clone(),
    _ => RandomProgress::default(),
  };

  // A walkable counted as completed stays counted, and never doubles as the
  // in-progress term.
  let child = update.element.element_id;
  if !state.completed_walkables.contains(&child) {
    if update.completion.is_completed() {
      state.completed_walkables.insert(child);
      if state.in_progress_element_id == Some(child) {
        state.in_progress_element_id = None;
        state.in_progress_completion = None;
      }
    } else {
      state.in_progress_element_id = Some(child);
      state.in_progress_completion = Some(update.completion);
    }
  }

  let n = exit_count(exit_after, walkables.len());
  let done = state.completed_walkables.len();
  let completion = if done >= n {
    Completion::COMPLETE
  } else {
    let partial = state.in_progress_completion.unwrap_or_default();
    Completion::new(
      (done as f64 + partial.value) / n as f64,
      (done as f64 + partial.confidence) / n as f64,
    )
  };

  Step::after(ProgressDetail::Random(state), completion, previous)
}
