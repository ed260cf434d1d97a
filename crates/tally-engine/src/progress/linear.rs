use std::collections::BTreeMap;

use tally_core::{
  courseware::CoursewareElement,
  progress::{Completion, Progress, ProgressDetail},
};

use super::{ChildUpdate, Step, mean};

/// Linear pathways average every configured walkable; unvisited ones count
/// as zero.
pub(super) fn step(
  walkables: &[CoursewareElement],
  previous: Option<&Progress>,
  update: &ChildUpdate,
) -> Step {
  let mut child_completions = match previous.map(|p| &p.detail) {
    Some(ProgressDetail::Linear { child_completions }) => child_completions.clone(),
    _ => BTreeMap::new(),
  };
  child_completions.insert(update.element.element_id, update.completion);

  let of = |w: &CoursewareElement| {
    child_completions.get(&w.element_id).copied().unwrap_or_default()
  };
  let completion = Completion::new(
    mean(walkables.iter().map(|w| of(w).value), walkables.len()),
    mean(walkables.iter().map(|w| of(w).confidence), walkables.len()),
  );

  Step::after(ProgressDetail::Linear { child_completions }, completion, previous)
}
