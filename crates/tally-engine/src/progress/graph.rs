use uuid::Uuid;

use tally_core::{
  courseware::CoursewareElement,
  progress::{Completion, GraphProgress, Progress, ProgressDetail, ProgressionType},
};

use super::{ChildUpdate, Step};
use crate::{Error, Result};

/// Graph pathways track a single current walkable. A completed child moves
/// the pointer to its `GO_TO` target, or else to the next walkable in
/// authored order; completion is the share of distinct walkables visited.
pub(super) fn step(
  starting_walkable_id: Option<Uuid>,
  walkables: &[CoursewareElement],
  previous: Option<&Progress>,
  update: &ChildUpdate,
) -> Result<Step> {
  let mut state = match previous.map(|p| &p.detail) {
    Some(ProgressDetail::Graph(state)) => state.clone(),
    _ => GraphProgress {
      current_walkable_id: starting_walkable_id
        .or_else(|| walkables.first().map(|w| w.element_id)),
      ..GraphProgress::default()
    },
  };

  let child = update.element.element_id;
  if update.completion.is_completed() {
    state.visited_walkables.insert(child);
    state.current_walkable_id = match update.progression {
      Some(ProgressionType::CompleteAndGoTo { walkable_id }) => {
        if !walkables.iter().any(|w| w.element_id == walkable_id) {
          return Err(Error::InvalidArgument(
            "cannot GO_TO a walkable outside the current pathway".to_owned(),
          ));
        }
        Some(walkable_id)
      }
      _ => next_after(walkables, child),
    };
  } else {
    state.current_walkable_id = Some(child);
  }

  let total = walkables.len().max(1) as f64;
  let share = state.visited_walkables.len() as f64 / total;
  let completion = Completion::new(share, share);

  Ok(Step::after(ProgressDetail::Graph(state), completion, previous))
}

fn next_after(walkables: &[CoursewareElement], id: Uuid) -> Option<Uuid> {
  walkables
    .iter()
    .position(|w| w.element_id == id)
    .and_then(|i| walkables.get(i + 1))
    .map(|w| w.element_id)
}
