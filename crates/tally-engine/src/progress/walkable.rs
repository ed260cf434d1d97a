//! Progress of walkables: interactives and activities.

use std::collections::BTreeMap;

use tally_core::{
  courseware::CoursewareElementType,
  progress::{Completion, Progress, ProgressDetail, ProgressionType},
};
use uuid::Uuid;

use super::{Step, mean};

/// Apply a progression fired by the walkable's own scenario.
///
/// A completing directive marks the walkable complete. `Repeat` resets it
/// to zero and halves the previous confidence. The result always
/// propagates, so the enclosing pathway sees every evaluation.
pub fn leaf_step(
  element_type: CoursewareElementType,
  progression: ProgressionType,
  previous: Option<&Progress>,
) -> Step {
  let completion = if progression.is_completing() {
    Completion::COMPLETE
  } else {
    let confidence = previous.map_or(1.0, |p| p.completion.confidence);
    Completion::new(0.0, confidence / 2.0)
  };

  let detail = match element_type {
    CoursewareElementType::Activity => ProgressDetail::Activity {
      progression:               Some(progression),
      child_pathway_completions: pathway_completions(previous),
    },
    _ => ProgressDetail::Interactive { progression },
  };

  Step { propagate: true, ..Step::after(detail, completion, previous) }
}

/// Recompute an activity after one of its pathways changed.
///
/// Completion is the mean over the activity's configured pathways, unless
/// the activity's own scenario already completed it.
pub fn activity_step(
  child_pathway_ids: &[Uuid],
  previous: Option<&Progress>,
  pathway_id: Uuid,
  pathway_completion: Completion,
) -> Step {
  let mut completions = pathway_completions(previous);
  completions.insert(pathway_id, pathway_completion);

  let own = match previous.map(|p| &p.detail) {
    Some(ProgressDetail::Activity { progression, .. }) => *progression,
    _ => None,
  };

  let completion = if own.is_some_and(ProgressionType::is_completing) {
    Completion::COMPLETE
  } else if child_pathway_ids.is_empty() {
    pathway_completion
  } else {
    let of = |id: &Uuid| completions.get(id).copied().unwrap_or_default();
    let n = child_pathway_ids.len();
    Completion::new(
      mean(child_pathway_ids.iter().map(|id| of(id).value), n),
      mean(child_pathway_ids.iter().map(|id| of(id).confidence), n),
    )
  };

  let detail = ProgressDetail::Activity {
    progression:               own,
    child_pathway_completions: completions,
  };
  Step::after(detail, completion, previous)
}

fn pathway_completions(previous: Option<&Progress>) -> BTreeMap<Uuid, Completion> {
  match previous.map(|p| &p.detail) {
    Some(ProgressDetail::Activity { child_pathway_completions, .. }) => {
      child_pathway_completions.clone()
    }
    _ => BTreeMap::new(),
  }
}
