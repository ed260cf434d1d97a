//! Pathway progress state machines.
//!
//! Every function here is pure: it takes the previous progress of an
//! element (for the same attempt) and one child update, and returns the
//! element's next variant state and completion. Persisting the result and
//! walking further up is the driver's job.

mod bkt;
mod graph;
mod linear;
mod random;
mod walkable;

pub use bkt::{Observation, observe};
pub use walkable::{activity_step, leaf_step};

use tally_core::{
  courseware::{CoursewareElement, DocumentItemRef, PathwayConfig},
  evaluation::Correctness,
  progress::{Completion, Progress, ProgressDetail, ProgressionType},
};

use crate::{Error, Result};

/// A change in one walkable's completion, as seen by its pathway.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildUpdate {
  pub element:     CoursewareElement,
  pub completion:  Completion,
  /// The directive fired for the walkable, when the walkable itself was the
  /// one evaluated. `None` when the change bubbled up from below.
  pub progression: Option<ProgressionType>,
  pub correctness: Correctness,
}

/// A competency value a pathway earned on exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MasteryAward {
  pub item:  DocumentItemRef,
  pub value: f64,
}

/// The outcome of feeding one update to an element's state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
  pub detail:     ProgressDetail,
  pub completion: Completion,
  /// Whether the parent level should be recomputed.
  pub propagate:  bool,
  /// True only on the step that first completes the element.
  pub exited:     bool,
  pub awards:     Vec<MasteryAward>,
}

impl Step {
  fn after(
    detail: ProgressDetail,
    completion: Completion,
    previous: Option<&Progress>,
  ) -> Self {
    let before = previous.map(|p| p.completion);
    Self {
      detail,
      completion,
      propagate: before != Some(completion),
      exited: completion.is_completed()
        && !before.is_some_and(|c| c.is_completed()),
      awards: Vec::new(),
    }
  }
}

/// Recompute a pathway after one of its walkables changed.
///
/// `walkables` is the pathway's configured children in authored order, and
/// must contain the updated child.
pub fn pathway_step(
  config: &PathwayConfig,
  walkables: &[CoursewareElement],
  previous: Option<&Progress>,
  update: &ChildUpdate,
) -> Result<Step> {
  if !walkables.iter().any(|w| w.element_id == update.element.element_id) {
    return Err(Error::Structural(format!(
      "walkable {} is not configured on its pathway",
      update.element.element_id
    )));
  }

  match config {
    PathwayConfig::Linear => Ok(linear::step(walkables, previous, update)),
    PathwayConfig::Random { exit_after } => {
      Ok(random::step(*exit_after, walkables, previous, update))
    }
    PathwayConfig::Graph { starting_walkable_id } => {
      graph::step(*starting_walkable_id, walkables, previous, update)
    }
    PathwayConfig::Bkt(params) => {
      params
        .validate()
        .map_err(|e| Error::InvalidArgument(e.to_string()))?;
      Ok(bkt::step(params, walkables, previous, update))
    }
  }
}

/// Mean of `values` over `count` slots; missing slots count as zero.
fn mean(values: impl Iterator<Item = f64>, count: usize) -> f64 {
  if count == 0 {
    return 0.0;
  }
  values.sum::<f64>() / count as f64
}


#[cfg(test)]
mod tests {
  use tally_core::courseware::BktConfig;

  use super::{fixtures::*, *};

  #[test]
  fn unknown_child_is_structural() {
    let walkables = screens(2);
    let stranger = screens(1)[0];
    let err = pathway_step(&PathwayConfig::Linear, &walkables, None, &completed(stranger))
      .unwrap_err();
    assert!(matches!(err, Error::Structural(_)));
  }

  #[test]
  fn invalid_bkt_parameters_are_rejected() {
    let walkables = screens(2);
    let config = PathwayConfig::Bkt(BktConfig {
      p_l0:              0.5,
      p_guess:           0.2,
      p_slip:            1.5,
      p_transit:         0.3,
      exit_after:        0,
      maintain_for:      1,
      mastery_threshold: 0.95,
      competency:        Vec::new(),
    });

    let err = pathway_step(&config, &walkables, None, &completed(walkables[0])).unwrap_err();
    let Error::InvalidArgument(message) = err else { panic!("expected invalid argument") };
    assert!(message.contains("p_slip"));
  }

  #[test]
  fn unchanged_completion_does_not_propagate() {
    let walkables = screens(2);
    let update = partial(walkables[0], 0.5, 0.5);

    let first = pathway_step(&PathwayConfig::Linear, &walkables, None, &update).unwrap();
    assert!(first.propagate);

    let again =
      pathway_step(&PathwayConfig::Linear, &walkables, Some(&stored(&first)), &update)
        .unwrap();
    assert!(!again.propagate);
    assert!(!again.exited);
  }
}
