//! Upward walks over the courseware tree.
//!
//! The tree alternates walkables and pathways:
//! interactive → pathway → activity → pathway → … → root activity.
//! Walks are iterative and bounded; a revisited element is reported as a
//! cycle rather than looping.

use std::collections::HashSet;

use tally_core::{
  courseware::{CoursewareElement, CoursewareElementType},
  store::CoursewareGraph,
};
use uuid::Uuid;

use crate::{Error, Result};

/// The parent of `element`, or `None` when `element` is the root activity.
///
/// Only activities may lack a parent; an interactive or pathway without one
/// is a structural error.
pub async fn parent_of<G: CoursewareGraph>(
  graph: &G,
  deployment_id: Uuid,
  element: CoursewareElement,
) -> Result<Option<CoursewareElement>> {
  let id = element.element_id;
  match element.element_type {
    CoursewareElementType::Activity => Ok(
      graph
        .find_parent_pathway_id(id, deployment_id)
        .await
        .map_err(Error::store)?
        .map(CoursewareElement::pathway),
    ),
    CoursewareElementType::Interactive => graph
      .find_parent_pathway_id(id, deployment_id)
      .await
      .map_err(Error::store)?
      .map(|p| Some(CoursewareElement::pathway(p)))
      .ok_or_else(|| {
        Error::Structural(format!(
          "Unable to find attempt: interactive {id} has no parent pathway"
        ))
      }),
    CoursewareElementType::Pathway => graph
      .find_parent_activity_id(id, deployment_id)
      .await
      .map_err(Error::store)?
      .map(|a| Some(CoursewareElement::activity(a)))
      .ok_or_else(|| {
        Error::Structural(format!(
          "Unable to find attempt: pathway {id} has no parent activity"
        ))
      }),
    other => Err(Error::InvalidArgument(format!(
      "{other} elements are not part of the attempt tree"
    ))),
  }
}

/// Every ancestor of `element`, nearest first, ending at the root activity.
pub async fn find_ancestry<G: CoursewareGraph>(
  graph: &G,
  deployment_id: Uuid,
  element: CoursewareElement,
  max_depth: usize,
) -> Result<Vec<CoursewareElement>> {
  let mut visited = HashSet::from([element.element_id]);
  let mut ancestry = Vec::new();
  let mut current = element;

  while let Some(parent) = parent_of(graph, deployment_id, current).await? {
    if !visited.insert(parent.element_id) {
      return Err(Error::CyclicStructure {
        kind: "courseware element",
        id:   parent.element_id,
      });
    }
    if ancestry.len() >= max_depth {
      return Err(Error::TooDeep {
        kind: "courseware",
        id: element.element_id,
        max_depth,
      });
    }
    ancestry.push(parent);
    current = parent;
  }

  Ok(ancestry)
}

#[cfg(test)]
mod tests {
  use tally_core::courseware::{LearnerPathway, PathwayConfig};

  use super::*;
  use crate::testing::{Course, store};

  #[tokio::test]
  async fn ancestry_runs_nearest_first_to_root() {
    let s = store().await;
    let course = Course::nested(&s).await;

    let ancestry = find_ancestry(
      &s,
      course.deployment.deployment_id,
      CoursewareElement::interactive(course.inner_screen),
      64,
    )
    .await
    .unwrap();

    assert_eq!(
      ancestry,
      vec![
        CoursewareElement::pathway(course.inner_pathway),
        CoursewareElement::activity(course.lesson),
        CoursewareElement::pathway(course.pathway),
        CoursewareElement::activity(course.root),
      ]
    );
  }

  #[tokio::test]
  async fn root_activity_has_no_ancestry() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;

    let ancestry = find_ancestry(
      &s,
      course.deployment.deployment_id,
      CoursewareElement::activity(course.root),
      64,
    )
    .await
    .unwrap();
    assert!(ancestry.is_empty());
  }

  #[tokio::test]
  async fn orphan_interactive_is_structural() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;

    let err = find_ancestry(
      &s,
      course.deployment.deployment_id,
      CoursewareElement::interactive(Uuid::new_v4()),
      64,
    )
    .await
    .unwrap_err();
    assert!(
      matches!(err, Error::Structural(ref m) if m.starts_with("Unable to find attempt"))
    );
  }

  #[tokio::test]
  async fn cyclic_ancestry_is_reported() {
    let s = store().await;
    let deployment = Uuid::new_v4();
    let (activity, pathway) = (Uuid::new_v4(), Uuid::new_v4());

    // The activity sits inside the pathway that it also owns.
    s.insert_activity(deployment, activity, Some(pathway)).await.unwrap();
    s.insert_pathway(
      deployment,
      &LearnerPathway { pathway_id: pathway, config: PathwayConfig::Linear },
      activity,
    )
    .await
    .unwrap();

    let err = find_ancestry(&s, deployment, CoursewareElement::activity(activity), 64)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::CyclicStructure { id, .. } if id == activity));
  }

  #[tokio::test]
  async fn depth_cap_is_enforced() {
    let s = store().await;
    let course = Course::nested(&s).await;

    let err = find_ancestry(
      &s,
      course.deployment.deployment_id,
      CoursewareElement::interactive(course.inner_screen),
      2,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::TooDeep { max_depth: 2, .. }));
  }
}
