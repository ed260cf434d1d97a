//! Attempt resolution.
//!
//! An attempt at an element is only valid while its `parent_id` points at
//! the latest attempt of the parent element. Resolving therefore walks the
//! courseware ancestry root first, reusing each level's latest attempt when
//! it still hangs off the parent's resolved attempt and creating a fresh one
//! (value 1) when it does not.

use tally_core::{
  attempt::{Attempt, NewAttempt},
  courseware::{CoursewareElement, CoursewareElementType, PathwayType},
  store::{CoursewareGraph, LearnerStore},
};
use uuid::Uuid;

use crate::{Error, Result, ancestry::find_ancestry};

/// Graph and BKT pathways let a student freely re-enter a screen they
/// already completed; re-entry starts a new attempt at that interactive.
/// Activity walkables keep their attempt, since it anchors the whole subtree
/// below them; only an explicit `Repeat` replaces it.
fn resets_completed_children(pathway_type: PathwayType) -> bool {
  matches!(pathway_type, PathwayType::Graph | PathwayType::Bkt)
}

pub(crate) fn require_id(name: &str, id: Uuid) -> Result<()> {
  if id.is_nil() {
    return Err(Error::InvalidArgument(format!("{name} is required")));
  }
  Ok(())
}

pub struct AttemptResolver<'a, S> {
  store:     &'a S,
  max_depth: usize,
}

impl<'a, S> AttemptResolver<'a, S>
where
  S: LearnerStore + CoursewareGraph,
{
  pub fn new(store: &'a S, max_depth: usize) -> Self { Self { store, max_depth } }

  /// The attempt a student is currently on at an element, creating any
  /// missing or stale attempts along the ancestry.
  pub async fn acquire_latest_attempt(
    &self,
    deployment_id: Uuid,
    element_id: Uuid,
    element_type: CoursewareElementType,
    student_id: Uuid,
  ) -> Result<Attempt> {
    require_id("deployment_id", deployment_id)?;
    require_id("element_id", element_id)?;
    require_id("student_id", student_id)?;
    if !element_type.has_attempts() {
      return Err(Error::InvalidArgument(format!(
        "{element_type} elements do not carry attempts"
      )));
    }

    let element = CoursewareElement::new(element_id, element_type);
    let mut chain =
      find_ancestry(self.store, deployment_id, element, self.max_depth).await?;
    chain.reverse();
    chain.push(element);

    let mut parent: Option<(CoursewareElement, Attempt)> = None;
    for level in chain {
      let attempt = self
        .resolve_level(deployment_id, student_id, level, parent.as_ref())
        .await?;
      parent = Some((level, attempt));
    }

    // The chain always ends with `element` itself.
    parent
      .map(|(_, attempt)| attempt)
      .ok_or_else(|| Error::Structural("empty attempt chain".to_owned()))
  }

  async fn resolve_level(
    &self,
    deployment_id: Uuid,
    student_id: Uuid,
    element: CoursewareElement,
    parent: Option<&(CoursewareElement, Attempt)>,
  ) -> Result<Attempt> {
    let parent_attempt_id = parent.map(|(_, a)| a.id);
    let latest = self
      .store
      .find_latest_attempt(deployment_id, element.element_id, student_id)
      .await
      .map_err(Error::store)?;

    let Some(latest) = latest.filter(|a| a.parent_id == parent_attempt_id) else {
      return self
        .create(NewAttempt {
          deployment_id,
          student_id,
          courseware_element_id: element.element_id,
          courseware_element_type: element.element_type,
          parent_id: parent_attempt_id,
          value: 1,
        })
        .await;
    };

    match parent {
      Some((pathway, _))
        if pathway.element_type == CoursewareElementType::Pathway
          && element.element_type == CoursewareElementType::Interactive =>
      {
        self
          .apply_pathway_policy(deployment_id, pathway.element_id, latest)
          .await
      }
      _ => Ok(latest),
    }
  }

  /// Decide whether an interactive keeps its attempt under its pathway.
  async fn apply_pathway_policy(
    &self,
    deployment_id: Uuid,
    pathway_id: Uuid,
    latest: Attempt,
  ) -> Result<Attempt> {
    let pathway = self
      .store
      .find_pathway(pathway_id, deployment_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::Structural(format!("pathway {pathway_id} has no configuration"))
      })?;
    if !resets_completed_children(pathway.pathway_type()) {
      return Ok(latest);
    }

    let progress = self
      .store
      .find_latest_progress_for_attempt(
        deployment_id,
        latest.courseware_element_id,
        latest.id,
      )
      .await
      .map_err(Error::store)?;
    match progress {
      Some(p) if p.completion.is_completed() => self.repeat_attempt(&latest).await,
      _ => Ok(latest),
    }
  }

  /// Start the next try at the same element under the same parent attempt.
  pub async fn repeat_attempt(&self, attempt: &Attempt) -> Result<Attempt> {
    self.create(NewAttempt::repeat_of(attempt)).await
  }

  /// Read-only lookup; never creates an attempt.
  pub async fn find_latest_attempt(
    &self,
    deployment_id: Uuid,
    element_id: Uuid,
    student_id: Uuid,
  ) -> Result<Option<Attempt>> {
    self
      .store
      .find_latest_attempt(deployment_id, element_id, student_id)
      .await
      .map_err(Error::store)
  }

  async fn create(&self, input: NewAttempt) -> Result<Attempt> {
    let attempt = self
      .store
      .record_attempt(input)
      .await
      .map_err(Error::store)?;
    tracing::info!(
      element_id = %attempt.courseware_element_id,
      student_id = %attempt.student_id,
      value = attempt.value,
      "created attempt"
    );
    Ok(attempt)
  }
}

#[cfg(test)]
mod tests {
  use tally_core::{
    courseware::{LearnerPathway, PathwayConfig},
    progress::{Completion, NewProgress, ProgressDetail, ProgressionType},
  };

  use super::*;
  use crate::testing::{Course, store};

  async fn complete(s: &tally_store_sqlite::SqliteStore, attempt: &Attempt) {
    s.record_progress(NewProgress {
      deployment_id:           attempt.deployment_id,
      change_id:               Uuid::new_v4(),
      courseware_element_id:   attempt.courseware_element_id,
      courseware_element_type: attempt.courseware_element_type,
      student_id:              attempt.student_id,
      attempt_id:              attempt.id,
      evaluation_id:           Uuid::new_v4(),
      completion:              Completion::COMPLETE,
      detail:                  ProgressDetail::Interactive {
        progression: ProgressionType::Complete,
      },
    })
    .await
    .unwrap();
  }

  #[tokio::test]
  async fn acquiring_creates_the_whole_chain() {
    let s = store().await;
    let course = Course::nested(&s).await;
    let resolver = AttemptResolver::new(&s, 64);
    let dep = course.deployment.deployment_id;

    let attempt = resolver
      .acquire_latest_attempt(
        dep,
        course.inner_screen,
        CoursewareElementType::Interactive,
        course.student,
      )
      .await
      .unwrap();
    assert_eq!(attempt.value, 1);

    // Follow parent ids up and check they mirror the courseware ancestry.
    let mut expected = vec![
      course.inner_pathway,
      course.lesson,
      course.pathway,
      course.root,
    ]
    .into_iter();
    let mut current = attempt;
    while let Some(parent_id) = current.parent_id {
      let parent = s.get_attempt(parent_id).await.unwrap().unwrap();
      assert_eq!(Some(parent.courseware_element_id), expected.next());
      current = parent;
    }
    assert_eq!(expected.next(), None);
    assert_eq!(current.courseware_element_id, course.root);
  }

  #[tokio::test]
  async fn acquiring_twice_reuses_the_attempt() {
    let s = store().await;
    let course = Course::linear(&s, 2).await;
    let resolver = AttemptResolver::new(&s, 64);
    let dep = course.deployment.deployment_id;
    let screen = course.screens[0];

    let first = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    let second = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    assert_eq!(first.id, second.id);
  }

  #[tokio::test]
  async fn stale_child_attempt_is_replaced_after_parent_repeat() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let resolver = AttemptResolver::new(&s, 64);
    let dep = course.deployment.deployment_id;
    let screen = course.screens[0];

    let before = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    let pathway_attempt = s.get_attempt(before.parent_id.unwrap()).await.unwrap().unwrap();
    let repeated = resolver.repeat_attempt(&pathway_attempt).await.unwrap();
    assert_eq!(repeated.value, 2);

    let after = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    assert_ne!(after.id, before.id);
    assert_eq!(after.parent_id, Some(repeated.id));
    assert_eq!(after.value, 1);
  }

  #[tokio::test]
  async fn linear_keeps_completed_child_attempt() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let resolver = AttemptResolver::new(&s, 64);
    let dep = course.deployment.deployment_id;
    let screen = course.screens[0];

    let first = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    complete(&s, &first).await;

    let again = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    assert_eq!(again.id, first.id);
  }

  #[tokio::test]
  async fn graph_resets_completed_child_attempt() {
    let s = store().await;
    let course =
      Course::with_pathway(&s, PathwayConfig::Graph { starting_walkable_id: None }, 2)
        .await;
    let resolver = AttemptResolver::new(&s, 64);
    let dep = course.deployment.deployment_id;
    let screen = course.screens[0];

    let first = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    complete(&s, &first).await;

    let again = resolver
      .acquire_latest_attempt(dep, screen, CoursewareElementType::Interactive, course.student)
      .await
      .unwrap();
    assert_ne!(again.id, first.id);
    assert_eq!(again.value, 2);
    assert_eq!(again.parent_id, first.parent_id);
  }

  #[tokio::test]
  async fn graph_keeps_completed_activity_attempt() {
    let s = store().await;
    let course =
      Course::with_pathway(&s, PathwayConfig::Graph { starting_walkable_id: None }, 1)
        .await;
    let dep = course.deployment.deployment_id;
    let (lesson, inner_pathway, inner_screen) =
      (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    s.insert_activity(dep, lesson, Some(course.pathway)).await.unwrap();
    s.insert_pathway(
      dep,
      &LearnerPathway { pathway_id: inner_pathway, config: PathwayConfig::Linear },
      lesson,
    )
    .await
    .unwrap();
    s.insert_interactive(dep, inner_screen, inner_pathway).await.unwrap();
    let resolver = AttemptResolver::new(&s, 64);

    let first = resolver
      .acquire_latest_attempt(dep, lesson, CoursewareElementType::Activity, course.student)
      .await
      .unwrap();
    complete(&s, &first).await;

    let again = resolver
      .acquire_latest_attempt(dep, lesson, CoursewareElementType::Activity, course.student)
      .await
      .unwrap();
    assert_eq!(again.id, first.id);

    let screen = resolver
      .acquire_latest_attempt(
        dep,
        inner_screen,
        CoursewareElementType::Interactive,
        course.student,
      )
      .await
      .unwrap();
    let inner = s.get_attempt(screen.parent_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(inner.parent_id, Some(first.id));
  }

  #[tokio::test]
  async fn unsupported_type_and_nil_ids_are_rejected() {
    let s = store().await;
    let resolver = AttemptResolver::new(&s, 64);

    let err = resolver
      .acquire_latest_attempt(
        Uuid::new_v4(),
        Uuid::new_v4(),
        CoursewareElementType::Component,
        Uuid::new_v4(),
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = resolver
      .acquire_latest_attempt(
        Uuid::nil(),
        Uuid::new_v4(),
        CoursewareElementType::Interactive,
        Uuid::new_v4(),
      )
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(ref m) if m.contains("deployment_id")));
  }

  #[tokio::test]
  async fn find_never_creates() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let resolver = AttemptResolver::new(&s, 64);

    let found = resolver
      .find_latest_attempt(course.deployment.deployment_id, course.screens[0], course.student)
      .await
      .unwrap();
    assert!(found.is_none());
  }
}
