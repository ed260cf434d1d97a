//! Score entries and score derivation.

use tally_core::{
  attempt::Attempt,
  courseware::CoursewareElement,
  evaluation::{ChangeScoreAction, EvaluationContext},
  score::{MutationOperator, NewScoreEntry, Score, StudentScoreEntry, fold_adjustments},
  store::{CoursewareGraph, LearnerStore},
};
use uuid::Uuid;

use crate::{Error, Result, attempt::AttemptResolver};

/// Reject a `SET` to a negative value before anything is persisted.
pub fn validate_action(action: &ChangeScoreAction) -> Result<()> {
  if action.operator == MutationOperator::Set && action.value < 0.0 {
    return Err(Error::NegativeSetValue(action.value));
  }
  Ok(())
}

pub struct ScoreAggregator<'a, S> {
  store:     &'a S,
  max_depth: usize,
}

impl<'a, S> ScoreAggregator<'a, S>
where
  S: LearnerStore + CoursewareGraph,
{
  pub fn new(store: &'a S, max_depth: usize) -> Self { Self { store, max_depth } }

  /// Persist the entry for `action` against `attempt`, which must be the
  /// action element's current attempt.
  ///
  /// The adjustment is the signed change the action makes to the running
  /// score: `+value` for ADD, `-value` for REMOVE, and the difference to the
  /// current score for SET.
  pub async fn create(
    &self,
    action: &ChangeScoreAction,
    ctx: &EvaluationContext,
    attempt: &Attempt,
    scenario_id: Option<Uuid>,
  ) -> Result<StudentScoreEntry> {
    validate_action(action)?;

    let adjustment_value = match action.operator {
      MutationOperator::Add => action.value,
      MutationOperator::Remove => -action.value,
      MutationOperator::Set => {
        let current = self
          .fold_for_attempt(
            ctx.deployment.deployment_id,
            ctx.student_id,
            action.element.element_id,
            attempt.id,
          )
          .await?;
        action.value - current
      }
    };

    let entry = self
      .store
      .record_score_entry(NewScoreEntry {
        deployment_id: ctx.deployment.deployment_id,
        change_id: ctx.deployment.change_id,
        cohort_id: ctx.deployment.cohort_id,
        student_id: ctx.student_id,
        attempt_id: attempt.id,
        element_id: action.element.element_id,
        element_type: action.element.element_type,
        operator: action.operator,
        value: action.value,
        adjustment_value,
        source_element_id: ctx.element.element_id,
        source_scenario_id: scenario_id,
        source_account_id: ctx.student_id,
        evaluation_id: ctx.evaluation_id,
      })
      .await
      .map_err(Error::store)?;

    tracing::debug!(
      element_id = %entry.element_id,
      operator = %entry.operator,
      adjustment = entry.adjustment_value,
      "recorded score entry"
    );
    Ok(entry)
  }

  /// Copy `entry` onto every ancestor's current attempt, nearest first.
  pub async fn roll_up_score_entries(
    &self,
    entry: &StudentScoreEntry,
    ancestry: &[CoursewareElement],
  ) -> Result<Vec<StudentScoreEntry>> {
    let resolver = AttemptResolver::new(self.store, self.max_depth);
    let mut rolled = Vec::with_capacity(ancestry.len());

    for ancestor in ancestry {
      let attempt = resolver
        .acquire_latest_attempt(
          entry.deployment_id,
          ancestor.element_id,
          ancestor.element_type,
          entry.student_id,
        )
        .await?;
      let copy = self
        .store
        .record_score_entry(NewScoreEntry {
          attempt_id: attempt.id,
          element_id: ancestor.element_id,
          element_type: ancestor.element_type,
          ..new_entry_from(entry)
        })
        .await
        .map_err(Error::store)?;
      rolled.push(copy);
    }

    Ok(rolled)
  }

  /// The student's score for an element. Without an explicit attempt the
  /// latest attempt is used. An attempt that does not exist, or belongs to
  /// another student or element, scores as not attempted.
  pub async fn compute_score(
    &self,
    deployment_id: Uuid,
    student_id: Uuid,
    element_id: Uuid,
    attempt_id: Option<Uuid>,
  ) -> Result<Score> {
    let attempt = match attempt_id {
      Some(id) => self
        .store
        .get_attempt(id)
        .await
        .map_err(Error::store)?
        .filter(|a| {
          a.deployment_id == deployment_id
            && a.student_id == student_id
            && a.courseware_element_id == element_id
        }),
      None => self
        .store
        .find_latest_attempt(deployment_id, element_id, student_id)
        .await
        .map_err(Error::store)?,
    };
    let Some(attempt) = attempt else {
      return Ok(Score::NOT_ATTEMPTED);
    };
    let attempt_id = attempt.id;

    let entries = self
      .store
      .find_score_entries(deployment_id, student_id, element_id, attempt_id)
      .await
      .map_err(Error::store)?;
    Ok(Score::from_entries(&entries))
  }

  async fn fold_for_attempt(
    &self,
    deployment_id: Uuid,
    student_id: Uuid,
    element_id: Uuid,
    attempt_id: Uuid,
  ) -> Result<f64> {
    let entries = self
      .store
      .find_score_entries(deployment_id, student_id, element_id, attempt_id)
      .await
      .map_err(Error::store)?;
    Ok(fold_adjustments(entries.iter().map(|e| e.adjustment_value)))
  }
}

fn new_entry_from(entry: &StudentScoreEntry) -> NewScoreEntry {
  NewScoreEntry {
    deployment_id:      entry.deployment_id,
    change_id:          entry.change_id,
    cohort_id:          entry.cohort_id,
    student_id:         entry.student_id,
    attempt_id:         entry.attempt_id,
    element_id:         entry.element_id,
    element_type:       entry.element_type,
    operator:           entry.operator,
    value:              entry.value,
    adjustment_value:   entry.adjustment_value,
    source_element_id:  entry.source_element_id,
    source_scenario_id: entry.source_scenario_id,
    source_account_id:  entry.source_account_id,
    evaluation_id:      entry.evaluation_id,
  }
}

#[cfg(test)]
mod tests {
  use tally_core::{courseware::CoursewareElementType, score::ScoreReason};

  use super::*;
  use crate::{
    ancestry::find_ancestry,
    testing::{Course, store},
  };

  fn action(element: CoursewareElement, operator: MutationOperator, value: f64) -> ChangeScoreAction {
    ChangeScoreAction { element, operator, value }
  }

  async fn screen_attempt(
    s: &tally_store_sqlite::SqliteStore,
    course: &Course,
  ) -> Attempt {
    AttemptResolver::new(s, 64)
      .acquire_latest_attempt(
        course.deployment.deployment_id,
        course.screens[0],
        CoursewareElementType::Interactive,
        course.student,
      )
      .await
      .unwrap()
  }

  #[tokio::test]
  async fn running_total_is_floored_at_zero_per_entry() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let screen = CoursewareElement::interactive(course.screens[0]);
    let ctx = course.context(screen);
    let attempt = screen_attempt(&s, &course).await;
    let scores = ScoreAggregator::new(&s, 64);

    for (operator, value) in [
      (MutationOperator::Add, 5.0),
      (MutationOperator::Add, 7.0),
      (MutationOperator::Remove, 15.0),
      (MutationOperator::Add, 2.0),
    ] {
      scores
        .create(&action(screen, operator, value), &ctx, &attempt, None)
        .await
        .unwrap();
    }

    let score = scores
      .compute_score(course.deployment.deployment_id, course.student, course.screens[0], None)
      .await
      .unwrap();
    assert_eq!(score.value, 2.0);
    assert_eq!(score.reason, ScoreReason::Scored);
  }

  #[tokio::test]
  async fn set_adjusts_by_difference_to_current() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let screen = CoursewareElement::interactive(course.screens[0]);
    let ctx = course.context(screen);
    let attempt = screen_attempt(&s, &course).await;
    let scores = ScoreAggregator::new(&s, 64);

    scores
      .create(&action(screen, MutationOperator::Add, 5.0), &ctx, &attempt, None)
      .await
      .unwrap();
    let set = scores
      .create(&action(screen, MutationOperator::Set, 3.0), &ctx, &attempt, None)
      .await
      .unwrap();
    assert_eq!(set.adjustment_value, -2.0);
    assert_eq!(set.value, 3.0);

    let score = scores
      .compute_score(ctx.deployment.deployment_id, course.student, course.screens[0], Some(attempt.id))
      .await
      .unwrap();
    assert_eq!(score.value, 3.0);
  }

  #[tokio::test]
  async fn negative_set_is_rejected_before_persisting() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let screen = CoursewareElement::interactive(course.screens[0]);
    let ctx = course.context(screen);
    let attempt = screen_attempt(&s, &course).await;
    let scores = ScoreAggregator::new(&s, 64);

    let err = scores
      .create(&action(screen, MutationOperator::Set, -1.0), &ctx, &attempt, None)
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "Negative value is not allowed with a SET operator (got -1)");

    let score = scores
      .compute_score(ctx.deployment.deployment_id, course.student, course.screens[0], None)
      .await
      .unwrap();
    assert_eq!(score.reason, ScoreReason::Unscored);
  }

  #[tokio::test]
  async fn entries_roll_up_to_every_ancestor() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let dep = course.deployment.deployment_id;
    let screen = CoursewareElement::interactive(course.screens[0]);
    let ctx = course.context(screen);
    let attempt = screen_attempt(&s, &course).await;
    let scores = ScoreAggregator::new(&s, 64);

    let entry = scores
      .create(&action(screen, MutationOperator::Add, 4.0), &ctx, &attempt, None)
      .await
      .unwrap();
    let ancestry = find_ancestry(&s, dep, screen, 64).await.unwrap();
    let rolled = scores.roll_up_score_entries(&entry, &ancestry).await.unwrap();

    assert_eq!(rolled.len(), 2);
    assert_eq!(rolled[0].element_id, course.pathway);
    assert_eq!(rolled[1].element_id, course.root);
    assert!(rolled.iter().all(|e| e.adjustment_value == 4.0 && e.source_element_id == course.screens[0]));

    let root = scores.compute_score(dep, course.student, course.root, None).await.unwrap();
    assert_eq!(root.value, 4.0);
  }

  #[tokio::test]
  async fn compute_score_without_attempt_and_repeatedly() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let scores = ScoreAggregator::new(&s, 64);
    let dep = course.deployment.deployment_id;

    let score = scores.compute_score(dep, course.student, course.root, None).await.unwrap();
    assert_eq!(score, Score::NOT_ATTEMPTED);

    let screen = CoursewareElement::interactive(course.screens[0]);
    let attempt = screen_attempt(&s, &course).await;
    scores
      .create(&action(screen, MutationOperator::Add, 1.5), &course.context(screen), &attempt, None)
      .await
      .unwrap();

    let first = scores.compute_score(dep, course.student, course.screens[0], None).await.unwrap();
    let second = scores.compute_score(dep, course.student, course.screens[0], None).await.unwrap();
    assert_eq!(first, second);
  }

  #[tokio::test]
  async fn unknown_attempt_is_not_attempted() {
    let s = store().await;
    let course = Course::linear(&s, 1).await;
    let scores = ScoreAggregator::new(&s, 64);
    let dep = course.deployment.deployment_id;
    let screen = CoursewareElement::interactive(course.screens[0]);
    let attempt = screen_attempt(&s, &course).await;
    scores
      .create(&action(screen, MutationOperator::Add, 2.0), &course.context(screen), &attempt, None)
      .await
      .unwrap();

    let missing = scores
      .compute_score(dep, course.student, course.screens[0], Some(Uuid::new_v4()))
      .await
      .unwrap();
    assert_eq!(missing, Score::NOT_ATTEMPTED);

    let elsewhere = scores
      .compute_score(dep, course.student, course.root, Some(attempt.id))
      .await
      .unwrap();
    assert_eq!(elsewhere, Score::NOT_ATTEMPTED);

    let own = scores
      .compute_score(dep, course.student, course.screens[0], Some(attempt.id))
      .await
      .unwrap();
    assert_eq!(own.reason, ScoreReason::Scored);
    assert_eq!(own.value, 2.0);
  }
}
