//! Evaluation handling: from a scenario result to persisted learner state.
//!
//! One evaluation acquires the walkable's attempt once, then applies the
//! triggered actions in order. Progress is recomputed one ancestor at a time
//! following the attempt chain, and stops at the first level whose
//! completion did not change. The first error aborts the remaining actions;
//! records already persisted stay, since every table is append-only.

use std::collections::HashSet;

use serde::Serialize;
use tally_core::{
  attempt::Attempt,
  competency::CompetencyMet,
  courseware::{CoursewareElement, CoursewareElementType, PathwayConfig},
  evaluation::{
    ChangeScoreAction,
    Correctness,
    EvaluationContext,
    GradePassbackAction,
    ProgressAction,
    ScenarioEvaluationResult,
    TriggeredAction,
  },
  event::{EventPublisher, LearnerEvent},
  progress::{Completion, NewProgress, Progress, ProgressionType},
  score::{Score, StudentScoreEntry},
  store::{CompetencyGraph, CoursewareGraph, LearnerStore},
};
use uuid::Uuid;

use crate::{
  Engine,
  Error,
  Result,
  ancestry::{find_ancestry, parent_of},
  attempt::require_id,
  competency::AwardContext,
  progress::{self, ChildUpdate, Step},
  score::validate_action,
};

/// Everything one evaluation persisted.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutcome {
  /// The evaluated walkable's attempt.
  pub attempt:       Attempt,
  /// Progress records, the walkable's first, then each ancestor reached.
  pub progress:      Vec<Progress>,
  pub score_entries: Vec<StudentScoreEntry>,
  pub competency:    Vec<CompetencyMet>,
  pub grades:        Vec<GradeReport>,
  /// Set when a `Repeat` progression started a new attempt.
  pub next_attempt:  Option<Attempt>,
}

/// A grade handed to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradeReport {
  pub element_id: Uuid,
  pub score:      Score,
  pub completion: Option<Completion>,
}

fn validate(ctx: &EvaluationContext, result: &ScenarioEvaluationResult) -> Result<()> {
  require_id("deployment_id", ctx.deployment.deployment_id)?;
  require_id("student_id", ctx.student_id)?;
  require_id("evaluation_id", ctx.evaluation_id)?;
  require_id("element_id", ctx.element.element_id)?;
  if !ctx.element.element_type.is_walkable() {
    return Err(Error::InvalidArgument(format!(
      "{} elements cannot be evaluated",
      ctx.element.element_type
    )));
  }

  for action in &result.triggered_actions {
    match action {
      TriggeredAction::ChangeScore(score) => {
        require_id("score element_id", score.element.element_id)?;
        validate_action(score)?;
      }
      TriggeredAction::ChangeCompetency(competency) => {
        require_id("document_id", competency.document_id)?;
        require_id("document_item_id", competency.document_item_id)?;
      }
      TriggeredAction::ChangeProgress(_) | TriggeredAction::GradePassback(_) => {}
    }
  }
  Ok(())
}

impl<S, P> Engine<S, P>
where
  S: LearnerStore + CoursewareGraph + CompetencyGraph,
  P: EventPublisher,
{
  /// Apply every action a scenario triggered for one evaluated walkable.
  pub async fn handle_evaluation(
    &self,
    ctx: &EvaluationContext,
    result: &ScenarioEvaluationResult,
  ) -> Result<EvaluationOutcome> {
    let checked = match validate(ctx, result) {
      Ok(()) => self.check_go_to_targets(ctx, result).await,
      Err(e) => Err(e),
    };
    if let Err(e) = checked {
      tracing::warn!(evaluation_id = %ctx.evaluation_id, "rejected evaluation: {e}");
      return Err(e);
    }

    let attempt = self
      .attempts()
      .acquire_latest_attempt(
        ctx.deployment.deployment_id,
        ctx.element.element_id,
        ctx.element.element_type,
        ctx.student_id,
      )
      .await?;

    let mut outcome = EvaluationOutcome {
      attempt,
      progress: Vec::new(),
      score_entries: Vec::new(),
      competency: Vec::new(),
      grades: Vec::new(),
      next_attempt: None,
    };

    for action in &result.triggered_actions {
      match action {
        TriggeredAction::ChangeProgress(action) => {
          self
            .apply_progress(ctx, action.progression, result.correctness, &mut outcome)
            .await?;
        }
        TriggeredAction::ChangeScore(action) => {
          self
            .apply_score(ctx, action, result.scenario_id, &mut outcome)
            .await?;
        }
        TriggeredAction::ChangeCompetency(action) => {
          let award_ctx = self.award_context(ctx, ctx.element, outcome.attempt.id);
          let awarded = self.competency().propagate(&award_ctx, action).await?;
          self.publish_awards(&awarded).await?;
          outcome.competency.extend(awarded);
        }
        TriggeredAction::GradePassback(action) => {
          let grade = self.grade_passback(ctx, action).await?;
          outcome.grades.push(grade);
        }
      }
    }

    tracing::debug!(
      evaluation_id = %ctx.evaluation_id,
      progress = outcome.progress.len(),
      scores = outcome.score_entries.len(),
      competency = outcome.competency.len(),
      "handled evaluation"
    );
    Ok(outcome)
  }

  // ── Progress ──────────────────────────────────────────────────────────

  /// Reject a `CompleteAndGoTo` aimed outside the walkable's graph pathway
  /// before anything is written.
  async fn check_go_to_targets(
    &self,
    ctx: &EvaluationContext,
    result: &ScenarioEvaluationResult,
  ) -> Result<()> {
    let targets: Vec<Uuid> = result
      .triggered_actions
      .iter()
      .filter_map(|action| match action {
        TriggeredAction::ChangeProgress(ProgressAction {
          progression: ProgressionType::CompleteAndGoTo { walkable_id },
        }) => Some(*walkable_id),
        _ => None,
      })
      .collect();
    if targets.is_empty() {
      return Ok(());
    }

    let dep = ctx.deployment.deployment_id;
    let Some(parent) = parent_of(&*self.store, dep, ctx.element).await? else {
      return Ok(());
    };
    if parent.element_type != CoursewareElementType::Pathway {
      return Ok(());
    }
    let is_graph = self
      .store
      .find_pathway(parent.element_id, dep)
      .await
      .map_err(Error::store)?
      .is_some_and(|p| matches!(p.config, PathwayConfig::Graph { .. }));
    if !is_graph {
      return Ok(());
    }

    let walkables = self
      .store
      .find_walkables(parent.element_id, dep)
      .await
      .map_err(Error::store)?;
    if targets
      .iter()
      .all(|target| walkables.iter().any(|w| w.element_id == *target))
    {
      Ok(())
    } else {
      Err(Error::InvalidArgument(
        "cannot GO_TO a walkable outside the current pathway".to_owned(),
      ))
    }
  }

  async fn apply_progress(
    &self,
    ctx: &EvaluationContext,
    progression: ProgressionType,
    correctness: Correctness,
    outcome: &mut EvaluationOutcome,
  ) -> Result<()> {
    let attempt = outcome.attempt.clone();
    let previous = self.latest_progress(&attempt).await?;
    let leaf = progress::leaf_step(ctx.element.element_type, progression, previous.as_ref());
    let recorded = self.record_progress(ctx, &attempt, &leaf).await?;
    outcome.progress.push(recorded);

    let mut update = ChildUpdate {
      element: ctx.element,
      completion: leaf.completion,
      progression: Some(progression),
      correctness,
    };
    let mut propagate = leaf.propagate;
    let mut child_attempt = attempt.clone();
    let mut visited = HashSet::from([attempt.id]);

    while propagate {
      let Some(parent_id) = child_attempt.parent_id else { break };
      if !visited.insert(parent_id) {
        return Err(Error::CyclicStructure { kind: "attempt", id: parent_id });
      }
      if visited.len() > self.config.max_depth + 1 {
        return Err(Error::TooDeep {
          kind: "progress",
          id: attempt.id,
          max_depth: self.config.max_depth,
        });
      }

      let parent_attempt = self
        .store
        .get_attempt(parent_id)
        .await
        .map_err(Error::store)?
        .ok_or_else(|| Error::Structural(format!("parent attempt {parent_id} is missing")))?;
      let parent = CoursewareElement::new(
        parent_attempt.courseware_element_id,
        parent_attempt.courseware_element_type,
      );

      let step = self.step_parent(ctx, &parent_attempt, parent, &update).await?;
      let recorded = self.record_progress(ctx, &parent_attempt, &step).await?;
      outcome.progress.push(recorded);

      if step.exited {
        tracing::info!(
          element_id = %parent.element_id,
          element_type = %parent.element_type,
          "element completed"
        );
      }
      for award in &step.awards {
        let award_ctx = self.award_context(ctx, parent, parent_attempt.id);
        let awarded = self
          .competency()
          .award(&award_ctx, award.item.document_id, award.item.document_item_id, award.value)
          .await?;
        self.publish_awards(&awarded).await?;
        outcome.competency.extend(awarded);
      }

      update = ChildUpdate {
        element: parent,
        completion: step.completion,
        progression: None,
        correctness,
      };
      propagate = step.propagate;
      child_attempt = parent_attempt;
    }

    if progression == ProgressionType::Repeat {
      let next = self.attempts().repeat_attempt(&attempt).await?;
      outcome.next_attempt = Some(next);
    }
    Ok(())
  }

  /// Recompute one ancestor from the child that just changed.
  async fn step_parent(
    &self,
    ctx: &EvaluationContext,
    parent_attempt: &Attempt,
    parent: CoursewareElement,
    update: &ChildUpdate,
  ) -> Result<Step> {
    let dep = ctx.deployment.deployment_id;
    let previous = self.latest_progress(parent_attempt).await?;

    match parent.element_type {
      CoursewareElementType::Pathway => {
        let pathway = self
          .store
          .find_pathway(parent.element_id, dep)
          .await
          .map_err(Error::store)?
          .ok_or_else(|| {
            Error::Structural(format!("pathway {} has no configuration", parent.element_id))
          })?;
        let walkables = self
          .store
          .find_walkables(parent.element_id, dep)
          .await
          .map_err(Error::store)?;
        progress::pathway_step(&pathway.config, &walkables, previous.as_ref(), update)
      }
      CoursewareElementType::Activity => {
        let pathways = self
          .store
          .find_child_pathway_ids(parent.element_id, dep)
          .await
          .map_err(Error::store)?;
        Ok(progress::activity_step(
          &pathways,
          previous.as_ref(),
          update.element.element_id,
          update.completion,
        ))
      }
      other => Err(Error::Structural(format!(
        "{other} {} cannot hold progress",
        parent.element_id
      ))),
    }
  }

  async fn latest_progress(&self, attempt: &Attempt) -> Result<Option<Progress>> {
    self
      .store
      .find_latest_progress_for_attempt(
        attempt.deployment_id,
        attempt.courseware_element_id,
        attempt.id,
      )
      .await
      .map_err(Error::store)
  }

  async fn record_progress(
    &self,
    ctx: &EvaluationContext,
    attempt: &Attempt,
    step: &Step,
  ) -> Result<Progress> {
    let progress = self
      .store
      .record_progress(NewProgress {
        deployment_id:           ctx.deployment.deployment_id,
        change_id:               ctx.deployment.change_id,
        courseware_element_id:   attempt.courseware_element_id,
        courseware_element_type: attempt.courseware_element_type,
        student_id:              ctx.student_id,
        attempt_id:              attempt.id,
        evaluation_id:           ctx.evaluation_id,
        completion:              step.completion,
        detail:                  step.detail.clone(),
      })
      .await
      .map_err(Error::store)?;

    tracing::debug!(
      element_id = %progress.courseware_element_id,
      value = progress.completion.value,
      confidence = progress.completion.confidence,
      "recorded progress"
    );
    self
      .publish(LearnerEvent::ProgressUpdated { progress: progress.clone() })
      .await?;
    Ok(progress)
  }

  // ── Scores ────────────────────────────────────────────────────────────

  async fn apply_score(
    &self,
    ctx: &EvaluationContext,
    action: &ChangeScoreAction,
    scenario_id: Option<Uuid>,
    outcome: &mut EvaluationOutcome,
  ) -> Result<()> {
    let dep = ctx.deployment.deployment_id;
    let attempt = if action.element.element_id == outcome.attempt.courseware_element_id {
      outcome.attempt.clone()
    } else {
      self
        .attempts()
        .acquire_latest_attempt(
          dep,
          action.element.element_id,
          action.element.element_type,
          ctx.student_id,
        )
        .await?
    };

    let scores = self.scores();
    let entry = scores.create(action, ctx, &attempt, scenario_id).await?;
    let ancestry = find_ancestry(&*self.store, dep, action.element, self.config.max_depth).await?;
    let rolled = scores.roll_up_score_entries(&entry, &ancestry).await?;

    for entry in std::iter::once(entry).chain(rolled) {
      let score = scores
        .compute_score(dep, ctx.student_id, entry.element_id, Some(entry.attempt_id))
        .await?;
      self
        .publish(LearnerEvent::ScoreUpdated { entry: entry.clone(), score })
        .await?;
      outcome.score_entries.push(entry);
    }
    Ok(())
  }

  // ── Competency and grades ─────────────────────────────────────────────

  fn award_context(
    &self,
    ctx: &EvaluationContext,
    element: CoursewareElement,
    attempt_id: Uuid,
  ) -> AwardContext {
    AwardContext {
      deployment: ctx.deployment,
      student_id: ctx.student_id,
      evaluation_id: ctx.evaluation_id,
      element,
      attempt_id,
    }
  }

  async fn publish_awards(&self, awarded: &[CompetencyMet]) -> Result<()> {
    for award in awarded {
      self
        .publish(LearnerEvent::CompetencyUpdated { award: award.clone() })
        .await?;
    }
    Ok(())
  }

  async fn grade_passback(
    &self,
    ctx: &EvaluationContext,
    action: &GradePassbackAction,
  ) -> Result<GradeReport> {
    let dep = ctx.deployment.deployment_id;
    let element_id = action.element_id.unwrap_or(ctx.deployment.root_activity_id);

    let score = self
      .scores()
      .compute_score(dep, ctx.student_id, element_id, None)
      .await?;
    let completion = self
      .store
      .find_latest_progress(dep, element_id, ctx.student_id)
      .await
      .map_err(Error::store)?
      .map(|p| p.completion);

    self
      .publish(LearnerEvent::GradePassback {
        deployment_id: dep,
        student_id: ctx.student_id,
        element_id,
        score,
        completion,
      })
      .await?;
    Ok(GradeReport { element_id, score, completion })
  }

  async fn publish(&self, event: LearnerEvent) -> Result<()> {
    self.publisher.publish(event).await.map_err(Error::publish)
  }
}
