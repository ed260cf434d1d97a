//! Competency awards and their roll-up through document items.
//!
//! Items form a DAG through `IS_CHILD_OF` associations. Awarding an item
//! recomputes each ancestor once, as the mean of its children's latest
//! values, after every affected child below it.

use std::collections::{HashMap, HashSet};

use tally_core::{
  clamp_unit,
  competency::{CompetencyMet, NewCompetencyMet},
  courseware::{CoursewareElement, Deployment},
  evaluation::ChangeCompetencyMetAction,
  score::MutationOperator,
  store::{CompetencyGraph, LearnerStore},
};
use uuid::Uuid;

use crate::{Error, Result, attempt::require_id};

/// Who earned an award, and through which evaluation.
#[derive(Debug, Clone, Copy)]
pub struct AwardContext {
  pub deployment:    Deployment,
  pub student_id:    Uuid,
  pub evaluation_id: Uuid,
  /// The courseware element whose evaluation caused the award.
  pub element:       CoursewareElement,
  pub attempt_id:    Uuid,
}

pub struct CompetencyPropagator<'a, S> {
  store:     &'a S,
  max_depth: usize,
}

impl<'a, S> CompetencyPropagator<'a, S>
where
  S: LearnerStore + CompetencyGraph,
{
  pub fn new(store: &'a S, max_depth: usize) -> Self { Self { store, max_depth } }

  /// Apply `action` to the student's current value for the item, then roll
  /// the result up to every ancestor item. Returns every award persisted,
  /// the triggering item first.
  pub async fn propagate(
    &self,
    ctx: &AwardContext,
    action: &ChangeCompetencyMetAction,
  ) -> Result<Vec<CompetencyMet>> {
    require_id("document_id", action.document_id)?;
    require_id("document_item_id", action.document_item_id)?;

    let previous = self
      .latest_value(ctx.student_id, action.document_id, action.document_item_id)
      .await?;
    let value = clamp_unit(action.operator.apply(previous, action.value));
    self
      .award_and_roll_up(ctx, action.document_id, action.document_item_id, value)
      .await
  }

  /// Set the item to `value` directly and roll it up.
  pub async fn award(
    &self,
    ctx: &AwardContext,
    document_id: Uuid,
    document_item_id: Uuid,
    value: f64,
  ) -> Result<Vec<CompetencyMet>> {
    self
      .propagate(ctx, &ChangeCompetencyMetAction {
        document_id,
        document_item_id,
        operator: MutationOperator::Set,
        value,
      })
      .await
  }

  async fn award_and_roll_up(
    &self,
    ctx: &AwardContext,
    document_id: Uuid,
    item_id: Uuid,
    value: f64,
  ) -> Result<Vec<CompetencyMet>> {
    let version_id = self
      .store
      .find_document_version_id(document_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::Structural(format!("competency document {document_id} is not published"))
      })?;

    let ancestors = self.ancestors_in_order(document_id, item_id).await?;
    let mut awarded = vec![self.record(ctx, document_id, version_id, item_id, value).await?];

    // Values computed during this roll-up, which take precedence over the
    // store when a parent averages its children.
    let mut fresh = HashMap::from([(item_id, value)]);
    for parent in ancestors {
      let value = self
        .average_of_children(ctx.student_id, document_id, parent, &fresh)
        .await?;
      fresh.insert(parent, value);
      awarded.push(self.record(ctx, document_id, version_id, parent, value).await?);
    }

    tracing::debug!(
      %document_id,
      %item_id,
      awards = awarded.len(),
      "propagated competency"
    );
    Ok(awarded)
  }

  /// Every ancestor of `item_id`, each listed once and after all of its
  /// own descendants that are also ancestors of `item_id`.
  ///
  /// Walks upward depth first; the stack is the current path, so a parent
  /// already on it is a cycle.
  async fn ancestors_in_order(&self, document_id: Uuid, item_id: Uuid) -> Result<Vec<Uuid>> {
    let mut parents_of: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    let mut finished = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![(item_id, 0usize)];

    while let Some(&(node, next)) = stack.last() {
      if !parents_of.contains_key(&node) {
        let parents = self
          .store
          .find_parent_item_ids(document_id, node)
          .await
          .map_err(Error::store)?;
        parents_of.insert(node, parents);
      }

      let parent = parents_of.get(&node).and_then(|p| p.get(next)).copied();
      let Some(parent) = parent else {
        stack.pop();
        finished.insert(node);
        order.push(node);
        continue;
      };

      if let Some(top) = stack.last_mut() {
        top.1 += 1;
      }
      if finished.contains(&parent) {
        continue;
      }
      if stack.iter().any(|&(on_path, _)| on_path == parent) {
        return Err(Error::CyclicStructure { kind: "document item", id: parent });
      }
      if stack.len() >= self.max_depth {
        return Err(Error::TooDeep {
          kind: "competency",
          id: item_id,
          max_depth: self.max_depth,
        });
      }
      stack.push((parent, 0));
    }

    // Post-order puts parents first and the item itself last.
    order.pop();
    order.reverse();
    Ok(order)
  }

  async fn average_of_children(
    &self,
    student_id: Uuid,
    document_id: Uuid,
    parent: Uuid,
    fresh: &HashMap<Uuid, f64>,
  ) -> Result<f64> {
    let children = self
      .store
      .find_child_item_ids(document_id, parent)
      .await
      .map_err(Error::store)?;
    if children.is_empty() {
      return Ok(0.0);
    }

    let mut total = 0.0;
    for child in &children {
      total += match fresh.get(child) {
        Some(value) => *value,
        None => self.latest_value(student_id, document_id, *child).await?,
      };
    }
    Ok(clamp_unit(total / children.len() as f64))
  }

  async fn latest_value(
    &self,
    student_id: Uuid,
    document_id: Uuid,
    item_id: Uuid,
  ) -> Result<f64> {
    Ok(
      self
        .store
        .find_latest_competency_met(student_id, document_id, item_id)
        .await
        .map_err(Error::store)?
        .map_or(0.0, |met| met.value),
    )
  }

  async fn record(
    &self,
    ctx: &AwardContext,
    document_id: Uuid,
    document_version_id: Uuid,
    document_item_id: Uuid,
    value: f64,
  ) -> Result<CompetencyMet> {
    self
      .store
      .record_competency_met(NewCompetencyMet {
        student_id: ctx.student_id,
        deployment_id: ctx.deployment.deployment_id,
        change_id: ctx.deployment.change_id,
        courseware_element_id: ctx.element.element_id,
        courseware_element_type: ctx.element.element_type,
        evaluation_id: ctx.evaluation_id,
        document_id,
        document_version_id,
        document_item_id,
        attempt_id: ctx.attempt_id,
        value,
        confidence: 1.0,
      })
      .await
      .map_err(Error::store)
  }
}
