//! Storage and graph-reader traits.
//!
//! The traits are implemented by storage backends (e.g. `tally-store-sqlite`).
//! The engine depends on these abstractions, not on any concrete backend.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use uuid::Uuid;

use crate::{
  attempt::{Attempt, NewAttempt},
  competency::{CompetencyMet, NewCompetencyMet},
  courseware::{CoursewareElement, LearnerPathway},
  progress::{NewProgress, Progress},
  score::{NewScoreEntry, StudentScoreEntry},
};

/// The error type shared by every trait a backend implements.
pub trait Backend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

// ─── Learner state ───────────────────────────────────────────────────────────

/// Append-only persistence of learner records.
///
/// No record is ever updated or deleted. "Latest" always means the most
/// recently recorded row for the key, by insertion order.
pub trait LearnerStore: Backend {
  // ── Attempts ──────────────────────────────────────────────────────────

  /// Persist a new attempt. The id and `recorded_at` are set by the store.
  fn record_attempt(
    &self,
    input: NewAttempt,
  ) -> impl Future<Output = Result<Attempt, Self::Error>> + Send + '_;

  fn get_attempt(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Attempt>, Self::Error>> + Send + '_;

  /// The latest attempt of `student_id` at `element_id` in a deployment.
  fn find_latest_attempt(
    &self,
    deployment_id: Uuid,
    element_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<Attempt>, Self::Error>> + Send + '_;

  // ── Progress ──────────────────────────────────────────────────────────

  fn record_progress(
    &self,
    input: NewProgress,
  ) -> impl Future<Output = Result<Progress, Self::Error>> + Send + '_;

  fn find_latest_progress(
    &self,
    deployment_id: Uuid,
    element_id: Uuid,
    student_id: Uuid,
  ) -> impl Future<Output = Result<Option<Progress>, Self::Error>> + Send + '_;

  /// The latest progress recorded against a specific attempt.
  fn find_latest_progress_for_attempt(
    &self,
    deployment_id: Uuid,
    element_id: Uuid,
    attempt_id: Uuid,
  ) -> impl Future<Output = Result<Option<Progress>, Self::Error>> + Send + '_;

  // ── Scores ────────────────────────────────────────────────────────────

  fn record_score_entry(
    &self,
    input: NewScoreEntry,
  ) -> impl Future<Output = Result<StudentScoreEntry, Self::Error>> + Send + '_;

  /// All entries for an element and attempt, in creation order.
  fn find_score_entries(
    &self,
    deployment_id: Uuid,
    student_id: Uuid,
    element_id: Uuid,
    attempt_id: Uuid,
  ) -> impl Future<Output = Result<Vec<StudentScoreEntry>, Self::Error>> + Send + '_;

  // ── Competency ────────────────────────────────────────────────────────

  fn record_competency_met(
    &self,
    input: NewCompetencyMet,
  ) -> impl Future<Output = Result<CompetencyMet, Self::Error>> + Send + '_;

  fn find_latest_competency_met(
    &self,
    student_id: Uuid,
    document_id: Uuid,
    document_item_id: Uuid,
  ) -> impl Future<Output = Result<Option<CompetencyMet>, Self::Error>> + Send + '_;
}

// ─── Courseware tree ─────────────────────────────────────────────────────────

/// Read-only lookups over a published courseware tree.
///
/// A `None` parent is the expected answer at the root of the tree and is how
/// upward walks know to stop.
pub trait CoursewareGraph: Backend {
  /// The pathway containing a walkable (activity or interactive).
  fn find_parent_pathway_id(
    &self,
    walkable_id: Uuid,
    deployment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  /// The activity containing a pathway.
  fn find_parent_activity_id(
    &self,
    pathway_id: Uuid,
    deployment_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  /// The configured walkables of a pathway, in authored order.
  fn find_walkables(
    &self,
    pathway_id: Uuid,
    deployment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<CoursewareElement>, Self::Error>> + Send + '_;

  /// The pathways of an activity, in authored order.
  fn find_child_pathway_ids(
    &self,
    activity_id: Uuid,
    deployment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// A pathway's declared type and configuration.
  fn find_pathway(
    &self,
    pathway_id: Uuid,
    deployment_id: Uuid,
  ) -> impl Future<Output = Result<Option<LearnerPathway>, Self::Error>> + Send + '_;
}

// ─── Competency documents ────────────────────────────────────────────────────

/// Read-only lookups over competency documents and their `IS_CHILD_OF`
/// item associations.
pub trait CompetencyGraph: Backend {
  /// Items that `item_id` is a child of.
  fn find_parent_item_ids(
    &self,
    document_id: Uuid,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Items that are children of `item_id`.
  fn find_child_item_ids(
    &self,
    document_id: Uuid,
    item_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  fn find_document_version_id(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;
}
