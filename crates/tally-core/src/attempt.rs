//! Attempts: a student's numbered try at a courseware element.
//!
//! Attempts form a tree that mirrors the courseware ancestry: every attempt
//! points at the attempt of its parent element, except at the deployment's
//! root activity. Like every other record, an attempt is never updated; a new
//! try is a new row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::courseware::CoursewareElementType;

/// A persisted attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
  pub id:                      Uuid,
  pub deployment_id:           Uuid,
  pub student_id:              Uuid,
  pub courseware_element_id:   Uuid,
  pub courseware_element_type: CoursewareElementType,
  /// The parent element's attempt; `None` only at the root activity.
  pub parent_id:               Option<Uuid>,
  /// 1-based ordinal within the parent attempt.
  pub value:                   u32,
  /// Server-assigned timestamp; never changes after creation.
  pub recorded_at:             DateTime<Utc>,
}

/// Input to [`crate::store::LearnerStore::record_attempt`].
#[derive(Debug, Clone)]
pub struct NewAttempt {
  pub deployment_id:           Uuid,
  pub student_id:              Uuid,
  pub courseware_element_id:   Uuid,
  pub courseware_element_type: CoursewareElementType,
  pub parent_id:               Option<Uuid>,
  pub value:                   u32,
}

impl NewAttempt {
  /// The next try at the same element under the same parent attempt.
  pub fn repeat_of(attempt: &Attempt) -> Self {
    Self {
      deployment_id:           attempt.deployment_id,
      student_id:              attempt.student_id,
      courseware_element_id:   attempt.courseware_element_id,
      courseware_element_type: attempt.courseware_element_type,
      parent_id:               attempt.parent_id,
      value:                   attempt.value + 1,
    }
  }
}
