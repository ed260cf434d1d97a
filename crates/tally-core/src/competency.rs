//! Competency awards against items of a competency document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::courseware::CoursewareElementType;

/// A recorded mastery value for one (student, document, item). The latest
/// award for the key is the item's current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyMet {
  pub id:                      Uuid,
  pub student_id:              Uuid,
  pub deployment_id:           Uuid,
  pub change_id:               Uuid,
  /// The courseware element whose evaluation caused the award.
  pub courseware_element_id:   Uuid,
  pub courseware_element_type: CoursewareElementType,
  pub evaluation_id:           Uuid,
  pub document_id:             Uuid,
  pub document_version_id:     Uuid,
  pub document_item_id:        Uuid,
  pub attempt_id:              Uuid,
  pub value:                   f64,
  pub confidence:              f64,
  pub recorded_at:             DateTime<Utc>,
}

/// Input to [`crate::store::LearnerStore::record_competency_met`].
#[derive(Debug, Clone)]
pub struct NewCompetencyMet {
  pub student_id:              Uuid,
  pub deployment_id:           Uuid,
  pub change_id:               Uuid,
  pub courseware_element_id:   Uuid,
  pub courseware_element_type: CoursewareElementType,
  pub evaluation_id:           Uuid,
  pub document_id:             Uuid,
  pub document_version_id:     Uuid,
  pub document_item_id:        Uuid,
  pub attempt_id:              Uuid,
  pub value:                   f64,
  pub confidence:              f64,
}
