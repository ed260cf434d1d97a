//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enum columns use the same
//! `SCREAMING_SNAKE_CASE` spelling as the JSON wire format. Variant state of
//! progress records is stored as compact JSON.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use tally_core::{
  attempt::Attempt,
  competency::CompetencyMet,
  courseware::{CoursewareElement, CoursewareElementType},
  progress::{Completion, Progress, ProgressDetail},
  score::{MutationOperator, StudentScoreEntry},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_element_type(s: &str) -> Result<CoursewareElementType> {
  CoursewareElementType::from_str(s).map_err(|_| Error::UnknownValue {
    column: "element_type",
    value:  s.to_owned(),
  })
}

pub fn decode_operator(s: &str) -> Result<MutationOperator> {
  MutationOperator::from_str(s).map_err(|_| Error::UnknownValue {
    column: "operator",
    value:  s.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `courseware_elements` row.
pub struct RawElement {
  pub element_id:   String,
  pub element_type: String,
}

impl RawElement {
  pub fn into_element(self) -> Result<CoursewareElement> {
    Ok(CoursewareElement {
      element_id:   decode_uuid(&self.element_id)?,
      element_type: decode_element_type(&self.element_type)?,
    })
  }
}

pub const ATTEMPT_COLUMNS: &str = "attempt_id, deployment_id, student_id, \
                                   element_id, element_type, parent_id, value, \
                                   recorded_at";

/// Raw values read directly from an `attempts` row.
pub struct RawAttempt {
  pub attempt_id:    String,
  pub deployment_id: String,
  pub student_id:    String,
  pub element_id:    String,
  pub element_type:  String,
  pub parent_id:     Option<String>,
  pub value:         u32,
  pub recorded_at:   String,
}

impl RawAttempt {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attempt_id:    row.get(0)?,
      deployment_id: row.get(1)?,
      student_id:    row.get(2)?,
      element_id:    row.get(3)?,
      element_type:  row.get(4)?,
      parent_id:     row.get(5)?,
      value:         row.get(6)?,
      recorded_at:   row.get(7)?,
    })
  }

  pub fn into_attempt(self) -> Result<Attempt> {
    Ok(Attempt {
      id:                      decode_uuid(&self.attempt_id)?,
      deployment_id:           decode_uuid(&self.deployment_id)?,
      student_id:              decode_uuid(&self.student_id)?,
      courseware_element_id:   decode_uuid(&self.element_id)?,
      courseware_element_type: decode_element_type(&self.element_type)?,
      parent_id:               decode_opt_uuid(self.parent_id.as_deref())?,
      value:                   self.value,
      recorded_at:             decode_dt(&self.recorded_at)?,
    })
  }
}

pub const PROGRESS_COLUMNS: &str = "progress_id, deployment_id, change_id, \
                                    element_id, element_type, student_id, \
                                    attempt_id, evaluation_id, completion_value, \
                                    completion_confidence, progress_type, \
                                    detail_json, recorded_at";

/// Raw values read directly from a `progress` row.
pub struct RawProgress {
  pub progress_id:           String,
  pub deployment_id:         String,
  pub change_id:             String,
  pub element_id:            String,
  pub element_type:          String,
  pub student_id:            String,
  pub attempt_id:            String,
  pub evaluation_id:         String,
  pub completion_value:      f64,
  pub completion_confidence: f64,
  pub progress_type:         String,
  pub detail_json:           String,
  pub recorded_at:           String,
}

impl RawProgress {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      progress_id:           row.get(0)?,
      deployment_id:         row.get(1)?,
      change_id:             row.get(2)?,
      element_id:            row.get(3)?,
      element_type:          row.get(4)?,
      student_id:            row.get(5)?,
      attempt_id:            row.get(6)?,
      evaluation_id:         row.get(7)?,
      completion_value:      row.get(8)?,
      completion_confidence: row.get(9)?,
      progress_type:         row.get(10)?,
      detail_json:           row.get(11)?,
      recorded_at:           row.get(12)?,
    })
  }

  pub fn into_progress(self) -> Result<Progress> {
    let data: serde_json::Value = serde_json::from_str(&self.detail_json)?;
    Ok(Progress {
      id:                      decode_uuid(&self.progress_id)?,
      deployment_id:           decode_uuid(&self.deployment_id)?,
      change_id:               decode_uuid(&self.change_id)?,
      courseware_element_id:   decode_uuid(&self.element_id)?,
      courseware_element_type: decode_element_type(&self.element_type)?,
      student_id:              decode_uuid(&self.student_id)?,
      attempt_id:              decode_uuid(&self.attempt_id)?,
      evaluation_id:           decode_uuid(&self.evaluation_id)?,
      completion:              Completion {
        value:      self.completion_value,
        confidence: self.completion_confidence,
      },
      detail:                  ProgressDetail::from_parts(&self.progress_type, data)?,
      recorded_at:             decode_dt(&self.recorded_at)?,
    })
  }
}

pub const SCORE_COLUMNS: &str = "entry_id, deployment_id, change_id, cohort_id, \
                                 student_id, attempt_id, element_id, \
                                 element_type, operator, value, \
                                 adjustment_value, source_element_id, \
                                 source_scenario_id, source_account_id, \
                                 evaluation_id, recorded_at";

/// Raw values read directly from a `score_entries` row.
pub struct RawScoreEntry {
  pub entry_id:           String,
  pub deployment_id:      String,
  pub change_id:          String,
  pub cohort_id:          String,
  pub student_id:         String,
  pub attempt_id:         String,
  pub element_id:         String,
  pub element_type:       String,
  pub operator:           String,
  pub value:              f64,
  pub adjustment_value:   f64,
  pub source_element_id:  String,
  pub source_scenario_id: Option<String>,
  pub source_account_id:  String,
  pub evaluation_id:      String,
  pub recorded_at:        String,
}

impl RawScoreEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:           row.get(0)?,
      deployment_id:      row.get(1)?,
      change_id:          row.get(2)?,
      cohort_id:          row.get(3)?,
      student_id:         row.get(4)?,
      attempt_id:         row.get(5)?,
      element_id:         row.get(6)?,
      element_type:       row.get(7)?,
      operator:           row.get(8)?,
      value:              row.get(9)?,
      adjustment_value:   row.get(10)?,
      source_element_id:  row.get(11)?,
      source_scenario_id: row.get(12)?,
      source_account_id:  row.get(13)?,
      evaluation_id:      row.get(14)?,
      recorded_at:        row.get(15)?,
    })
  }

  pub fn into_entry(self) -> Result<StudentScoreEntry> {
    Ok(StudentScoreEntry {
      id:                 decode_uuid(&self.entry_id)?,
      deployment_id:      decode_uuid(&self.deployment_id)?,
      change_id:          decode_uuid(&self.change_id)?,
      cohort_id:          decode_uuid(&self.cohort_id)?,
      student_id:         decode_uuid(&self.student_id)?,
      attempt_id:         decode_uuid(&self.attempt_id)?,
      element_id:         decode_uuid(&self.element_id)?,
      element_type:       decode_element_type(&self.element_type)?,
      operator:           decode_operator(&self.operator)?,
      value:              self.value,
      adjustment_value:   self.adjustment_value,
      source_element_id:  decode_uuid(&self.source_element_id)?,
      source_scenario_id: decode_opt_uuid(self.source_scenario_id.as_deref())?,
      source_account_id:  decode_uuid(&self.source_account_id)?,
      evaluation_id:      decode_uuid(&self.evaluation_id)?,
      recorded_at:        decode_dt(&self.recorded_at)?,
    })
  }
}

pub const COMPETENCY_COLUMNS: &str = "award_id, student_id, deployment_id, \
                                      change_id, element_id, element_type, \
                                      evaluation_id, document_id, \
                                      document_version_id, document_item_id, \
                                      attempt_id, value, confidence, \
                                      recorded_at";

/// Raw values read directly from a `competency_met` row.
pub struct RawCompetencyMet {
  pub award_id:            String,
  pub student_id:          String,
  pub deployment_id:       String,
  pub change_id:           String,
  pub element_id:          String,
  pub element_type:        String,
  pub evaluation_id:       String,
  pub document_id:         String,
  pub document_version_id: String,
  pub document_item_id:    String,
  pub attempt_id:          String,
  pub value:               f64,
  pub confidence:          f64,
  pub recorded_at:         String,
}

impl RawCompetencyMet {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      award_id:            row.get(0)?,
      student_id:          row.get(1)?,
      deployment_id:       row.get(2)?,
      change_id:           row.get(3)?,
      element_id:          row.get(4)?,
      element_type:        row.get(5)?,
      evaluation_id:       row.get(6)?,
      document_id:         row.get(7)?,
      document_version_id: row.get(8)?,
      document_item_id:    row.get(9)?,
      attempt_id:          row.get(10)?,
      value:               row.get(11)?,
      confidence:          row.get(12)?,
      recorded_at:         row.get(13)?,
    })
  }

  pub fn into_award(self) -> Result<CompetencyMet> {
    Ok(CompetencyMet {
      id:                      decode_uuid(&self.award_id)?,
      student_id:              decode_uuid(&self.student_id)?,
      deployment_id:           decode_uuid(&self.deployment_id)?,
      change_id:               decode_uuid(&self.change_id)?,
      courseware_element_id:   decode_uuid(&self.element_id)?,
      courseware_element_type: decode_element_type(&self.element_type)?,
      evaluation_id:           decode_uuid(&self.evaluation_id)?,
      document_id:             decode_uuid(&self.document_id)?,
      document_version_id:     decode_uuid(&self.document_version_id)?,
      document_item_id:        decode_uuid(&self.document_item_id)?,
      attempt_id:              decode_uuid(&self.attempt_id)?,
      value:                   self.value,
      confidence:              self.confidence,
      recorded_at:             decode_dt(&self.recorded_at)?,
    })
  }
}
