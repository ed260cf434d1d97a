//! The SQLite implementation of [`LearnerStore`].

use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

use tally_core::{
  attempt::{Attempt, NewAttempt},
  competency::{CompetencyMet, NewCompetencyMet},
  progress::{NewProgress, Progress},
  score::{NewScoreEntry, StudentScoreEntry},
  store::{Backend, LearnerStore},
};

use crate::{
  Result,
  encode::{
    ATTEMPT_COLUMNS, COMPETENCY_COLUMNS, PROGRESS_COLUMNS, RawAttempt,
    RawCompetencyMet, RawProgress, RawScoreEntry, SCORE_COLUMNS, encode_dt,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Row queries ───────────────────────────────────────────────────────────
  //
  // `filter` is a static SQL fragment (WHERE clause plus ordering); all
  // caller-provided values travel as bound parameters.

  async fn query_attempts(
    &self,
    filter: &'static str,
    args:   Vec<String>,
  ) -> Result<Vec<Attempt>> {
    let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE {filter}");
    let raws: Vec<RawAttempt> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), RawAttempt::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAttempt::into_attempt).collect()
  }

  async fn query_progress(
    &self,
    filter: &'static str,
    args:   Vec<String>,
  ) -> Result<Vec<Progress>> {
    let sql = format!("SELECT {PROGRESS_COLUMNS} FROM progress WHERE {filter}");
    let raws: Vec<RawProgress> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), RawProgress::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawProgress::into_progress).collect()
  }

  async fn query_score_entries(
    &self,
    filter: &'static str,
    args:   Vec<String>,
  ) -> Result<Vec<StudentScoreEntry>> {
    let sql = format!("SELECT {SCORE_COLUMNS} FROM score_entries WHERE {filter}");
    let raws: Vec<RawScoreEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args.iter()), RawScoreEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawScoreEntry::into_entry).collect()
  }

  async fn query_competency(
    &self,
    filter: &'static str,
    args:   Vec<String>,
  ) -> Result<Vec<CompetencyMet>> {
    let sql =
      format!("SELECT {COMPETENCY_COLUMNS} FROM competency_met WHERE {filter}");
    let raws: Vec<RawCompetencyMet> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params_from_iter(args.iter()),
            RawCompetencyMet::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawCompetencyMet::into_award).collect()
  }
}

// ─── LearnerStore impl ───────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = crate::Error;
}

impl LearnerStore for SqliteStore {
  // ── Attempts ──────────────────────────────────────────────────────────────

  async fn record_attempt(&self, input: NewAttempt) -> Result<Attempt> {
    let attempt = Attempt {
      id:                      Uuid::new_v4(),
      deployment_id:           input.deployment_id,
      student_id:              input.student_id,
      courseware_element_id:   input.courseware_element_id,
      courseware_element_type: input.courseware_element_type,
      parent_id:               input.parent_id,
      value:                   input.value,
      recorded_at:             Utc::now(),
    };

    let attempt_id_str    = encode_uuid(attempt.id);
    let deployment_id_str = encode_uuid(attempt.deployment_id);
    let student_id_str    = encode_uuid(attempt.student_id);
    let element_id_str    = encode_uuid(attempt.courseware_element_id);
    let element_type_str  = attempt.courseware_element_type.as_ref().to_owned();
    let parent_id_str     = attempt.parent_id.map(encode_uuid);
    let value             = attempt.value;
    let recorded_at_str   = encode_dt(attempt.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO attempts (
             attempt_id, deployment_id, student_id, element_id, element_type,
             parent_id, value, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            attempt_id_str,
            deployment_id_str,
            student_id_str,
            element_id_str,
            element_type_str,
            parent_id_str,
            value,
            recorded_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(attempt)
  }

  async fn get_attempt(&self, id: Uuid) -> Result<Option<Attempt>> {
    let found = self
      .query_attempts("attempt_id = ?1", vec![encode_uuid(id)])
      .await?;
    Ok(found.into_iter().next())
  }

  async fn find_latest_attempt(
    &self,
    deployment_id: Uuid,
    element_id:    Uuid,
    student_id:    Uuid,
  ) -> Result<Option<Attempt>> {
    let found = self
      .query_attempts(
        "deployment_id = ?1 AND element_id = ?2 AND student_id = ?3
         ORDER BY seq DESC LIMIT 1",
        vec![
          encode_uuid(deployment_id),
          encode_uuid(element_id),
          encode_uuid(student_id),
        ],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  // ── Progress ──────────────────────────────────────────────────────────────

  async fn record_progress(&self, input: NewProgress) -> Result<Progress> {
    let progress = Progress {
      id:                      Uuid::new_v4(),
      deployment_id:           input.deployment_id,
      change_id:               input.change_id,
      courseware_element_id:   input.courseware_element_id,
      courseware_element_type: input.courseware_element_type,
      student_id:              input.student_id,
      attempt_id:              input.attempt_id,
      evaluation_id:           input.evaluation_id,
      completion:              input.completion,
      detail:                  input.detail,
      recorded_at:             Utc::now(),
    };

    let progress_id_str   = encode_uuid(progress.id);
    let deployment_id_str = encode_uuid(progress.deployment_id);
    let change_id_str     = encode_uuid(progress.change_id);
    let element_id_str    = encode_uuid(progress.courseware_element_id);
    let element_type_str  = progress.courseware_element_type.as_ref().to_owned();
    let student_id_str    = encode_uuid(progress.student_id);
    let attempt_id_str    = encode_uuid(progress.attempt_id);
    let evaluation_id_str = encode_uuid(progress.evaluation_id);
    let value             = progress.completion.value;
    let confidence        = progress.completion.confidence;
    let progress_type     = progress.detail.discriminant().to_owned();
    let detail_json_str   = progress.detail.to_json()?.to_string();
    let recorded_at_str   = encode_dt(progress.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO progress (
             progress_id, deployment_id, change_id, element_id, element_type,
             student_id, attempt_id, evaluation_id, completion_value,
             completion_confidence, progress_type, detail_json, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            progress_id_str,
            deployment_id_str,
            change_id_str,
            element_id_str,
            element_type_str,
            student_id_str,
            attempt_id_str,
            evaluation_id_str,
            value,
            confidence,
            progress_type,
            detail_json_str,
            recorded_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(progress)
  }

  async fn find_latest_progress(
    &self,
    deployment_id: Uuid,
    element_id:    Uuid,
    student_id:    Uuid,
  ) -> Result<Option<Progress>> {
    let found = self
      .query_progress(
        "deployment_id = ?1 AND element_id = ?2 AND student_id = ?3
         ORDER BY seq DESC LIMIT 1",
        vec![
          encode_uuid(deployment_id),
          encode_uuid(element_id),
          encode_uuid(student_id),
        ],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  async fn find_latest_progress_for_attempt(
    &self,
    deployment_id: Uuid,
    element_id:    Uuid,
    attempt_id:    Uuid,
  ) -> Result<Option<Progress>> {
    let found = self
      .query_progress(
        "deployment_id = ?1 AND element_id = ?2 AND attempt_id = ?3
         ORDER BY seq DESC LIMIT 1",
        vec![
          encode_uuid(deployment_id),
          encode_uuid(element_id),
          encode_uuid(attempt_id),
        ],
      )
      .await?;
    Ok(found.into_iter().next())
  }

  // ── Scores ────────────────────────────────────────────────────────────────

  async fn record_score_entry(
    &self,
    input: NewScoreEntry,
  ) -> Result<StudentScoreEntry> {
    let entry = StudentScoreEntry {
      id:                 Uuid::new_v4(),
      deployment_id:      input.deployment_id,
      change_id:          input.change_id,
      cohort_id:          input.cohort_id,
      student_id:         input.student_id,
      attempt_id:         input.attempt_id,
      element_id:         input.element_id,
      element_type:       input.element_type,
      operator:           input.operator,
      value:              input.value,
      adjustment_value:   input.adjustment_value,
      source_element_id:  input.source_element_id,
      source_scenario_id: input.source_scenario_id,
      source_account_id:  input.source_account_id,
      evaluation_id:      input.evaluation_id,
      recorded_at:        Utc::now(),
    };

    let entry_id_str          = encode_uuid(entry.id);
    let deployment_id_str     = encode_uuid(entry.deployment_id);
    let change_id_str         = encode_uuid(entry.change_id);
    let cohort_id_str         = encode_uuid(entry.cohort_id);
    let student_id_str        = encode_uuid(entry.student_id);
    let attempt_id_str        = encode_uuid(entry.attempt_id);
    let element_id_str        = encode_uuid(entry.element_id);
    let element_type_str      = entry.element_type.as_ref().to_owned();
    let operator_str          = entry.operator.as_ref().to_owned();
    let value                 = entry.value;
    let adjustment_value      = entry.adjustment_value;
    let source_element_id_str = encode_uuid(entry.source_element_id);
    let source_scenario_str   = entry.source_scenario_id.map(encode_uuid);
    let source_account_str    = encode_uuid(entry.source_account_id);
    let evaluation_id_str     = encode_uuid(entry.evaluation_id);
    let recorded_at_str       = encode_dt(entry.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO score_entries (
             entry_id, deployment_id, change_id, cohort_id, student_id,
             attempt_id, element_id, element_type, operator, value,
             adjustment_value, source_element_id, source_scenario_id,
             source_account_id, evaluation_id, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
          rusqlite::params![
            entry_id_str,
            deployment_id_str,
            change_id_str,
            cohort_id_str,
            student_id_str,
            attempt_id_str,
            element_id_str,
            element_type_str,
            operator_str,
            value,
            adjustment_value,
            source_element_id_str,
            source_scenario_str,
            source_account_str,
            evaluation_id_str,
            recorded_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn find_score_entries(
    &self,
    deployment_id: Uuid,
    student_id:    Uuid,
    element_id:    Uuid,
    attempt_id:    Uuid,
  ) -> Result<Vec<StudentScoreEntry>> {
    self
      .query_score_entries(
        "deployment_id = ?1 AND student_id = ?2 AND element_id = ?3
         AND attempt_id = ?4
         ORDER BY seq ASC",
        vec![
          encode_uuid(deployment_id),
          encode_uuid(student_id),
          encode_uuid(element_id),
          encode_uuid(attempt_id),
        ],
      )
      .await
  }

  // ── Competency ────────────────────────────────────────────────────────────

  async fn record_competency_met(
    &self,
    input: NewCompetencyMet,
  ) -> Result<CompetencyMet> {
    let award = CompetencyMet {
      id:                      Uuid::new_v4(),
      student_id:              input.student_id,
      deployment_id:           input.deployment_id,
      change_id:               input.change_id,
      courseware_element_id:   input.courseware_element_id,
      courseware_element_type: input.courseware_element_type,
      evaluation_id:           input.evaluation_id,
      document_id:             input.document_id,
      document_version_id:     input.document_version_id,
      document_item_id:        input.document_item_id,
      attempt_id:              input.attempt_id,
      value:                   input.value,
      confidence:              input.confidence,
      recorded_at:             Utc::now(),
    };

    let award_id_str         = encode_uuid(award.id);
    let student_id_str       = encode_uuid(award.student_id);
    let deployment_id_str    = encode_uuid(award.deployment_id);
    let change_id_str        = encode_uuid(award.change_id);
    let element_id_str       = encode_uuid(award.courseware_element_id);
    let element_type_str     = award.courseware_element_type.as_ref().to_owned();
    let evaluation_id_str    = encode_uuid(award.evaluation_id);
    let document_id_str      = encode_uuid(award.document_id);
    let document_version_str = encode_uuid(award.document_version_id);
    let document_item_str    = encode_uuid(award.document_item_id);
    let attempt_id_str       = encode_uuid(award.attempt_id);
    let value                = award.value;
    let confidence           = award.confidence;
    let recorded_at_str      = encode_dt(award.recorded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO competency_met (
             award_id, student_id, deployment_id, change_id, element_id,
             element_type, evaluation_id, document_id, document_version_id,
             document_item_id, attempt_id, value, confidence, recorded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          rusqlite::params![
            award_id_str,
            student_id_str,
            deployment_id_str,
            change_id_str,
            element_id_str,
            element_type_str,
            evaluation_id_str,
            document_id_str,
            document_version_str,
            document_item_str,
            attempt_id_str,
            value,
            confidence,
            recorded_at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(award)
  }

  async fn find_latest_competency_met(
    &self,
    student_id:       Uuid,
    document_id:      Uuid,
    document_item_id: Uuid,
  ) -> Result<Option<CompetencyMet>> {
    let found = self
      .query_competency(
        "student_id = ?1 AND document_id = ?2 AND document_item_id = ?3
         ORDER BY seq DESC LIMIT 1",
        vec![
          encode_uuid(student_id),
          encode_uuid(document_id),
          encode_uuid(document_item_id),
        ],
      )
      .await?;
    Ok(found.into_iter().next())
  }
}
