//! Published courseware and competency documents.
//!
//! The engine only reads these tables. The `insert_*` methods are the write
//! side used by whatever publishes a deployment into this store (and by
//! tests); they never touch learner records.

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tally_core::{
  courseware::{CoursewareElement, CoursewareElementType, LearnerPathway},
  store::{CompetencyGraph, CoursewareGraph},
};

use crate::{
  Result, SqliteStore,
  encode::{RawElement, decode_uuid, encode_uuid},
};

// ─── Writers ─────────────────────────────────────────────────────────────────

impl SqliteStore {
  async fn insert_element(
    &self,
    deployment_id: Uuid,
    element:       CoursewareElement,
    parent_id:     Option<Uuid>,
    config_json:   Option<String>,
  ) -> Result<()> {
    let deployment_id_str = encode_uuid(deployment_id);
    let element_id_str    = encode_uuid(element.element_id);
    let element_type_str  = element.element_type.as_ref().to_owned();
    let parent_id_str     = parent_id.map(encode_uuid);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO courseware_elements (
             deployment_id, element_id, element_type, parent_id, config_json
           ) VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            deployment_id_str,
            element_id_str,
            element_type_str,
            parent_id_str,
            config_json,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Publish an activity. `parent_pathway_id` is `None` for the root.
  pub async fn insert_activity(
    &self,
    deployment_id:     Uuid,
    activity_id:       Uuid,
    parent_pathway_id: Option<Uuid>,
  ) -> Result<()> {
    self
      .insert_element(
        deployment_id,
        CoursewareElement::activity(activity_id),
        parent_pathway_id,
        None,
      )
      .await
  }

  /// Publish a pathway under an activity.
  pub async fn insert_pathway(
    &self,
    deployment_id:      Uuid,
    pathway:            &LearnerPathway,
    parent_activity_id: Uuid,
  ) -> Result<()> {
    let config_json = serde_json::to_string(&pathway.config)?;
    self
      .insert_element(
        deployment_id,
        CoursewareElement::pathway(pathway.pathway_id),
        Some(parent_activity_id),
        Some(config_json),
      )
      .await
  }

  /// Publish an interactive under a pathway.
  pub async fn insert_interactive(
    &self,
    deployment_id:     Uuid,
    interactive_id:    Uuid,
    parent_pathway_id: Uuid,
  ) -> Result<()> {
    self
      .insert_element(
        deployment_id,
        CoursewareElement::interactive(interactive_id),
        Some(parent_pathway_id),
        None,
      )
      .await
  }

  /// Publish (or republish) a competency document at `version_id`.
  pub async fn insert_document(
    &self,
    document_id: Uuid,
    version_id:  Uuid,
  ) -> Result<()> {
    let document_id_str = encode_uuid(document_id);
    let version_id_str  = encode_uuid(version_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (document_id, version_id) VALUES (?1, ?2)
           ON CONFLICT (document_id) DO UPDATE SET version_id = excluded.version_id",
          rusqlite::params![document_id_str, version_id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Record that `child_item_id` IS_CHILD_OF `parent_item_id`.
  pub async fn associate_items(
    &self,
    document_id:    Uuid,
    child_item_id:  Uuid,
    parent_item_id: Uuid,
  ) -> Result<()> {
    let document_id_str = encode_uuid(document_id);
    let child_str       = encode_uuid(child_item_id);
    let parent_str      = encode_uuid(parent_item_id);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO item_associations (
             document_id, child_item_id, parent_item_id
           ) VALUES (?1, ?2, ?3)",
          rusqlite::params![document_id_str, child_str, parent_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Readers ───────────────────────────────────────────────────────────────

  /// The parent of `element_id` if it has the given type.
  async fn find_parent_of_type(
    &self,
    element_id:    Uuid,
    deployment_id: Uuid,
    parent_type:   CoursewareElementType,
  ) -> Result<Option<Uuid>> {
    let deployment_id_str = encode_uuid(deployment_id);
    let element_id_str    = encode_uuid(element_id);
    let parent_type_str   = parent_type.as_ref().to_owned();

    let parent: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT p.element_id
             FROM courseware_elements c
             JOIN courseware_elements p
               ON p.deployment_id = c.deployment_id AND p.element_id = c.parent_id
             WHERE c.deployment_id = ?1
               AND c.element_id    = ?2
               AND p.element_type  = ?3",
            rusqlite::params![deployment_id_str, element_id_str, parent_type_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    parent.as_deref().map(decode_uuid).transpose()
  }

  /// Children of `parent_id` whose type is one of `types`, in publish order.
  async fn find_children(
    &self,
    parent_id:     Uuid,
    deployment_id: Uuid,
    types:         &'static str,
  ) -> Result<Vec<CoursewareElement>> {
    let deployment_id_str = encode_uuid(deployment_id);
    let parent_id_str     = encode_uuid(parent_id);
    let sql = format!(
      "SELECT element_id, element_type
       FROM courseware_elements
       WHERE deployment_id = ?1 AND parent_id = ?2 AND element_type IN ({types})
       ORDER BY rowid"
    );

    let raws: Vec<RawElement> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![deployment_id_str, parent_id_str], |row| {
            Ok(RawElement {
              element_id:   row.get(0)?,
              element_type: row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawElement::into_element).collect()
  }

  async fn query_item_ids(
    &self,
    sql:         &'static str,
    document_id: Uuid,
    item_id:     Uuid,
  ) -> Result<Vec<Uuid>> {
    let document_id_str = encode_uuid(document_id);
    let item_id_str     = encode_uuid(item_id);

    let ids: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params![document_id_str, item_id_str], |row| {
            row.get::<_, String>(0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    ids.iter().map(|s| decode_uuid(s)).collect()
  }
}

// ─── CoursewareGraph impl ────────────────────────────────────────────────────

impl CoursewareGraph for SqliteStore {
  async fn find_parent_pathway_id(
    &self,
    walkable_id:   Uuid,
    deployment_id: Uuid,
  ) -> Result<Option<Uuid>> {
    self
      .find_parent_of_type(walkable_id, deployment_id, CoursewareElementType::Pathway)
      .await
  }

  async fn find_parent_activity_id(
    &self,
    pathway_id:    Uuid,
    deployment_id: Uuid,
  ) -> Result<Option<Uuid>> {
    self
      .find_parent_of_type(pathway_id, deployment_id, CoursewareElementType::Activity)
      .await
  }

  async fn find_walkables(
    &self,
    pathway_id:    Uuid,
    deployment_id: Uuid,
  ) -> Result<Vec<CoursewareElement>> {
    self
      .find_children(pathway_id, deployment_id, "'ACTIVITY', 'INTERACTIVE'")
      .await
  }

  async fn find_child_pathway_ids(
    &self,
    activity_id:   Uuid,
    deployment_id: Uuid,
  ) -> Result<Vec<Uuid>> {
    let pathways = self
      .find_children(activity_id, deployment_id, "'PATHWAY'")
      .await?;
    Ok(pathways.into_iter().map(|p| p.element_id).collect())
  }

  async fn find_pathway(
    &self,
    pathway_id:    Uuid,
    deployment_id: Uuid,
  ) -> Result<Option<LearnerPathway>> {
    let deployment_id_str = encode_uuid(deployment_id);
    let pathway_id_str    = encode_uuid(pathway_id);

    let config_json: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT config_json FROM courseware_elements
             WHERE deployment_id = ?1 AND element_id = ?2
               AND element_type = 'PATHWAY' AND config_json IS NOT NULL",
            rusqlite::params![deployment_id_str, pathway_id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    let Some(json) = config_json else {
      return Ok(None);
    };
    Ok(Some(LearnerPathway {
      pathway_id,
      config: serde_json::from_str(&json)?,
    }))
  }
}

// ─── CompetencyGraph impl ────────────────────────────────────────────────────

impl CompetencyGraph for SqliteStore {
  async fn find_parent_item_ids(
    &self,
    document_id: Uuid,
    item_id:     Uuid,
  ) -> Result<Vec<Uuid>> {
    self
      .query_item_ids(
        "SELECT parent_item_id FROM item_associations
         WHERE document_id = ?1 AND child_item_id = ?2
         ORDER BY rowid",
        document_id,
        item_id,
      )
      .await
  }

  async fn find_child_item_ids(
    &self,
    document_id: Uuid,
    item_id:     Uuid,
  ) -> Result<Vec<Uuid>> {
    self
      .query_item_ids(
        "SELECT child_item_id FROM item_associations
         WHERE document_id = ?1 AND parent_item_id = ?2
         ORDER BY rowid",
        document_id,
        item_id,
      )
      .await
  }

  async fn find_document_version_id(&self, document_id: Uuid) -> Result<Option<Uuid>> {
    let document_id_str = encode_uuid(document_id);

    let version: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT version_id FROM documents WHERE document_id = ?1",
            rusqlite::params![document_id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    version.as_deref().map(decode_uuid).transpose()
  }
}
