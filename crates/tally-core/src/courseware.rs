//! Courseware references: the read-only tree the learner walks.
//!
//! Elements are identity-only: the engine never needs their content, only
//! their type and where they sit in the published tree. Pathways additionally
//! carry the configuration their progress state machine runs against.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Element identity ────────────────────────────────────────────────────────

/// The kind of node a courseware element is.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CoursewareElementType {
  Activity,
  Pathway,
  Interactive,
  Component,
  Feedback,
  Scenario,
}

impl CoursewareElementType {
  /// Walkables are the elements a student can progress through.
  pub fn is_walkable(self) -> bool {
    matches!(self, Self::Activity | Self::Interactive)
  }

  /// Whether attempts are tracked for elements of this type.
  pub fn has_attempts(self) -> bool {
    matches!(self, Self::Activity | Self::Pathway | Self::Interactive)
  }
}

/// A reference to a node in a published courseware tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoursewareElement {
  pub element_id:   Uuid,
  pub element_type: CoursewareElementType,
}

impl CoursewareElement {
  pub fn new(element_id: Uuid, element_type: CoursewareElementType) -> Self {
    Self { element_id, element_type }
  }

  pub fn activity(element_id: Uuid) -> Self {
    Self::new(element_id, CoursewareElementType::Activity)
  }

  pub fn pathway(element_id: Uuid) -> Self {
    Self::new(element_id, CoursewareElementType::Pathway)
  }

  pub fn interactive(element_id: Uuid) -> Self {
    Self::new(element_id, CoursewareElementType::Interactive)
  }
}

// ─── Deployment ──────────────────────────────────────────────────────────────

/// An immutable published snapshot of a courseware tree. Supplied by the
/// publishing pipeline and threaded through every call unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
  pub deployment_id:    Uuid,
  /// Distinguishes republished revisions of the same deployment.
  pub change_id:        Uuid,
  pub root_activity_id: Uuid,
  pub cohort_id:        Uuid,
}

// ─── Pathways ────────────────────────────────────────────────────────────────

/// The declared type of a pathway; selects its progress state machine.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PathwayType {
  Linear,
  Random,
  Graph,
  Bkt,
}

/// A document item that a BKT pathway awards on mastery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentItemRef {
  pub document_id:      Uuid,
  pub document_item_id: Uuid,
}

fn default_mastery_threshold() -> f64 { 0.95 }

/// Parameters of a Bayesian Knowledge Tracing pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BktConfig {
  /// Prior probability that the skill is already known.
  pub p_l0:              f64,
  pub p_guess:           f64,
  pub p_slip:            f64,
  /// Probability of learning the skill after an observation.
  pub p_transit:         f64,
  /// Exit after this many observations; `0` disables the limit.
  pub exit_after:        u32,
  /// Consecutive observations `p_ln` must stay at or above the threshold.
  pub maintain_for:      u32,
  #[serde(default = "default_mastery_threshold")]
  pub mastery_threshold: f64,
  /// Items awarded when the pathway exits.
  #[serde(default)]
  pub competency:        Vec<DocumentItemRef>,
}

impl BktConfig {
  /// Reject probabilities outside `[0, 1]`.
  pub fn validate(&self) -> Result<()> {
    for (name, value) in [
      ("p_l0", self.p_l0),
      ("p_guess", self.p_guess),
      ("p_slip", self.p_slip),
      ("p_transit", self.p_transit),
      ("mastery_threshold", self.mastery_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(Error::ProbabilityOutOfRange { name, value });
      }
    }
    Ok(())
  }
}

/// Type-specific configuration of a pathway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathwayConfig {
  Linear,
  Random {
    /// Number of completed walkables after which the pathway exits.
    exit_after: u32,
  },
  Graph {
    starting_walkable_id: Option<Uuid>,
  },
  Bkt(BktConfig),
}

impl PathwayConfig {
  pub fn pathway_type(&self) -> PathwayType {
    match self {
      Self::Linear => PathwayType::Linear,
      Self::Random { .. } => PathwayType::Random,
      Self::Graph { .. } => PathwayType::Graph,
      Self::Bkt(_) => PathwayType::Bkt,
    }
  }
}

/// A pathway as read from the published tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerPathway {
  pub pathway_id: Uuid,
  pub config:     PathwayConfig,
}

impl LearnerPathway {
  pub fn pathway_type(&self) -> PathwayType { self.config.pathway_type() }
}
