//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
///
/// Learner tables are strictly append-only: no UPDATE or DELETE is ever
/// issued against them. The `seq` column records creation order and is what
/// "latest" means everywhere.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Published courseware (read-only to the engine) ──────────────────────────

CREATE TABLE IF NOT EXISTS courseware_elements (
    deployment_id TEXT NOT NULL,
    element_id    TEXT NOT NULL,
    element_type  TEXT NOT NULL,   -- 'ACTIVITY' | 'PATHWAY' | 'INTERACTIVE' | ...
    parent_id     TEXT,            -- NULL for the root activity
    config_json   TEXT,            -- PathwayConfig for pathways, else NULL
    PRIMARY KEY (deployment_id, element_id)
);

CREATE TABLE IF NOT EXISTS documents (
    document_id TEXT PRIMARY KEY,
    version_id  TEXT NOT NULL
);

-- child IS_CHILD_OF parent
CREATE TABLE IF NOT EXISTS item_associations (
    document_id    TEXT NOT NULL,
    child_item_id  TEXT NOT NULL,
    parent_item_id TEXT NOT NULL,
    UNIQUE (document_id, child_item_id, parent_item_id)
);

-- ── Learner state (append-only) ─────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS attempts (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id    TEXT NOT NULL UNIQUE,
    deployment_id TEXT NOT NULL,
    student_id    TEXT NOT NULL,
    element_id    TEXT NOT NULL,
    element_type  TEXT NOT NULL,
    parent_id     TEXT,
    value         INTEGER NOT NULL CHECK (value >= 1),
    recorded_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS progress (
    seq                   INTEGER PRIMARY KEY AUTOINCREMENT,
    progress_id           TEXT NOT NULL UNIQUE,
    deployment_id         TEXT NOT NULL,
    change_id             TEXT NOT NULL,
    element_id            TEXT NOT NULL,
    element_type          TEXT NOT NULL,
    student_id            TEXT NOT NULL,
    attempt_id            TEXT NOT NULL REFERENCES attempts(attempt_id),
    evaluation_id         TEXT NOT NULL,
    completion_value      REAL NOT NULL,
    completion_confidence REAL NOT NULL,
    progress_type         TEXT NOT NULL,   -- discriminant of ProgressDetail
    detail_json           TEXT NOT NULL,   -- JSON payload (inner data only)
    recorded_at           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS score_entries (
    seq                INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id           TEXT NOT NULL UNIQUE,
    deployment_id      TEXT NOT NULL,
    change_id          TEXT NOT NULL,
    cohort_id          TEXT NOT NULL,
    student_id         TEXT NOT NULL,
    attempt_id         TEXT NOT NULL REFERENCES attempts(attempt_id),
    element_id         TEXT NOT NULL,
    element_type       TEXT NOT NULL,
    operator           TEXT NOT NULL,   -- 'ADD' | 'SET' | 'REMOVE'
    value              REAL NOT NULL,
    adjustment_value   REAL NOT NULL,
    source_element_id  TEXT NOT NULL,
    source_scenario_id TEXT,
    source_account_id  TEXT NOT NULL,
    evaluation_id      TEXT NOT NULL,
    recorded_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS competency_met (
    seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
    award_id            TEXT NOT NULL UNIQUE,
    student_id          TEXT NOT NULL,
    deployment_id       TEXT NOT NULL,
    change_id           TEXT NOT NULL,
    element_id          TEXT NOT NULL,
    element_type        TEXT NOT NULL,
    evaluation_id       TEXT NOT NULL,
    document_id         TEXT NOT NULL,
    document_version_id TEXT NOT NULL,
    document_item_id    TEXT NOT NULL,
    attempt_id          TEXT NOT NULL,
    value               REAL NOT NULL CHECK (value BETWEEN 0 AND 1),
    confidence          REAL NOT NULL CHECK (confidence BETWEEN 0 AND 1),
    recorded_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS elements_parent_idx   ON courseware_elements(deployment_id, parent_id);
CREATE INDEX IF NOT EXISTS associations_child_idx  ON item_associations(document_id, child_item_id);
CREATE INDEX IF NOT EXISTS associations_parent_idx ON item_associations(document_id, parent_item_id);
CREATE INDEX IF NOT EXISTS attempts_key_idx      ON attempts(deployment_id, element_id, student_id);
CREATE INDEX IF NOT EXISTS progress_key_idx      ON progress(deployment_id, element_id, student_id);
CREATE INDEX IF NOT EXISTS progress_attempt_idx  ON progress(attempt_id);
CREATE INDEX IF NOT EXISTS scores_key_idx        ON score_entries(deployment_id, student_id, element_id, attempt_id);
CREATE INDEX IF NOT EXISTS competency_key_idx    ON competency_met(student_id, document_id, document_item_id);

PRAGMA user_version = 1;
";
