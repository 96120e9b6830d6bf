//! SQLite store: connection setup, schema, and row helpers.
//!
//! Every org-owned table carries an `org_id` column and every store function
//! filters on it. Child tables (stations, check-ins, sections, modules) hang
//! off an org-owned parent and are only reached through it.

use crate::error::Result;
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Open (or create) the instance database under `root`.
pub fn open(root: &Path) -> Result<Connection> {
    open_path(&crate::paths::db_path(root))
}

pub fn open_path(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        crate::io::ensure_dir(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    prepare(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    prepare(&conn)?;
    Ok(conn)
}

fn prepare(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    migrate(conn)
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |r| r.get(0))?)
}

/// Bring the schema up to [`SCHEMA_VERSION`]. Idempotent.
pub fn migrate(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.execute_batch("PRAGMA user_version = 1;")?;
    }
    Ok(())
}

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS organizations(
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    is_dev_org INTEGER NOT NULL DEFAULT 0,
    feature_flags TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS memberships(
    org_id TEXT NOT NULL,
    email TEXT NOT NULL,
    role TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY(org_id, email),
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS facilities(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    name TEXT NOT NULL,
    address_line TEXT,
    city TEXT,
    state TEXT,
    postal_code TEXT,
    bed_count INTEGER,
    created_at TEXT NOT NULL,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_facilities_org ON facilities(org_id);

CREATE TABLE IF NOT EXISTS staff(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    facility_id TEXT NOT NULL,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL,
    job_title TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    UNIQUE(org_id, email),
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY(facility_id) REFERENCES facilities(id)
);
CREATE INDEX IF NOT EXISTS idx_staff_org_facility ON staff(org_id, facility_id);

CREATE TABLE IF NOT EXISTS competencies(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    title TEXT NOT NULL,
    risk_level TEXT NOT NULL,
    applicable_roles TEXT NOT NULL DEFAULT '[]',
    setting TEXT,
    language TEXT NOT NULL DEFAULT 'en',
    sections TEXT NOT NULL DEFAULT '{}',
    archived INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_competencies_org ON competencies(org_id);

CREATE TABLE IF NOT EXISTS assignments(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    staff_id TEXT NOT NULL,
    competency_id TEXT NOT NULL,
    due_date TEXT,
    status TEXT NOT NULL,
    assigned_at TEXT NOT NULL,
    completed_at TEXT,
    notes TEXT,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY(staff_id) REFERENCES staff(id) ON DELETE CASCADE,
    FOREIGN KEY(competency_id) REFERENCES competencies(id)
);
CREATE INDEX IF NOT EXISTS idx_assignments_org_staff ON assignments(org_id, staff_id);
CREATE INDEX IF NOT EXISTS idx_assignments_competency ON assignments(competency_id);

CREATE TABLE IF NOT EXISTS deficiencies(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    facility_id TEXT NOT NULL,
    tag_code TEXT NOT NULL,
    severity TEXT NOT NULL,
    scope TEXT NOT NULL,
    narrative TEXT NOT NULL,
    survey_date TEXT NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY(facility_id) REFERENCES facilities(id)
);
CREATE INDEX IF NOT EXISTS idx_deficiencies_org ON deficiencies(org_id, facility_id);

CREATE TABLE IF NOT EXISTS plans_of_correction(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    deficiency_id TEXT NOT NULL UNIQUE,
    corrective_action TEXT NOT NULL,
    residents_affected TEXT NOT NULL DEFAULT '',
    systemic_changes TEXT NOT NULL DEFAULT '',
    monitoring TEXT NOT NULL DEFAULT '',
    responsible_party TEXT NOT NULL DEFAULT '',
    target_date TEXT,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY(deficiency_id) REFERENCES deficiencies(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS policies(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    facility_id TEXT,
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    file_url TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    version INTEGER NOT NULL DEFAULT 1,
    archived INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY(facility_id) REFERENCES facilities(id)
);
CREATE INDEX IF NOT EXISTS idx_policies_org ON policies(org_id);

CREATE TABLE IF NOT EXISTS drills(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    facility_id TEXT NOT NULL,
    drill_type TEXT NOT NULL,
    scheduled_for TEXT NOT NULL,
    started_at TEXT,
    ended_at TEXT,
    status TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY(facility_id) REFERENCES facilities(id)
);
CREATE INDEX IF NOT EXISTS idx_drills_org ON drills(org_id, facility_id);

CREATE TABLE IF NOT EXISTS drill_stations(
    id TEXT PRIMARY KEY,
    drill_id TEXT NOT NULL,
    name TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    FOREIGN KEY(drill_id) REFERENCES drills(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS drill_checkins(
    id TEXT PRIMARY KEY,
    drill_id TEXT NOT NULL,
    station_id TEXT,
    name TEXT NOT NULL,
    role TEXT NOT NULL,
    checked_in_at TEXT NOT NULL,
    FOREIGN KEY(drill_id) REFERENCES drills(id) ON DELETE CASCADE,
    FOREIGN KEY(station_id) REFERENCES drill_stations(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS tracks(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS track_sections(
    id TEXT PRIMARY KEY,
    track_id TEXT NOT NULL,
    title TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    FOREIGN KEY(track_id) REFERENCES tracks(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS track_modules(
    id TEXT PRIMARY KEY,
    section_id TEXT NOT NULL,
    title TEXT NOT NULL,
    competency_id TEXT,
    order_index INTEGER NOT NULL,
    FOREIGN KEY(section_id) REFERENCES track_sections(id) ON DELETE CASCADE,
    FOREIGN KEY(competency_id) REFERENCES competencies(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS track_assignments(
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL,
    staff_id TEXT NOT NULL,
    track_id TEXT NOT NULL,
    due_date TEXT,
    status TEXT NOT NULL,
    assigned_at TEXT NOT NULL,
    completed_at TEXT,
    FOREIGN KEY(org_id) REFERENCES organizations(id) ON DELETE CASCADE,
    FOREIGN KEY(staff_id) REFERENCES staff(id) ON DELETE CASCADE,
    FOREIGN KEY(track_id) REFERENCES tracks(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS module_completions(
    staff_id TEXT NOT NULL,
    module_id TEXT NOT NULL,
    status TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY(staff_id, module_id),
    FOREIGN KEY(staff_id) REFERENCES staff(id) ON DELETE CASCADE,
    FOREIGN KEY(module_id) REFERENCES track_modules(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS contact_messages(
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    organization TEXT,
    message TEXT NOT NULL,
    received_at TEXT NOT NULL
);
";

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Read a TEXT column through `FromStr` (status and role enums).
pub(crate) fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a TEXT column holding JSON.
pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
