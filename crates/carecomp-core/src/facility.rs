use crate::db::new_id;
use crate::error::{CarecompError, Result};
use crate::paths;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub address_line: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub bed_count: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Editable facility fields, shared by create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FacilityInput {
    pub name: String,
    #[serde(default)]
    pub address_line: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub bed_count: Option<u32>,
}

const COLUMNS: &str =
    "id, org_id, name, address_line, city, state, postal_code, bed_count, created_at";

impl Facility {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            name: row.get(2)?,
            address_line: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            postal_code: row.get(6)?,
            bed_count: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    pub fn create(conn: &Connection, org_id: &str, input: FacilityInput) -> Result<Self> {
        let facility = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            name: paths::required("name", &input.name)?,
            address_line: input.address_line,
            city: input.city,
            state: input.state,
            postal_code: input.postal_code,
            bed_count: input.bed_count,
            created_at: Utc::now(),
        };
        conn.execute(
            &format!("INSERT INTO facilities({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                facility.id,
                facility.org_id,
                facility.name,
                facility.address_line,
                facility.city,
                facility.state,
                facility.postal_code,
                facility.bed_count,
                facility.created_at
            ],
        )?;
        Ok(facility)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM facilities WHERE org_id = ?1 AND id = ?2"),
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::FacilityNotFound(id.to_string()))
    }

    pub fn list(conn: &Connection, org_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM facilities WHERE org_id = ?1 ORDER BY name"
        ))?;
        let rows = stmt.query_map(params![org_id], Self::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update(conn: &Connection, org_id: &str, id: &str, input: FacilityInput) -> Result<Self> {
        let name = paths::required("name", &input.name)?;
        let n = conn.execute(
            "UPDATE facilities SET name = ?1, address_line = ?2, city = ?3, state = ?4,
                 postal_code = ?5, bed_count = ?6
             WHERE org_id = ?7 AND id = ?8",
            params![
                name,
                input.address_line,
                input.city,
                input.state,
                input.postal_code,
                input.bed_count,
                org_id,
                id
            ],
        )?;
        if n == 0 {
            return Err(CarecompError::FacilityNotFound(id.to_string()));
        }
        Self::load(conn, org_id, id)
    }

    /// Delete a facility. Refused while staff, deficiencies or drills still
    /// point at it.
    pub fn delete(conn: &Connection, org_id: &str, id: &str) -> Result<()> {
        Self::load(conn, org_id, id)?;
        for (table, what) in [
            ("staff", "staff members"),
            ("deficiencies", "deficiencies"),
            ("drills", "drills"),
        ] {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE org_id = ?1 AND facility_id = ?2"),
                params![org_id, id],
                |r| r.get(0),
            )?;
            if count > 0 {
                return Err(CarecompError::InUse(format!(
                    "facility {id} still has {count} {what}"
                )));
            }
        }
        conn.execute(
            "UPDATE policies SET facility_id = NULL WHERE org_id = ?1 AND facility_id = ?2",
            params![org_id, id],
        )?;
        conn.execute(
            "DELETE FROM facilities WHERE org_id = ?1 AND id = ?2",
            params![org_id, id],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
