use crate::db::new_id;
use crate::error::{CarecompError, Result};
use crate::facility::Facility;
use crate::paths;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub org_id: String,
    pub facility_id: String,
    pub full_name: String,
    pub email: String,
    pub job_title: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffInput {
    pub facility_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaffFilter {
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub active_only: bool,
}

const COLUMNS: &str = "id, org_id, facility_id, full_name, email, job_title, active, created_at";

impl StaffMember {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            facility_id: row.get(2)?,
            full_name: row.get(3)?,
            email: row.get(4)?,
            job_title: row.get(5)?,
            active: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn validate(conn: &Connection, org_id: &str, input: &StaffInput) -> Result<(String, String)> {
        let full_name = paths::required("full_name", &input.full_name)?;
        let email = paths::normalize_email(&input.email)?;
        Facility::load(conn, org_id, &input.facility_id)?;
        Ok((full_name, email))
    }

    fn ensure_email_free(conn: &Connection, org_id: &str, email: &str, except: Option<&str>) -> Result<()> {
        if let Some(existing) = Self::find_by_email(conn, org_id, email)? {
            if except != Some(existing.id.as_str()) {
                return Err(CarecompError::AlreadyExists(format!("staff member with email {email}")));
            }
        }
        Ok(())
    }

    pub fn create(conn: &Connection, org_id: &str, input: StaffInput) -> Result<Self> {
        let (full_name, email) = Self::validate(conn, org_id, &input)?;
        Self::ensure_email_free(conn, org_id, &email, None)?;

        let member = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            facility_id: input.facility_id,
            full_name,
            email,
            job_title: input.job_title,
            active: true,
            created_at: Utc::now(),
        };
        conn.execute(
            &format!("INSERT INTO staff({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                member.id,
                member.org_id,
                member.facility_id,
                member.full_name,
                member.email,
                member.job_title,
                member.active,
                member.created_at
            ],
        )?;
        Ok(member)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM staff WHERE org_id = ?1 AND id = ?2"),
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::StaffNotFound(id.to_string()))
    }

    /// Self-service lookup: the staff record whose email matches the caller.
    pub fn find_by_email(conn: &Connection, org_id: &str, email: &str) -> Result<Option<Self>> {
        let email = paths::normalize_email(email)?;
        Ok(conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM staff WHERE org_id = ?1 AND email = ?2"),
                params![org_id, email],
                Self::from_row,
            )
            .optional()?)
    }

    pub fn list(conn: &Connection, org_id: &str, filter: &StaffFilter) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM staff
             WHERE org_id = ?1
               AND (?2 IS NULL OR facility_id = ?2)
               AND (?3 = 0 OR active = 1)
             ORDER BY full_name"
        ))?;
        let rows = stmt.query_map(
            params![org_id, filter.facility_id, filter.active_only],
            Self::from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update(conn: &Connection, org_id: &str, id: &str, input: StaffInput) -> Result<Self> {
        Self::load(conn, org_id, id)?;
        let (full_name, email) = Self::validate(conn, org_id, &input)?;
        Self::ensure_email_free(conn, org_id, &email, Some(id))?;
        conn.execute(
            "UPDATE staff SET facility_id = ?1, full_name = ?2, email = ?3, job_title = ?4
             WHERE org_id = ?5 AND id = ?6",
            params![input.facility_id, full_name, email, input.job_title, org_id, id],
        )?;
        Self::load(conn, org_id, id)
    }

    pub fn set_active(conn: &Connection, org_id: &str, id: &str, active: bool) -> Result<Self> {
        let n = conn.execute(
            "UPDATE staff SET active = ?1 WHERE org_id = ?2 AND id = ?3",
            params![active, org_id, id],
        )?;
        if n == 0 {
            return Err(CarecompError::StaffNotFound(id.to_string()));
        }
        Self::load(conn, org_id, id)
    }

    /// Delete a staff member together with their assignments and completions.
    pub fn delete(conn: &Connection, org_id: &str, id: &str) -> Result<()> {
        let n = conn.execute(
            "DELETE FROM staff WHERE org_id = ?1 AND id = ?2",
            params![org_id, id],
        )?;
        if n == 0 {
            return Err(CarecompError::StaffNotFound(id.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
