use crate::db::{new_id, parse_col};
use crate::error::{CarecompError, Result};
use crate::facility::Facility;
use crate::paths;
use crate::status::derive_for_date;
use crate::types::{DeficiencyStatus, DueStatus, PocStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyDeficiency {
    pub id: String,
    pub org_id: String,
    pub facility_id: String,
    pub tag_code: String,
    pub severity: String,
    pub scope: String,
    pub narrative: String,
    pub survey_date: NaiveDate,
    pub status: DeficiencyStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeficiencyInput {
    pub facility_id: String,
    pub tag_code: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub narrative: String,
    pub survey_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeficiencyFilter {
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub status: Option<DeficiencyStatus>,
}

/// A deficiency as the survey board shows it: with its plan's status and
/// target date, and a due status derived from that target date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardRow {
    #[serde(flatten)]
    pub deficiency: SurveyDeficiency,
    pub facility_name: String,
    pub poc_status: Option<PocStatus>,
    pub target_date: Option<NaiveDate>,
    pub due_status: DueStatus,
}

const COLUMNS: &str = "d.id, d.org_id, d.facility_id, d.tag_code, d.severity, d.scope, \
                       d.narrative, d.survey_date, d.status, d.created_at";

impl SurveyDeficiency {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            facility_id: row.get(2)?,
            tag_code: row.get(3)?,
            severity: row.get(4)?,
            scope: row.get(5)?,
            narrative: row.get(6)?,
            survey_date: row.get(7)?,
            status: parse_col(row, 8)?,
            created_at: row.get(9)?,
        })
    }

    pub fn create(conn: &Connection, org_id: &str, input: DeficiencyInput) -> Result<Self> {
        Facility::load(conn, org_id, &input.facility_id)?;
        let survey_date = input
            .survey_date
            .ok_or_else(|| CarecompError::validation("survey_date", "is required"))?;

        let deficiency = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            facility_id: input.facility_id,
            tag_code: paths::normalize_tag_code(&input.tag_code)?,
            severity: input.severity.trim().to_string(),
            scope: input.scope.trim().to_string(),
            narrative: input.narrative,
            survey_date,
            status: DeficiencyStatus::Open,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO deficiencies(id, org_id, facility_id, tag_code, severity, scope,
                 narrative, survey_date, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                deficiency.id,
                deficiency.org_id,
                deficiency.facility_id,
                deficiency.tag_code,
                deficiency.severity,
                deficiency.scope,
                deficiency.narrative,
                deficiency.survey_date,
                deficiency.status.as_str(),
                deficiency.created_at
            ],
        )?;
        Ok(deficiency)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM deficiencies d WHERE d.org_id = ?1 AND d.id = ?2"),
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::DeficiencyNotFound(id.to_string()))
    }

    pub fn list(conn: &Connection, org_id: &str, filter: &DeficiencyFilter) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM deficiencies d
             WHERE d.org_id = ?1
               AND (?2 IS NULL OR d.facility_id = ?2)
               AND (?3 IS NULL OR d.status = ?3)
             ORDER BY d.survey_date DESC, d.tag_code"
        ))?;
        let rows = stmt.query_map(
            params![
                org_id,
                filter.facility_id,
                filter.status.map(DeficiencyStatus::as_str)
            ],
            Self::from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Survey board: deficiencies joined with their facility and plan.
    pub fn board(
        conn: &Connection,
        org_id: &str,
        filter: &DeficiencyFilter,
        today: NaiveDate,
        window: i64,
    ) -> Result<Vec<BoardRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS}, f.name, p.status, p.target_date
             FROM deficiencies d
             JOIN facilities f ON f.id = d.facility_id AND f.org_id = d.org_id
             LEFT JOIN plans_of_correction p ON p.deficiency_id = d.id AND p.org_id = d.org_id
             WHERE d.org_id = ?1
               AND (?2 IS NULL OR d.facility_id = ?2)
               AND (?3 IS NULL OR d.status = ?3)
             ORDER BY p.target_date IS NULL, p.target_date, d.survey_date DESC"
        ))?;
        let rows = stmt.query_map(
            params![
                org_id,
                filter.facility_id,
                filter.status.map(DeficiencyStatus::as_str)
            ],
            |row| {
                let deficiency = Self::from_row(row)?;
                let poc_status: Option<String> = row.get(11)?;
                let poc_status = poc_status
                    .map(|s| s.parse::<PocStatus>())
                    .transpose()
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            11,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                let target_date: Option<NaiveDate> = row.get(12)?;
                let due_status = derive_for_date(
                    deficiency.status == DeficiencyStatus::Resolved,
                    target_date,
                    today,
                    window,
                );
                Ok(BoardRow {
                    deficiency,
                    facility_name: row.get(10)?,
                    poc_status,
                    target_date,
                    due_status,
                })
            },
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn update(conn: &Connection, org_id: &str, id: &str, input: DeficiencyInput) -> Result<Self> {
        let mut deficiency = Self::load(conn, org_id, id)?;
        Facility::load(conn, org_id, &input.facility_id)?;
        deficiency.facility_id = input.facility_id;
        deficiency.tag_code = paths::normalize_tag_code(&input.tag_code)?;
        deficiency.severity = input.severity.trim().to_string();
        deficiency.scope = input.scope.trim().to_string();
        deficiency.narrative = input.narrative;
        if let Some(date) = input.survey_date {
            deficiency.survey_date = date;
        }
        conn.execute(
            "UPDATE deficiencies SET facility_id = ?1, tag_code = ?2, severity = ?3, scope = ?4,
                 narrative = ?5, survey_date = ?6
             WHERE org_id = ?7 AND id = ?8",
            params![
                deficiency.facility_id,
                deficiency.tag_code,
                deficiency.severity,
                deficiency.scope,
                deficiency.narrative,
                deficiency.survey_date,
                org_id,
                id
            ],
        )?;
        Ok(deficiency)
    }

    pub fn set_status(conn: &Connection, org_id: &str, id: &str, status: DeficiencyStatus) -> Result<Self> {
        let n = conn.execute(
            "UPDATE deficiencies SET status = ?1 WHERE org_id = ?2 AND id = ?3",
            params![status.as_str(), org_id, id],
        )?;
        if n == 0 {
            return Err(CarecompError::DeficiencyNotFound(id.to_string()));
        }
        Self::load(conn, org_id, id)
    }

    /// Delete a deficiency and its plan of correction.
    pub fn delete(conn: &Connection, org_id: &str, id: &str) -> Result<()> {
        let n = conn.execute(
            "DELETE FROM deficiencies WHERE org_id = ?1 AND id = ?2",
            params![org_id, id],
        )?;
        if n == 0 {
            return Err(CarecompError::DeficiencyNotFound(id.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
