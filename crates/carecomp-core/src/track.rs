//! Learning tracks: an ordered curriculum of sections and modules, assigned
//! to staff as a whole and completed module by module.

use crate::assignment::parse_input_due_date;
use crate::competency::CompetencyTemplate;
use crate::db::{new_id, parse_col};
use crate::error::{CarecompError, Result};
use crate::paths;
use crate::progress::StatusSource;
use crate::status::derive_for_date;
use crate::staff::StaffMember;
use crate::types::{AssignmentStatus, DueStatus, ModuleStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub org_id: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSection {
    pub id: String,
    pub track_id: String,
    pub title: String,
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackModule {
    pub id: String,
    pub section_id: String,
    pub title: String,
    pub competency_id: Option<String>,
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionTree {
    #[serde(flatten)]
    pub section: TrackSection,
    pub modules: Vec<TrackModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackTree {
    #[serde(flatten)]
    pub track: Track,
    pub sections: Vec<SectionTree>,
}

impl TrackTree {
    pub fn module_count(&self) -> usize {
        self.sections.iter().map(|s| s.modules.len()).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAssignment {
    pub id: String,
    pub org_id: String,
    pub staff_id: String,
    pub track_id: String,
    pub due_date: Option<NaiveDate>,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TrackAssignment {
    pub fn due_status(&self, today: NaiveDate, window: i64) -> DueStatus {
        derive_for_date(
            self.status == AssignmentStatus::Completed,
            self.due_date,
            today,
            window,
        )
    }
}

impl StatusSource for TrackAssignment {
    fn raw_status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }
}

/// A track assignment as listed: who, which track, and where it stands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackAssignmentRow {
    #[serde(flatten)]
    pub assignment: TrackAssignment,
    pub staff_name: String,
    pub facility_id: String,
    pub track_title: String,
    pub due_status: DueStatus,
}

impl StatusSource for TrackAssignmentRow {
    fn raw_status(&self) -> Option<&str> {
        self.assignment.raw_status()
    }

    fn due_date(&self) -> Option<NaiveDate> {
        self.assignment.due_date
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackAssignmentFilter {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub track_id: Option<String>,
    #[serde(default)]
    pub due_status: Option<DueStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleCompletion {
    pub staff_id: String,
    pub module_id: String,
    pub status: ModuleStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackProgress {
    pub track_id: String,
    pub staff_id: String,
    pub completed_modules: usize,
    pub total_modules: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleInput {
    pub title: String,
    #[serde(default)]
    pub competency_id: Option<String>,
}

const TA_COLUMNS: &str =
    "id, org_id, staff_id, track_id, due_date, status, assigned_at, completed_at";
const TA_SELECT: &str =
    "a.id, a.org_id, a.staff_id, a.track_id, a.due_date, a.status, a.assigned_at, a.completed_at";

fn track_assignment_from_row(row: &Row<'_>) -> rusqlite::Result<TrackAssignment> {
    Ok(TrackAssignment {
        id: row.get(0)?,
        org_id: row.get(1)?,
        staff_id: row.get(2)?,
        track_id: row.get(3)?,
        due_date: row.get(4)?,
        status: parse_col(row, 5)?,
        assigned_at: row.get(6)?,
        completed_at: row.get(7)?,
    })
}

impl Track {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn create(conn: &Connection, org_id: &str, input: TrackInput) -> Result<Self> {
        let track = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            title: paths::required("title", &input.title)?,
            description: input.description,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO tracks(id, org_id, title, description, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![track.id, track.org_id, track.title, track.description, track.created_at],
        )?;
        Ok(track)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            "SELECT id, org_id, title, description, created_at FROM tracks WHERE org_id = ?1 AND id = ?2",
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::TrackNotFound(id.to_string()))
    }

    pub fn list(conn: &Connection, org_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, org_id, title, description, created_at FROM tracks
             WHERE org_id = ?1 ORDER BY title",
        )?;
        let rows = stmt.query_map(params![org_id], Self::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The track with its sections and modules, both in order.
    pub fn load_tree(conn: &Connection, org_id: &str, id: &str) -> Result<TrackTree> {
        let track = Self::load(conn, org_id, id)?;

        let mut stmt = conn.prepare(
            "SELECT id, track_id, title, order_index FROM track_sections
             WHERE track_id = ?1 ORDER BY order_index",
        )?;
        let sections = stmt
            .query_map(params![track.id], |row| {
                Ok(TrackSection {
                    id: row.get(0)?,
                    track_id: row.get(1)?,
                    title: row.get(2)?,
                    order_index: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
            "SELECT id, section_id, title, competency_id, order_index FROM track_modules
             WHERE section_id = ?1 ORDER BY order_index",
        )?;
        let mut tree = Vec::with_capacity(sections.len());
        for section in sections {
            let modules = stmt
                .query_map(params![section.id], |row| {
                    Ok(TrackModule {
                        id: row.get(0)?,
                        section_id: row.get(1)?,
                        title: row.get(2)?,
                        competency_id: row.get(3)?,
                        order_index: row.get(4)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tree.push(SectionTree { section, modules });
        }

        Ok(TrackTree {
            track,
            sections: tree,
        })
    }

    pub fn add_section(conn: &Connection, org_id: &str, track_id: &str, title: &str) -> Result<TrackSection> {
        Self::load(conn, org_id, track_id)?;
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM track_sections WHERE track_id = ?1",
            params![track_id],
            |r| r.get(0),
        )?;
        let section = TrackSection {
            id: new_id(),
            track_id: track_id.to_string(),
            title: paths::required("title", title)?,
            order_index: next,
        };
        conn.execute(
            "INSERT INTO track_sections(id, track_id, title, order_index) VALUES (?1, ?2, ?3, ?4)",
            params![section.id, section.track_id, section.title, section.order_index],
        )?;
        Ok(section)
    }

    /// Track id owning `section_id`, checked against the org.
    fn section_track(conn: &Connection, org_id: &str, section_id: &str) -> Result<String> {
        conn.query_row(
            "SELECT t.id FROM track_sections s JOIN tracks t ON t.id = s.track_id
             WHERE t.org_id = ?1 AND s.id = ?2",
            params![org_id, section_id],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| CarecompError::SectionNotFound(section_id.to_string()))
    }

    /// Track id owning `module_id`, checked against the org.
    pub fn module_track(conn: &Connection, org_id: &str, module_id: &str) -> Result<String> {
        conn.query_row(
            "SELECT t.id FROM track_modules m
             JOIN track_sections s ON s.id = m.section_id
             JOIN tracks t ON t.id = s.track_id
             WHERE t.org_id = ?1 AND m.id = ?2",
            params![org_id, module_id],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| CarecompError::ModuleNotFound(module_id.to_string()))
    }

    pub fn add_module(conn: &Connection, org_id: &str, section_id: &str, input: ModuleInput) -> Result<TrackModule> {
        Self::section_track(conn, org_id, section_id)?;
        if let Some(competency_id) = &input.competency_id {
            CompetencyTemplate::load(conn, org_id, competency_id)?;
        }
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM track_modules WHERE section_id = ?1",
            params![section_id],
            |r| r.get(0),
        )?;
        let module = TrackModule {
            id: new_id(),
            section_id: section_id.to_string(),
            title: paths::required("title", &input.title)?,
            competency_id: input.competency_id,
            order_index: next,
        };
        conn.execute(
            "INSERT INTO track_modules(id, section_id, title, competency_id, order_index)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                module.id,
                module.section_id,
                module.title,
                module.competency_id,
                module.order_index
            ],
        )?;
        Ok(module)
    }

    // -----------------------------------------------------------------------
    // Assignment and completion
    // -----------------------------------------------------------------------

    /// Assign the track to a staff member. Refused while they already hold
    /// an open assignment for it.
    pub fn assign(
        conn: &Connection,
        org_id: &str,
        track_id: &str,
        staff_id: &str,
        due_date: Option<&str>,
    ) -> Result<TrackAssignment> {
        Self::load(conn, org_id, track_id)?;
        StaffMember::load(conn, org_id, staff_id)?;
        let due_date = parse_input_due_date(due_date)?;
        if Self::open_assignment(conn, org_id, track_id, staff_id)?.is_some() {
            return Err(CarecompError::AlreadyExists(format!(
                "open track assignment for staff member {staff_id}"
            )));
        }

        let assignment = TrackAssignment {
            id: new_id(),
            org_id: org_id.to_string(),
            staff_id: staff_id.to_string(),
            track_id: track_id.to_string(),
            due_date,
            status: AssignmentStatus::Assigned,
            assigned_at: Utc::now(),
            completed_at: None,
        };
        conn.execute(
            &format!("INSERT INTO track_assignments({TA_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                assignment.id,
                assignment.org_id,
                assignment.staff_id,
                assignment.track_id,
                assignment.due_date,
                assignment.status.as_str(),
                assignment.assigned_at,
                assignment.completed_at
            ],
        )?;
        Ok(assignment)
    }

    fn open_assignment(
        conn: &Connection,
        org_id: &str,
        track_id: &str,
        staff_id: &str,
    ) -> Result<Option<TrackAssignment>> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {TA_COLUMNS} FROM track_assignments
                     WHERE org_id = ?1 AND track_id = ?2 AND staff_id = ?3 AND status != 'completed'
                     ORDER BY assigned_at LIMIT 1"
                ),
                params![org_id, track_id, staff_id],
                track_assignment_from_row,
            )
            .optional()?)
    }

    /// Track assignments joined with staff and track, each carrying its
    /// derived due status.
    pub fn list_assignments(
        conn: &Connection,
        org_id: &str,
        filter: &TrackAssignmentFilter,
        today: NaiveDate,
        window: i64,
    ) -> Result<Vec<TrackAssignmentRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {TA_SELECT}, s.full_name, s.facility_id, t.title
             FROM track_assignments a
             JOIN staff s ON s.id = a.staff_id AND s.org_id = a.org_id
             JOIN tracks t ON t.id = a.track_id AND t.org_id = a.org_id
             WHERE a.org_id = ?1
               AND (?2 IS NULL OR a.staff_id = ?2)
               AND (?3 IS NULL OR s.facility_id = ?3)
               AND (?4 IS NULL OR a.track_id = ?4)
             ORDER BY a.due_date IS NULL, a.due_date, s.full_name"
        ))?;
        let rows = stmt.query_map(
            params![org_id, filter.staff_id, filter.facility_id, filter.track_id],
            |row| {
                let assignment = track_assignment_from_row(row)?;
                let due_status = assignment.due_status(today, window);
                Ok(TrackAssignmentRow {
                    assignment,
                    staff_name: row.get(8)?,
                    facility_id: row.get(9)?,
                    track_title: row.get(10)?,
                    due_status,
                })
            },
        )?;
        let mut out = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        if let Some(wanted) = filter.due_status {
            out.retain(|r| r.due_status == wanted);
        }
        Ok(out)
    }

    /// Record a staff member's status on one module. When every module of
    /// the track is completed, the open track assignment is completed too;
    /// any other progress moves it from `assigned` to `in_progress`.
    pub fn record_completion(
        conn: &Connection,
        org_id: &str,
        module_id: &str,
        staff_id: &str,
        status: ModuleStatus,
    ) -> Result<ModuleCompletion> {
        let track_id = Self::module_track(conn, org_id, module_id)?;
        StaffMember::load(conn, org_id, staff_id)?;

        let completion = ModuleCompletion {
            staff_id: staff_id.to_string(),
            module_id: module_id.to_string(),
            status,
            updated_at: Utc::now(),
        };

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO module_completions(staff_id, module_id, status, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(staff_id, module_id) DO UPDATE SET status = ?3, updated_at = ?4",
            params![
                completion.staff_id,
                completion.module_id,
                completion.status.as_str(),
                completion.updated_at
            ],
        )?;

        if let Some(open) = Self::open_assignment(&tx, org_id, &track_id, staff_id)? {
            let progress = Self::progress(&tx, org_id, &track_id, staff_id)?;
            let (next, completed_at) = if progress.total_modules > 0
                && progress.completed_modules == progress.total_modules
            {
                (AssignmentStatus::Completed, Some(completion.updated_at))
            } else if status != ModuleStatus::NotStarted {
                (AssignmentStatus::InProgress, None)
            } else {
                (open.status, None)
            };
            tx.execute(
                "UPDATE track_assignments SET status = ?1, completed_at = ?2 WHERE org_id = ?3 AND id = ?4",
                params![next.as_str(), completed_at, org_id, open.id],
            )?;
        }
        tx.commit()?;
        Ok(completion)
    }

    /// Completed modules over total modules for one staff member.
    pub fn progress(conn: &Connection, org_id: &str, track_id: &str, staff_id: &str) -> Result<TrackProgress> {
        Self::load(conn, org_id, track_id)?;
        let (total, completed): (i64, i64) = conn.query_row(
            "SELECT COUNT(m.id),
                    COALESCE(SUM(CASE WHEN c.status = 'completed' THEN 1 ELSE 0 END), 0)
             FROM track_modules m
             JOIN track_sections s ON s.id = m.section_id
             LEFT JOIN module_completions c ON c.module_id = m.id AND c.staff_id = ?2
             WHERE s.track_id = ?1",
            params![track_id, staff_id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        let total_modules = total.max(0) as usize;
        let completed_modules = completed.max(0) as usize;
        Ok(TrackProgress {
            track_id: track_id.to_string(),
            staff_id: staff_id.to_string(),
            completed_modules,
            total_modules,
            ratio: if total_modules == 0 {
                0.0
            } else {
                completed_modules as f64 / total_modules as f64
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
