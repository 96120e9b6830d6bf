use crate::competency::CompetencyTemplate;
use crate::db::{new_id, parse_col};
use crate::error::{CarecompError, Result};
use crate::progress::{aggregate_with_window, Progress, StatusSource};
use crate::staff::StaffMember;
use crate::track::{Track, TrackAssignmentFilter, TrackAssignmentRow};
use crate::status::{derive_for_date, parse_due_date};
use crate::types::{AssignmentStatus, DueStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub org_id: String,
    pub staff_id: String,
    pub competency_id: String,
    pub due_date: Option<NaiveDate>,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl StatusSource for Assignment {
    fn raw_status(&self) -> Option<&str> {
        Some(self.status.as_str())
    }

    fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }
}

/// Listing row: the assignment joined with the names a table shows, plus
/// the derived due status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRow {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub staff_name: String,
    pub facility_id: String,
    pub competency_title: String,
    pub due_status: DueStatus,
}

impl StatusSource for AssignmentRow {
    fn raw_status(&self) -> Option<&str> {
        self.assignment.raw_status()
    }

    fn due_date(&self) -> Option<NaiveDate> {
        self.assignment.due_date
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignInput {
    pub staff_id: String,
    pub competency_id: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkAssignInput {
    pub staff_ids: Vec<String>,
    pub competency_id: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkAssignResult {
    pub created: Vec<Assignment>,
    /// Staff ids skipped because they already hold an open assignment.
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentFilter {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub competency_id: Option<String>,
    #[serde(default)]
    pub due_status: Option<DueStatus>,
}

impl AssignmentFilter {
    /// The same staff, facility, and due-status constraints applied to
    /// track assignments.
    pub fn track_filter(&self) -> TrackAssignmentFilter {
        TrackAssignmentFilter {
            staff_id: self.staff_id.clone(),
            facility_id: self.facility_id.clone(),
            track_id: None,
            due_status: self.due_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyAssignments {
    pub competencies: Vec<AssignmentRow>,
    pub tracks: Vec<TrackAssignmentRow>,
}

/// Parse a caller-supplied due date. Blank means none; anything else must
/// carry a `YYYY-MM-DD` day.
pub fn parse_input_due_date(raw: Option<&str>) -> Result<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_due_date(s)
            .map(Some)
            .ok_or_else(|| CarecompError::validation("due_date", format!("'{s}' is not a date"))),
    }
}

const COLUMNS: &str =
    "a.id, a.org_id, a.staff_id, a.competency_id, a.due_date, a.status, a.assigned_at, a.completed_at, a.notes";

impl Assignment {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            staff_id: row.get(2)?,
            competency_id: row.get(3)?,
            due_date: row.get(4)?,
            status: parse_col(row, 5)?,
            assigned_at: row.get(6)?,
            completed_at: row.get(7)?,
            notes: row.get(8)?,
        })
    }

    pub fn due_status(&self, today: NaiveDate, window: i64) -> DueStatus {
        derive_for_date(
            self.status == AssignmentStatus::Completed,
            self.due_date,
            today,
            window,
        )
    }

    fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO assignments(id, org_id, staff_id, competency_id, due_date, status,
                 assigned_at, completed_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                self.id,
                self.org_id,
                self.staff_id,
                self.competency_id,
                self.due_date,
                self.status.as_str(),
                self.assigned_at,
                self.completed_at,
                self.notes
            ],
        )?;
        Ok(())
    }

    fn new(org_id: &str, staff_id: &str, competency_id: &str, due: Option<NaiveDate>, notes: Option<String>) -> Self {
        Self {
            id: new_id(),
            org_id: org_id.to_string(),
            staff_id: staff_id.to_string(),
            competency_id: competency_id.to_string(),
            due_date: due,
            status: AssignmentStatus::Assigned,
            assigned_at: Utc::now(),
            completed_at: None,
            notes,
        }
    }

    pub fn assign(conn: &Connection, org_id: &str, input: AssignInput) -> Result<Self> {
        StaffMember::load(conn, org_id, &input.staff_id)?;
        CompetencyTemplate::load(conn, org_id, &input.competency_id)?;
        let due = parse_input_due_date(input.due_date.as_deref())?;

        let assignment = Self::new(org_id, &input.staff_id, &input.competency_id, due, input.notes);
        assignment.insert(conn)?;
        Ok(assignment)
    }

    /// Assign one competency to many staff members in a single transaction.
    /// Staff that already hold an open (not completed) assignment for the
    /// competency are skipped.
    pub fn bulk_assign(conn: &Connection, org_id: &str, input: BulkAssignInput) -> Result<BulkAssignResult> {
        CompetencyTemplate::load(conn, org_id, &input.competency_id)?;
        let due = parse_input_due_date(input.due_date.as_deref())?;

        let tx = conn.unchecked_transaction()?;
        let mut result = BulkAssignResult::default();
        for staff_id in &input.staff_ids {
            StaffMember::load(&tx, org_id, staff_id)?;
            let open: i64 = tx.query_row(
                "SELECT COUNT(*) FROM assignments
                 WHERE org_id = ?1 AND staff_id = ?2 AND competency_id = ?3 AND status != 'completed'",
                params![org_id, staff_id, input.competency_id],
                |r| r.get(0),
            )?;
            if open > 0 {
                result.skipped.push(staff_id.clone());
                continue;
            }
            let assignment = Self::new(org_id, staff_id, &input.competency_id, due, None);
            assignment.insert(&tx)?;
            result.created.push(assignment);
        }
        tx.commit()?;
        Ok(result)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM assignments a WHERE a.org_id = ?1 AND a.id = ?2"),
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::AssignmentNotFound(id.to_string()))
    }

    pub fn list(
        conn: &Connection,
        org_id: &str,
        filter: &AssignmentFilter,
        today: NaiveDate,
        window: i64,
    ) -> Result<Vec<AssignmentRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS}, s.full_name, s.facility_id, c.title
             FROM assignments a
             JOIN staff s ON s.id = a.staff_id AND s.org_id = a.org_id
             JOIN competencies c ON c.id = a.competency_id AND c.org_id = a.org_id
             WHERE a.org_id = ?1
               AND (?2 IS NULL OR a.staff_id = ?2)
               AND (?3 IS NULL OR s.facility_id = ?3)
               AND (?4 IS NULL OR a.competency_id = ?4)
             ORDER BY a.due_date IS NULL, a.due_date, s.full_name"
        ))?;
        let rows = stmt.query_map(
            params![
                org_id,
                filter.staff_id,
                filter.facility_id,
                filter.competency_id
            ],
            |row| {
                let assignment = Self::from_row(row)?;
                let due_status = assignment.due_status(today, window);
                Ok(AssignmentRow {
                    assignment,
                    staff_name: row.get(9)?,
                    facility_id: row.get(10)?,
                    competency_title: row.get(11)?,
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

    /// Assignments of the staff record whose email matches `email`.
    /// Competency and track assignments of the staff record matching `email`.
    pub fn list_mine(
        conn: &Connection,
        org_id: &str,
        email: &str,
        today: NaiveDate,
        window: i64,
    ) -> Result<MyAssignments> {
        let staff = StaffMember::find_by_email(conn, org_id, email)?
            .ok_or_else(|| CarecompError::StaffNotFound(email.to_string()))?;
        let filter = AssignmentFilter {
            staff_id: Some(staff.id),
            ..Default::default()
        };
        Ok(MyAssignments {
            competencies: Self::list(conn, org_id, &filter, today, window)?,
            tracks: Track::list_assignments(conn, org_id, &filter.track_filter(), today, window)?,
        })
    }

    /// Aggregate over competency assignments and, unless a competency is
    /// named, track assignments matching the same filter.
    pub fn progress(
        conn: &Connection,
        org_id: &str,
        filter: &AssignmentFilter,
        today: NaiveDate,
        window: i64,
    ) -> Result<Progress> {
        let rows = Self::list(conn, org_id, filter, today, window)?;
        let progress = aggregate_with_window(&rows, today, window);
        if filter.competency_id.is_some() {
            return Ok(progress);
        }
        let tracks = Track::list_assignments(conn, org_id, &filter.track_filter(), today, window)?;
        Ok(progress.merge(&aggregate_with_window(&tracks, today, window)))
    }

    /// Move to `status`. Completing stamps `completed_at`; any other status
    /// clears it.
    pub fn set_status(conn: &Connection, org_id: &str, id: &str, status: AssignmentStatus) -> Result<Self> {
        let mut assignment = Self::load(conn, org_id, id)?;
        assignment.completed_at = match status {
            AssignmentStatus::Completed => assignment.completed_at.or(Some(Utc::now())),
            _ => None,
        };
        assignment.status = status;
        conn.execute(
            "UPDATE assignments SET status = ?1, completed_at = ?2 WHERE org_id = ?3 AND id = ?4",
            params![assignment.status.as_str(), assignment.completed_at, org_id, id],
        )?;
        Ok(assignment)
    }

    pub fn update_details(
        conn: &Connection,
        org_id: &str,
        id: &str,
        due_date: Option<&str>,
        notes: Option<String>,
    ) -> Result<Self> {
        let mut assignment = Self::load(conn, org_id, id)?;
        assignment.due_date = parse_input_due_date(due_date)?;
        assignment.notes = notes;
        conn.execute(
            "UPDATE assignments SET due_date = ?1, notes = ?2 WHERE org_id = ?3 AND id = ?4",
            params![assignment.due_date, assignment.notes, org_id, id],
        )?;
        Ok(assignment)
    }

    pub fn delete(conn: &Connection, org_id: &str, id: &str) -> Result<()> {
        let n = conn.execute(
            "DELETE FROM assignments WHERE org_id = ?1 AND id = ?2",
            params![org_id, id],
        )?;
        if n == 0 {
            return Err(CarecompError::AssignmentNotFound(id.to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::DUE_SOON_DAYS;
    use crate::testutil::{second_org, seed_competency, seed_facility, seed_org, seed_staff};
    use crate::track::TrackInput;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 15).unwrap()
    }

    fn assign(conn: &Connection, org: &str, staff: &str, comp: &str, due: Option<&str>) -> Assignment {
        Assignment::assign(
            conn,
            org,
            AssignInput {
                staff_id: staff.to_string(),
                competency_id: comp.to_string(),
                due_date: due.map(str::to_string),
                notes: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn assign_and_derive_status() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s = seed_staff(&conn, &org, &f, "ana@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");

        let overdue = assign(&conn, &org, &s.id, &c, Some("2025-10-01"));
        assert_eq!(overdue.due_status(today(), DUE_SOON_DAYS), DueStatus::Overdue);

        let no_due = assign(&conn, &org, &s.id, &c, None);
        assert_eq!(no_due.due_status(today(), DUE_SOON_DAYS), DueStatus::OnTrack);
    }

    #[test]
    fn timestamp_due_dates_are_stored_as_days() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s = seed_staff(&conn, &org, &f, "ana@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");
        let a = assign(&conn, &org, &s.id, &c, Some("2025-11-20T23:59:00-05:00"));
        let loaded = Assignment::load(&conn, &org, &a.id).unwrap();
        assert_eq!(loaded.due_date, NaiveDate::from_ymd_opt(2025, 11, 20));
    }

    #[test]
    fn malformed_due_date_is_rejected_on_write() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s = seed_staff(&conn, &org, &f, "ana@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");
        let err = Assignment::assign(
            &conn,
            &org,
            AssignInput {
                staff_id: s.id,
                competency_id: c,
                due_date: Some("next tuesday".to_string()),
                notes: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, CarecompError::Validation { .. }));
    }

    #[test]
    fn set_status_stamps_and_clears_completed_at() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s = seed_staff(&conn, &org, &f, "ana@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");
        let a = assign(&conn, &org, &s.id, &c, Some("2025-10-01"));

        let done = Assignment::set_status(&conn, &org, &a.id, AssignmentStatus::Completed).unwrap();
        assert!(done.completed_at.is_some());
        assert_eq!(done.due_status(today(), DUE_SOON_DAYS), DueStatus::Completed);

        let reopened = Assignment::set_status(&conn, &org, &a.id, AssignmentStatus::InProgress).unwrap();
        assert!(reopened.completed_at.is_none());
        let loaded = Assignment::load(&conn, &org, &a.id).unwrap();
        assert_eq!(loaded.status, AssignmentStatus::InProgress);
    }

    #[test]
    fn bulk_assign_skips_open_duplicates() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s1 = seed_staff(&conn, &org, &f, "one@example.org");
        let s2 = seed_staff(&conn, &org, &f, "two@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");
        assign(&conn, &org, &s1.id, &c, None);

        let result = Assignment::bulk_assign(
            &conn,
            &org,
            BulkAssignInput {
                staff_ids: vec![s1.id.clone(), s2.id.clone(), s2.id.clone()],
                competency_id: c.clone(),
                due_date: Some("2025-12-01".to_string()),
            },
        )
        .unwrap();
        assert_eq!(result.created.len(), 1);
        assert_eq!(result.created[0].staff_id, s2.id);
        assert_eq!(result.skipped, vec![s1.id.clone(), s2.id.clone()]);
    }

    #[test]
    fn bulk_assign_rolls_back_on_foreign_staff() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s1 = seed_staff(&conn, &org, &f, "one@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");

        let result = Assignment::bulk_assign(
            &conn,
            &org,
            BulkAssignInput {
                staff_ids: vec![s1.id.clone(), "missing".to_string()],
                competency_id: c,
                due_date: None,
            },
        );
        assert!(result.is_err());
        let rows = Assignment::list(&conn, &org, &AssignmentFilter::default(), today(), DUE_SOON_DAYS)
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn list_filters_and_progress() {
        let (conn, org) = seed_org();
        let a = seed_facility(&conn, &org, "A");
        let b = seed_facility(&conn, &org, "B");
        let sa = seed_staff(&conn, &org, &a, "a@example.org");
        let sb = seed_staff(&conn, &org, &b, "b@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");

        let x = assign(&conn, &org, &sa.id, &c, Some("2025-10-01"));
        assign(&conn, &org, &sa.id, &c, Some("2025-11-20"));
        assign(&conn, &org, &sb.id, &c, None);
        Assignment::set_status(&conn, &org, &x.id, AssignmentStatus::Completed).unwrap();

        let in_a = AssignmentFilter {
            facility_id: Some(a.clone()),
            ..Default::default()
        };
        let rows = Assignment::list(&conn, &org, &in_a, today(), DUE_SOON_DAYS).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.staff_name == sa.full_name));

        let due_soon = AssignmentFilter {
            due_status: Some(DueStatus::DueSoon),
            ..Default::default()
        };
        assert_eq!(
            Assignment::list(&conn, &org, &due_soon, today(), DUE_SOON_DAYS)
                .unwrap()
                .len(),
            1
        );

        let p = Assignment::progress(&conn, &org, &AssignmentFilter::default(), today(), DUE_SOON_DAYS)
            .unwrap();
        assert_eq!(p.total, 3);
        assert_eq!(p.completed, 1);
        assert_eq!(p.assigned, 2);
        assert_eq!(p.overdue, 0);
    }

    #[test]
    fn list_mine_resolves_by_email() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s = seed_staff(&conn, &org, &f, "ana@example.org");
        let other = seed_staff(&conn, &org, &f, "bo@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");
        assign(&conn, &org, &s.id, &c, None);
        assign(&conn, &org, &other.id, &c, None);

        let mine = Assignment::list_mine(&conn, &org, "ANA@example.org", today(), DUE_SOON_DAYS).unwrap();
        assert_eq!(mine.competencies.len(), 1);
        assert!(mine.tracks.is_empty());
        assert!(matches!(
            Assignment::list_mine(&conn, &org, "nobody@example.org", today(), DUE_SOON_DAYS),
            Err(CarecompError::StaffNotFound(_))
        ));
    }

    #[test]
    fn overdue_track_assignment_counts_toward_progress_and_mine() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s = seed_staff(&conn, &org, &f, "ana@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");
        assign(&conn, &org, &s.id, &c, Some("2026-01-20"));
        let track = Track::create(
            &conn,
            &org,
            TrackInput {
                title: "Orientation".to_string(),
                description: None,
            },
        )
        .unwrap();
        Track::assign(&conn, &org, &track.id, &s.id, Some("2025-10-01")).unwrap();

        let all = Assignment::progress(&conn, &org, &AssignmentFilter::default(), today(), DUE_SOON_DAYS)
            .unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.overdue, 1);

        let by_competency = AssignmentFilter {
            competency_id: Some(c.clone()),
            ..Default::default()
        };
        let p = Assignment::progress(&conn, &org, &by_competency, today(), DUE_SOON_DAYS).unwrap();
        assert_eq!((p.total, p.overdue), (1, 0));

        let mine = Assignment::list_mine(&conn, &org, "ana@example.org", today(), DUE_SOON_DAYS).unwrap();
        assert_eq!(mine.competencies.len(), 1);
        assert_eq!(mine.tracks.len(), 1);
        assert_eq!(mine.tracks[0].due_status, DueStatus::Overdue);
    }

    #[test]
    fn other_org_cannot_touch_assignment() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let s = seed_staff(&conn, &org, &f, "ana@example.org");
        let c = seed_competency(&conn, &org, "Hand Hygiene");
        let a = assign(&conn, &org, &s.id, &c, None);
        let other = second_org(&conn);

        assert!(Assignment::set_status(&conn, &other, &a.id, AssignmentStatus::Completed).is_err());
        assert!(Assignment::delete(&conn, &other, &a.id).is_err());
        // Cross-org staff / competency references are refused.
        assert!(Assignment::assign(
            &conn,
            &other,
            AssignInput {
                staff_id: s.id.clone(),
                competency_id: c.clone(),
                ..Default::default()
            }
        )
        .is_err());
    }
}
