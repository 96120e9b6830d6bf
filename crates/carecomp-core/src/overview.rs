//! Read-only dashboards built from the store and the progress rules.

use crate::assignment::{Assignment, AssignmentFilter, AssignmentRow};
use crate::deficiency::{DeficiencyFilter, SurveyDeficiency};
use crate::drill::{Drill, DrillFilter};
use crate::error::Result;
use crate::facility::Facility;
use crate::policy::{Policy, PolicyFilter};
use crate::progress::{aggregate_by, aggregate_with_window, Progress};
use crate::staff::{StaffFilter, StaffMember};
use crate::track::{Track, TrackAssignmentRow};
use crate::types::{DeficiencyStatus, DrillStatus, DueStatus};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffProgress {
    pub staff_id: String,
    pub staff_name: String,
    pub progress: Progress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityOverview {
    pub facility: Facility,
    pub staff_count: usize,
    pub progress: Progress,
    pub per_staff: Vec<StaffProgress>,
    pub overdue: Vec<AssignmentRow>,
    pub overdue_tracks: Vec<TrackAssignmentRow>,
    pub open_deficiencies: usize,
    pub upcoming_drills: Vec<Drill>,
    pub policy_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityProgress {
    pub facility_id: String,
    pub facility_name: String,
    pub progress: Progress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgDashboard {
    pub total: Progress,
    pub facilities: Vec<FacilityProgress>,
}

/// Merge two keyed aggregates.
fn merge_keyed(mut a: BTreeMap<String, Progress>, b: BTreeMap<String, Progress>) -> BTreeMap<String, Progress> {
    for (k, p) in b {
        let merged = a.get(&k).map_or_else(|| p.clone(), |q| q.merge(&p));
        a.insert(k, merged);
    }
    a
}

/// Manager view of one facility. Competency and track assignments both
/// count toward the progress figures.
pub fn facility_overview(
    conn: &Connection,
    org_id: &str,
    facility_id: &str,
    today: NaiveDate,
    window: i64,
) -> Result<FacilityOverview> {
    let facility = Facility::load(conn, org_id, facility_id)?;

    let staff = StaffMember::list(
        conn,
        org_id,
        &StaffFilter {
            facility_id: Some(facility.id.clone()),
            active_only: false,
        },
    )?;

    let filter = AssignmentFilter {
        facility_id: Some(facility.id.clone()),
        ..Default::default()
    };
    let rows = Assignment::list(conn, org_id, &filter, today, window)?;
    let track_rows = Track::list_assignments(conn, org_id, &filter.track_filter(), today, window)?;
    let progress = aggregate_with_window(&rows, today, window)
        .merge(&aggregate_with_window(&track_rows, today, window));

    let by_staff = merge_keyed(
        aggregate_by(&rows, today, window, |r| r.assignment.staff_id.clone()),
        aggregate_by(&track_rows, today, window, |r| r.assignment.staff_id.clone()),
    );
    // Deactivated staff keep a row while they still hold assignments, so
    // the rows add up to the facility total.
    let per_staff = staff
        .iter()
        .filter(|s| s.active || by_staff.contains_key(&s.id))
        .map(|s| StaffProgress {
            staff_id: s.id.clone(),
            staff_name: s.full_name.clone(),
            progress: by_staff.get(&s.id).cloned().unwrap_or_default(),
        })
        .collect();
    let staff_count = staff.iter().filter(|s| s.active).count();

    let overdue = rows
        .into_iter()
        .filter(|r| r.due_status == DueStatus::Overdue)
        .collect();
    let overdue_tracks = track_rows
        .into_iter()
        .filter(|r| r.due_status == DueStatus::Overdue)
        .collect();

    let open_deficiencies = SurveyDeficiency::list(
        conn,
        org_id,
        &DeficiencyFilter {
            facility_id: Some(facility.id.clone()),
            status: None,
        },
    )?
    .iter()
    .filter(|d| d.status != DeficiencyStatus::Resolved)
    .count();

    let upcoming_drills = Drill::list(
        conn,
        org_id,
        &DrillFilter {
            facility_id: Some(facility.id.clone()),
            status: Some(DrillStatus::Scheduled),
        },
    )?
    .into_iter()
    .filter(|d| d.scheduled_for.date_naive() >= today)
    .collect();

    let policy_count = Policy::list(
        conn,
        org_id,
        &PolicyFilter {
            facility_id: Some(facility.id.clone()),
            ..Default::default()
        },
    )?
    .len();

    Ok(FacilityOverview {
        facility,
        staff_count,
        progress,
        per_staff,
        overdue,
        overdue_tracks,
        open_deficiencies,
        upcoming_drills,
        policy_count,
    })
}

/// Progress per facility plus the org-wide total, over competency and
/// track assignments. Facilities with no assignments still appear, with an
/// empty aggregate.
pub fn org_dashboard(conn: &Connection, org_id: &str, today: NaiveDate, window: i64) -> Result<OrgDashboard> {
    let filter = AssignmentFilter::default();
    let rows = Assignment::list(conn, org_id, &filter, today, window)?;
    let track_rows = Track::list_assignments(conn, org_id, &filter.track_filter(), today, window)?;
    let by_facility = merge_keyed(
        aggregate_by(&rows, today, window, |r| r.facility_id.clone()),
        aggregate_by(&track_rows, today, window, |r| r.facility_id.clone()),
    );

    let facilities = Facility::list(conn, org_id)?
        .into_iter()
        .map(|f| FacilityProgress {
            progress: by_facility.get(&f.id).cloned().unwrap_or_default(),
            facility_id: f.id,
            facility_name: f.name,
        })
        .collect();

    Ok(OrgDashboard {
        total: aggregate_with_window(&rows, today, window)
            .merge(&aggregate_with_window(&track_rows, today, window)),
        facilities,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
