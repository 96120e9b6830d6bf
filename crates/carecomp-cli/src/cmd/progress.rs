use crate::cmd::open_instance;
use crate::output::{print_json, print_table};
use carecomp_core::assignment::{Assignment, AssignmentFilter};
use carecomp_core::overview::org_dashboard;
use carecomp_core::progress::Progress;
use chrono::Utc;
use std::path::Path;

/// With a facility or staff filter, print one aggregate. Without, print the
/// per-facility breakdown and the org total.
pub fn run(
    root: &Path,
    org: &str,
    facility: Option<String>,
    staff: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (config, conn) = open_instance(root)?;
    let today = Utc::now().date_naive();
    let window = config.rules.due_soon_days;

    if facility.is_some() || staff.is_some() {
        let filter = AssignmentFilter {
            staff_id: staff,
            facility_id: facility,
            ..Default::default()
        };
        let p = Assignment::progress(&conn, org, &filter, today, window)?;
        if json {
            return print_json(&p);
        }
        print_table(&HEADERS, vec![row("selection", &p)]);
        return Ok(());
    }

    let dash = org_dashboard(&conn, org, today, window)?;
    if json {
        return print_json(&dash);
    }
    let mut rows: Vec<Vec<String>> = dash
        .facilities
        .iter()
        .map(|f| row(&f.facility_name, &f.progress))
        .collect();
    rows.push(row("TOTAL", &dash.total));
    print_table(&HEADERS, rows);
    Ok(())
}

const HEADERS: [&str; 8] = [
    "SCOPE",
    "TOTAL",
    "ASSIGNED",
    "IN PROGRESS",
    "COMPLETED",
    "OVERDUE",
    "DUE SOON",
    "DONE",
];

fn row(label: &str, p: &Progress) -> Vec<String> {
    vec![
        label.to_string(),
        p.total.to_string(),
        p.assigned.to_string(),
        p.in_progress.to_string(),
        p.completed.to_string(),
        p.overdue.to_string(),
        p.due_soon.to_string(),
        format!("{:.0}%", p.completion_ratio * 100.0),
    ]
}
