use crate::cmd::open_instance;
use crate::output::print_json;
use carecomp_core::assignment::{Assignment, BulkAssignInput};
use std::path::Path;

/// Assign one competency to each listed staff member. Staff who already hold
/// an open assignment for it are skipped.
pub fn run(
    root: &Path,
    org: &str,
    competency: &str,
    staff: Vec<String>,
    due: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (_, conn) = open_instance(root)?;
    let result = Assignment::bulk_assign(
        &conn,
        org,
        BulkAssignInput {
            staff_ids: staff,
            competency_id: competency.to_string(),
            due_date: due,
        },
    )?;
    tracing::info!(
        created = result.created.len(),
        skipped = result.skipped.len(),
        "assign"
    );

    if json {
        return print_json(&result);
    }
    for a in &result.created {
        let due = a
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no due date".to_string());
        println!("assigned: {} ({due})", a.staff_id);
    }
    for id in &result.skipped {
        println!("skipped:  {id} (already assigned)");
    }
    Ok(())
}
