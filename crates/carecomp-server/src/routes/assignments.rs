use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::assignment::{
    AssignInput, Assignment, AssignmentFilter, AssignmentRow, BulkAssignInput, BulkAssignResult,
    MyAssignments,
};
use carecomp_core::gate::require_role;
use carecomp_core::progress::Progress;
use carecomp_core::staff::StaffMember;
use carecomp_core::types::{AssignmentStatus, Module, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/assignments?staff_id=&facility_id=&competency_id=&due_status=: manager+.
pub async fn list_assignments(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(filter): Query<AssignmentFilter>,
) -> Result<Json<Vec<AssignmentRow>>, AppError> {
    ctx.require(Module::Assignments, Role::Manager)?;
    let (today, window) = (app.today(), app.window());
    let org_id = ctx.org_id.clone();
    let rows = app
        .with_db(move |conn| Assignment::list(conn, &org_id, &filter, today, window))
        .await?;
    Ok(Json(rows))
}

/// GET /api/assignments/mine: the caller's own competency and track
/// assignments.
pub async fn list_mine(
    State(app): State<AppState>,
    Org(ctx): Org,
) -> Result<Json<MyAssignments>, AppError> {
    ctx.require(Module::Assignments, Role::Staff)?;
    let (today, window) = (app.today(), app.window());
    let (org_id, email) = (ctx.org_id.clone(), ctx.email.clone());
    let rows = app
        .with_db(move |conn| Assignment::list_mine(conn, &org_id, &email, today, window))
        .await?;
    Ok(Json(rows))
}

/// GET /api/assignments/progress: manager+; same filters as the list.
pub async fn get_progress(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(filter): Query<AssignmentFilter>,
) -> Result<Json<Progress>, AppError> {
    ctx.require(Module::Assignments, Role::Manager)?;
    let (today, window) = (app.today(), app.window());
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| Assignment::progress(conn, &org_id, &filter, today, window))
        .await?;
    Ok(Json(p))
}

/// POST /api/assignments: manager+.
pub async fn create_assignment(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<AssignInput>,
) -> Result<(StatusCode, Json<Assignment>), AppError> {
    ctx.require(Module::Assignments, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let a = app
        .with_db(move |conn| Assignment::assign(conn, &org_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(a)))
}

/// POST /api/assignments/bulk: manager+; one competency, many staff.
pub async fn bulk_assign(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<BulkAssignInput>,
) -> Result<(StatusCode, Json<BulkAssignResult>), AppError> {
    ctx.require(Module::Assignments, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let result = app
        .with_db(move |conn| Assignment::bulk_assign(conn, &org_id, body))
        .await?;
    tracing::info!(
        org = %ctx.org_id,
        created = result.created.len(),
        skipped = result.skipped.len(),
        "bulk assign"
    );
    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(serde::Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// PUT /api/assignments/{id}/status: manager+, or the assigned staff member.
pub async fn set_status(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Assignment>, AppError> {
    ctx.require_feature(Module::Assignments)?;
    let status: AssignmentStatus = body.status.parse()?;
    let (org_id, email, role) = (ctx.org_id.clone(), ctx.email.clone(), ctx.role);
    let a = app
        .with_db(move |conn| {
            if role < Role::Manager {
                let a = Assignment::load(conn, &org_id, &id)?;
                let own = StaffMember::find_by_email(conn, &org_id, &email)?;
                if own.map(|s| s.id) != Some(a.staff_id) {
                    require_role(role, Role::Manager)?;
                }
            }
            Assignment::set_status(conn, &org_id, &id, status)
        })
        .await?;
    Ok(Json(a))
}

#[derive(serde::Deserialize)]
pub struct DetailsBody {
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// PUT /api/assignments/{id}: manager+; due date and notes.
pub async fn update_assignment(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<DetailsBody>,
) -> Result<Json<Assignment>, AppError> {
    ctx.require(Module::Assignments, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let a = app
        .with_db(move |conn| {
            Assignment::update_details(conn, &org_id, &id, body.due_date.as_deref(), body.notes)
        })
        .await?;
    Ok(Json(a))
}

/// DELETE /api/assignments/{id}: manager+.
pub async fn delete_assignment(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.require(Module::Assignments, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    app.with_db(move |conn| Assignment::delete(conn, &org_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
