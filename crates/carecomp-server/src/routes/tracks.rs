use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::gate::require_role;
use carecomp_core::staff::StaffMember;
use carecomp_core::track::{
    ModuleCompletion, ModuleInput, Track, TrackAssignment, TrackAssignmentFilter, TrackAssignmentRow,
    TrackInput, TrackModule, TrackProgress, TrackSection, TrackTree,
};
use carecomp_core::types::{Module, ModuleStatus, Role};
use carecomp_core::CarecompError;
use rusqlite::Connection;

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// Staff id a request acts for. Without an explicit id the caller's own
/// staff record is used; acting for someone else needs manager+.
fn target_staff(
    conn: &Connection,
    org_id: &str,
    email: &str,
    role: Role,
    requested: Option<String>,
) -> carecomp_core::Result<String> {
    let own = StaffMember::find_by_email(conn, org_id, email)?.map(|s| s.id);
    match requested {
        Some(id) if own.as_deref() == Some(id.as_str()) => Ok(id),
        Some(id) => {
            require_role(role, Role::Manager)?;
            Ok(id)
        }
        None => own.ok_or_else(|| CarecompError::StaffNotFound(email.to_string())),
    }
}

/// GET /api/tracks
pub async fn list_tracks(
    State(app): State<AppState>,
    Org(ctx): Org,
) -> Result<Json<Vec<Track>>, AppError> {
    ctx.require(Module::Tracks, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let list = app.with_db(move |conn| Track::list(conn, &org_id)).await?;
    Ok(Json(list))
}

/// POST /api/tracks: manager+.
pub async fn create_track(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<TrackInput>,
) -> Result<(StatusCode, Json<Track>), AppError> {
    ctx.require(Module::Tracks, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let t = app
        .with_db(move |conn| Track::create(conn, &org_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(t)))
}

/// GET /api/tracks/{id}: the full section/module tree.
pub async fn get_track(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<TrackTree>, AppError> {
    ctx.require(Module::Tracks, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let tree = app
        .with_db(move |conn| Track::load_tree(conn, &org_id, &id))
        .await?;
    Ok(Json(tree))
}

#[derive(serde::Deserialize)]
pub struct SectionBody {
    pub title: String,
}

/// POST /api/tracks/{id}/sections: manager+.
pub async fn add_section(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<SectionBody>,
) -> Result<(StatusCode, Json<TrackSection>), AppError> {
    ctx.require(Module::Tracks, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let s = app
        .with_db(move |conn| Track::add_section(conn, &org_id, &id, &body.title))
        .await?;
    Ok((StatusCode::CREATED, Json(s)))
}

/// POST /api/tracks/sections/{id}/modules: manager+.
pub async fn add_module(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(section_id): Path<String>,
    Json(body): Json<ModuleInput>,
) -> Result<(StatusCode, Json<TrackModule>), AppError> {
    ctx.require(Module::Tracks, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let m = app
        .with_db(move |conn| Track::add_module(conn, &org_id, &section_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(m)))
}

#[derive(serde::Deserialize)]
pub struct AssignBody {
    pub staff_id: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// POST /api/tracks/{id}/assign: manager+.
pub async fn assign_track(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<AssignBody>,
) -> Result<(StatusCode, Json<TrackAssignment>), AppError> {
    ctx.require(Module::Tracks, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let a = app
        .with_db(move |conn| {
            Track::assign(conn, &org_id, &id, &body.staff_id, body.due_date.as_deref())
        })
        .await?;
    Ok((StatusCode::CREATED, Json(a)))
}

/// GET /api/tracks/assignments?staff_id=&facility_id=&track_id=&due_status=:
/// manager+ see every assignment; staff see only their own.
pub async fn list_track_assignments(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(mut filter): Query<TrackAssignmentFilter>,
) -> Result<Json<Vec<TrackAssignmentRow>>, AppError> {
    ctx.require(Module::Tracks, Role::Staff)?;
    let (today, window) = (app.today(), app.window());
    let manager = ctx.is_at_least(Role::Manager);
    let (org_id, email, role) = (ctx.org_id.clone(), ctx.email.clone(), ctx.role);
    let rows = app
        .with_db(move |conn| {
            if !manager {
                filter.staff_id = Some(target_staff(conn, &org_id, &email, role, filter.staff_id.take())?);
            }
            Track::list_assignments(conn, &org_id, &filter, today, window)
        })
        .await?;
    Ok(Json(rows))
}

#[derive(serde::Deserialize)]
pub struct CompleteBody {
    #[serde(default)]
    pub staff_id: Option<String>,
    #[serde(default)]
    pub status: Option<ModuleStatus>,
}

/// POST /api/tracks/modules/{id}/complete: the caller's own completion, or
/// any staff member's for manager+. `status` defaults to `completed`.
pub async fn complete_module(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(module_id): Path<String>,
    body: Option<Json<CompleteBody>>,
) -> Result<Json<ModuleCompletion>, AppError> {
    ctx.require(Module::Tracks, Role::Staff)?;
    let (staff_id, status) = match body {
        Some(Json(b)) => (b.staff_id, b.status.unwrap_or(ModuleStatus::Completed)),
        None => (None, ModuleStatus::Completed),
    };
    let (org_id, email, role) = (ctx.org_id.clone(), ctx.email.clone(), ctx.role);
    let c = app
        .with_db(move |conn| {
            let staff_id = target_staff(conn, &org_id, &email, role, staff_id)?;
            Track::record_completion(conn, &org_id, &module_id, &staff_id, status)
        })
        .await?;
    Ok(Json(c))
}

#[derive(serde::Deserialize)]
pub struct ProgressQuery {
    #[serde(default)]
    pub staff_id: Option<String>,
}

/// GET /api/tracks/{id}/progress?staff_id=: defaults to the caller.
pub async fn get_progress(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Query(q): Query<ProgressQuery>,
) -> Result<Json<TrackProgress>, AppError> {
    ctx.require(Module::Tracks, Role::Staff)?;
    let (org_id, email, role) = (ctx.org_id.clone(), ctx.email.clone(), ctx.role);
    let p = app
        .with_db(move |conn| {
            let staff_id = target_staff(conn, &org_id, &email, role, q.staff_id)?;
            Track::progress(conn, &org_id, &id, &staff_id)
        })
        .await?;
    Ok(Json(p))
}
