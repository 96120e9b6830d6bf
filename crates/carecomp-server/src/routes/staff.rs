use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::staff::{StaffFilter, StaffInput, StaffMember};
use carecomp_core::types::{Module, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/staff?facility_id=&active_only=
pub async fn list_staff(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(filter): Query<StaffFilter>,
) -> Result<Json<Vec<StaffMember>>, AppError> {
    ctx.require(Module::Staff, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let list = app
        .with_db(move |conn| StaffMember::list(conn, &org_id, &filter))
        .await?;
    Ok(Json(list))
}

/// POST /api/staff: manager+.
pub async fn create_staff(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<StaffInput>,
) -> Result<(StatusCode, Json<StaffMember>), AppError> {
    ctx.require(Module::Staff, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let s = app
        .with_db(move |conn| StaffMember::create(conn, &org_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(s)))
}

/// GET /api/staff/{id}
pub async fn get_staff(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<StaffMember>, AppError> {
    ctx.require(Module::Staff, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let s = app
        .with_db(move |conn| StaffMember::load(conn, &org_id, &id))
        .await?;
    Ok(Json(s))
}

/// PUT /api/staff/{id}: manager+.
pub async fn update_staff(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<StaffInput>,
) -> Result<Json<StaffMember>, AppError> {
    ctx.require(Module::Staff, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let s = app
        .with_db(move |conn| StaffMember::update(conn, &org_id, &id, body))
        .await?;
    Ok(Json(s))
}

#[derive(serde::Deserialize)]
pub struct ActiveBody {
    pub active: bool,
}

/// PUT /api/staff/{id}/active: manager+; deactivate or reactivate.
pub async fn set_staff_active(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<ActiveBody>,
) -> Result<Json<StaffMember>, AppError> {
    ctx.require(Module::Staff, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let s = app
        .with_db(move |conn| StaffMember::set_active(conn, &org_id, &id, body.active))
        .await?;
    Ok(Json(s))
}

/// DELETE /api/staff/{id}: admin.
pub async fn delete_staff(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.require(Module::Staff, Role::Admin)?;
    let org_id = ctx.org_id.clone();
    app.with_db(move |conn| StaffMember::delete(conn, &org_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
