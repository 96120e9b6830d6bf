use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::facility::{Facility, FacilityInput};
use carecomp_core::types::{Module, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/facilities
pub async fn list_facilities(
    State(app): State<AppState>,
    Org(ctx): Org,
) -> Result<Json<Vec<Facility>>, AppError> {
    ctx.require(Module::Facilities, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let list = app.with_db(move |conn| Facility::list(conn, &org_id)).await?;
    Ok(Json(list))
}

/// POST /api/facilities: manager+.
pub async fn create_facility(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<FacilityInput>,
) -> Result<(StatusCode, Json<Facility>), AppError> {
    ctx.require(Module::Facilities, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let f = app
        .with_db(move |conn| Facility::create(conn, &org_id, body))
        .await?;
    tracing::info!(org = %ctx.org_id, facility = %f.id, "facility created");
    Ok((StatusCode::CREATED, Json(f)))
}

/// GET /api/facilities/{id}
pub async fn get_facility(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<Facility>, AppError> {
    ctx.require(Module::Facilities, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let f = app
        .with_db(move |conn| Facility::load(conn, &org_id, &id))
        .await?;
    Ok(Json(f))
}

/// PUT /api/facilities/{id}: manager+.
pub async fn update_facility(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<FacilityInput>,
) -> Result<Json<Facility>, AppError> {
    ctx.require(Module::Facilities, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let f = app
        .with_db(move |conn| Facility::update(conn, &org_id, &id, body))
        .await?;
    Ok(Json(f))
}

/// DELETE /api/facilities/{id}: admin.
pub async fn delete_facility(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.require(Module::Facilities, Role::Admin)?;
    let org_id = ctx.org_id.clone();
    app.with_db(move |conn| Facility::delete(conn, &org_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
