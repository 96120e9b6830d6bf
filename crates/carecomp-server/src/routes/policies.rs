use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::policy::{Policy, PolicyFilter, PolicyInput};
use carecomp_core::types::{Module, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/policies?facility_id=&category=&tag=&include_archived=
pub async fn list_policies(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(filter): Query<PolicyFilter>,
) -> Result<Json<Vec<Policy>>, AppError> {
    ctx.require(Module::Policies, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let list = app
        .with_db(move |conn| Policy::list(conn, &org_id, &filter))
        .await?;
    Ok(Json(list))
}

/// POST /api/policies: manager+; `file_url` points at an uploaded document.
pub async fn create_policy(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<PolicyInput>,
) -> Result<(StatusCode, Json<Policy>), AppError> {
    ctx.require(Module::Policies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| Policy::create(conn, &org_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(p)))
}

/// GET /api/policies/{id}
pub async fn get_policy(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<Policy>, AppError> {
    ctx.require(Module::Policies, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| Policy::load(conn, &org_id, &id))
        .await?;
    Ok(Json(p))
}

#[derive(serde::Deserialize)]
pub struct VersionBody {
    pub file_url: String,
}

/// POST /api/policies/{id}/versions: manager+.
pub async fn publish_version(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<VersionBody>,
) -> Result<Json<Policy>, AppError> {
    ctx.require(Module::Policies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| Policy::publish_version(conn, &org_id, &id, &body.file_url))
        .await?;
    Ok(Json(p))
}

/// POST /api/policies/{id}/archive: manager+.
pub async fn archive_policy(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<Policy>, AppError> {
    ctx.require(Module::Policies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| Policy::set_archived(conn, &org_id, &id, true))
        .await?;
    Ok(Json(p))
}
