use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::org::{Membership, Organization};
use carecomp_core::types::{Module, Role};
use std::collections::BTreeMap;

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/org: the caller's organization, role, and flags as displayed.
pub async fn get_org(Org(ctx): Org) -> Result<Json<serde_json::Value>, AppError> {
    Ok(Json(serde_json::json!({
        "id": ctx.org_id,
        "name": ctx.org_name,
        "email": ctx.email,
        "role": ctx.role,
        "is_dev_org": ctx.is_dev_org,
        "feature_flags": ctx.display_flags(),
    })))
}

/// PUT /api/org/flags: admin; body is a map of module name to enabled.
///
/// Only the role is checked here, not the `admin` or `settings` flags, so an
/// admin can always switch a disabled module back on.
pub async fn put_flags(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<BTreeMap<String, bool>>,
) -> Result<Json<serde_json::Value>, AppError> {
    ctx.require_role(Role::Admin)?;
    let org_id = ctx.org_id.clone();
    let org = app
        .with_db(move |conn| {
            let mut org = Organization::load(conn, &org_id)?;
            org.set_flags(conn, &body)?;
            Ok(org)
        })
        .await?;
    tracing::info!(org = %org.id, by = %ctx.email, "feature flags updated");
    Ok(Json(serde_json::json!({
        "feature_flags": org.feature_flags.resolved(),
    })))
}

/// GET /api/org/settings: manager+; the organization's name and the due
/// rules the dashboards use.
pub async fn get_settings(
    State(app): State<AppState>,
    Org(ctx): Org,
) -> Result<Json<serde_json::Value>, AppError> {
    ctx.require(Module::Settings, Role::Manager)?;
    Ok(Json(serde_json::json!({
        "name": ctx.org_name,
        "is_dev_org": ctx.is_dev_org,
        "due_soon_days": app.window(),
    })))
}

#[derive(serde::Deserialize)]
pub struct SettingsBody {
    pub name: String,
}

/// PUT /api/org/settings: admin; rename the organization.
pub async fn put_settings(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<SettingsBody>,
) -> Result<Json<Organization>, AppError> {
    ctx.require(Module::Settings, Role::Admin)?;
    let org_id = ctx.org_id.clone();
    let org = app
        .with_db(move |conn| {
            let mut org = Organization::load(conn, &org_id)?;
            org.rename(conn, &body.name)?;
            Ok(org)
        })
        .await?;
    tracing::info!(org = %org.id, by = %ctx.email, "organization renamed");
    Ok(Json(org))
}

/// GET /api/org/members
pub async fn list_members(
    State(app): State<AppState>,
    Org(ctx): Org,
) -> Result<Json<Vec<Membership>>, AppError> {
    ctx.require(Module::Admin, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let members = app.with_db(move |conn| Membership::list(conn, &org_id)).await?;
    Ok(Json(members))
}

#[derive(serde::Deserialize)]
pub struct MemberBody {
    pub email: String,
    pub role: Role,
}

/// POST /api/org/members: admin; add a member or change their role. The
/// caller must hold both the granted role and the member's current one.
pub async fn upsert_member(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<MemberBody>,
) -> Result<(StatusCode, Json<Membership>), AppError> {
    ctx.require(Module::Admin, Role::Admin)?;
    let (org_id, actor) = (ctx.org_id.clone(), ctx.role);
    let member = app
        .with_db(move |conn| Membership::upsert_as(conn, &org_id, actor, &body.email, body.role))
        .await?;
    tracing::info!(org = %ctx.org_id, member = %member.email, role = %member.role, "member updated");
    Ok((StatusCode::CREATED, Json(member)))
}

/// DELETE /api/org/members/{email}: admin, and at least the member's role.
pub async fn remove_member(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(email): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.require(Module::Admin, Role::Admin)?;
    let (org_id, actor) = (ctx.org_id.clone(), ctx.role);
    app.with_db(move |conn| Membership::remove_as(conn, &org_id, actor, &email))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
