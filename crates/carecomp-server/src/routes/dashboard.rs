use axum::extract::{Path, State};
use axum::Json;
use carecomp_core::overview::{self, FacilityOverview, OrgDashboard};
use carecomp_core::types::{Module, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/manager/facility/{id}/overview: manager+.
pub async fn facility_overview(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<FacilityOverview>, AppError> {
    ctx.require(Module::Facilities, Role::Manager)?;
    let (today, window) = (app.today(), app.window());
    let org_id = ctx.org_id.clone();
    let ov = app
        .with_db(move |conn| overview::facility_overview(conn, &org_id, &id, today, window))
        .await?;
    Ok(Json(ov))
}

/// GET /api/dashboard: org-wide progress per facility.
pub async fn org_dashboard(
    State(app): State<AppState>,
    Org(ctx): Org,
) -> Result<Json<OrgDashboard>, AppError> {
    ctx.require(Module::Assignments, Role::Staff)?;
    let (today, window) = (app.today(), app.window());
    let org_id = ctx.org_id.clone();
    let dash = app
        .with_db(move |conn| overview::org_dashboard(conn, &org_id, today, window))
        .await?;
    Ok(Json(dash))
}
