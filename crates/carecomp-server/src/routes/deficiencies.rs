use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::deficiency::{BoardRow, DeficiencyFilter, DeficiencyInput, SurveyDeficiency};
use carecomp_core::poc::{PlanInput, PlanOfCorrection};
use carecomp_core::types::{DeficiencyStatus, Module, PocStatus, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/deficiencies?facility_id=&status=: the survey board.
pub async fn list_deficiencies(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(filter): Query<DeficiencyFilter>,
) -> Result<Json<Vec<BoardRow>>, AppError> {
    ctx.require(Module::Deficiencies, Role::Staff)?;
    let (today, window) = (app.today(), app.window());
    let org_id = ctx.org_id.clone();
    let rows = app
        .with_db(move |conn| SurveyDeficiency::board(conn, &org_id, &filter, today, window))
        .await?;
    Ok(Json(rows))
}

/// POST /api/deficiencies: manager+.
pub async fn create_deficiency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<DeficiencyInput>,
) -> Result<(StatusCode, Json<SurveyDeficiency>), AppError> {
    ctx.require(Module::Deficiencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let d = app
        .with_db(move |conn| SurveyDeficiency::create(conn, &org_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(d)))
}

/// GET /api/deficiencies/{id}: the deficiency with its plan, if any.
pub async fn get_deficiency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    ctx.require(Module::Deficiencies, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let (d, plan) = app
        .with_db(move |conn| {
            let d = SurveyDeficiency::load(conn, &org_id, &id)?;
            let plan = match PlanOfCorrection::load_for_deficiency(conn, &org_id, &id) {
                Ok(p) => Some(p),
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
            Ok((d, plan))
        })
        .await?;
    Ok(Json(serde_json::json!({
        "deficiency": d,
        "plan_of_correction": plan,
    })))
}

/// PUT /api/deficiencies/{id}: manager+.
pub async fn update_deficiency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<DeficiencyInput>,
) -> Result<Json<SurveyDeficiency>, AppError> {
    ctx.require(Module::Deficiencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let d = app
        .with_db(move |conn| SurveyDeficiency::update(conn, &org_id, &id, body))
        .await?;
    Ok(Json(d))
}

#[derive(serde::Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// PUT /api/deficiencies/{id}/status: manager+.
pub async fn set_deficiency_status(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<SurveyDeficiency>, AppError> {
    ctx.require(Module::Deficiencies, Role::Manager)?;
    let status: DeficiencyStatus = body.status.parse()?;
    let org_id = ctx.org_id.clone();
    let d = app
        .with_db(move |conn| SurveyDeficiency::set_status(conn, &org_id, &id, status))
        .await?;
    Ok(Json(d))
}

/// DELETE /api/deficiencies/{id}: manager+.
pub async fn delete_deficiency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.require(Module::Deficiencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    app.with_db(move |conn| SurveyDeficiency::delete(conn, &org_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Plan of correction
// ---------------------------------------------------------------------------

/// GET /api/deficiencies/{id}/poc
pub async fn get_poc(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<PlanOfCorrection>, AppError> {
    ctx.require(Module::Deficiencies, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| PlanOfCorrection::load_for_deficiency(conn, &org_id, &id))
        .await?;
    Ok(Json(p))
}

/// POST /api/deficiencies/{id}/poc: manager+; one plan per deficiency.
pub async fn create_poc(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<PlanInput>,
) -> Result<(StatusCode, Json<PlanOfCorrection>), AppError> {
    ctx.require(Module::Deficiencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| PlanOfCorrection::create(conn, &org_id, &id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(p)))
}

/// PUT /api/deficiencies/{id}/poc: manager+.
pub async fn update_poc(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<PlanInput>,
) -> Result<Json<PlanOfCorrection>, AppError> {
    ctx.require(Module::Deficiencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| PlanOfCorrection::update(conn, &org_id, &id, body))
        .await?;
    Ok(Json(p))
}

/// PUT /api/deficiencies/{id}/poc/status: manager+.
pub async fn set_poc_status(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Json<PlanOfCorrection>, AppError> {
    ctx.require(Module::Deficiencies, Role::Manager)?;
    let status: PocStatus = body.status.parse()?;
    let org_id = ctx.org_id.clone();
    let p = app
        .with_db(move |conn| PlanOfCorrection::set_status(conn, &org_id, &id, status))
        .await?;
    tracing::info!(org = %ctx.org_id, deficiency = %p.deficiency_id, status = %p.status, "plan of correction status");
    Ok(Json(p))
}
