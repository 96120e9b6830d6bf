use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::drill::{
    CheckinInput, Drill, DrillCheckin, DrillDetail, DrillFilter, DrillInput, DrillStation,
};
use carecomp_core::types::{Module, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/drills?facility_id=&status=
pub async fn list_drills(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(filter): Query<DrillFilter>,
) -> Result<Json<Vec<Drill>>, AppError> {
    ctx.require(Module::Drills, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let list = app
        .with_db(move |conn| Drill::list(conn, &org_id, &filter))
        .await?;
    Ok(Json(list))
}

/// POST /api/drills: manager+; schedule a drill.
pub async fn schedule_drill(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<DrillInput>,
) -> Result<(StatusCode, Json<Drill>), AppError> {
    ctx.require(Module::Drills, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let d = app
        .with_db(move |conn| Drill::schedule(conn, &org_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(d)))
}

/// GET /api/drills/{id}: drill with stations and check-ins.
pub async fn get_drill(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<DrillDetail>, AppError> {
    ctx.require(Module::Drills, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let d = app
        .with_db(move |conn| Drill::load_detail(conn, &org_id, &id))
        .await?;
    Ok(Json(d))
}

/// POST /api/drills/{id}/start: manager+.
pub async fn start_drill(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<Drill>, AppError> {
    ctx.require(Module::Drills, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let d = app.with_db(move |conn| Drill::start(conn, &org_id, &id)).await?;
    tracing::info!(org = %ctx.org_id, drill = %d.id, "drill started");
    Ok(Json(d))
}

/// POST /api/drills/{id}/end: manager+.
pub async fn end_drill(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<Drill>, AppError> {
    ctx.require(Module::Drills, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let d = app.with_db(move |conn| Drill::end(conn, &org_id, &id)).await?;
    tracing::info!(org = %ctx.org_id, drill = %d.id, "drill ended");
    Ok(Json(d))
}

/// POST /api/drills/{id}/cancel: manager+.
pub async fn cancel_drill(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<Drill>, AppError> {
    ctx.require(Module::Drills, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let d = app.with_db(move |conn| Drill::cancel(conn, &org_id, &id)).await?;
    Ok(Json(d))
}

#[derive(serde::Deserialize)]
pub struct StationBody {
    pub name: String,
}

/// POST /api/drills/{id}/stations: manager+; appended after the last station.
pub async fn add_station(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<StationBody>,
) -> Result<(StatusCode, Json<DrillStation>), AppError> {
    ctx.require(Module::Drills, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let s = app
        .with_db(move |conn| Drill::add_station(conn, &org_id, &id, &body.name))
        .await?;
    Ok((StatusCode::CREATED, Json(s)))
}

#[derive(serde::Deserialize)]
pub struct OrderBody {
    pub station_ids: Vec<String>,
}

/// PUT /api/drills/{id}/stations/order: manager+.
pub async fn reorder_stations(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<OrderBody>,
) -> Result<Json<Vec<DrillStation>>, AppError> {
    ctx.require(Module::Drills, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let stations = app
        .with_db(move |conn| Drill::reorder_stations(conn, &org_id, &id, &body.station_ids))
        .await?;
    Ok(Json(stations))
}

/// POST /api/drills/{id}/checkins: any member, while the drill is active.
pub async fn check_in(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<CheckinInput>,
) -> Result<(StatusCode, Json<DrillCheckin>), AppError> {
    ctx.require(Module::Drills, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let c = app
        .with_db(move |conn| Drill::check_in(conn, &org_id, &id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(c)))
}
