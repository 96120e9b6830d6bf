use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::competency::{CompetencyFilter, CompetencyInput, CompetencyTemplate};
use carecomp_core::types::{Module, Role};

use crate::context::Org;
use crate::error::AppError;
use crate::state::AppState;

/// GET /api/competencies?risk_level=&role=&include_archived=: browsing the
/// template library is gated by `library`; authoring by `competencies`.
pub async fn list_competencies(
    State(app): State<AppState>,
    Org(ctx): Org,
    Query(filter): Query<CompetencyFilter>,
) -> Result<Json<Vec<CompetencyTemplate>>, AppError> {
    ctx.require(Module::Library, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let list = app
        .with_db(move |conn| CompetencyTemplate::list(conn, &org_id, &filter))
        .await?;
    Ok(Json(list))
}

/// POST /api/competencies: manager+.
pub async fn create_competency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Json(body): Json<CompetencyInput>,
) -> Result<(StatusCode, Json<CompetencyTemplate>), AppError> {
    ctx.require(Module::Competencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let c = app
        .with_db(move |conn| CompetencyTemplate::create(conn, &org_id, body))
        .await?;
    tracing::info!(org = %ctx.org_id, competency = %c.id, "competency created");
    Ok((StatusCode::CREATED, Json(c)))
}

/// GET /api/competencies/{id}
pub async fn get_competency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<Json<CompetencyTemplate>, AppError> {
    ctx.require(Module::Library, Role::Staff)?;
    let org_id = ctx.org_id.clone();
    let c = app
        .with_db(move |conn| CompetencyTemplate::load(conn, &org_id, &id))
        .await?;
    Ok(Json(c))
}

/// PUT /api/competencies/{id}: manager+.
pub async fn update_competency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    Json(body): Json<CompetencyInput>,
) -> Result<Json<CompetencyTemplate>, AppError> {
    ctx.require(Module::Competencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let c = app
        .with_db(move |conn| CompetencyTemplate::update(conn, &org_id, &id, body))
        .await?;
    Ok(Json(c))
}

#[derive(serde::Deserialize)]
pub struct SectionBody {
    pub body: String,
}

/// PUT /api/competencies/{id}/sections/{key}: manager+.
pub async fn put_section(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path((id, key)): Path<(String, String)>,
    Json(body): Json<SectionBody>,
) -> Result<Json<CompetencyTemplate>, AppError> {
    ctx.require(Module::Competencies, Role::Manager)?;
    let org_id = ctx.org_id.clone();
    let c = app
        .with_db(move |conn| CompetencyTemplate::set_section(conn, &org_id, &id, &key, &body.body))
        .await?;
    Ok(Json(c))
}

#[derive(serde::Deserialize)]
pub struct ArchiveBody {
    #[serde(default = "default_true")]
    pub archived: bool,
}

fn default_true() -> bool {
    true
}

/// POST /api/competencies/{id}/archive: manager+.
pub async fn archive_competency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
    body: Option<Json<ArchiveBody>>,
) -> Result<Json<CompetencyTemplate>, AppError> {
    ctx.require(Module::Competencies, Role::Manager)?;
    let archived = body.map(|Json(b)| b.archived).unwrap_or(true);
    let org_id = ctx.org_id.clone();
    let c = app
        .with_db(move |conn| CompetencyTemplate::set_archived(conn, &org_id, &id, archived))
        .await?;
    Ok(Json(c))
}

/// DELETE /api/competencies/{id}: admin; refused while assignments exist.
pub async fn delete_competency(
    State(app): State<AppState>,
    Org(ctx): Org,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.require(Module::Competencies, Role::Admin)?;
    let org_id = ctx.org_id.clone();
    app.with_db(move |conn| CompetencyTemplate::delete(conn, &org_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
