use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use carecomp_core::contact::{ContactInput, ContactMessage};

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/contact: public contact form; no organization context.
pub async fn submit_contact(
    State(app): State<AppState>,
    Json(body): Json<ContactInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let msg = app.with_db(move |conn| ContactMessage::record(conn, body)).await?;
    tracing::info!(id = %msg.id, "contact message received");
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "ok": true, "id": msg.id })),
    ))
}
