use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use carecomp_core::error::CarecompError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// HTTP status for a core error.
pub fn status_for(e: &CarecompError) -> StatusCode {
    match e {
        CarecompError::NotInitialized | CarecompError::MissingOrgContext(_) => StatusCode::BAD_REQUEST,
        CarecompError::NotAMember { .. }
        | CarecompError::PermissionDenied { .. }
        | CarecompError::FeatureDisabled(_) => StatusCode::FORBIDDEN,
        CarecompError::OrgNotFound(_)
        | CarecompError::FacilityNotFound(_)
        | CarecompError::StaffNotFound(_)
        | CarecompError::CompetencyNotFound(_)
        | CarecompError::AssignmentNotFound(_)
        | CarecompError::DeficiencyNotFound(_)
        | CarecompError::PlanNotFound(_)
        | CarecompError::PolicyNotFound(_)
        | CarecompError::DrillNotFound(_)
        | CarecompError::StationNotFound(_)
        | CarecompError::TrackNotFound(_)
        | CarecompError::SectionNotFound(_)
        | CarecompError::ModuleNotFound(_) => StatusCode::NOT_FOUND,
        CarecompError::AlreadyExists(_) | CarecompError::InUse(_) => StatusCode::CONFLICT,
        CarecompError::Validation { .. }
        | CarecompError::InvalidRole(_)
        | CarecompError::InvalidStatus(_)
        | CarecompError::InvalidRiskLevel(_)
        | CarecompError::UnknownModule(_) => StatusCode::BAD_REQUEST,
        CarecompError::InvalidTransition { .. } | CarecompError::DrillNotActive { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CarecompError::Db(_)
        | CarecompError::Io(_)
        | CarecompError::Yaml(_)
        | CarecompError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self
            .0
            .downcast_ref::<CarecompError>()
            .map(status_for)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
