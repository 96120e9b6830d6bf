use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarecompError {
    #[error("not initialized: run 'carecomp init'")]
    NotInitialized,

    #[error("missing organization context: {0}")]
    MissingOrgContext(String),

    #[error("organization not found: {0}")]
    OrgNotFound(String),

    #[error("{email} is not a member of organization {org_id}")]
    NotAMember { org_id: String, email: String },

    #[error("permission denied: requires {required}, caller is {actual}")]
    PermissionDenied { required: String, actual: String },

    #[error("module '{0}' is disabled for this organization")]
    FeatureDisabled(String),

    #[error("facility not found: {0}")]
    FacilityNotFound(String),

    #[error("staff member not found: {0}")]
    StaffNotFound(String),

    #[error("competency not found: {0}")]
    CompetencyNotFound(String),

    #[error("assignment not found: {0}")]
    AssignmentNotFound(String),

    #[error("deficiency not found: {0}")]
    DeficiencyNotFound(String),

    #[error("plan of correction not found for deficiency: {0}")]
    PlanNotFound(String),

    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    #[error("drill not found: {0}")]
    DrillNotFound(String),

    #[error("drill station not found: {0}")]
    StationNotFound(String),

    #[error("track not found: {0}")]
    TrackNotFound(String),

    #[error("track section not found: {0}")]
    SectionNotFound(String),

    #[error("track module not found: {0}")]
    ModuleNotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("in use: {0}")]
    InUse(String),

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid risk level: {0}")]
    InvalidRiskLevel(String),

    #[error("unknown module: {0}")]
    UnknownModule(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("drill {id} is {status}; check-ins need an active drill")]
    DrillNotActive { id: String, status: String },

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CarecompError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        CarecompError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for every `*NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
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
                | CarecompError::ModuleNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CarecompError>;
