use crate::error::CarecompError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowercase, trim, and fold `-` / spaces into `_` so "In Progress",
/// "in-progress" and "in_progress" compare equal.
pub fn normalize_token(s: &str) -> String {
    s.trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Membership role. Declaration order is the privilege order:
/// `staff < manager < admin < dev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Staff,
    Manager,
    Admin,
    Dev,
}

impl Role {
    pub fn all() -> &'static [Role] {
        &[Role::Staff, Role::Manager, Role::Admin, Role::Dev]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Admin => "admin",
            Role::Dev => "dev",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "staff" => Ok(Role::Staff),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            "dev" => Ok(Role::Dev),
            _ => Err(CarecompError::InvalidRole(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// AssignmentStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
        }
    }

    /// Bucket any raw status string. Completion words map to `Completed`,
    /// progress words to `InProgress`, everything else to `Assigned`.
    pub fn bucket(raw: Option<&str>) -> AssignmentStatus {
        match raw.map(normalize_token).as_deref() {
            Some("completed" | "complete" | "done" | "resolved") => AssignmentStatus::Completed,
            Some("in_progress" | "started" | "inprogress") => AssignmentStatus::InProgress,
            _ => AssignmentStatus::Assigned,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "assigned" => Ok(AssignmentStatus::Assigned),
            "in_progress" => Ok(AssignmentStatus::InProgress),
            "completed" => Ok(AssignmentStatus::Completed),
            _ => Err(CarecompError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// DueStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueStatus {
    Overdue,
    DueSoon,
    OnTrack,
    Completed,
}

impl DueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DueStatus::Overdue => "overdue",
            DueStatus::DueSoon => "due_soon",
            DueStatus::OnTrack => "on_track",
            DueStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DueStatus {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "overdue" => Ok(DueStatus::Overdue),
            "due_soon" => Ok(DueStatus::DueSoon),
            "on_track" => Ok(DueStatus::OnTrack),
            "completed" => Ok(DueStatus::Completed),
            _ => Err(CarecompError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// RiskLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            _ => Err(CarecompError::InvalidRiskLevel(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// DeficiencyStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeficiencyStatus {
    Open,
    InProgress,
    Resolved,
}

impl DeficiencyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeficiencyStatus::Open => "open",
            DeficiencyStatus::InProgress => "in_progress",
            DeficiencyStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for DeficiencyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeficiencyStatus {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "open" => Ok(DeficiencyStatus::Open),
            "in_progress" => Ok(DeficiencyStatus::InProgress),
            "resolved" => Ok(DeficiencyStatus::Resolved),
            _ => Err(CarecompError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// PocStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PocStatus {
    Draft,
    Submitted,
    Accepted,
    Rejected,
}

impl PocStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PocStatus::Draft => "draft",
            PocStatus::Submitted => "submitted",
            PocStatus::Accepted => "accepted",
            PocStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PocStatus {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "draft" => Ok(PocStatus::Draft),
            "submitted" => Ok(PocStatus::Submitted),
            "accepted" => Ok(PocStatus::Accepted),
            "rejected" => Ok(PocStatus::Rejected),
            _ => Err(CarecompError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// DrillStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl DrillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DrillStatus::Scheduled => "scheduled",
            DrillStatus::Active => "active",
            DrillStatus::Completed => "completed",
            DrillStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DrillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DrillStatus {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "scheduled" => Ok(DrillStatus::Scheduled),
            "active" => Ok(DrillStatus::Active),
            "completed" => Ok(DrillStatus::Completed),
            "cancelled" => Ok(DrillStatus::Cancelled),
            _ => Err(CarecompError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ModuleStatus
// ---------------------------------------------------------------------------

/// Per-staff completion state of a track module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ModuleStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleStatus::NotStarted => "not_started",
            ModuleStatus::InProgress => "in_progress",
            ModuleStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModuleStatus {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "not_started" => Ok(ModuleStatus::NotStarted),
            "in_progress" => Ok(ModuleStatus::InProgress),
            "completed" => Ok(ModuleStatus::Completed),
            _ => Err(CarecompError::InvalidStatus(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// Product area that can be switched on or off per organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    Admin,
    Assignments,
    Competencies,
    Deficiencies,
    Drills,
    Facilities,
    Library,
    Policies,
    Settings,
    Staff,
    Tracks,
}

impl Module {
    pub fn all() -> &'static [Module] {
        &[
            Module::Admin,
            Module::Assignments,
            Module::Competencies,
            Module::Deficiencies,
            Module::Drills,
            Module::Facilities,
            Module::Library,
            Module::Policies,
            Module::Settings,
            Module::Staff,
            Module::Tracks,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Module::Admin => "admin",
            Module::Assignments => "assignments",
            Module::Competencies => "competencies",
            Module::Deficiencies => "deficiencies",
            Module::Drills => "drills",
            Module::Facilities => "facilities",
            Module::Library => "library",
            Module::Policies => "policies",
            Module::Settings => "settings",
            Module::Staff => "staff",
            Module::Tracks => "tracks",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Module {
    type Err = CarecompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = normalize_token(s);
        Module::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == norm)
            .ok_or_else(|| CarecompError::UnknownModule(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
