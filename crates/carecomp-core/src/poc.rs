use crate::db::{new_id, parse_col};
use crate::deficiency::SurveyDeficiency;
use crate::error::{CarecompError, Result};
use crate::paths;
use crate::types::{DeficiencyStatus, PocStatus};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Remediation plan for one survey deficiency. A deficiency has at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOfCorrection {
    pub id: String,
    pub org_id: String,
    pub deficiency_id: String,
    pub corrective_action: String,
    pub residents_affected: String,
    pub systemic_changes: String,
    pub monitoring: String,
    pub responsible_party: String,
    pub target_date: Option<NaiveDate>,
    pub status: PocStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanInput {
    pub corrective_action: String,
    #[serde(default)]
    pub residents_affected: String,
    #[serde(default)]
    pub systemic_changes: String,
    #[serde(default)]
    pub monitoring: String,
    #[serde(default)]
    pub responsible_party: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

const COLUMNS: &str = "id, org_id, deficiency_id, corrective_action, residents_affected, \
                       systemic_changes, monitoring, responsible_party, target_date, status, \
                       created_at, updated_at";

impl PlanOfCorrection {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            deficiency_id: row.get(2)?,
            corrective_action: row.get(3)?,
            residents_affected: row.get(4)?,
            systemic_changes: row.get(5)?,
            monitoring: row.get(6)?,
            responsible_party: row.get(7)?,
            target_date: row.get(8)?,
            status: parse_col(row, 9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn find(conn: &Connection, org_id: &str, deficiency_id: &str) -> Result<Option<Self>> {
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM plans_of_correction
                     WHERE org_id = ?1 AND deficiency_id = ?2"
                ),
                params![org_id, deficiency_id],
                Self::from_row,
            )
            .optional()?)
    }

    /// Draft a plan for `deficiency_id`. Fails if the deficiency already has one.
    pub fn create(conn: &Connection, org_id: &str, deficiency_id: &str, input: PlanInput) -> Result<Self> {
        SurveyDeficiency::load(conn, org_id, deficiency_id)?;
        if Self::find(conn, org_id, deficiency_id)?.is_some() {
            return Err(CarecompError::AlreadyExists(format!(
                "plan of correction for deficiency {deficiency_id}"
            )));
        }

        let now = Utc::now();
        let plan = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            deficiency_id: deficiency_id.to_string(),
            corrective_action: paths::required("corrective_action", &input.corrective_action)?,
            residents_affected: input.residents_affected,
            systemic_changes: input.systemic_changes,
            monitoring: input.monitoring,
            responsible_party: input.responsible_party,
            target_date: input.target_date,
            status: PocStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            &format!(
                "INSERT INTO plans_of_correction({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                plan.id,
                plan.org_id,
                plan.deficiency_id,
                plan.corrective_action,
                plan.residents_affected,
                plan.systemic_changes,
                plan.monitoring,
                plan.responsible_party,
                plan.target_date,
                plan.status.as_str(),
                plan.created_at,
                plan.updated_at
            ],
        )?;
        Ok(plan)
    }

    pub fn load_for_deficiency(conn: &Connection, org_id: &str, deficiency_id: &str) -> Result<Self> {
        Self::find(conn, org_id, deficiency_id)?
            .ok_or_else(|| CarecompError::PlanNotFound(deficiency_id.to_string()))
    }

    pub fn update(conn: &Connection, org_id: &str, deficiency_id: &str, input: PlanInput) -> Result<Self> {
        let mut plan = Self::load_for_deficiency(conn, org_id, deficiency_id)?;
        plan.corrective_action = paths::required("corrective_action", &input.corrective_action)?;
        plan.residents_affected = input.residents_affected;
        plan.systemic_changes = input.systemic_changes;
        plan.monitoring = input.monitoring;
        plan.responsible_party = input.responsible_party;
        plan.target_date = input.target_date;
        plan.updated_at = Utc::now();
        conn.execute(
            "UPDATE plans_of_correction SET corrective_action = ?1, residents_affected = ?2,
                 systemic_changes = ?3, monitoring = ?4, responsible_party = ?5,
                 target_date = ?6, updated_at = ?7
             WHERE org_id = ?8 AND id = ?9",
            params![
                plan.corrective_action,
                plan.residents_affected,
                plan.systemic_changes,
                plan.monitoring,
                plan.responsible_party,
                plan.target_date,
                plan.updated_at,
                org_id,
                plan.id
            ],
        )?;
        Ok(plan)
    }

    /// Set the plan status. Accepting a plan moves an `open` deficiency to
    /// `in_progress`.
    pub fn set_status(conn: &Connection, org_id: &str, deficiency_id: &str, status: PocStatus) -> Result<Self> {
        let mut plan = Self::load_for_deficiency(conn, org_id, deficiency_id)?;
        plan.status = status;
        plan.updated_at = Utc::now();

        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "UPDATE plans_of_correction SET status = ?1, updated_at = ?2 WHERE org_id = ?3 AND id = ?4",
            params![plan.status.as_str(), plan.updated_at, org_id, plan.id],
        )?;
        if status == PocStatus::Accepted {
            tx.execute(
                "UPDATE deficiencies SET status = ?1 WHERE org_id = ?2 AND id = ?3 AND status = ?4",
                params![
                    DeficiencyStatus::InProgress.as_str(),
                    org_id,
                    deficiency_id,
                    DeficiencyStatus::Open.as_str()
                ],
            )?;
        }
        tx.commit()?;
        Ok(plan)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deficiency::DeficiencyInput;
    use crate::testutil::{second_org, seed_facility, seed_org};

    fn seed_deficiency(conn: &Connection, org: &str) -> SurveyDeficiency {
        let f = seed_facility(conn, org, "Maple");
        SurveyDeficiency::create(
            conn,
            org,
            DeficiencyInput {
                facility_id: f,
                tag_code: "F880".to_string(),
                severity: "E".to_string(),
                scope: "pattern".to_string(),
                narrative: "Infection control lapses.".to_string(),
                survey_date: NaiveDate::from_ymd_opt(2025, 9, 1),
            },
        )
        .unwrap()
    }

    fn plan(action: &str) -> PlanInput {
        PlanInput {
            corrective_action: action.to_string(),
            responsible_party: "DON".to_string(),
            target_date: NaiveDate::from_ymd_opt(2025, 10, 15),
            ..Default::default()
        }
    }

    #[test]
    fn one_plan_per_deficiency() {
        let (conn, org) = seed_org();
        let d = seed_deficiency(&conn, &org);
        let p = PlanOfCorrection::create(&conn, &org, &d.id, plan("Retrain")).unwrap();
        assert_eq!(p.status, PocStatus::Draft);

        let err = PlanOfCorrection::create(&conn, &org, &d.id, plan("Again")).unwrap_err();
        assert!(matches!(err, CarecompError::AlreadyExists(_)));
    }

    #[test]
    fn accepting_moves_open_deficiency_to_in_progress() {
        let (conn, org) = seed_org();
        let d = seed_deficiency(&conn, &org);
        PlanOfCorrection::create(&conn, &org, &d.id, plan("Retrain")).unwrap();

        PlanOfCorrection::set_status(&conn, &org, &d.id, PocStatus::Submitted).unwrap();
        assert_eq!(
            SurveyDeficiency::load(&conn, &org, &d.id).unwrap().status,
            DeficiencyStatus::Open
        );

        PlanOfCorrection::set_status(&conn, &org, &d.id, PocStatus::Accepted).unwrap();
        assert_eq!(
            SurveyDeficiency::load(&conn, &org, &d.id).unwrap().status,
            DeficiencyStatus::InProgress
        );
    }

    #[test]
    fn accepting_leaves_resolved_deficiency_alone() {
        let (conn, org) = seed_org();
        let d = seed_deficiency(&conn, &org);
        PlanOfCorrection::create(&conn, &org, &d.id, plan("Retrain")).unwrap();
        SurveyDeficiency::set_status(&conn, &org, &d.id, DeficiencyStatus::Resolved).unwrap();

        PlanOfCorrection::set_status(&conn, &org, &d.id, PocStatus::Accepted).unwrap();
        assert_eq!(
            SurveyDeficiency::load(&conn, &org, &d.id).unwrap().status,
            DeficiencyStatus::Resolved
        );
    }

    #[test]
    fn update_requires_corrective_action() {
        let (conn, org) = seed_org();
        let d = seed_deficiency(&conn, &org);
        PlanOfCorrection::create(&conn, &org, &d.id, plan("Retrain")).unwrap();
        assert!(PlanOfCorrection::update(&conn, &org, &d.id, plan(" ")).is_err());

        let updated = PlanOfCorrection::update(&conn, &org, &d.id, plan("Retrain and audit")).unwrap();
        assert_eq!(updated.corrective_action, "Retrain and audit");
    }

    #[test]
    fn plan_is_invisible_to_other_org() {
        let (conn, org) = seed_org();
        let d = seed_deficiency(&conn, &org);
        PlanOfCorrection::create(&conn, &org, &d.id, plan("Retrain")).unwrap();
        let other = second_org(&conn);
        assert!(matches!(
            PlanOfCorrection::load_for_deficiency(&conn, &other, &d.id),
            Err(CarecompError::PlanNotFound(_))
        ));
        assert!(matches!(
            PlanOfCorrection::create(&conn, &other, &d.id, plan("Hijack")),
            Err(CarecompError::DeficiencyNotFound(_))
        ));
    }
}
