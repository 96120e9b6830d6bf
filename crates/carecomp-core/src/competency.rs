use crate::db::{json_col, new_id, parse_col};
use crate::error::{CarecompError, Result};
use crate::paths;
use crate::types::RiskLevel;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Section keys the competency builder offers out of the box. Other keys are
/// accepted as-is.
pub const STANDARD_SECTIONS: &[&str] = &[
    "purpose",
    "objectives",
    "procedure",
    "evaluation",
    "quiz",
    "references",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyTemplate {
    pub id: String,
    pub org_id: String,
    pub title: String,
    pub risk_level: RiskLevel,
    pub applicable_roles: BTreeSet<String>,
    pub setting: Option<String>,
    pub language: String,
    pub sections: BTreeMap<String, String>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetencyInput {
    pub title: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub applicable_roles: BTreeSet<String>,
    #[serde(default)]
    pub setting: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompetencyFilter {
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    /// Only templates that list this role (case-insensitive).
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

const COLUMNS: &str = "id, org_id, title, risk_level, applicable_roles, setting, language, \
                       sections, archived, created_at, updated_at";

fn normalize_roles(roles: BTreeSet<String>) -> BTreeSet<String> {
    roles
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect()
}

/// Drop blank section keys and trim keys to lowercase.
fn normalize_sections(sections: BTreeMap<String, String>) -> BTreeMap<String, String> {
    sections
        .into_iter()
        .filter_map(|(k, v)| {
            let key = k.trim().to_ascii_lowercase();
            (!key.is_empty()).then_some((key, v))
        })
        .collect()
}

impl CompetencyTemplate {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            title: row.get(2)?,
            risk_level: parse_col(row, 3)?,
            applicable_roles: json_col(row, 4)?,
            setting: row.get(5)?,
            language: row.get(6)?,
            sections: json_col(row, 7)?,
            archived: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn create(conn: &Connection, org_id: &str, input: CompetencyInput) -> Result<Self> {
        let now = Utc::now();
        let template = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            title: paths::required("title", &input.title)?,
            risk_level: input.risk_level,
            applicable_roles: normalize_roles(input.applicable_roles),
            setting: input.setting,
            language: input.language.unwrap_or_else(|| "en".to_string()),
            sections: normalize_sections(input.sections),
            archived: false,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            &format!(
                "INSERT INTO competencies({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                template.id,
                template.org_id,
                template.title,
                template.risk_level.as_str(),
                serde_json::to_string(&template.applicable_roles)?,
                template.setting,
                template.language,
                serde_json::to_string(&template.sections)?,
                template.archived,
                template.created_at,
                template.updated_at
            ],
        )?;
        Ok(template)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM competencies WHERE org_id = ?1 AND id = ?2"),
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::CompetencyNotFound(id.to_string()))
    }

    pub fn list(conn: &Connection, org_id: &str, filter: &CompetencyFilter) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM competencies
             WHERE org_id = ?1
               AND (?2 IS NULL OR risk_level = ?2)
               AND (?3 = 1 OR archived = 0)
             ORDER BY title"
        ))?;
        let rows = stmt.query_map(
            params![
                org_id,
                filter.risk_level.map(RiskLevel::as_str),
                filter.include_archived
            ],
            Self::from_row,
        )?;
        let mut templates = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        if let Some(role) = &filter.role {
            templates.retain(|t| t.applies_to(role));
        }
        Ok(templates)
    }

    /// True when `role` is listed, or when the template lists no roles at all.
    pub fn applies_to(&self, role: &str) -> bool {
        self.applicable_roles.is_empty()
            || self
                .applicable_roles
                .iter()
                .any(|r| r.eq_ignore_ascii_case(role.trim()))
    }

    pub fn update(conn: &Connection, org_id: &str, id: &str, input: CompetencyInput) -> Result<Self> {
        let mut template = Self::load(conn, org_id, id)?;
        template.title = paths::required("title", &input.title)?;
        template.risk_level = input.risk_level;
        template.applicable_roles = normalize_roles(input.applicable_roles);
        template.setting = input.setting;
        if let Some(lang) = input.language {
            template.language = lang;
        }
        template.sections = normalize_sections(input.sections);
        template.updated_at = Utc::now();

        conn.execute(
            "UPDATE competencies SET title = ?1, risk_level = ?2, applicable_roles = ?3,
                 setting = ?4, language = ?5, sections = ?6, updated_at = ?7
             WHERE org_id = ?8 AND id = ?9",
            params![
                template.title,
                template.risk_level.as_str(),
                serde_json::to_string(&template.applicable_roles)?,
                template.setting,
                template.language,
                serde_json::to_string(&template.sections)?,
                template.updated_at,
                org_id,
                id
            ],
        )?;
        Ok(template)
    }

    /// Replace or add a single content section.
    pub fn set_section(conn: &Connection, org_id: &str, id: &str, key: &str, body: &str) -> Result<Self> {
        let mut template = Self::load(conn, org_id, id)?;
        let key = paths::required("section", key)?.to_ascii_lowercase();
        template.sections.insert(key, body.to_string());
        template.updated_at = Utc::now();
        conn.execute(
            "UPDATE competencies SET sections = ?1, updated_at = ?2 WHERE org_id = ?3 AND id = ?4",
            params![
                serde_json::to_string(&template.sections)?,
                template.updated_at,
                org_id,
                id
            ],
        )?;
        Ok(template)
    }

    pub fn set_archived(conn: &Connection, org_id: &str, id: &str, archived: bool) -> Result<Self> {
        let n = conn.execute(
            "UPDATE competencies SET archived = ?1, updated_at = ?2 WHERE org_id = ?3 AND id = ?4",
            params![archived, Utc::now(), org_id, id],
        )?;
        if n == 0 {
            return Err(CarecompError::CompetencyNotFound(id.to_string()));
        }
        Self::load(conn, org_id, id)
    }

    /// Delete a template. Refused while any assignment references it.
    pub fn delete(conn: &Connection, org_id: &str, id: &str) -> Result<()> {
        Self::load(conn, org_id, id)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM assignments WHERE org_id = ?1 AND competency_id = ?2",
            params![org_id, id],
            |r| r.get(0),
        )?;
        if count > 0 {
            return Err(CarecompError::InUse(format!(
                "competency {id} has {count} assignments; archive it instead"
            )));
        }
        conn.execute(
            "DELETE FROM competencies WHERE org_id = ?1 AND id = ?2",
            params![org_id, id],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{second_org, seed_org};

    fn input(title: &str, risk: RiskLevel, roles: &[&str]) -> CompetencyInput {
        let mut sections = BTreeMap::new();
        sections.insert("Purpose".to_string(), "Prevent infection spread.".to_string());
        sections.insert("  ".to_string(), "dropped".to_string());
        CompetencyInput {
            title: title.to_string(),
            risk_level: risk,
            applicable_roles: roles.iter().map(|r| r.to_string()).collect(),
            setting: Some("Skilled nursing".to_string()),
            language: None,
            sections,
        }
    }

    #[test]
    fn create_normalizes_sections_and_defaults_language() {
        let (conn, org) = seed_org();
        let c = CompetencyTemplate::create(&conn, &org, input("Hand Hygiene", RiskLevel::High, &["RN"]))
            .unwrap();
        assert_eq!(c.language, "en");
        assert_eq!(c.sections.len(), 1);
        assert!(c.sections.contains_key("purpose"));

        let loaded = CompetencyTemplate::load(&conn, &org, &c.id).unwrap();
        assert_eq!(loaded.risk_level, RiskLevel::High);
        assert!(loaded.applicable_roles.contains("RN"));
    }

    #[test]
    fn list_filters() {
        let (conn, org) = seed_org();
        CompetencyTemplate::create(&conn, &org, input("Hand Hygiene", RiskLevel::High, &["RN"])).unwrap();
        CompetencyTemplate::create(&conn, &org, input("Fire Safety", RiskLevel::Low, &[])).unwrap();
        let archived =
            CompetencyTemplate::create(&conn, &org, input("Old", RiskLevel::High, &["CNA"])).unwrap();
        CompetencyTemplate::set_archived(&conn, &org, &archived.id, true).unwrap();

        let high = CompetencyTemplate::list(
            &conn,
            &org,
            &CompetencyFilter {
                risk_level: Some(RiskLevel::High),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(high.len(), 1);

        let for_cna = CompetencyTemplate::list(
            &conn,
            &org,
            &CompetencyFilter {
                role: Some("cna".to_string()),
                include_archived: true,
                ..Default::default()
            },
        )
        .unwrap();
        // "Fire Safety" lists no roles and applies to everyone.
        let titles: Vec<_> = for_cna.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Fire Safety", "Old"]);
    }

    #[test]
    fn set_section_adds_key() {
        let (conn, org) = seed_org();
        let c = CompetencyTemplate::create(&conn, &org, input("Hand Hygiene", RiskLevel::High, &[])).unwrap();
        let c = CompetencyTemplate::set_section(&conn, &org, &c.id, "Quiz", "Q1. ...").unwrap();
        assert_eq!(c.sections.get("quiz").map(String::as_str), Some("Q1. ..."));
    }

    #[test]
    fn cross_org_access_is_not_found() {
        let (conn, org) = seed_org();
        let other = second_org(&conn);
        let c = CompetencyTemplate::create(&conn, &org, input("Hand Hygiene", RiskLevel::High, &[])).unwrap();
        assert!(matches!(
            CompetencyTemplate::load(&conn, &other, &c.id),
            Err(CarecompError::CompetencyNotFound(_))
        ));
        assert!(CompetencyTemplate::delete(&conn, &other, &c.id).is_err());
    }
}
