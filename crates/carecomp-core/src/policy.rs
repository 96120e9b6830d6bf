use crate::db::{json_col, new_id};
use crate::error::{CarecompError, Result};
use crate::facility::Facility;
use crate::paths;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CATEGORY: &str = "general";

/// A stored policy document. `facility_id: None` means the policy applies
/// across the organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub org_id: String,
    pub facility_id: Option<String>,
    pub title: String,
    pub category: String,
    pub file_url: String,
    pub tags: Vec<String>,
    pub version: u32,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyInput {
    #[serde(default)]
    pub facility_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub file_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyFilter {
    /// Policies of this facility plus the org-wide ones.
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub include_archived: bool,
}

const COLUMNS: &str = "id, org_id, facility_id, title, category, file_url, tags, version, \
                       archived, created_at, updated_at";

/// Trimmed, lowercased, de-duplicated tags in first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

impl Policy {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            facility_id: row.get(2)?,
            title: row.get(3)?,
            category: row.get(4)?,
            file_url: row.get(5)?,
            tags: json_col(row, 6)?,
            version: row.get(7)?,
            archived: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn create(conn: &Connection, org_id: &str, input: PolicyInput) -> Result<Self> {
        if let Some(facility_id) = &input.facility_id {
            Facility::load(conn, org_id, facility_id)?;
        }
        let now = Utc::now();
        let policy = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            facility_id: input.facility_id,
            title: paths::required("title", &input.title)?,
            category: input
                .category
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            file_url: paths::required("file_url", &input.file_url)?,
            tags: normalize_tags(input.tags),
            version: 1,
            archived: false,
            created_at: now,
            updated_at: now,
        };
        conn.execute(
            &format!("INSERT INTO policies({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
            params![
                policy.id,
                policy.org_id,
                policy.facility_id,
                policy.title,
                policy.category,
                policy.file_url,
                serde_json::to_string(&policy.tags)?,
                policy.version,
                policy.archived,
                policy.created_at,
                policy.updated_at
            ],
        )?;
        Ok(policy)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM policies WHERE org_id = ?1 AND id = ?2"),
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::PolicyNotFound(id.to_string()))
    }

    pub fn list(conn: &Connection, org_id: &str, filter: &PolicyFilter) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM policies
             WHERE org_id = ?1
               AND (?2 IS NULL OR facility_id = ?2 OR facility_id IS NULL)
               AND (?3 IS NULL OR category = ?3)
               AND (?4 = 1 OR archived = 0)
             ORDER BY category, title"
        ))?;
        let category = filter.category.as_deref().map(|c| c.trim().to_lowercase());
        let rows = stmt.query_map(
            params![org_id, filter.facility_id, category, filter.include_archived],
            Self::from_row,
        )?;
        let mut policies = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        if let Some(tag) = &filter.tag {
            let tag = tag.trim().to_lowercase();
            policies.retain(|p| p.tags.contains(&tag));
        }
        Ok(policies)
    }

    /// Replace the document with a new upload and bump the version.
    pub fn publish_version(conn: &Connection, org_id: &str, id: &str, file_url: &str) -> Result<Self> {
        let mut policy = Self::load(conn, org_id, id)?;
        policy.file_url = paths::required("file_url", file_url)?;
        policy.version += 1;
        policy.updated_at = Utc::now();
        conn.execute(
            "UPDATE policies SET file_url = ?1, version = ?2, updated_at = ?3 WHERE org_id = ?4 AND id = ?5",
            params![policy.file_url, policy.version, policy.updated_at, org_id, id],
        )?;
        Ok(policy)
    }

    pub fn set_archived(conn: &Connection, org_id: &str, id: &str, archived: bool) -> Result<Self> {
        let n = conn.execute(
            "UPDATE policies SET archived = ?1, updated_at = ?2 WHERE org_id = ?3 AND id = ?4",
            params![archived, Utc::now(), org_id, id],
        )?;
        if n == 0 {
            return Err(CarecompError::PolicyNotFound(id.to_string()));
        }
        Self::load(conn, org_id, id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
