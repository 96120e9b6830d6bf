use crate::db::{json_col, new_id, parse_col};
use crate::error::{CarecompError, Result};
use crate::gate::{effective_flags, require_feature, require_role, FeatureFlags};
use crate::paths;
use crate::types::{Module, Role};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub is_dev_org: bool,
    pub feature_flags: FeatureFlags,
    pub created_at: DateTime<Utc>,
}

const ORG_COLUMNS: &str = "id, name, is_dev_org, feature_flags, created_at";

impl Organization {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            is_dev_org: row.get(2)?,
            feature_flags: json_col(row, 3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn create(conn: &Connection, name: &str, flags: FeatureFlags) -> Result<Self> {
        let org = Self {
            id: new_id(),
            name: paths::required("name", name)?,
            is_dev_org: false,
            feature_flags: flags,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO organizations(id, name, is_dev_org, feature_flags, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                org.id,
                org.name,
                org.is_dev_org,
                serde_json::to_string(&org.feature_flags)?,
                org.created_at
            ],
        )?;
        Ok(org)
    }

    pub fn load(conn: &Connection, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {ORG_COLUMNS} FROM organizations WHERE id = ?1"),
            params![id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::OrgNotFound(id.to_string()))
    }

    pub fn list(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ORG_COLUMNS} FROM organizations ORDER BY created_at, name"
        ))?;
        let rows = stmt.query_map([], Self::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Organizations the given email belongs to, with the role held in each.
    pub fn list_for_email(conn: &Connection, email: &str) -> Result<Vec<(Self, Role)>> {
        let email = paths::normalize_email(email)?;
        let mut stmt = conn.prepare(
            "SELECT o.id, o.name, o.is_dev_org, o.feature_flags, o.created_at, m.role
             FROM organizations o JOIN memberships m ON m.org_id = o.id
             WHERE m.email = ?1 ORDER BY o.name",
        )?;
        let rows = stmt.query_map(params![email], |row| {
            Ok((Self::from_row(row)?, parse_col::<Role>(row, 5)?))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn set_flags(&mut self, conn: &Connection, updates: &BTreeMap<String, bool>) -> Result<()> {
        self.feature_flags.apply(updates)?;
        conn.execute(
            "UPDATE organizations SET feature_flags = ?1 WHERE id = ?2",
            params![serde_json::to_string(&self.feature_flags)?, self.id],
        )?;
        Ok(())
    }

    pub fn rename(&mut self, conn: &Connection, name: &str) -> Result<()> {
        let name = paths::required("name", name)?;
        conn.execute(
            "UPDATE organizations SET name = ?1 WHERE id = ?2",
            params![name, self.id],
        )?;
        self.name = name;
        Ok(())
    }

    pub fn set_dev_org(&mut self, conn: &Connection, is_dev_org: bool) -> Result<()> {
        conn.execute(
            "UPDATE organizations SET is_dev_org = ?1 WHERE id = ?2",
            params![is_dev_org, self.id],
        )?;
        self.is_dev_org = is_dev_org;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub org_id: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            org_id: row.get(0)?,
            email: row.get(1)?,
            role: parse_col(row, 2)?,
            created_at: row.get(3)?,
        })
    }

    /// Add a member or change an existing member's role.
    pub fn upsert(conn: &Connection, org_id: &str, email: &str, role: Role) -> Result<Self> {
        Organization::load(conn, org_id)?;
        let email = paths::normalize_email(email)?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO memberships(org_id, email, role, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(org_id, email) DO UPDATE SET role = excluded.role",
            params![org_id, email, role.as_str(), now],
        )?;
        Self::load(conn, org_id, &email)?.ok_or_else(|| CarecompError::NotAMember {
            org_id: org_id.to_string(),
            email,
        })
    }

    /// Upsert on behalf of a caller holding `actor`. The caller must hold
    /// both the granted role and the member's current role.
    pub fn upsert_as(conn: &Connection, org_id: &str, actor: Role, email: &str, role: Role) -> Result<Self> {
        require_role(actor, role)?;
        if let Some(existing) = Self::load(conn, org_id, &paths::normalize_email(email)?)? {
            require_role(actor, existing.role)?;
        }
        Self::upsert(conn, org_id, email, role)
    }

    /// Remove on behalf of a caller holding `actor`, who must hold at least
    /// the member's current role.
    pub fn remove_as(conn: &Connection, org_id: &str, actor: Role, email: &str) -> Result<()> {
        if let Some(existing) = Self::load(conn, org_id, &paths::normalize_email(email)?)? {
            require_role(actor, existing.role)?;
        }
        Self::remove(conn, org_id, email)
    }

    pub fn load(conn: &Connection, org_id: &str, email: &str) -> Result<Option<Self>> {
        Ok(conn
            .query_row(
                "SELECT org_id, email, role, created_at FROM memberships
                 WHERE org_id = ?1 AND email = ?2",
                params![org_id, email],
                Self::from_row,
            )
            .optional()?)
    }

    pub fn list(conn: &Connection, org_id: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT org_id, email, role, created_at FROM memberships
             WHERE org_id = ?1 ORDER BY email",
        )?;
        let rows = stmt.query_map(params![org_id], Self::from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn remove(conn: &Connection, org_id: &str, email: &str) -> Result<()> {
        let email = paths::normalize_email(email)?;
        let n = conn.execute(
            "DELETE FROM memberships WHERE org_id = ?1 AND email = ?2",
            params![org_id, email],
        )?;
        if n == 0 {
            return Err(CarecompError::NotAMember {
                org_id: org_id.to_string(),
                email,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OrgContext
// ---------------------------------------------------------------------------

/// The caller's organization, identity, and role for one request.
#[derive(Debug, Clone, Serialize)]
pub struct OrgContext {
    pub org_id: String,
    pub org_name: String,
    pub email: String,
    pub role: Role,
    pub is_dev_org: bool,
    pub flags: FeatureFlags,
}

impl OrgContext {
    /// Resolve the caller's context from an org id and email. Both must be
    /// present and the email must hold a membership in the organization.
    pub fn resolve(conn: &Connection, org_id: Option<&str>, email: Option<&str>) -> Result<Self> {
        let org_id = org_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CarecompError::MissingOrgContext("no organization id".into()))?;
        let email = email
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CarecompError::MissingOrgContext("no user email".into()))?;
        let email = paths::normalize_email(email)?;

        let org = Organization::load(conn, org_id)?;
        let membership =
            Membership::load(conn, &org.id, &email)?.ok_or_else(|| CarecompError::NotAMember {
                org_id: org.id.clone(),
                email: email.clone(),
            })?;

        Ok(Self {
            org_id: org.id,
            org_name: org.name,
            email,
            role: membership.role,
            is_dev_org: org.is_dev_org,
            flags: org.feature_flags,
        })
    }

    pub fn require_role(&self, min: Role) -> Result<()> {
        require_role(self.role, min)
    }

    /// Enforces the stored flags; the dev-org display override does not apply.
    pub fn require_feature(&self, module: Module) -> Result<()> {
        require_feature(&self.flags, module)
    }

    /// Feature check followed by a role check, the usual guard on a route.
    pub fn require(&self, module: Module, min: Role) -> Result<()> {
        self.require_feature(module)?;
        self.require_role(min)
    }

    pub fn display_flags(&self) -> BTreeMap<Module, bool> {
        effective_flags(&self.flags, self.is_dev_org)
    }

    pub fn is_at_least(&self, min: Role) -> bool {
        self.role >= min
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
