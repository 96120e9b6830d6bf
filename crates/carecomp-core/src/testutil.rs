//! Fixtures shared by the store tests.

use crate::competency::{CompetencyInput, CompetencyTemplate};
use crate::db;
use crate::facility::{Facility, FacilityInput};
use crate::gate::FeatureFlags;
use crate::org::{Membership, Organization};
use crate::staff::{StaffInput, StaffMember};
use crate::types::{RiskLevel, Role};
use rusqlite::Connection;

/// In-memory database with one organization and an admin member
/// (`admin@example.org`). Returns the connection and the org id.
pub fn seed_org() -> (Connection, String) {
    let conn = db::open_in_memory().unwrap();
    let org = Organization::create(&conn, "Sunrise Care", FeatureFlags::default()).unwrap();
    Membership::upsert(&conn, &org.id, "admin@example.org", Role::Admin).unwrap();
    (conn, org.id)
}

pub fn second_org(conn: &Connection) -> String {
    Organization::create(conn, "Elsewhere Health", FeatureFlags::default())
        .unwrap()
        .id
}

pub fn seed_facility(conn: &Connection, org_id: &str, name: &str) -> String {
    Facility::create(
        conn,
        org_id,
        FacilityInput {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .unwrap()
    .id
}

/// Staff member named after the local part of `email`.
pub fn seed_staff(conn: &Connection, org_id: &str, facility_id: &str, email: &str) -> StaffMember {
    let name = email.split('@').next().unwrap_or(email);
    StaffMember::create(
        conn,
        org_id,
        StaffInput {
            facility_id: facility_id.to_string(),
            full_name: name.to_string(),
            email: email.to_string(),
            job_title: Some("CNA".to_string()),
        },
    )
    .unwrap()
}

pub fn seed_competency(conn: &Connection, org_id: &str, title: &str) -> String {
    CompetencyTemplate::create(
        conn,
        org_id,
        CompetencyInput {
            title: title.to_string(),
            risk_level: RiskLevel::Medium,
            applicable_roles: Default::default(),
            setting: None,
            language: None,
            sections: Default::default(),
        },
    )
    .unwrap()
    .id
}
