//! Emergency drills: scheduling, the `scheduled → active → completed` state
//! machine, stations, and live check-ins.

use crate::db::{new_id, parse_col};
use crate::error::{CarecompError, Result};
use crate::facility::Facility;
use crate::paths;
use crate::types::DrillStatus;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Drill {
    pub id: String,
    pub org_id: String,
    pub facility_id: String,
    pub drill_type: String,
    pub scheduled_for: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: DrillStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillStation {
    pub id: String,
    pub drill_id: String,
    pub name: String,
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillCheckin {
    pub id: String,
    pub drill_id: String,
    pub station_id: Option<String>,
    pub name: String,
    pub role: String,
    pub checked_in_at: DateTime<Utc>,
}

/// A drill with its stations (in order) and check-ins (oldest first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillDetail {
    #[serde(flatten)]
    pub drill: Drill,
    pub stations: Vec<DrillStation>,
    pub checkins: Vec<DrillCheckin>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrillInput {
    pub facility_id: String,
    pub drill_type: String,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrillFilter {
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub status: Option<DrillStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckinInput {
    #[serde(default)]
    pub station_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub role: String,
}

/// Allowed drill status moves.
pub fn can_transition(from: DrillStatus, to: DrillStatus) -> bool {
    matches!(
        (from, to),
        (DrillStatus::Scheduled, DrillStatus::Active)
            | (DrillStatus::Active, DrillStatus::Completed)
            | (DrillStatus::Scheduled, DrillStatus::Cancelled)
            | (DrillStatus::Active, DrillStatus::Cancelled)
    )
}

const COLUMNS: &str = "id, org_id, facility_id, drill_type, scheduled_for, started_at, ended_at, \
                       status, notes, created_at";

impl Drill {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            facility_id: row.get(2)?,
            drill_type: row.get(3)?,
            scheduled_for: row.get(4)?,
            started_at: row.get(5)?,
            ended_at: row.get(6)?,
            status: parse_col(row, 7)?,
            notes: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    pub fn schedule(conn: &Connection, org_id: &str, input: DrillInput) -> Result<Self> {
        Facility::load(conn, org_id, &input.facility_id)?;
        let drill = Self {
            id: new_id(),
            org_id: org_id.to_string(),
            facility_id: input.facility_id,
            drill_type: paths::required("drill_type", &input.drill_type)?.to_lowercase(),
            scheduled_for: input.scheduled_for,
            started_at: None,
            ended_at: None,
            status: DrillStatus::Scheduled,
            notes: input.notes,
            created_at: Utc::now(),
        };
        conn.execute(
            &format!("INSERT INTO drills({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                drill.id,
                drill.org_id,
                drill.facility_id,
                drill.drill_type,
                drill.scheduled_for,
                drill.started_at,
                drill.ended_at,
                drill.status.as_str(),
                drill.notes,
                drill.created_at
            ],
        )?;
        Ok(drill)
    }

    pub fn load(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        conn.query_row(
            &format!("SELECT {COLUMNS} FROM drills WHERE org_id = ?1 AND id = ?2"),
            params![org_id, id],
            Self::from_row,
        )
        .optional()?
        .ok_or_else(|| CarecompError::DrillNotFound(id.to_string()))
    }

    pub fn load_detail(conn: &Connection, org_id: &str, id: &str) -> Result<DrillDetail> {
        let drill = Self::load(conn, org_id, id)?;
        let stations = Self::stations(conn, &drill.id)?;

        let mut stmt = conn.prepare(
            "SELECT id, drill_id, station_id, name, role, checked_in_at
             FROM drill_checkins WHERE drill_id = ?1 ORDER BY checked_in_at, rowid",
        )?;
        let checkins = stmt
            .query_map(params![drill.id], |row| {
                Ok(DrillCheckin {
                    id: row.get(0)?,
                    drill_id: row.get(1)?,
                    station_id: row.get(2)?,
                    name: row.get(3)?,
                    role: row.get(4)?,
                    checked_in_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(DrillDetail {
            drill,
            stations,
            checkins,
        })
    }

    fn stations(conn: &Connection, drill_id: &str) -> Result<Vec<DrillStation>> {
        let mut stmt = conn.prepare(
            "SELECT id, drill_id, name, order_index FROM drill_stations
             WHERE drill_id = ?1 ORDER BY order_index",
        )?;
        let rows = stmt.query_map(params![drill_id], |row| {
            Ok(DrillStation {
                id: row.get(0)?,
                drill_id: row.get(1)?,
                name: row.get(2)?,
                order_index: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list(conn: &Connection, org_id: &str, filter: &DrillFilter) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM drills
             WHERE org_id = ?1
               AND (?2 IS NULL OR facility_id = ?2)
               AND (?3 IS NULL OR status = ?3)
             ORDER BY scheduled_for"
        ))?;
        let rows = stmt.query_map(
            params![org_id, filter.facility_id, filter.status.map(DrillStatus::as_str)],
            Self::from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn transition(conn: &Connection, org_id: &str, id: &str, to: DrillStatus) -> Result<Self> {
        let mut drill = Self::load(conn, org_id, id)?;
        if !can_transition(drill.status, to) {
            return Err(CarecompError::InvalidTransition {
                from: drill.status.to_string(),
                to: to.to_string(),
            });
        }
        let now = Utc::now();
        match to {
            DrillStatus::Active => drill.started_at = Some(now),
            DrillStatus::Completed | DrillStatus::Cancelled => drill.ended_at = Some(now),
            DrillStatus::Scheduled => {}
        }
        drill.status = to;
        conn.execute(
            "UPDATE drills SET status = ?1, started_at = ?2, ended_at = ?3 WHERE org_id = ?4 AND id = ?5",
            params![drill.status.as_str(), drill.started_at, drill.ended_at, org_id, id],
        )?;
        Ok(drill)
    }

    pub fn start(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        Self::transition(conn, org_id, id, DrillStatus::Active)
    }

    pub fn end(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        Self::transition(conn, org_id, id, DrillStatus::Completed)
    }

    pub fn cancel(conn: &Connection, org_id: &str, id: &str) -> Result<Self> {
        Self::transition(conn, org_id, id, DrillStatus::Cancelled)
    }

    /// Append a station after the current last one.
    pub fn add_station(conn: &Connection, org_id: &str, drill_id: &str, name: &str) -> Result<DrillStation> {
        Self::load(conn, org_id, drill_id)?;
        let next: i64 = conn.query_row(
            "SELECT COALESCE(MAX(order_index) + 1, 0) FROM drill_stations WHERE drill_id = ?1",
            params![drill_id],
            |r| r.get(0),
        )?;
        let station = DrillStation {
            id: new_id(),
            drill_id: drill_id.to_string(),
            name: paths::required("name", name)?,
            order_index: next,
        };
        conn.execute(
            "INSERT INTO drill_stations(id, drill_id, name, order_index) VALUES (?1, ?2, ?3, ?4)",
            params![station.id, station.drill_id, station.name, station.order_index],
        )?;
        Ok(station)
    }

    /// Reorder stations. `ordered_ids` must list every station of the drill
    /// exactly once.
    pub fn reorder_stations(
        conn: &Connection,
        org_id: &str,
        drill_id: &str,
        ordered_ids: &[String],
    ) -> Result<Vec<DrillStation>> {
        Self::load(conn, org_id, drill_id)?;
        let current: BTreeSet<String> = Self::stations(conn, drill_id)?
            .into_iter()
            .map(|s| s.id)
            .collect();
        let requested: BTreeSet<String> = ordered_ids.iter().cloned().collect();
        if requested.len() != ordered_ids.len() || requested != current {
            return Err(CarecompError::validation(
                "station_ids",
                "must list every station of the drill exactly once",
            ));
        }

        let tx = conn.unchecked_transaction()?;
        for (idx, station_id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE drill_stations SET order_index = ?1 WHERE drill_id = ?2 AND id = ?3",
                params![idx as i64, drill_id, station_id],
            )?;
        }
        tx.commit()?;
        Self::stations(conn, drill_id)
    }

    /// Record a participant. The drill must be active and the station, if
    /// given, must belong to it.
    pub fn check_in(conn: &Connection, org_id: &str, drill_id: &str, input: CheckinInput) -> Result<DrillCheckin> {
        let drill = Self::load(conn, org_id, drill_id)?;
        if drill.status != DrillStatus::Active {
            return Err(CarecompError::DrillNotActive {
                id: drill.id,
                status: drill.status.to_string(),
            });
        }
        if let Some(station_id) = &input.station_id {
            let found: Option<String> = conn
                .query_row(
                    "SELECT id FROM drill_stations WHERE drill_id = ?1 AND id = ?2",
                    params![drill_id, station_id],
                    |r| r.get(0),
                )
                .optional()?;
            if found.is_none() {
                return Err(CarecompError::StationNotFound(station_id.clone()));
            }
        }

        let checkin = DrillCheckin {
            id: new_id(),
            drill_id: drill.id,
            station_id: input.station_id,
            name: paths::required("name", &input.name)?,
            role: input.role.trim().to_string(),
            checked_in_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO drill_checkins(id, drill_id, station_id, name, role, checked_in_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                checkin.id,
                checkin.drill_id,
                checkin.station_id,
                checkin.name,
                checkin.role,
                checkin.checked_in_at
            ],
        )?;
        Ok(checkin)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{second_org, seed_facility, seed_org};
    use chrono::TimeZone;

    fn schedule(conn: &Connection, org: &str, facility: &str) -> Drill {
        Drill::schedule(
            conn,
            org,
            DrillInput {
                facility_id: facility.to_string(),
                drill_type: "Fire".to_string(),
                scheduled_for: Utc.with_ymd_and_hms(2025, 11, 20, 14, 0, 0).unwrap(),
                notes: None,
            },
        )
        .unwrap()
    }

    fn checkin(station: Option<&str>, name: &str) -> CheckinInput {
        CheckinInput {
            station_id: station.map(str::to_string),
            name: name.to_string(),
            role: "CNA".to_string(),
        }
    }

    #[test]
    fn state_machine() {
        assert!(can_transition(DrillStatus::Scheduled, DrillStatus::Active));
        assert!(can_transition(DrillStatus::Active, DrillStatus::Completed));
        assert!(can_transition(DrillStatus::Active, DrillStatus::Cancelled));
        assert!(!can_transition(DrillStatus::Scheduled, DrillStatus::Completed));
        assert!(!can_transition(DrillStatus::Completed, DrillStatus::Active));
        assert!(!can_transition(DrillStatus::Cancelled, DrillStatus::Active));
    }

    #[test]
    fn start_then_end_stamps_times() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let d = schedule(&conn, &org, &f);
        assert_eq!(d.drill_type, "fire");

        let started = Drill::start(&conn, &org, &d.id).unwrap();
        assert!(started.started_at.is_some());
        let ended = Drill::end(&conn, &org, &d.id).unwrap();
        assert_eq!(ended.status, DrillStatus::Completed);
        assert!(ended.ended_at.is_some());

        assert!(matches!(
            Drill::start(&conn, &org, &d.id),
            Err(CarecompError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn ending_a_scheduled_drill_is_rejected() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let d = schedule(&conn, &org, &f);
        assert!(matches!(
            Drill::end(&conn, &org, &d.id),
            Err(CarecompError::InvalidTransition { .. })
        ));
        Drill::cancel(&conn, &org, &d.id).unwrap();
    }

    #[test]
    fn stations_append_and_reorder() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let d = schedule(&conn, &org, &f);
        let a = Drill::add_station(&conn, &org, &d.id, "Lobby").unwrap();
        let b = Drill::add_station(&conn, &org, &d.id, "East Wing").unwrap();
        assert_eq!((a.order_index, b.order_index), (0, 1));

        let reordered =
            Drill::reorder_stations(&conn, &org, &d.id, &[b.id.clone(), a.id.clone()]).unwrap();
        let names: Vec<_> = reordered.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["East Wing", "Lobby"]);

        assert!(Drill::reorder_stations(&conn, &org, &d.id, &[b.id.clone()]).is_err());
        assert!(Drill::reorder_stations(&conn, &org, &d.id, &[b.id.clone(), b.id.clone()]).is_err());
    }

    #[test]
    fn check_in_only_while_active() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let d = schedule(&conn, &org, &f);
        let lobby = Drill::add_station(&conn, &org, &d.id, "Lobby").unwrap();

        assert!(matches!(
            Drill::check_in(&conn, &org, &d.id, checkin(None, "Ana")),
            Err(CarecompError::DrillNotActive { .. })
        ));

        Drill::start(&conn, &org, &d.id).unwrap();
        Drill::check_in(&conn, &org, &d.id, checkin(Some(&lobby.id), "Ana")).unwrap();
        Drill::check_in(&conn, &org, &d.id, checkin(None, "Bo")).unwrap();

        let detail = Drill::load_detail(&conn, &org, &d.id).unwrap();
        assert_eq!(detail.stations.len(), 1);
        assert_eq!(detail.checkins.len(), 2);
        assert_eq!(detail.checkins[0].name, "Ana");
    }

    #[test]
    fn station_must_belong_to_drill() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let d1 = schedule(&conn, &org, &f);
        let d2 = schedule(&conn, &org, &f);
        let foreign = Drill::add_station(&conn, &org, &d2.id, "Elsewhere").unwrap();
        Drill::start(&conn, &org, &d1.id).unwrap();

        assert!(matches!(
            Drill::check_in(&conn, &org, &d1.id, checkin(Some(&foreign.id), "Ana")),
            Err(CarecompError::StationNotFound(_))
        ));
    }

    #[test]
    fn list_filters_and_scoping() {
        let (conn, org) = seed_org();
        let f = seed_facility(&conn, &org, "Maple");
        let d = schedule(&conn, &org, &f);
        schedule(&conn, &org, &f);
        Drill::start(&conn, &org, &d.id).unwrap();

        let active = Drill::list(
            &conn,
            &org,
            &DrillFilter {
                status: Some(DrillStatus::Active),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(active.len(), 1);

        let other = second_org(&conn);
        assert!(Drill::list(&conn, &other, &DrillFilter::default()).unwrap().is_empty());
        assert!(Drill::add_station(&conn, &other, &d.id, "Sneaky").is_err());
    }
}
