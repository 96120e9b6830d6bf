use crate::db::new_id;
use crate::error::Result;
use crate::paths;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Message left through the public contact form. Not org-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub organization: Option<String>,
    pub message: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub organization: Option<String>,
    pub message: String,
}

impl ContactMessage {
    pub fn record(conn: &Connection, input: ContactInput) -> Result<Self> {
        let msg = Self {
            id: new_id(),
            name: paths::required("name", &input.name)?,
            email: paths::normalize_email(&input.email)?,
            organization: input
                .organization
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty()),
            message: paths::required("message", &input.message)?,
            received_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO contact_messages(id, name, email, organization, message, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                msg.id,
                msg.name,
                msg.email,
                msg.organization,
                msg.message,
                msg.received_at
            ],
        )?;
        Ok(msg)
    }

    /// Newest first.
    pub fn list(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, email, organization, message, received_at
             FROM contact_messages ORDER BY received_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Self {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                organization: row.get(3)?,
                message: row.get(4)?,
                received_at: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::error::CarecompError;

    #[test]
    fn record_validates_and_stores() {
        let conn = db::open_in_memory().unwrap();
        let msg = ContactMessage::record(
            &conn,
            ContactInput {
                name: "Dana".to_string(),
                email: "Dana@Example.org".to_string(),
                organization: Some("  ".to_string()),
                message: "Interested in a demo.".to_string(),
            },
        )
        .unwrap();
        assert_eq!(msg.email, "dana@example.org");
        assert!(msg.organization.is_none());
        assert_eq!(ContactMessage::list(&conn).unwrap().len(), 1);
    }

    #[test]
    fn bad_email_or_blank_message_is_rejected() {
        let conn = db::open_in_memory().unwrap();
        let base = ContactInput {
            name: "Dana".to_string(),
            email: "not-an-email".to_string(),
            organization: None,
            message: "Hi".to_string(),
        };
        assert!(matches!(
            ContactMessage::record(&conn, base.clone()),
            Err(CarecompError::Validation { .. })
        ));
        let blank = ContactInput {
            email: "dana@example.org".to_string(),
            message: "   ".to_string(),
            ..base
        };
        assert!(matches!(
            ContactMessage::record(&conn, blank),
            Err(CarecompError::Validation { .. })
        ));
    }
}
