use crate::error::{CarecompError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const CARECOMP_DIR: &str = ".carecomp";
pub const CONFIG_FILE: &str = ".carecomp/config.yaml";
pub const DB_FILE: &str = ".carecomp/carecomp.sqlite3";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn carecomp_dir(root: &Path) -> PathBuf {
    root.join(CARECOMP_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn db_path(root: &Path) -> PathBuf {
    root.join(DB_FILE)
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
static TAG_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap())
}

fn tag_re() -> &'static Regex {
    TAG_RE.get_or_init(|| Regex::new(r"^F\d{3,4}$").unwrap())
}

/// Lowercased, trimmed email, or a validation error.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_ascii_lowercase();
    if email.len() > 254 || !email_re().is_match(&email) {
        return Err(CarecompError::validation("email", format!("'{email}' is not an email address")));
    }
    Ok(email)
}

/// Survey tag codes look like `F880` / `F0880`. Input is uppercased.
pub fn normalize_tag_code(tag: &str) -> Result<String> {
    let tag = tag.trim().to_ascii_uppercase();
    if !tag_re().is_match(&tag) {
        return Err(CarecompError::validation("tag_code", format!("'{tag}' is not an F-tag")));
    }
    Ok(tag)
}

/// Trimmed non-empty text, or a validation error naming `field`.
pub fn required(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(CarecompError::validation(field, "is required"));
    }
    Ok(v.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
