use crate::output::print_json;
use anyhow::Context;
use carecomp_core::config::Config;
use carecomp_core::status::{derive_status_with_window, parse_due_date, DUE_SOON_DAYS};
use chrono::Utc;
use std::path::Path;

/// Classify a raw status and due date without touching the store. Uses the
/// instance's due-soon window when one is initialized.
pub fn run(
    root: &Path,
    due: Option<&str>,
    status: Option<&str>,
    today: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let today = match today {
        Some(raw) => parse_due_date(raw).with_context(|| format!("invalid --today date '{raw}'"))?,
        None => Utc::now().date_naive(),
    };
    let window = Config::load(root)
        .map(|c| c.rules.due_soon_days)
        .unwrap_or(DUE_SOON_DAYS);

    let derived = derive_status_with_window(status, due, today, window);

    if json {
        print_json(&serde_json::json!({
            "due_status": derived,
            "today": today,
            "window_days": window,
        }))?;
    } else {
        println!("{derived}");
    }
    Ok(())
}
