use crate::error::AppError;
use carecomp_core::config::Config;
use carecomp_core::db;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub config: Arc<Config>,
    pub db_path: PathBuf,
}

impl AppState {
    pub fn new(root: PathBuf, config: Config) -> Self {
        let db_path = carecomp_core::paths::db_path(&root);
        Self {
            root,
            config: Arc::new(config),
            db_path,
        }
    }

    /// Due-soon window in days, from `rules.due_soon_days`.
    pub fn window(&self) -> i64 {
        self.config.rules.due_soon_days
    }

    pub fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Run `f` on the blocking pool against a fresh connection.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> carecomp_core::Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = db::open_path(&path)?;
            f(&conn)
        })
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
        Ok(result)
    }
}
