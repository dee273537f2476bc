//! Installation and update wizards.
//!
//! Both split their work into steps that a browser advances one request
//! at a time, so a slow host never runs into a request timeout.

pub mod install;
pub mod runner;
pub mod update;
pub mod version;

use rusqlite::Connection;

use crate::db::table_exists;
use crate::settings;

pub use install::Installation;
pub use runner::{advance, Progress, Step, StepCall, StepHandler, StepKind, StepReport, StepResult};
pub use update::Update;

#[derive(Debug, thiserror::Error)]
pub enum MaintenanceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Version stored by the last install or update, if any.
pub fn recorded_version(conn: &Connection) -> rusqlite::Result<Option<String>> {
    if !table_exists(conn, "config")? {
        return Ok(None);
    }
    settings::stored(conn, settings::VERSION_KEY)
}

pub fn is_installed(conn: &Connection) -> rusqlite::Result<bool> {
    Ok(recorded_version(conn)?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::pool_with_schema;

    #[test]
    fn installed_once_version_is_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::create_pool(&tmp.path().join("blank.db")).unwrap();
        assert!(!is_installed(&pool.get().unwrap()).unwrap());

        let (pool, _tmp) = pool_with_schema();
        let conn = pool.get().unwrap();
        assert!(!is_installed(&conn).unwrap());
        settings::set(&conn, settings::VERSION_KEY, "0.1.0").unwrap();
        assert!(is_installed(&conn).unwrap());
        assert_eq!(recorded_version(&conn).unwrap().as_deref(), Some("0.1.0"));
    }
}
