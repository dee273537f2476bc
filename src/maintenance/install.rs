//! Fresh installation: tables, default settings and texts, access rules
//! and the first administrator.

use rusqlite::{params, Connection};

use crate::auth::identity::IdentitySource;
use crate::auth::password::{self, AccountError};
use crate::config::{IdentityMode, InstallConfig};
use crate::db::models::{ROLE_ADMIN, USER_STATUS_ACTIVE};
use crate::db::schema::{Table, TABLES};
use crate::db::{in_transaction, unix_now};
use crate::forum::content;
use crate::maintenance::runner::{advance, advance_all};
use crate::maintenance::{MaintenanceError, Progress, Step, StepCall, StepHandler, StepReport, StepResult};
use crate::{rbac, settings};

pub const ADMIN_USERNAME: &str = "admin";

/// Forward installation steps in execution order.
pub fn steps() -> Vec<Step> {
    let mut steps: Vec<Step> = TABLES
        .iter()
        .map(|table| Step {
            table: table.name,
            call: StepCall::CreateTable(table),
        })
        .collect();
    steps.extend([
        Step {
            table: "config",
            call: StepCall::AddConfig,
        },
        Step {
            table: "content",
            call: StepCall::AddContent,
        },
        Step {
            table: "auth_items",
            call: StepCall::AddRules,
        },
        Step {
            table: "users",
            call: StepCall::AddAdmin,
        },
    ]);
    steps
}

/// Table drops, children before parents.
pub fn drop_steps() -> Vec<Step> {
    steps()
        .into_iter()
        .rev()
        .filter(|step| matches!(step.call, StepCall::CreateTable(_)))
        .collect()
}

pub struct Installation<'a> {
    conn: &'a Connection,
    install: &'a InstallConfig,
    identities: &'a dyn IdentitySource,
}

impl<'a> Installation<'a> {
    pub fn new(
        conn: &'a Connection,
        install: &'a InstallConfig,
        identities: &'a dyn IdentitySource,
    ) -> Self {
        Self {
            conn,
            install,
            identities,
        }
    }

    /// Runs the next forward step. A client that leaves drop mode half
    /// way starts the installation over.
    pub fn next_step(&self, progress: &mut Progress) -> Result<StepResult, MaintenanceError> {
        if progress.dropping {
            progress.reset();
        }
        advance(&steps(), progress, self)
    }

    /// Drops every remaining table in one go. Entering drop mode points the
    /// cursor at the first drop, whatever the forward run left behind. The
    /// first failed drop stops the batch and is reported; the next call
    /// carries on after it. Once all drops have run the cursor is reset and
    /// the first installation step runs.
    pub fn next_drop(&self, progress: &mut Progress) -> Result<StepResult, MaintenanceError> {
        let drops = drop_steps();
        if !progress.dropping {
            progress.start_dropping(drops.len());
        }
        let dropper = TableDropper { conn: self.conn };
        if let Some(mut failed) = advance_all(&drops, progress, &dropper)? {
            failed.drop = true;
            return Ok(failed);
        }
        tracing::info!("All forum tables dropped, starting installation");
        progress.reset();
        self.next_step(progress)
    }

    fn create_table(&self, table: &Table) -> StepReport {
        match self.conn.execute_batch(table.create_sql) {
            Ok(()) => StepReport::success(format!("Table {} has been created.", table.name)),
            Err(e) => {
                tracing::error!("Creating table {} failed: {}", table.name, e);
                StepReport::error(format!("Error during table {} creating: {}", table.name, e))
            }
        }
    }

    fn add_config(&self) -> Result<StepReport, MaintenanceError> {
        let outcome = in_transaction(self.conn, |tx| -> rusqlite::Result<()> {
            let mut insert = tx.prepare("INSERT INTO config (name, value) VALUES (?1, ?2)")?;
            for (name, value) in settings::DEFAULTS {
                insert.execute(params![name, value])?;
            }
            Ok(())
        })?;
        Ok(match outcome {
            Ok(()) => StepReport::success("Default settings have been added."),
            Err(e) => {
                tracing::error!("Adding default settings failed: {}", e);
                StepReport::error(format!("Error during settings adding: {}", e))
            }
        })
    }

    fn add_content(&self) -> Result<StepReport, MaintenanceError> {
        let outcome = in_transaction(self.conn, content::seed)?;
        Ok(match outcome {
            Ok(()) => StepReport::success("Default texts have been added."),
            Err(e) => {
                tracing::error!("Adding default texts failed: {}", e);
                StepReport::error(format!("Error during texts adding: {}", e))
            }
        })
    }

    fn add_rules(&self) -> Result<StepReport, MaintenanceError> {
        let outcome = in_transaction(self.conn, rbac::seed)?;
        Ok(match outcome {
            Ok(()) => StepReport::success("Access roles have been created."),
            Err(e) => {
                tracing::error!("Adding access rules failed: {}", e);
                StepReport::error(format!("Error during access roles creating: {}", e))
            }
        })
    }

    fn add_admin(&self) -> Result<StepReport, MaintenanceError> {
        match self.install.identity {
            IdentityMode::Local => self.add_local_admin(),
            IdentityMode::Inherited => self.add_inherited_admin(),
        }
    }

    fn add_local_admin(&self) -> Result<StepReport, MaintenanceError> {
        let one_time = password::generate_password();
        let outcome = in_transaction(self.conn, |tx| -> Result<(), AccountError> {
            let hash = password::hash(&one_time)?;
            let now = unix_now();
            tx.execute(
                "INSERT INTO users (username, password_hash, status, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![ADMIN_USERNAME, hash, USER_STATUS_ACTIVE, ROLE_ADMIN, now],
            )?;
            rbac::assign(tx, rbac::ROLE_ADMIN, tx.last_insert_rowid())?;
            Ok(())
        })?;

        Ok(match outcome {
            Ok(()) => {
                tracing::info!("Administrator account created");
                StepReport::success(format!(
                    "Administrator account has been created. Login: {} Password: {} \
                     Remember to change these credentials after first login!",
                    ADMIN_USERNAME, one_time
                ))
            }
            Err(e) => {
                tracing::error!("Creating administrator account failed: {}", e);
                StepReport::error(format!("Error during account creating: {}", e))
            }
        })
    }

    fn add_inherited_admin(&self) -> Result<StepReport, MaintenanceError> {
        let Some(admin_id) = self.install.admin_id.as_deref() else {
            return Ok(StepReport::warning("No administrator privileges have been set!"));
        };
        let Some(name) = self.identities.find_identity(admin_id) else {
            return Ok(StepReport::warning(format!(
                "Can not find inherited user of ID {}. No administrator privileges have been set.",
                admin_id
            )));
        };

        let outcome = in_transaction(self.conn, |tx| -> rusqlite::Result<()> {
            let now = unix_now();
            tx.execute(
                "INSERT INTO users (inherited_id, username, status, role, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![admin_id, name, USER_STATUS_ACTIVE, ROLE_ADMIN, now],
            )?;
            rbac::assign(tx, rbac::ROLE_ADMIN, tx.last_insert_rowid())
        })?;

        Ok(match outcome {
            Ok(()) => {
                tracing::info!("Administrator privileges granted to inherited user {}", admin_id);
                StepReport::success(format!(
                    "Administrator privileges have been set for the user of ID {}.",
                    admin_id
                ))
            }
            Err(e) => {
                tracing::error!("Granting administrator privileges failed: {}", e);
                StepReport::error(format!("Error during account creating: {}", e))
            }
        })
    }
}

impl StepHandler for Installation<'_> {
    fn run(&self, step: &Step) -> Result<StepReport, MaintenanceError> {
        match step.call {
            StepCall::CreateTable(table) => Ok(self.create_table(table)),
            StepCall::AddConfig => self.add_config(),
            StepCall::AddContent => self.add_content(),
            StepCall::AddRules => self.add_rules(),
            StepCall::AddAdmin => self.add_admin(),
            StepCall::UpdateValue { .. } => Ok(StepReport::error(
                "Setting updates are not part of the installation.",
            )),
        }
    }
}

struct TableDropper<'a> {
    conn: &'a Connection,
}

impl StepHandler for TableDropper<'_> {
    fn run(&self, step: &Step) -> Result<StepReport, MaintenanceError> {
        let StepCall::CreateTable(table) = step.call else {
            return Ok(StepReport::error(format!("Nothing to drop for {}.", step.table)));
        };
        Ok(match self.conn.execute_batch(&table.drop_sql()) {
            Ok(()) => StepReport::success(format!("Table {} has been dropped.", table.name)),
            Err(e) => {
                tracing::error!("Dropping table {} failed: {}", table.name, e);
                StepReport::error(format!("Error during table {} dropping: {}", table.name, e))
            }
        })
    }
}
