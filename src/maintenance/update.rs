//! Brings an installed forum from its recorded version to this build.

use rusqlite::Connection;
use std::cmp::Ordering;

use crate::maintenance::runner::advance;
use crate::maintenance::version::compare_versions;
use crate::maintenance::{MaintenanceError, Progress, Step, StepCall, StepHandler, StepKind, StepReport, StepResult};
use crate::settings;

const fn set(name: &'static str, value: &'static str) -> Step {
    Step {
        table: "config",
        call: StepCall::UpdateValue { name, value },
    }
}

/// Changes introduced by each version, oldest first.
pub const VERSIONS: &[(&str, &[Step])] = &[
    (
        "0.2.0",
        &[set(settings::MERGE_POSTS, "1"), set("registration_off", "0")],
    ),
    (
        "0.3.0",
        &[
            set(settings::MEMBERS_VISIBLE, "1"),
            set("password_reset_token_expire", "86400"),
        ],
    ),
];

pub struct Update<'a> {
    conn: &'a Connection,
    versions: &'a [(&'a str, &'a [Step])],
    target: &'a str,
}

impl<'a> Update<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self::with_versions(conn, VERSIONS, settings::VERSION)
    }

    pub fn with_versions(
        conn: &'a Connection,
        versions: &'a [(&'a str, &'a [Step])],
        target: &'a str,
    ) -> Self {
        Self {
            conn,
            versions,
            target,
        }
    }

    pub fn target(&self) -> &str {
        self.target
    }

    /// Whether the recorded version is behind this build.
    pub fn is_needed(&self, recorded: &str) -> bool {
        compare_versions(self.target, recorded) == Ordering::Greater
    }

    /// Steps of every version newer than `recorded`, in version order.
    pub fn applicable_steps(&self, recorded: &str) -> Vec<Step> {
        self.versions
            .iter()
            .filter(|(version, _)| compare_versions(version, recorded) == Ordering::Greater)
            .flat_map(|(_, steps)| steps.iter().copied())
            .collect()
    }

    /// Runs the next update step. The call that completes the list records
    /// the new version.
    pub fn next_step(&self, progress: &mut Progress) -> Result<StepResult, MaintenanceError> {
        let recorded = progress.recorded_version.clone().unwrap_or_default();
        let steps = self.applicable_steps(&recorded);

        if steps.is_empty() && progress.current == 0 && self.is_needed(&recorded) {
            self.record_version()?;
            progress.current = 1;
            progress.total = 1;
            return Ok(StepResult {
                drop: false,
                kind: StepKind::Success,
                result: format!("Nothing to change. Forum version is now {}.", self.target),
                table: "config".to_string(),
                percent: 100,
            });
        }

        let before = progress.current;
        let mut result = advance(&steps, progress, self)?;
        if progress.current > before && progress.current == progress.total {
            self.record_version()?;
            result.result = format!("{} Forum version is now {}.", result.result, self.target);
        }
        Ok(result)
    }

    fn record_version(&self) -> Result<(), MaintenanceError> {
        settings::set(self.conn, settings::VERSION_KEY, self.target)?;
        tracing::info!("Forum updated to version {}", self.target);
        Ok(())
    }
}

impl StepHandler for Update<'_> {
    fn run(&self, step: &Step) -> Result<StepReport, MaintenanceError> {
        let StepCall::UpdateValue { name, value } = step.call else {
            return Ok(StepReport::error("Only setting changes can run during an update."));
        };
        Ok(match settings::set(self.conn, name, value) {
            Ok(()) => StepReport::success(format!("Setting {} has been set to {}.", name, value)),
            Err(e) => {
                tracing::error!("Updating setting {} failed: {}", name, e);
                StepReport::error(format!("Error during setting {} update: {}", name, e))
            }
        })
    }
}
