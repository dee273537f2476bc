//! Drives an ordered list of steps one request at a time.

use serde::{Deserialize, Serialize};

use crate::db::schema::Table;
use crate::maintenance::MaintenanceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Success,
    Warning,
    Error,
}

/// What a step reports back to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub kind: StepKind,
    pub message: String,
}

impl StepReport {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Error,
            message: message.into(),
        }
    }
}

/// The procedure a step runs, with its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepCall {
    CreateTable(&'static Table),
    AddConfig,
    AddContent,
    AddRules,
    AddAdmin,
    UpdateValue {
        name: &'static str,
        value: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub table: &'static str,
    pub call: StepCall,
}

/// Executes steps. Returning `Err` means the step could not even be
/// attempted; ordinary failures are `StepKind::Error` reports.
pub trait StepHandler {
    fn run(&self, step: &Step) -> Result<StepReport, MaintenanceError>;
}

/// Where a client is in a step list. Lives in the client's session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    /// Version recorded before an update began.
    pub recorded_version: Option<String>,
    /// Set while the cursor walks the drop list instead of the steps.
    #[serde(default)]
    pub dropping: bool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_version(recorded: impl Into<String>) -> Self {
        Self {
            recorded_version: Some(recorded.into()),
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.current = 0;
        self.total = 0;
        self.dropping = false;
    }

    /// Points the cursor at the start of a drop list of `total` steps.
    pub fn start_dropping(&mut self, total: usize) {
        self.current = 0;
        self.total = total;
        self.dropping = true;
    }

    /// Whether a run has started and not reached its end yet.
    pub fn is_running(&self) -> bool {
        self.dropping || (self.current > 0 && self.current < self.total)
    }

    pub fn is_complete(&self) -> bool {
        !self.dropping && self.total > 0 && self.current >= self.total
    }
}

/// JSON answer for one advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub drop: bool,
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub result: String,
    pub table: String,
    pub percent: u8,
}

impl StepResult {
    fn terminal(message: &str) -> Self {
        Self {
            drop: false,
            kind: StepKind::Error,
            result: message.to_string(),
            table: "...".to_string(),
            percent: 100,
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == StepKind::Success
    }
}

pub fn percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (current as f64 / total as f64 * 100.0).round().min(100.0) as u8
}

/// Runs the step at `progress.current` and moves the cursor on, whatever
/// the step reported.
pub fn advance(
    steps: &[Step],
    progress: &mut Progress,
    handler: &dyn StepHandler,
) -> Result<StepResult, MaintenanceError> {
    if progress.current == 0 {
        progress.total = steps.len();
    }
    if progress.current >= progress.total {
        return Ok(StepResult::terminal("The process should already be complete."));
    }
    let Some(step) = steps.get(progress.current) else {
        return Ok(StepResult::terminal("Process aborted! Can not find the requested step."));
    };

    let report = handler.run(step)?;
    progress.current += 1;
    tracing::debug!(
        "Step {}/{} on {}: {:?}",
        progress.current,
        progress.total,
        step.table,
        report.kind
    );

    Ok(StepResult {
        drop: false,
        kind: report.kind,
        result: report.message,
        table: step.table.to_string(),
        percent: percent(progress.current, progress.total),
    })
}

/// Runs every remaining step. Stops at the first step that does not
/// succeed and returns its result; `None` means all steps succeeded.
pub fn advance_all(
    steps: &[Step],
    progress: &mut Progress,
    handler: &dyn StepHandler,
) -> Result<Option<StepResult>, MaintenanceError> {
    if progress.current == 0 {
        progress.total = steps.len();
    }
    while progress.current < progress.total {
        let result = advance(steps, progress, handler)?;
        if !result.is_success() {
            return Ok(Some(result));
        }
    }
    Ok(None)
}
