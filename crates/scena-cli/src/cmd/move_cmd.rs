//! `scena move`: drag one task onto another task or a column.

use crate::backend::Session;
use crate::output::{OutputMode, render_mode};
use clap::Args;
use scena_core::drag::DropTarget;
use scena_core::model::{ColumnOrder, Placement, TaskId};
use scena_core::sync::DropResult;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug)]
#[command(group(
    clap::ArgGroup::new("target").required(true).args(["before", "column"])
))]
pub struct MoveArgs {
    /// Task to move.
    pub task: String,

    /// Drop onto this task: take its column and its slot.
    #[arg(long)]
    pub before: Option<String>,

    /// Drop onto this column: append after its last task.
    #[arg(long)]
    pub column: Option<String>,
}

impl MoveArgs {
    fn target(&self) -> anyhow::Result<DropTarget> {
        match (&self.before, &self.column) {
            (Some(task), None) => Ok(DropTarget::Task(task.as_str().into())),
            (None, Some(column)) => Ok(DropTarget::Column(column.as_str().into())),
            _ => anyhow::bail!("pass exactly one of --before or --column"),
        }
    }
}

/// What a drop did, as reported to the user.
#[derive(Debug, Serialize)]
pub struct DropReport {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DropResult> for DropReport {
    fn from(result: &DropResult) -> Self {
        let mut report = Self {
            action: "noop",
            task: None,
            placement: None,
            columns: Vec::new(),
            error: None,
        };
        match result {
            DropResult::NoOp => {}
            DropResult::TaskMoved { task, placement } => {
                report.action = "moved";
                report.task = Some(task.clone());
                report.placement = Some(placement.clone());
            }
            DropResult::ColumnsReordered(items) => {
                report.action = "reordered";
                report.columns.clone_from(items);
            }
            DropResult::RolledBack { error } => {
                report.action = "rolled_back";
                report.error = Some(error.to_string());
            }
        }
        report
    }
}

fn write_text(report: &DropReport, w: &mut dyn Write) -> io::Result<()> {
    match (&report.task, &report.placement) {
        (Some(task), Some(placement)) => {
            writeln!(w, "{}\t{task}\t{}\t{}", report.action, placement.column, placement.order)
        }
        _ if !report.columns.is_empty() => {
            for item in &report.columns {
                writeln!(w, "{}\t{}\t{}", report.action, item.id, item.order)?;
            }
            Ok(())
        }
        _ => writeln!(w, "{}", report.action),
    }
}

fn write_pretty(report: &DropReport, w: &mut dyn Write) -> io::Result<()> {
    match report.action {
        "moved" => {
            if let (Some(task), Some(placement)) = (&report.task, &report.placement) {
                writeln!(
                    w,
                    "✓ moved {task} to {} at position {}",
                    placement.column, placement.order
                )?;
            }
        }
        "reordered" => {
            let ids: Vec<&str> = report.columns.iter().map(|c| c.id.as_str()).collect();
            writeln!(w, "✓ columns now: {}", ids.join(" → "))?;
        }
        "rolled_back" => writeln!(w, "✗ change rejected; board reloaded from server")?,
        _ => writeln!(w, "nothing to do: dropped where it started")?,
    }
    Ok(())
}

/// Render `result`; a rollback is reported and then surfaced as an error.
pub fn finish(result: DropResult, output: OutputMode) -> anyhow::Result<()> {
    render_mode(output, &DropReport::from(&result), write_text, write_pretty)?;
    match result {
        DropResult::RolledBack { error } => Err(anyhow::Error::new(error).context("change rolled back")),
        _ => Ok(()),
    }
}

pub fn run_move(args: &MoveArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let target = args.target()?;
    let mut sync = session.connect()?;
    let result = sync.move_task(&TaskId::from(args.task.as_str()), &target)?;
    finish(result, output)
}
