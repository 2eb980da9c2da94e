//! `scena add-task` and `scena add-column`.

use crate::backend::Session;
use crate::output::{OutputMode, render_mode};
use clap::Args;
use scena_core::drag::{DragError, order_after};
use scena_core::model::{ColumnId, NewColumn, NewTask, TaskId};
use scena_core::replica::Replica;
use scena_core::sync::Created;
use serde::Serialize;
use std::io::Write;

#[derive(Args, Debug)]
pub struct AddTaskArgs {
    /// Task title.
    pub title: String,

    /// Column to create the task in.
    #[arg(long)]
    pub column: String,

    /// Parent task.
    #[arg(long)]
    pub parent: Option<String>,

    /// Explicit order; defaults to the end of the column.
    #[arg(long)]
    pub order: Option<i64>,
}

#[derive(Args, Debug)]
pub struct AddColumnArgs {
    /// Column name.
    pub name: String,

    /// Header colour, e.g. `#3b82f6`.
    #[arg(long)]
    pub color: Option<String>,
}

/// Next free slot after the last task of `column`.
fn append_order(replica: &Replica, column: &ColumnId) -> i64 {
    order_after(
        replica
            .tasks()
            .iter()
            .filter(|t| &t.column_id == column)
            .map(|t| t.order)
            .max(),
    )
}

fn report<T: Serialize>(
    created: Created<T>,
    id_of: impl Fn(&T) -> String,
    output: OutputMode,
) -> anyhow::Result<()> {
    match created {
        Created::Confirmed(record) => {
            let id = id_of(&record);
            render_mode(
                output,
                &record,
                |_, w| writeln!(w, "{id}"),
                |_, w| writeln!(w, "✓ created {id}"),
            )
        }
        Created::RolledBack { error } => {
            Err(anyhow::Error::new(error).context("create rejected; board reloaded from server"))
        }
    }
}

pub fn run_add_task(args: &AddTaskArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let mut sync = session.connect()?;
    let column = ColumnId::from(args.column.as_str());
    if sync.replica().column(&column).is_none() {
        anyhow::bail!(DragError::UnknownColumn(column));
    }
    let parent_id = args.parent.as_deref().map(TaskId::from);
    if let Some(parent) = &parent_id {
        if sync.replica().task(parent).is_none() {
            anyhow::bail!(DragError::UnknownTask(parent.clone()));
        }
    }

    let new = NewTask {
        title: args.title.clone(),
        order: args
            .order
            .unwrap_or_else(|| append_order(sync.replica(), &column)),
        column_id: column,
        parent_id,
    };
    let created = sync.create_task(&new)?;
    report(created, |t| t.id.to_string(), output)
}

pub fn run_add_column(
    args: &AddColumnArgs,
    session: &Session,
    output: OutputMode,
) -> anyhow::Result<()> {
    let mut sync = session.connect()?;
    let order = order_after(sync.replica().columns().iter().map(|c| c.order).max());
    let new = NewColumn {
        name: args.name.clone(),
        order,
        color: args.color.clone(),
    };
    let created = sync.create_column(&new)?;
    report(created, |c| c.id.to_string(), output)
}
