//! `scena gantt`: the global projection as timeline rows.

use crate::backend::Session;
use crate::output::{OutputMode, pretty_section, render_mode};
use chrono::NaiveDate;
use clap::Args;
use scena_core::forest::{gantt_rows, project_global};
use scena_core::model::{ColumnId, TaskId};
use scena_core::replica::Replica;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug, Default)]
pub struct GanttArgs {
    /// Include tasks flagged as hidden from the Gantt chart.
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GanttRow {
    pub id: TaskId,
    pub title: String,
    pub column_id: ColumnId,
    pub level: u32,
    pub sort_key: String,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

/// Rows in display order; serializes as a bare array.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct GanttView {
    pub rows: Vec<GanttRow>,
}

pub fn build_rows(replica: &Replica, include_hidden: bool) -> GanttView {
    let forest = project_global(replica.tasks());
    let nodes = if include_hidden {
        forest.flatten()
    } else {
        gantt_rows(&forest)
    };
    let rows = nodes
        .into_iter()
        .map(|node| GanttRow {
            id: node.task.id.clone(),
            title: node.task.title.clone(),
            column_id: node.task.column_id.clone(),
            level: node.level,
            sort_key: node.sort_key.clone(),
            progress: node.task.progress,
            start_date: node.task.start_date,
            due_date: node.task.due_date,
        })
        .collect();
    GanttView { rows }
}

fn date_or_dash(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d").to_string())
}

fn write_text(view: &GanttView, w: &mut dyn Write) -> io::Result<()> {
    for row in &view.rows {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.id,
            row.level,
            row.sort_key,
            date_or_dash(row.start_date),
            date_or_dash(row.due_date),
            row.progress,
            row.title
        )?;
    }
    Ok(())
}

fn write_pretty(view: &GanttView, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Timeline ({} rows)", view.rows.len()))?;
    for row in &view.rows {
        let label = format!("{}{}", "  ".repeat(row.level as usize), row.title);
        writeln!(
            w,
            "{label:<40} {:>10} → {:<10} {:>3}%  {}",
            date_or_dash(row.start_date),
            date_or_dash(row.due_date),
            row.progress,
            row.id
        )?;
    }
    Ok(())
}

pub fn run_gantt(args: &GanttArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let sync = session.connect()?;
    let rows = build_rows(sync.replica(), args.all);
    render_mode(output, &rows, write_text, write_pretty)
}
