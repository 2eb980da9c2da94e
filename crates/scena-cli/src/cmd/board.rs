//! `scena board`: the Kanban projection, column by column.

use crate::backend::Session;
use crate::output::{OutputMode, pretty_rule, pretty_section, render_mode};
use clap::Args;
use scena_core::drag::DragError;
use scena_core::forest::{Forest, ForestNode, project_by_column};
use scena_core::model::{ColumnId, TaskId};
use scena_core::replica::Replica;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Args, Debug, Default)]
pub struct BoardArgs {
    /// Show only this column.
    #[arg(long)]
    pub column: Option<String>,
}

/// One rendered task row.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub id: TaskId,
    pub title: String,
    pub level: u32,
    pub sort_key: String,
    pub order: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checklist: Option<(usize, usize)>,
}

impl From<&ForestNode> for RowView {
    fn from(node: &ForestNode) -> Self {
        let (done, total) = node.task.checklist_progress();
        Self {
            id: node.task.id.clone(),
            title: node.task.title.clone(),
            level: node.level,
            sort_key: node.sort_key.clone(),
            order: node.task.order,
            parent_id: node.task.parent_id.clone(),
            checklist: (total > 0).then_some((done, total)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ColumnView {
    pub id: ColumnId,
    pub name: String,
    pub order: i64,
    pub tasks: Vec<RowView>,
}

#[derive(Debug, Serialize)]
pub struct BoardView {
    pub project: String,
    pub columns: Vec<ColumnView>,
    /// Tasks whose parent chain loops back on itself.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<TaskId>,
}

impl BoardView {
    pub fn build(project: &str, replica: &Replica, only: Option<&str>) -> Self {
        let forest: Forest = project_by_column(replica.tasks());
        let columns = replica
            .ordered_columns()
            .into_iter()
            .filter(|c| only.is_none_or(|id| c.id.as_str() == id))
            .map(|c| ColumnView {
                id: c.id.clone(),
                name: c.name.clone(),
                order: c.order,
                tasks: forest
                    .flatten_column(&c.id)
                    .into_iter()
                    .map(RowView::from)
                    .collect(),
            })
            .collect();
        Self {
            project: project.to_string(),
            columns,
            cycles: forest.cycles().to_vec(),
        }
    }
}

pub fn write_text(view: &BoardView, w: &mut dyn Write) -> io::Result<()> {
    for column in &view.columns {
        for row in &column.tasks {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                column.id, row.id, row.level, row.sort_key, row.title
            )?;
        }
    }
    for id in &view.cycles {
        writeln!(w, "cycle\t{id}")?;
    }
    Ok(())
}

pub fn write_pretty(view: &BoardView, w: &mut dyn Write) -> io::Result<()> {
    for column in &view.columns {
        pretty_section(w, &format!("{} ({})", column.name, column.tasks.len()))?;
        if column.tasks.is_empty() {
            writeln!(w, "  (empty)")?;
        }
        for row in &column.tasks {
            let indent = "  ".repeat(row.level as usize + 1);
            let checklist = row
                .checklist
                .map(|(done, total)| format!(" [{done}/{total}]"))
                .unwrap_or_default();
            writeln!(w, "{indent}{}  {}{checklist}", row.id, row.title)?;
        }
        writeln!(w)?;
    }
    if !view.cycles.is_empty() {
        pretty_rule(w)?;
        let ids: Vec<&str> = view.cycles.iter().map(TaskId::as_str).collect();
        writeln!(w, "warning: parent cycle through {}", ids.join(", "))?;
    }
    Ok(())
}

pub fn run_board(args: &BoardArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let sync = session.connect()?;
    if let Some(id) = &args.column {
        let id = ColumnId::from(id.as_str());
        if sync.replica().column(&id).is_none() {
            anyhow::bail!(DragError::UnknownColumn(id));
        }
    }
    let view = BoardView::build(sync.project().as_str(), sync.replica(), args.column.as_deref());
    render_mode(output, &view, write_text, write_pretty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scena_core::model::{Column, Task};

    fn replica() -> Replica {
        Replica::from_server(
            vec![Column::new("c2", "Edit", 1), Column::new("c1", "Shoot", 0)],
            vec![
                Task::new("a", "Storyboard", "c1", 0),
                Task::new("b", "Shot list", "c1", 1).with_parent("a"),
                Task::new("c", "Rough cut", "c2", 0).with_parent("a"),
            ],
        )
    }

    #[test]
    fn columns_follow_board_order_and_nest_within_column() {
        let view = BoardView::build("p1", &replica(), None);
        let ids: Vec<&str> = view.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        let shoot: Vec<(&str, u32)> = view.columns[0]
            .tasks
            .iter()
            .map(|r| (r.id.as_str(), r.level))
            .collect();
        assert_eq!(shoot, [("a", 0), ("b", 1)]);
        // Parent lives in another column: shown as a root, still indented.
        assert_eq!(view.columns[1].tasks[0].level, 1);
    }

    #[test]
    fn text_rows_are_tab_separated() {
        let view = BoardView::build("p1", &replica(), Some("c2"));
        let mut buf = Vec::new();
        write_text(&view, &mut buf).expect("write");
        assert_eq!(String::from_utf8_lossy(&buf), "c2\tc\t1\t000000\tRough cut\n");
    }

    #[test]
    fn pretty_indents_by_level() {
        let view = BoardView::build("p1", &replica(), Some("c1"));
        let mut buf = Vec::new();
        write_pretty(&view, &mut buf).expect("write");
        let text = String::from_utf8_lossy(&buf);
        assert!(text.contains("\n  a  Storyboard\n"));
        assert!(text.contains("\n    b  Shot list\n"));
    }
}
