//! Parent/child projections of a flat task list.
//!
//! Tasks link to each other through `parent_id`. The same edge set is
//! projected two ways:
//!
//! - [`project_by_column`] (Kanban): a task nests under its parent only when
//!   both sit in the same column; otherwise it is promoted to a root of its
//!   own column.
//! - [`project_global`] (Gantt): a task nests under its parent whenever the
//!   parent exists, regardless of column.
//!
//! Both are pure functions returning an immutable [`Forest`]. Every node
//! carries a derived `level` (depth along the full parent chain) and a
//! `sort_key` (dotted, zero-padded `order` path) used only to order a
//! flattened rendering. Neither is ever sent to the server.
//!
//! # Cycles
//!
//! Parent chains come from the server unchecked, so they may loop.
//! [`task_level`] reports a loop as [`CycleDetected`]; the forest records
//! level 0 for such tasks and lists them in [`Forest::cycles`]. Attaching a
//! child is refused when it would close a loop, so every node stays
//! reachable from exactly one root.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ErrorCode;
use crate::model::{ColumnId, Task, TaskId};

/// Width of each zero-padded `order` segment in a sort key.
pub const SORT_KEY_WIDTH: usize = 6;

/// Digits in a segment for an `order` outside `0..=999_999`.
const WIDE_SEGMENT_DIGITS: usize = 19;

/// Largest `order` written as a plain [`SORT_KEY_WIDTH`] segment.
const PLAIN_SEGMENT_MAX: i64 = 999_999;

/// A parent chain that returns to a task already visited on the same walk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parent chain starting at task '{task}' contains a cycle")]
pub struct CycleDetected {
    /// The task whose walk hit the cycle.
    pub task: TaskId,
}

impl CycleDetected {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::CycleDetected
    }
}

/// Which nesting rule a [`Forest`] was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Nest only within a column.
    ByColumn,
    /// Nest whenever a parent exists.
    Global,
}

/// Borrowed id lookup over a task slice.
///
/// The first occurrence of a duplicated id wins.
#[derive(Debug)]
pub struct TaskIndex<'a> {
    by_id: HashMap<&'a TaskId, &'a Task>,
}

impl<'a> TaskIndex<'a> {
    #[must_use]
    pub fn new(tasks: &'a [Task]) -> Self {
        let mut by_id = HashMap::with_capacity(tasks.len());
        for task in tasks {
            by_id.entry(&task.id).or_insert(task);
        }
        Self { by_id }
    }

    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&'a Task> {
        self.by_id.get(id).copied()
    }

    /// The task's parent, if the parent id resolves to a known task.
    #[must_use]
    pub fn parent_of(&self, task: &Task) -> Option<&'a Task> {
        task.parent_id.as_ref().and_then(|p| self.get(p))
    }
}

/// Depth of a task along its parent chain.
///
/// Roots (no parent, or a parent id that resolves to nothing) are level 0.
///
/// # Errors
///
/// Returns [`CycleDetected`] when the walk revisits a task.
pub fn task_level(index: &TaskIndex<'_>, task: &Task) -> Result<u32, CycleDetected> {
    let mut visited: HashSet<&TaskId> = HashSet::new();
    visited.insert(&task.id);

    let mut level = 0u32;
    let mut current = task;
    while let Some(parent) = index.parent_of(current) {
        if !visited.insert(&parent.id) {
            return Err(CycleDetected {
                task: task.id.clone(),
            });
        }
        level += 1;
        current = parent;
    }
    Ok(level)
}

/// All transitive descendants of `root` through `parent_id`, breadth first.
///
/// The root itself is not included. Column membership is ignored.
#[must_use]
pub fn descendants_of(tasks: &[Task], root: &TaskId) -> Vec<TaskId> {
    let mut children: HashMap<&TaskId, Vec<&TaskId>> = HashMap::new();
    for task in tasks {
        if let Some(parent) = &task.parent_id {
            children.entry(parent).or_default().push(&task.id);
        }
    }

    let mut visited: HashSet<&TaskId> = HashSet::new();
    visited.insert(root);
    let mut queue: VecDeque<&TaskId> = VecDeque::new();
    queue.push_back(root);
    let mut out = Vec::new();

    while let Some(current) = queue.pop_front() {
        let Some(kids) = children.get(current) else {
            continue;
        };
        for &kid in kids {
            if visited.insert(kid) {
                out.push(kid.clone());
                queue.push_back(kid);
            }
        }
    }
    out
}

/// Sort key segment for one `order` value.
///
/// Orders in `0..=999_999` are zero-padded to [`SORT_KEY_WIDTH`] digits.
/// A negative order is written as `-` followed by its offset from
/// `i64::MIN`, and a larger one as `~` followed by the order itself, both
/// padded to 19 digits. `-` sorts before every digit and `~` after, so
/// comparing segments as strings agrees with comparing the orders.
#[must_use]
pub fn sort_key_segment(order: i64) -> String {
    if order < 0 {
        format!("-{:0width$}", order.abs_diff(i64::MIN), width = WIDE_SEGMENT_DIGITS)
    } else if order > PLAIN_SEGMENT_MAX {
        format!("~{order:0width$}", width = WIDE_SEGMENT_DIGITS)
    } else {
        format!("{order:0width$}", width = SORT_KEY_WIDTH)
    }
}

/// One task inside a [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestNode {
    pub task: Task,
    /// Depth along the full parent chain; 0 for roots and cyclic chains.
    pub level: u32,
    /// Dotted path of zero-padded orders from this node's root.
    pub sort_key: String,
    /// Attached children in ascending `order`.
    pub children: Vec<TaskId>,
}

/// Immutable parent/child projection of a task list.
#[derive(Debug, Clone)]
pub struct Forest {
    projection: Projection,
    nodes: Vec<ForestNode>,
    position: HashMap<TaskId, usize>,
    roots: Vec<TaskId>,
    cycles: Vec<TaskId>,
}

/// Kanban projection: nest only when parent and child share a column.
#[must_use]
pub fn project_by_column(tasks: &[Task]) -> Forest {
    Forest::build(tasks, Projection::ByColumn)
}

/// Gantt projection: nest whenever the parent exists.
#[must_use]
pub fn project_global(tasks: &[Task]) -> Forest {
    Forest::build(tasks, Projection::Global)
}

impl Forest {
    fn build(tasks: &[Task], projection: Projection) -> Self {
        let index = TaskIndex::new(tasks);

        let mut nodes: Vec<ForestNode> = Vec::with_capacity(tasks.len());
        let mut position: HashMap<TaskId, usize> = HashMap::with_capacity(tasks.len());
        let mut cycles = Vec::new();

        for task in tasks {
            if position.contains_key(&task.id) {
                tracing::debug!(task = %task.id, "duplicate task id ignored");
                continue;
            }
            let level = match task_level(&index, task) {
                Ok(level) => level,
                Err(cycle) => {
                    tracing::debug!(code = %cycle.code(), task = %cycle.task, "level of cyclic chain is 0");
                    cycles.push(cycle.task);
                    0
                }
            };
            position.insert(task.id.clone(), nodes.len());
            nodes.push(ForestNode {
                task: task.clone(),
                level,
                sort_key: String::new(),
                children: Vec::new(),
            });
        }

        // Stable: equal orders keep input order.
        let mut by_order: Vec<usize> = (0..nodes.len()).collect();
        by_order.sort_by_key(|&i| nodes[i].task.order);

        let mut attached_to: HashMap<usize, usize> = HashMap::new();
        let mut roots: Vec<usize> = Vec::new();

        for &i in &by_order {
            let parent = nodes[i]
                .task
                .parent_id
                .as_ref()
                .and_then(|p| position.get(p).copied())
                .filter(|&p| match projection {
                    Projection::Global => true,
                    Projection::ByColumn => nodes[p].task.column_id == nodes[i].task.column_id,
                })
                .filter(|&p| !closes_loop(&attached_to, i, p));

            if let Some(p) = parent {
                attached_to.insert(i, p);
                let child_id = nodes[i].task.id.clone();
                nodes[p].children.push(child_id);
            } else {
                roots.push(i);
            }
        }

        assign_sort_keys(&mut nodes, &position, &roots);

        let roots = roots.into_iter().map(|i| nodes[i].task.id.clone()).collect();
        Self {
            projection,
            nodes,
            position,
            roots,
            cycles,
        }
    }

    #[must_use]
    pub const fn projection(&self) -> Projection {
        self.projection
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in input order.
    pub fn iter(&self) -> impl Iterator<Item = &ForestNode> {
        self.nodes.iter()
    }

    #[must_use]
    pub fn node(&self, id: &TaskId) -> Option<&ForestNode> {
        self.position.get(id).map(|&i| &self.nodes[i])
    }

    #[must_use]
    pub fn level(&self, id: &TaskId) -> Option<u32> {
        self.node(id).map(|n| n.level)
    }

    #[must_use]
    pub fn sort_key(&self, id: &TaskId) -> Option<&str> {
        self.node(id).map(|n| n.sort_key.as_str())
    }

    /// Root nodes in ascending `order`.
    pub fn roots(&self) -> impl Iterator<Item = &ForestNode> {
        self.roots.iter().filter_map(|id| self.node(id))
    }

    /// Roots whose task sits in `column`.
    pub fn roots_in_column<'s>(
        &'s self,
        column: &'s ColumnId,
    ) -> impl Iterator<Item = &'s ForestNode> + 's {
        self.roots().filter(move |n| &n.task.column_id == column)
    }

    /// Attached children of `id` in ascending `order`.
    pub fn children_of<'s>(&'s self, id: &TaskId) -> impl Iterator<Item = &'s ForestNode> + 's {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|c| self.node(c))
    }

    /// Whether `child` is attached directly under `parent` in this projection.
    #[must_use]
    pub fn is_child_of(&self, child: &TaskId, parent: &TaskId) -> bool {
        self.node(parent)
            .is_some_and(|n| n.children.iter().any(|c| c == child))
    }

    /// Tasks whose parent chain loops.
    #[must_use]
    pub fn cycles(&self) -> &[TaskId] {
        &self.cycles
    }

    /// Depth-first pre-order walk from the roots, which is sort-key order.
    #[must_use]
    pub fn flatten(&self) -> Vec<&ForestNode> {
        self.walk(self.roots(), |_| true)
    }

    /// Depth-first walk of the roots in `column`.
    #[must_use]
    pub fn flatten_column(&self, column: &ColumnId) -> Vec<&ForestNode> {
        self.walk(self.roots().filter(|n| &n.task.column_id == column), |_| true)
    }

    fn walk<'s>(
        &'s self,
        start: impl Iterator<Item = &'s ForestNode>,
        keep: impl Fn(&ForestNode) -> bool,
    ) -> Vec<&'s ForestNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<&ForestNode> = start.collect();
        stack.reverse();
        while let Some(node) = stack.pop() {
            if !keep(node) {
                continue;
            }
            out.push(node);
            for child in node.children.iter().rev() {
                if let Some(c) = self.node(child) {
                    stack.push(c);
                }
            }
        }
        out
    }
}

/// Rows for a Gantt chart: the flattened forest without hidden tasks.
///
/// A task flagged `is_hidden_in_gantt` is omitted along with everything
/// nested under it.
#[must_use]
pub fn gantt_rows(forest: &Forest) -> Vec<&ForestNode> {
    forest.walk(forest.roots(), |n| !n.task.is_hidden_in_gantt)
}

/// Would attaching `child` under `parent` make `child` its own ancestor?
fn closes_loop(attached_to: &HashMap<usize, usize>, child: usize, parent: usize) -> bool {
    let mut current = parent;
    loop {
        if current == child {
            return true;
        }
        match attached_to.get(&current) {
            Some(&next) => current = next,
            None => return false,
        }
    }
}

fn assign_sort_keys(nodes: &mut [ForestNode], position: &HashMap<TaskId, usize>, roots: &[usize]) {
    let mut stack: Vec<(usize, Option<String>)> = roots.iter().map(|&r| (r, None)).collect();
    while let Some((i, prefix)) = stack.pop() {
        let segment = sort_key_segment(nodes[i].task.order);
        let key = match prefix {
            Some(p) => format!("{p}.{segment}"),
            None => segment,
        };
        for child in &nodes[i].children {
            if let Some(&c) = position.get(child) {
                stack.push((c, Some(key.clone())));
            }
        }
        nodes[i].sort_key = key;
    }
}
