//! Client-side working copy of one project's board.
//!
//! The server is the source of truth; the replica holds the last fetched
//! columns and tasks with optimistic edits laid on top. Each optimistic
//! placement is registered as a [`PendingEdit`] stamped with the sequence
//! number of the gesture that produced it, so polls and write
//! acknowledgements can be reconciled explicitly instead of whichever
//! response lands last silently winning.
//!
//! # Reconciliation on a task poll
//!
//! | pending edit? | server placement    | result                              |
//! |---------------|---------------------|-------------------------------------|
//! | no            | anything            | server record replaces local        |
//! | yes           | equals `local`      | write landed, pending cleared       |
//! | yes           | equals `base`       | write not seen yet, local kept      |
//! | yes           | anything else       | local kept, [`Conflict`] reported   |
//!
//! Acknowledging a write clears only the edits carrying that write's
//! sequence number, so a slow response for an older gesture never clears
//! (or reverts) a newer one.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::model::{Column, ColumnId, ColumnOrder, NewColumn, NewTask, Placement, Task, TaskId};

/// Prefix of ids handed to records created locally and not yet confirmed.
pub const PROVISIONAL_PREFIX: &str = "provisional-";

/// An optimistic placement the server has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEdit {
    /// Gesture that produced this edit.
    pub seq: u64,
    /// Last placement the server reported before the edit.
    pub base: Placement,
    /// Placement shown locally.
    pub local: Placement,
    /// Edit of an earlier, unacknowledged gesture that this one replaced.
    #[serde(skip)]
    pub replaced: Option<Box<PendingEdit>>,
}

impl PendingEdit {
    /// This edit with gesture `seq` undone, or `None` if nothing remains.
    fn without(mut self, seq: u64) -> Option<Self> {
        if self.seq == seq {
            return self.replaced.map(|edit| *edit);
        }
        self.replaced = self
            .replaced
            .and_then(|edit| (*edit).without(seq))
            .map(Box::new);
        Some(self)
    }
}

/// Cut the replaced edit of `seq`, and everything older, out of the chain.
fn take_replaced(slot: &mut Option<Box<PendingEdit>>, seq: u64) -> Option<Placement> {
    if slot.as_ref().is_some_and(|edit| edit.seq == seq) {
        return slot.take().map(|edit| edit.local);
    }
    take_replaced(&mut slot.as_mut()?.replaced, seq)
}

/// A task moved by someone else while a local edit to it was pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub task: TaskId,
    pub base: Placement,
    pub local: Placement,
    pub server: Placement,
}

/// What a poll did to the replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Pending edits the server now reflects.
    pub confirmed: Vec<TaskId>,
    /// Pending edits kept because the server has not caught up.
    pub kept_local: Vec<TaskId>,
    /// Pending edits whose task was moved concurrently elsewhere.
    pub conflicts: Vec<Conflict>,
    /// Pending edits dropped because the task is gone from the server.
    pub vanished: Vec<TaskId>,
    /// Whether a pending column reorder was laid over the server order.
    pub column_order_kept: bool,
}

impl ReconcileReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: Self) {
        self.confirmed.extend(other.confirmed);
        self.kept_local.extend(other.kept_local);
        self.conflicts.extend(other.conflicts);
        self.vanished.extend(other.vanished);
        self.column_order_kept |= other.column_order_kept;
    }

    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone)]
struct PendingColumns {
    seq: u64,
    items: Vec<ColumnOrder>,
}

/// Working copy of a board: server state plus optimistic edits.
#[derive(Debug, Clone, Default)]
pub struct Replica {
    columns: Vec<Column>,
    tasks: Vec<Task>,
    pending: BTreeMap<TaskId, PendingEdit>,
    pending_columns: Option<PendingColumns>,
    provisional_tasks: BTreeSet<TaskId>,
    provisional_columns: BTreeSet<ColumnId>,
    next_seq: u64,
    next_provisional: u64,
}

impl Replica {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replica seeded with server state and no pending edits.
    #[must_use]
    pub fn from_server(columns: Vec<Column>, tasks: Vec<Task>) -> Self {
        Self {
            columns,
            tasks,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Columns sorted by `order` (ties keep server order).
    #[must_use]
    pub fn ordered_columns(&self) -> Vec<&Column> {
        let mut cols: Vec<&Column> = self.columns.iter().collect();
        cols.sort_by_key(|c| c.order);
        cols
    }

    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    #[must_use]
    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    #[must_use]
    pub fn pending(&self, id: &TaskId) -> Option<&PendingEdit> {
        self.pending.get(id)
    }

    pub fn pending_edits(&self) -> impl Iterator<Item = &PendingEdit> {
        self.pending.values()
    }

    /// Whether any optimistic state (placements, reorders, creations) is
    /// waiting on the server.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
            || self.pending_columns.is_some()
            || !self.provisional_tasks.is_empty()
            || !self.provisional_columns.is_empty()
    }

    /// Allocate the sequence number for a new gesture.
    pub fn next_edit_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Optimistically place a task. Returns `false` when the task is unknown.
    ///
    /// The first edit to a task records the current placement as its base;
    /// later edits keep that base and only move `local` and `seq` forward.
    /// An edit from an earlier gesture is kept as `replaced` until that
    /// gesture is settled.
    pub fn place_task(&mut self, id: &TaskId, placement: &Placement, seq: u64) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) else {
            return false;
        };
        let (base, replaced) = match self.pending.remove(id) {
            Some(edit) if edit.seq == seq => (edit.base, edit.replaced),
            Some(edit) => (edit.base.clone(), Some(Box::new(edit))),
            None => (task.placement(), None),
        };
        task.column_id = placement.column.clone();
        task.order = placement.order;
        self.pending.insert(
            id.clone(),
            PendingEdit {
                seq,
                base,
                local: placement.clone(),
                replaced,
            },
        );
        true
    }

    /// Put tasks back where they were and forget the pending edits of `seq`.
    ///
    /// Used when a gesture ends without a write.
    pub fn restore(&mut self, placements: &[(TaskId, Placement)], seq: u64) {
        for (id, placement) in placements {
            if let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) {
                task.column_id = placement.column.clone();
                task.order = placement.order;
            }
        }
        self.forget(seq);
    }

    /// Undo the bookkeeping of gesture `seq` without touching placements.
    ///
    /// An edit it replaced becomes the pending edit again.
    pub fn forget(&mut self, seq: u64) {
        self.pending = std::mem::take(&mut self.pending)
            .into_iter()
            .filter_map(|(id, edit)| edit.without(seq).map(|edit| (id, edit)))
            .collect();
        self.clear_column_order(seq);
    }

    /// The server accepted the write of gesture `seq`.
    ///
    /// Clears only edits stamped with `seq`; returns how many were cleared.
    /// A newer edit that replaced one of them is rebased onto the accepted
    /// placement.
    pub fn acknowledge(&mut self, seq: u64) -> usize {
        let mut cleared = 0;
        self.pending.retain(|_, edit| {
            if edit.seq == seq {
                cleared += 1;
                return false;
            }
            if let Some(landed) = take_replaced(&mut edit.replaced, seq) {
                edit.base = landed;
            }
            true
        });
        self.clear_column_order(seq);
        cleared
    }

    fn clear_column_order(&mut self, seq: u64) {
        if self.pending_columns.as_ref().is_some_and(|p| p.seq == seq) {
            self.pending_columns = None;
        }
    }

    /// Optimistically apply a full column ordering.
    pub fn reorder_columns_local(&mut self, items: Vec<ColumnOrder>, seq: u64) {
        overlay_column_order(&mut self.columns, &items);
        self.pending_columns = Some(PendingColumns { seq, items });
    }

    /// Reconcile a column poll.
    pub fn apply_columns(&mut self, server: Vec<Column>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let provisional: Vec<Column> = self
            .columns
            .iter()
            .filter(|c| self.provisional_columns.contains(&c.id))
            .cloned()
            .collect();

        self.columns = server;
        if let Some(pending) = &self.pending_columns {
            if column_order_matches(&self.columns, &pending.items) {
                self.pending_columns = None;
            } else {
                overlay_column_order(&mut self.columns, &pending.items);
                report.column_order_kept = true;
            }
        }
        self.columns.extend(provisional);
        report
    }

    /// Reconcile a task poll against pending edits.
    pub fn apply_tasks(&mut self, server: Vec<Task>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let provisional: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| self.provisional_tasks.contains(&t.id))
            .cloned()
            .collect();

        let mut seen: BTreeSet<TaskId> = BTreeSet::new();
        let mut merged = Vec::with_capacity(server.len() + provisional.len());

        for mut task in server {
            seen.insert(task.id.clone());
            let Some(edit) = self.pending.get(&task.id) else {
                merged.push(task);
                continue;
            };
            let server_at = task.placement();
            if server_at == edit.local {
                report.confirmed.push(task.id.clone());
                self.pending.remove(&task.id);
            } else {
                if server_at == edit.base {
                    report.kept_local.push(task.id.clone());
                } else {
                    tracing::warn!(
                        task = %task.id,
                        base = %edit.base,
                        local = %edit.local,
                        server = %server_at,
                        "task moved concurrently while a local edit was pending"
                    );
                    report.conflicts.push(Conflict {
                        task: task.id.clone(),
                        base: edit.base.clone(),
                        local: edit.local.clone(),
                        server: server_at,
                    });
                }
                task.column_id = edit.local.column.clone();
                task.order = edit.local.order;
            }
            merged.push(task);
        }

        let vanished: Vec<TaskId> = self
            .pending
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in &vanished {
            self.pending.remove(id);
        }
        report.vanished = vanished;

        merged.extend(provisional);
        self.tasks = merged;
        report
    }

    /// Throw away every optimistic change and adopt server state wholesale.
    pub fn reset(&mut self, columns: Vec<Column>, tasks: Vec<Task>) {
        self.columns = columns;
        self.tasks = tasks;
        self.discard_pending();
    }

    /// Forget all pending bookkeeping. Placements stay until the next reset.
    pub fn discard_pending(&mut self) {
        self.pending.clear();
        self.pending_columns = None;
        self.provisional_tasks.clear();
        self.provisional_columns.clear();
    }

    /// Insert a locally created task under a provisional id.
    pub fn insert_provisional_task(&mut self, new: &NewTask) -> TaskId {
        let id = TaskId::new(self.next_provisional_id());
        let mut task = Task::new(id.clone(), new.title.clone(), new.column_id.clone(), new.order);
        task.parent_id.clone_from(&new.parent_id);
        self.tasks.push(task);
        self.provisional_tasks.insert(id.clone());
        id
    }

    /// Swap a provisional task for the record the server created.
    pub fn confirm_provisional_task(&mut self, provisional: &TaskId, created: Task) {
        self.provisional_tasks.remove(provisional);
        match self.tasks.iter_mut().find(|t| &t.id == provisional) {
            Some(slot) => *slot = created,
            None => self.tasks.push(created),
        }
    }

    pub fn drop_provisional_task(&mut self, provisional: &TaskId) {
        self.provisional_tasks.remove(provisional);
        self.tasks.retain(|t| &t.id != provisional);
    }

    /// Insert a locally created column under a provisional id.
    pub fn insert_provisional_column(&mut self, new: &NewColumn) -> ColumnId {
        let id = ColumnId::new(self.next_provisional_id());
        let mut column = Column::new(id.clone(), new.name.clone(), new.order);
        column.color.clone_from(&new.color);
        self.columns.push(column);
        self.provisional_columns.insert(id.clone());
        id
    }

    pub fn confirm_provisional_column(&mut self, provisional: &ColumnId, created: Column) {
        self.provisional_columns.remove(provisional);
        match self.columns.iter_mut().find(|c| &c.id == provisional) {
            Some(slot) => *slot = created,
            None => self.columns.push(created),
        }
    }

    pub fn drop_provisional_column(&mut self, provisional: &ColumnId) {
        self.provisional_columns.remove(provisional);
        self.columns.retain(|c| &c.id != provisional);
    }

    fn next_provisional_id(&mut self) -> String {
        self.next_provisional += 1;
        format!("{PROVISIONAL_PREFIX}{}", self.next_provisional)
    }
}

fn overlay_column_order(columns: &mut [Column], items: &[ColumnOrder]) {
    let wanted: HashMap<&ColumnId, i64> = items.iter().map(|i| (&i.id, i.order)).collect();
    for column in columns {
        if let Some(&order) = wanted.get(&column.id) {
            column.order = order;
        }
    }
}

fn column_order_matches(columns: &[Column], items: &[ColumnOrder]) -> bool {
    items.iter().all(|item| {
        columns
            .iter()
            .find(|c| c.id == item.id)
            .is_none_or(|c| c.order == item.order)
    })
}
