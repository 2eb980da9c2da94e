//! Drag-and-drop session over a [`Replica`].
//!
//! A session is either idle or dragging one item (a task card or a column
//! header). While dragging, every hover recomputes where the item would land
//! and applies that placement to the replica optimistically, so the board
//! reflects the move during the gesture. Nothing here talks to the server:
//! [`DragSession::end`] returns a [`DropOutcome`] describing the single write
//! the caller has to make, if any.
//!
//! Placement rules for a task:
//!
//! - over another task: take that task's column and its `order`, landing
//!   just before it;
//! - over a column: take that column and append after its last task
//!   (`max order + 1`, or 0 when the column is empty);
//! - over itself or one of its own descendants: stay put.
//!
//! Moving a task carries every transitive descendant into the new column;
//! descendants keep their own `order`.

use crate::forest::descendants_of;
use crate::model::{ColumnId, ColumnOrder, Placement, TaskId};
use crate::replica::Replica;

/// What is being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragItem {
    Task(TaskId),
    Column(ColumnId),
}

/// What the pointer is over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    Task(TaskId),
    Column(ColumnId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DragError {
    #[error("task not found: '{0}'")]
    UnknownTask(TaskId),
    #[error("column not found: '{0}'")]
    UnknownColumn(ColumnId),
    #[error("no drag in progress")]
    NotDragging,
}

impl DragError {
    #[must_use]
    pub const fn code(&self) -> crate::error::ErrorCode {
        use crate::error::ErrorCode;
        match self {
            Self::UnknownTask(_) => ErrorCode::TaskNotFound,
            Self::UnknownColumn(_) => ErrorCode::ColumnNotFound,
            Self::NotDragging => ErrorCode::NoActiveDrag,
        }
    }
}

/// Where the dragged item was when the gesture began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// The task's placement and those of its descendants, task first.
    Task(Vec<(TaskId, Placement)>),
    /// Column ids in board order.
    Columns(Vec<ColumnId>),
}

/// State of a drag in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDrag {
    pub item: DragItem,
    pub origin: Origin,
    /// Sequence number stamped on every optimistic edit of this gesture.
    pub seq: u64,
}

impl ActiveDrag {
    /// Placement of the dragged task at drag start.
    #[must_use]
    pub fn origin_placement(&self) -> Option<&Placement> {
        match &self.origin {
            Origin::Task(snapshot) => snapshot.first().map(|(_, p)| p),
            Origin::Columns(_) => None,
        }
    }
}

/// The write a finished gesture requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    /// Dropped where it started (or outside any target): nothing to send.
    NoOp,
    /// `PUT /tasks/{task}` with the placement.
    MoveTask {
        task: TaskId,
        placement: Placement,
        seq: u64,
    },
    /// `PUT /columns/reorder` with the full ordering.
    ReorderColumns { items: Vec<ColumnOrder>, seq: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum DragState {
    #[default]
    Idle,
    Dragging(ActiveDrag),
}

/// Drag state machine: `Idle -> Dragging -> Idle`.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    state: DragState,
}

impl DragSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    #[must_use]
    pub const fn active(&self) -> Option<&ActiveDrag> {
        match &self.state {
            DragState::Dragging(active) => Some(active),
            DragState::Idle => None,
        }
    }

    /// Begin dragging `item`, recording where it started.
    ///
    /// Starting while another drag is active abandons the earlier one.
    ///
    /// # Errors
    ///
    /// Fails when `item` is not on the board.
    pub fn start(&mut self, item: DragItem, replica: &mut Replica) -> Result<(), DragError> {
        if let Some(previous) = self.cancel(replica) {
            tracing::debug!(item = ?previous.item, "abandoned unfinished drag");
        }

        let origin = match &item {
            DragItem::Task(id) => {
                let task = replica
                    .task(id)
                    .ok_or_else(|| DragError::UnknownTask(id.clone()))?;
                let mut snapshot = vec![(id.clone(), task.placement())];
                for kid in descendants_of(replica.tasks(), id) {
                    if let Some(t) = replica.task(&kid) {
                        snapshot.push((kid, t.placement()));
                    }
                }
                Origin::Task(snapshot)
            }
            DragItem::Column(id) => {
                if replica.column(id).is_none() {
                    return Err(DragError::UnknownColumn(id.clone()));
                }
                Origin::Columns(replica.ordered_columns().iter().map(|c| c.id.clone()).collect())
            }
        };

        let seq = replica.next_edit_seq();
        tracing::debug!(item = ?item, seq, "drag started");
        self.state = DragState::Dragging(ActiveDrag { item, origin, seq });
        Ok(())
    }

    /// Hover over `target`: recompute and optimistically apply the placement.
    ///
    /// Returns the placement applied, or `None` when nothing moved (column
    /// drags, or hovering the dragged task's own subtree).
    ///
    /// # Errors
    ///
    /// Fails when idle or when `target` is not on the board.
    pub fn over(
        &mut self,
        target: &DropTarget,
        replica: &mut Replica,
    ) -> Result<Option<Placement>, DragError> {
        let active = self.active().ok_or(DragError::NotDragging)?;
        let DragItem::Task(task) = &active.item else {
            return Ok(None);
        };
        let Some(placement) = resolve_placement(replica, task, target)? else {
            return Ok(None);
        };
        move_subtree(replica, task, &placement, active.seq);
        Ok(Some(placement))
    }

    /// Drop on `target` (or outside any target when `None`) and return the
    /// write to make.
    ///
    /// # Errors
    ///
    /// Fails when idle or when `target` is not on the board. The session is
    /// always idle afterwards.
    pub fn end(
        &mut self,
        target: Option<&DropTarget>,
        replica: &mut Replica,
    ) -> Result<DropOutcome, DragError> {
        let DragState::Dragging(active) = std::mem::take(&mut self.state) else {
            return Err(DragError::NotDragging);
        };

        let Some(target) = target else {
            restore_origin(replica, &active);
            return Ok(DropOutcome::NoOp);
        };

        match &active.item {
            DragItem::Task(task) => end_task_drag(replica, &active, task, target),
            DragItem::Column(column) => end_column_drag(replica, &active, column, target),
        }
    }

    /// Abandon the current drag and put the board back as it was.
    pub fn cancel(&mut self, replica: &mut Replica) -> Option<ActiveDrag> {
        let DragState::Dragging(active) = std::mem::take(&mut self.state) else {
            return None;
        };
        restore_origin(replica, &active);
        Some(active)
    }
}

fn end_task_drag(
    replica: &mut Replica,
    active: &ActiveDrag,
    task: &TaskId,
    target: &DropTarget,
) -> Result<DropOutcome, DragError> {
    let resolved = match resolve_placement(replica, task, target) {
        Ok(resolved) => resolved,
        Err(err) => {
            restore_origin(replica, active);
            return Err(err);
        }
    };
    let current = replica
        .task(task)
        .map(crate::model::Task::placement)
        .ok_or_else(|| DragError::UnknownTask(task.clone()))?;
    let placement = resolved.unwrap_or(current);

    if active.origin_placement() == Some(&placement) {
        restore_origin(replica, active);
        tracing::debug!(task = %task, "dropped in place");
        return Ok(DropOutcome::NoOp);
    }

    move_subtree(replica, task, &placement, active.seq);
    Ok(DropOutcome::MoveTask {
        task: task.clone(),
        placement,
        seq: active.seq,
    })
}

fn end_column_drag(
    replica: &mut Replica,
    active: &ActiveDrag,
    column: &ColumnId,
    target: &DropTarget,
) -> Result<DropOutcome, DragError> {
    let onto = match target {
        DropTarget::Column(id) => {
            replica
                .column(id)
                .ok_or_else(|| DragError::UnknownColumn(id.clone()))?;
            id.clone()
        }
        DropTarget::Task(id) => replica
            .task(id)
            .map(|t| t.column_id.clone())
            .ok_or_else(|| DragError::UnknownTask(id.clone()))?,
    };

    let mut ids: Vec<ColumnId> = replica.ordered_columns().iter().map(|c| c.id.clone()).collect();
    let from = ids.iter().position(|c| c == column);
    let to = ids.iter().position(|c| c == &onto);
    let (Some(from), Some(to)) = (from, to) else {
        return Err(DragError::UnknownColumn(column.clone()));
    };
    if from == to {
        return Ok(DropOutcome::NoOp);
    }

    array_move(&mut ids, from, to);
    let items: Vec<ColumnOrder> = ids
        .into_iter()
        .zip(0_i64..)
        .map(|(id, order)| ColumnOrder { id, order })
        .collect();
    replica.reorder_columns_local(items.clone(), active.seq);
    Ok(DropOutcome::ReorderColumns {
        items,
        seq: active.seq,
    })
}

fn restore_origin(replica: &mut Replica, active: &ActiveDrag) {
    match &active.origin {
        Origin::Task(snapshot) => replica.restore(snapshot, active.seq),
        Origin::Columns(_) => replica.forget(active.seq),
    }
}

/// Where `task` would land when dropped on `target`.
///
/// Returns `None` when `target` is the task itself or one of its
/// descendants.
///
/// # Errors
///
/// Fails when `task` or `target` is not on the board.
pub fn resolve_placement(
    replica: &Replica,
    task: &TaskId,
    target: &DropTarget,
) -> Result<Option<Placement>, DragError> {
    if replica.task(task).is_none() {
        return Err(DragError::UnknownTask(task.clone()));
    }
    let subtree = descendants_of(replica.tasks(), task);

    match target {
        DropTarget::Task(over) => {
            let over_task = replica
                .task(over)
                .ok_or_else(|| DragError::UnknownTask(over.clone()))?;
            if over == task || subtree.contains(over) {
                return Ok(None);
            }
            Ok(Some(over_task.placement()))
        }
        DropTarget::Column(column) => {
            if replica.column(column).is_none() {
                return Err(DragError::UnknownColumn(column.clone()));
            }
            let max = replica
                .tasks()
                .iter()
                .filter(|t| &t.column_id == column)
                .filter(|t| &t.id != task && !subtree.contains(&t.id))
                .map(|t| t.order)
                .max();
            Ok(Some(Placement {
                column: column.clone(),
                order: order_after(max),
            }))
        }
    }
}

/// The `order` that appends after `last`, or 0 for an empty list.
///
/// Saturates at `i64::MAX`, so an append next to a task already there ties
/// with it instead of wrapping to the front.
#[must_use]
pub const fn order_after(last: Option<i64>) -> i64 {
    match last {
        Some(order) => order.saturating_add(1),
        None => 0,
    }
}

/// Place `task` and carry its descendants into the same column.
///
/// Descendants keep their own `order`. Returns the ids touched, task first.
pub fn move_subtree(
    replica: &mut Replica,
    task: &TaskId,
    placement: &Placement,
    seq: u64,
) -> Vec<TaskId> {
    let descendants = descendants_of(replica.tasks(), task);
    let mut moved = Vec::with_capacity(descendants.len() + 1);
    if replica.place_task(task, placement, seq) {
        moved.push(task.clone());
    }
    for kid in descendants {
        let Some(order) = replica.task(&kid).map(|t| t.order) else {
            continue;
        };
        let at = Placement {
            column: placement.column.clone(),
            order,
        };
        if replica.place_task(&kid, &at, seq) {
            moved.push(kid);
        }
    }
    tracing::debug!(task = %task, to = %placement, moved = moved.len(), "subtree placed");
    moved
}

/// Move the element at `from` to index `to`, shifting the rest.
///
/// Out-of-range indices leave the slice unchanged.
pub fn array_move<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || to >= items.len() || from == to {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}
