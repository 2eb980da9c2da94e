//! Board coordinator: replica + drag session + API.
//!
//! [`BoardSync`] owns everything a client needs for one project's board and
//! performs the single network write each finished gesture requires. The
//! only failure policy is the one the board has always had: when a write is
//! rejected or lost, every optimistic change is thrown away and both
//! collections are fetched again. There are no retries and no idempotency
//! keys; a write that times out after landing will simply be confirmed by
//! the next poll.

use crate::api::{ApiError, BoardApi};
use crate::drag::{DragError, DragItem, DragSession, DropOutcome, DropTarget};
use crate::error::ErrorCode;
use crate::forest::{Forest, project_by_column, project_global};
use crate::model::{
    Column, ColumnId, ColumnOrder, NewColumn, NewTask, Placement, ProjectId, Task, TaskId,
    TaskMove,
};
use crate::replica::{ReconcileReport, Replica};

/// Failure the coordinator could not recover from on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Drag(#[from] DragError),
    /// A fetch failed; the replica is unchanged.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// A write failed and so did the refetch meant to undo it.
    #[error("write failed ({write}) and refetch failed ({refetch})")]
    RollbackFailed { write: ApiError, refetch: ApiError },
}

impl SyncError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Drag(e) => e.code(),
            Self::Api(e) => e.code(),
            Self::RollbackFailed { .. } => ErrorCode::RollbackFailed,
        }
    }
}

/// How a finished gesture ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropResult {
    /// Nothing needed sending.
    NoOp,
    /// A task move was accepted.
    TaskMoved { task: TaskId, placement: Placement },
    /// A column reorder was accepted.
    ColumnsReordered(Vec<ColumnOrder>),
    /// The write failed; local state now mirrors the server again.
    RolledBack { error: ApiError },
}

/// Outcome of an optimistic create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Created<T> {
    Confirmed(T),
    RolledBack { error: ApiError },
}

/// One project's board, kept in sync with the server.
#[derive(Debug)]
pub struct BoardSync<A> {
    api: A,
    project: ProjectId,
    replica: Replica,
    session: DragSession,
}

impl<A: BoardApi> BoardSync<A> {
    /// Coordinator with an empty replica. Call [`refresh`](Self::refresh)
    /// to load the board.
    #[must_use]
    pub fn new(api: A, project: ProjectId) -> Self {
        Self {
            api,
            project,
            replica: Replica::new(),
            session: DragSession::new(),
        }
    }

    /// Coordinator with the board already loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Api`] when either collection cannot be fetched.
    pub fn load(api: A, project: ProjectId) -> Result<Self, SyncError> {
        let mut sync = Self::new(api, project);
        sync.refresh()?;
        Ok(sync)
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub const fn project(&self) -> &ProjectId {
        &self.project
    }

    #[must_use]
    pub const fn replica(&self) -> &Replica {
        &self.replica
    }

    #[must_use]
    pub const fn session(&self) -> &DragSession {
        &self.session
    }

    /// Kanban projection of the current replica.
    #[must_use]
    pub fn kanban(&self) -> Forest {
        project_by_column(self.replica.tasks())
    }

    /// Gantt projection of the current replica.
    #[must_use]
    pub fn gantt(&self) -> Forest {
        project_global(self.replica.tasks())
    }

    /// Poll columns.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Api`] when the fetch fails; the replica is unchanged.
    pub fn refresh_columns(&mut self) -> Result<ReconcileReport, SyncError> {
        let columns = self.api.fetch_columns(&self.project)?;
        Ok(self.replica.apply_columns(columns))
    }

    /// Poll tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Api`] when the fetch fails; the replica is unchanged.
    pub fn refresh_tasks(&mut self) -> Result<ReconcileReport, SyncError> {
        let tasks = self.api.fetch_tasks(&self.project)?;
        Ok(self.replica.apply_tasks(tasks))
    }

    /// Poll both collections.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Api`] when either fetch fails.
    pub fn refresh(&mut self) -> Result<ReconcileReport, SyncError> {
        let mut report = self.refresh_columns()?;
        report.merge(self.refresh_tasks()?);
        Ok(report)
    }

    /// # Errors
    ///
    /// Fails when `item` is not on the board.
    pub fn drag_start(&mut self, item: DragItem) -> Result<(), SyncError> {
        Ok(self.session.start(item, &mut self.replica)?)
    }

    /// # Errors
    ///
    /// Fails when idle or when `target` is not on the board.
    pub fn drag_over(&mut self, target: &DropTarget) -> Result<Option<Placement>, SyncError> {
        Ok(self.session.over(target, &mut self.replica)?)
    }

    /// Abandon the current drag, restoring the board.
    pub fn drag_cancel(&mut self) {
        self.session.cancel(&mut self.replica);
    }

    /// Drop and persist.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Drag`] for an invalid drop and
    /// [`SyncError::RollbackFailed`] when both the write and the refetch fail.
    /// A failed write alone is not an error: it yields
    /// [`DropResult::RolledBack`].
    pub fn drag_end(&mut self, target: Option<&DropTarget>) -> Result<DropResult, SyncError> {
        match self.session.end(target, &mut self.replica)? {
            DropOutcome::NoOp => Ok(DropResult::NoOp),
            DropOutcome::MoveTask {
                task,
                placement,
                seq,
            } => {
                let body = TaskMove::from(&placement);
                match self.api.move_task(&self.project, &task, &body) {
                    Ok(()) => {
                        self.replica.acknowledge(seq);
                        tracing::info!(task = %task, to = %placement, "task moved");
                        Ok(DropResult::TaskMoved { task, placement })
                    }
                    Err(error) => Ok(DropResult::RolledBack {
                        error: self.roll_back(error)?,
                    }),
                }
            }
            DropOutcome::ReorderColumns { items, seq } => {
                match self.api.reorder_columns(&self.project, &items) {
                    Ok(()) => {
                        self.replica.acknowledge(seq);
                        tracing::info!(columns = items.len(), "columns reordered");
                        Ok(DropResult::ColumnsReordered(items))
                    }
                    Err(error) => Ok(DropResult::RolledBack {
                        error: self.roll_back(error)?,
                    }),
                }
            }
        }
    }

    /// Drag `task` onto `target` and drop it there in one step.
    ///
    /// # Errors
    ///
    /// See [`drag_end`](Self::drag_end).
    pub fn move_task(
        &mut self,
        task: &TaskId,
        target: &DropTarget,
    ) -> Result<DropResult, SyncError> {
        self.drag_start(DragItem::Task(task.clone()))?;
        if let Err(err) = self.drag_over(target) {
            self.drag_cancel();
            return Err(err);
        }
        self.drag_end(Some(target))
    }

    /// Drag column `column` onto column `onto` and drop it there.
    ///
    /// # Errors
    ///
    /// See [`drag_end`](Self::drag_end).
    pub fn reorder_columns(
        &mut self,
        column: &ColumnId,
        onto: &ColumnId,
    ) -> Result<DropResult, SyncError> {
        self.drag_start(DragItem::Column(column.clone()))?;
        self.drag_end(Some(&DropTarget::Column(onto.clone())))
    }

    /// Create a task, showing it locally before the server answers.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RollbackFailed`] when the create and the refetch
    /// both fail.
    pub fn create_task(&mut self, new: &NewTask) -> Result<Created<Task>, SyncError> {
        let provisional = self.replica.insert_provisional_task(new);
        match self.api.create_task(&self.project, new) {
            Ok(task) => {
                tracing::info!(task = %task.id, "task created");
                self.replica.confirm_provisional_task(&provisional, task.clone());
                Ok(Created::Confirmed(task))
            }
            Err(error) => {
                self.replica.drop_provisional_task(&provisional);
                Ok(Created::RolledBack {
                    error: self.roll_back(error)?,
                })
            }
        }
    }

    /// Create a column, showing it locally before the server answers.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::RollbackFailed`] when the create and the refetch
    /// both fail.
    pub fn create_column(&mut self, new: &NewColumn) -> Result<Created<Column>, SyncError> {
        let provisional = self.replica.insert_provisional_column(new);
        match self.api.create_column(&self.project, new) {
            Ok(column) => {
                tracing::info!(column = %column.id, "column created");
                self.replica.confirm_provisional_column(&provisional, column.clone());
                Ok(Created::Confirmed(column))
            }
            Err(error) => {
                self.replica.drop_provisional_column(&provisional);
                Ok(Created::RolledBack {
                    error: self.roll_back(error)?,
                })
            }
        }
    }

    /// Discard optimistic state and refetch the truth. Hands the write error
    /// back once the board mirrors the server again.
    fn roll_back(&mut self, error: ApiError) -> Result<ApiError, SyncError> {
        tracing::warn!(code = %error.code(), error = %error, "write failed; refetching board");
        self.replica.discard_pending();
        let fetched = self
            .api
            .fetch_columns(&self.project)
            .and_then(|columns| Ok((columns, self.api.fetch_tasks(&self.project)?)));
        match fetched {
            Ok((columns, tasks)) => {
                self.replica.reset(columns, tasks);
                Ok(error)
            }
            Err(refetch) => {
                tracing::error!(error = %refetch, "refetch after failed write also failed");
                Err(SyncError::RollbackFailed {
                    write: error,
                    refetch,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Call, MemoryBoard};

    fn server() -> MemoryBoard {
        MemoryBoard::new(
            vec![
                Column::new("c1", "Shoot", 0),
                Column::new("c2", "Edit", 1),
                Column::new("c3", "Deliver", 2),
            ],
            vec![
                Task::new("A", "Storyboard", "c1", 0),
                Task::new("B", "Shot list", "c1", 1).with_parent("A"),
            ],
        )
    }

    fn loaded() -> BoardSync<MemoryBoard> {
        BoardSync::load(server(), ProjectId::from("p1")).expect("load")
    }

    fn at(column: &str, order: i64) -> Placement {
        Placement {
            column: column.into(),
            order,
        }
    }

    fn placement(sync: &BoardSync<MemoryBoard>, id: &str) -> Placement {
        sync.replica()
            .task(&id.into())
            .map(Task::placement)
            .expect("task exists")
    }

    #[test]
    fn drag_to_empty_column_sends_one_write() {
        let mut sync = loaded();
        let result = sync
            .move_task(&"A".into(), &DropTarget::Column("c2".into()))
            .expect("move");

        assert_eq!(
            result,
            DropResult::TaskMoved {
                task: "A".into(),
                placement: at("c2", 0),
            }
        );
        assert_eq!(placement(&sync, "A"), at("c2", 0));
        assert_eq!(placement(&sync, "B"), at("c2", 1));
        assert_eq!(sync.api().write_count(), 1);
        assert!(matches!(
            sync.api().calls().last(),
            Some(Call::MoveTask(task, body)) if task.as_str() == "A" && body.order == 0
        ));
        assert!(!sync.replica().has_pending());
    }

    #[test]
    fn moved_subtree_survives_next_poll() {
        let mut sync = loaded();
        sync.move_task(&"A".into(), &DropTarget::Column("c2".into()))
            .expect("move");
        let report = sync.refresh().expect("refresh");
        assert!(!report.has_conflicts());
        assert_eq!(placement(&sync, "A"), at("c2", 0));
        assert_eq!(placement(&sync, "B"), at("c2", 1));
    }

    #[test]
    fn drop_in_place_writes_nothing() {
        let mut sync = loaded();
        sync.drag_start(DragItem::Task("A".into())).expect("start");
        let result = sync
            .drag_end(Some(&DropTarget::Task("A".into())))
            .expect("end");
        assert_eq!(result, DropResult::NoOp);
        assert_eq!(sync.api().write_count(), 0);
    }

    #[test]
    fn rejected_move_rolls_back_to_server_state() {
        let mut sync = loaded();
        sync.api().fail_next_writes(1);
        let result = sync
            .move_task(&"A".into(), &DropTarget::Column("c3".into()))
            .expect("rollback succeeds");

        let DropResult::RolledBack { error } = result else {
            panic!("expected rollback, got {result:?}");
        };
        assert_eq!(error.code(), ErrorCode::ServerRejected);
        assert_eq!(placement(&sync, "A"), at("c1", 0));
        assert_eq!(placement(&sync, "B"), at("c1", 1));
        assert!(!sync.replica().has_pending());
    }

    #[test]
    fn failed_refetch_surfaces_both_errors() {
        let mut sync = loaded();
        sync.api().fail_next_writes(1);
        sync.api().fail_next_fetches(1);
        let err = sync
            .move_task(&"A".into(), &DropTarget::Column("c3".into()))
            .expect_err("rollback fails");
        assert_eq!(err.code(), ErrorCode::RollbackFailed);
        assert!(matches!(err, SyncError::RollbackFailed { .. }));
    }

    #[test]
    fn poll_during_drag_keeps_dragged_placement() {
        let mut sync = loaded();
        sync.drag_start(DragItem::Task("A".into())).expect("start");
        sync.drag_over(&DropTarget::Column("c2".into()))
            .expect("over");

        let report = sync.refresh().expect("poll");
        assert_eq!(report.kept_local.len(), 2);
        assert_eq!(placement(&sync, "A"), at("c2", 0));

        let result = sync
            .drag_end(Some(&DropTarget::Column("c2".into())))
            .expect("end");
        assert!(matches!(result, DropResult::TaskMoved { .. }));
        assert_eq!(sync.api().write_count(), 1);
    }

    #[test]
    fn column_reorder_persists_full_ordering() {
        let mut sync = loaded();
        let result = sync
            .reorder_columns(&"c3".into(), &"c1".into())
            .expect("reorder");
        let DropResult::ColumnsReordered(items) = result else {
            panic!("expected reorder, got {result:?}");
        };
        let sent: Vec<(String, i64)> = items.iter().map(|i| (i.id.to_string(), i.order)).collect();
        assert_eq!(
            sent,
            [("c3".to_string(), 0), ("c1".to_string(), 1), ("c2".to_string(), 2)]
        );
        let server: Vec<i64> = sync.api().columns().iter().map(|c| c.order).collect();
        assert_eq!(server, [1, 2, 0]);
    }

    #[test]
    fn rejected_column_reorder_refetches_server_order() {
        let mut sync = loaded();
        sync.api().fail_next_writes(1);
        let result = sync
            .reorder_columns(&"c3".into(), &"c1".into())
            .expect("rollback succeeds");

        let DropResult::RolledBack { error } = result else {
            panic!("expected rollback, got {result:?}");
        };
        assert_eq!(error.code(), ErrorCode::ServerRejected);
        let shown: Vec<&str> = sync
            .replica()
            .ordered_columns()
            .iter()
            .map(|c| c.id.as_str())
            .collect();
        assert_eq!(shown, ["c1", "c2", "c3"]);
        assert!(!sync.replica().has_pending());
        assert!(matches!(sync.api().calls().last(), Some(Call::FetchTasks)));
    }

    #[test]
    fn created_task_replaces_provisional() {
        let mut sync = loaded();
        let created = sync
            .create_task(&NewTask {
                title: "Colour grade".into(),
                column_id: "c2".into(),
                parent_id: None,
                order: 0,
            })
            .expect("create");
        let Created::Confirmed(task) = created else {
            panic!("expected confirmation, got {created:?}");
        };
        assert!(sync.replica().task(&task.id).is_some());
        assert_eq!(sync.replica().tasks().len(), 3);
        assert!(!sync.replica().has_pending());
    }

    #[test]
    fn rejected_column_create_leaves_no_trace() {
        let mut sync = loaded();
        sync.api().fail_next_writes(1);
        let created = sync
            .create_column(&NewColumn {
                name: "Review".into(),
                order: 3,
                color: None,
            })
            .expect("rollback succeeds");
        assert!(matches!(created, Created::RolledBack { .. }));
        assert_eq!(sync.replica().columns().len(), 3);
    }

    #[test]
    fn kanban_reflects_optimistic_move() {
        let mut sync = loaded();
        sync.drag_start(DragItem::Task("A".into())).expect("start");
        sync.drag_over(&DropTarget::Column("c3".into()))
            .expect("over");
        let forest = sync.kanban();
        let roots: Vec<_> = forest
            .roots_in_column(&"c3".into())
            .map(|n| n.task.id.to_string())
            .collect();
        assert_eq!(roots, ["A"]);
        sync.drag_cancel();
        assert_eq!(placement(&sync, "A"), at("c1", 0));
    }
}
