//! The board API as seen from the client.
//!
//! [`BoardApi`] is the only contact point between the core and the outside
//! world: two collection reads and the writes a board gesture can produce.
//! Implementations are blocking; a call returning is the only suspension
//! point the core knows about.
//!
//! [`MemoryBoard`] keeps everything in process and records each call, which
//! makes it suitable for tests and for exercising rollback paths.

use std::cell::{Cell, RefCell};

use crate::error::ErrorCode;
use crate::forest::descendants_of;
use crate::model::{
    Column, ColumnOrder, NewColumn, NewTask, Placement, ProjectId, Task, TaskId, TaskMove,
};

/// Failure talking to the board API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{method} {path} returned HTTP {status}: {body}")]
    Status {
        method: &'static str,
        path: String,
        status: u16,
        body: String,
    },
    /// The request never produced a response.
    #[error("{method} {path} failed: {reason}")]
    Transport {
        method: &'static str,
        path: String,
        reason: String,
    },
    /// The response body was not what the API promises.
    #[error("could not decode response of {path}: {reason}")]
    Decode { path: String, reason: String },
    /// A local stand-in for the server could not be read or written.
    #[error("board storage error: {0}")]
    Storage(String),
}

impl ApiError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Status { .. } => ErrorCode::ServerRejected,
            Self::Transport { .. } => ErrorCode::TransportFailed,
            Self::Decode { .. } => ErrorCode::DecodeFailed,
            Self::Storage(_) => ErrorCode::SnapshotUnavailable,
        }
    }
}

/// Route of each endpoint relative to the server root.
///
/// Ids are percent-encoded as single path segments.
pub mod routes {
    use crate::model::{ProjectId, TaskId};
    use urlencoding::encode;

    #[must_use]
    pub fn columns(project: &ProjectId) -> String {
        format!("/api/scena/projects/{}/columns", encode(project.as_str()))
    }

    #[must_use]
    pub fn tasks(project: &ProjectId) -> String {
        format!("/api/scena/projects/{}/tasks", encode(project.as_str()))
    }

    #[must_use]
    pub fn task(project: &ProjectId, task: &TaskId) -> String {
        format!(
            "/api/scena/projects/{}/tasks/{}",
            encode(project.as_str()),
            encode(task.as_str())
        )
    }

    #[must_use]
    pub fn column_reorder(project: &ProjectId) -> String {
        format!("/api/scena/projects/{}/columns/reorder", encode(project.as_str()))
    }
}

/// Client side of the board endpoints.
pub trait BoardApi {
    /// `GET /api/scena/projects/{id}/columns`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] raised by the transport or server.
    fn fetch_columns(&self, project: &ProjectId) -> Result<Vec<Column>, ApiError>;

    /// `GET /api/scena/projects/{id}/tasks`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] raised by the transport or server.
    fn fetch_tasks(&self, project: &ProjectId) -> Result<Vec<Task>, ApiError>;

    /// `PUT /api/scena/projects/{id}/tasks/{taskId}` with `{ columnId, order }`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] raised by the transport or server.
    fn move_task(&self, project: &ProjectId, task: &TaskId, body: &TaskMove)
    -> Result<(), ApiError>;

    /// `PUT /api/scena/projects/{id}/columns/reorder` with `{ items }`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] raised by the transport or server.
    fn reorder_columns(&self, project: &ProjectId, items: &[ColumnOrder]) -> Result<(), ApiError>;

    /// `POST /api/scena/projects/{id}/tasks`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] raised by the transport or server.
    fn create_task(&self, project: &ProjectId, new: &NewTask) -> Result<Task, ApiError>;

    /// `POST /api/scena/projects/{id}/columns`
    ///
    /// # Errors
    ///
    /// Any [`ApiError`] raised by the transport or server.
    fn create_column(&self, project: &ProjectId, new: &NewColumn) -> Result<Column, ApiError>;
}

/// A call received by a [`MemoryBoard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchColumns,
    FetchTasks,
    MoveTask(TaskId, TaskMove),
    ReorderColumns(Vec<ColumnOrder>),
    CreateTask(NewTask),
    CreateColumn(NewColumn),
}

impl Call {
    /// Whether this call would change server state.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        !matches!(self, Self::FetchColumns | Self::FetchTasks)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    columns: Vec<Column>,
    tasks: Vec<Task>,
    calls: Vec<Call>,
    next_id: u64,
}

/// In-process board for tests and offline runs.
///
/// Ignores the project id. Writes can be made to fail with
/// [`MemoryBoard::fail_next_writes`]; fetches with
/// [`MemoryBoard::fail_next_fetches`].
#[derive(Debug, Default)]
pub struct MemoryBoard {
    state: RefCell<MemoryState>,
    failing_writes: Cell<usize>,
    failing_fetches: Cell<usize>,
}

impl MemoryBoard {
    #[must_use]
    pub fn new(columns: Vec<Column>, tasks: Vec<Task>) -> Self {
        Self {
            state: RefCell::new(MemoryState {
                columns,
                tasks,
                ..MemoryState::default()
            }),
            ..Self::default()
        }
    }

    /// Make the next `n` write calls answer HTTP 500.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.set(n);
    }

    /// Make the next `n` fetch calls fail at the transport level.
    pub fn fail_next_fetches(&self, n: usize) {
        self.failing_fetches.set(n);
    }

    /// Every call received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Number of write calls received so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.borrow().calls.iter().filter(|c| c.is_write()).count()
    }

    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().tasks.clone()
    }

    #[must_use]
    pub fn columns(&self) -> Vec<Column> {
        self.state.borrow().columns.clone()
    }

    /// Move a task server-side, as another client would.
    pub fn place_task(&self, task: &TaskId, placement: &Placement) {
        let mut state = self.state.borrow_mut();
        if let Some(t) = state.tasks.iter_mut().find(|t| &t.id == task) {
            t.column_id = placement.column.clone();
            t.order = placement.order;
        }
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn check_fetch(&self, path: String) -> Result<(), ApiError> {
        let left = self.failing_fetches.get();
        if left == 0 {
            return Ok(());
        }
        self.failing_fetches.set(left - 1);
        Err(ApiError::Transport {
            method: "GET",
            path,
            reason: "connection refused".into(),
        })
    }

    fn check_write(&self, method: &'static str, path: String) -> Result<(), ApiError> {
        let left = self.failing_writes.get();
        if left == 0 {
            return Ok(());
        }
        self.failing_writes.set(left - 1);
        Err(ApiError::Status {
            method,
            path,
            status: 500,
            body: "internal error".into(),
        })
    }

    fn next_id(&self, prefix: &str) -> String {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

impl BoardApi for MemoryBoard {
    fn fetch_columns(&self, project: &ProjectId) -> Result<Vec<Column>, ApiError> {
        self.record(Call::FetchColumns);
        self.check_fetch(routes::columns(project))?;
        Ok(self.columns())
    }

    fn fetch_tasks(&self, project: &ProjectId) -> Result<Vec<Task>, ApiError> {
        self.record(Call::FetchTasks);
        self.check_fetch(routes::tasks(project))?;
        Ok(self.tasks())
    }

    fn move_task(
        &self,
        project: &ProjectId,
        task: &TaskId,
        body: &TaskMove,
    ) -> Result<(), ApiError> {
        self.record(Call::MoveTask(task.clone(), body.clone()));
        self.check_write("PUT", routes::task(project, task))?;
        let mut state = self.state.borrow_mut();
        let subtree = descendants_of(&state.tasks, task);
        let Some(t) = state.tasks.iter_mut().find(|t| &t.id == task) else {
            return Err(ApiError::Status {
                method: "PUT",
                path: routes::task(project, task),
                status: 404,
                body: "task not found".into(),
            });
        };
        t.column_id = body.column_id.clone();
        t.order = body.order;
        for t in &mut state.tasks {
            if subtree.contains(&t.id) {
                t.column_id = body.column_id.clone();
            }
        }
        Ok(())
    }

    fn reorder_columns(&self, project: &ProjectId, items: &[ColumnOrder]) -> Result<(), ApiError> {
        self.record(Call::ReorderColumns(items.to_vec()));
        self.check_write("PUT", routes::column_reorder(project))?;
        let mut state = self.state.borrow_mut();
        for item in items {
            if let Some(c) = state.columns.iter_mut().find(|c| c.id == item.id) {
                c.order = item.order;
            }
        }
        Ok(())
    }

    fn create_task(&self, project: &ProjectId, new: &NewTask) -> Result<Task, ApiError> {
        self.record(Call::CreateTask(new.clone()));
        self.check_write("POST", routes::tasks(project))?;
        let mut task = Task::new(
            self.next_id("task"),
            new.title.clone(),
            new.column_id.clone(),
            new.order,
        );
        task.parent_id.clone_from(&new.parent_id);
        self.state.borrow_mut().tasks.push(task.clone());
        Ok(task)
    }

    fn create_column(&self, project: &ProjectId, new: &NewColumn) -> Result<Column, ApiError> {
        self.record(Call::CreateColumn(new.clone()));
        self.check_write("POST", routes::columns(project))?;
        let mut column = Column::new(self.next_id("column"), new.name.clone(), new.order);
        column.color.clone_from(&new.color);
        self.state.borrow_mut().columns.push(column.clone());
        Ok(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_match_server_paths() {
        let project = ProjectId::from("p1");
        assert_eq!(routes::columns(&project), "/api/scena/projects/p1/columns");
        assert_eq!(routes::tasks(&project), "/api/scena/projects/p1/tasks");
        assert_eq!(
            routes::task(&project, &TaskId::from("t9")),
            "/api/scena/projects/p1/tasks/t9"
        );
        assert_eq!(
            routes::column_reorder(&project),
            "/api/scena/projects/p1/columns/reorder"
        );
    }

    #[test]
    fn routes_encode_ids_as_one_segment() {
        let project = ProjectId::from("team/a b");
        assert_eq!(
            routes::task(&project, &TaskId::from("t?1#x")),
            "/api/scena/projects/team%2Fa%20b/tasks/t%3F1%23x"
        );
        assert_eq!(
            routes::columns(&project),
            "/api/scena/projects/team%2Fa%20b/columns"
        );
    }

    #[test]
    fn memory_board_applies_moves_and_counts_writes() {
        let board = MemoryBoard::new(
            vec![Column::new("c1", "A", 0)],
            vec![Task::new("t1", "T", "c1", 0)],
        );
        let project = ProjectId::from("p");
        board
            .move_task(
                &project,
                &"t1".into(),
                &TaskMove {
                    column_id: "c2".into(),
                    order: 3,
                },
            )
            .expect("move");
        assert_eq!(board.tasks()[0].column_id.as_str(), "c2");
        assert_eq!(board.write_count(), 1);
        board.fetch_tasks(&project).expect("fetch");
        assert_eq!(board.write_count(), 1);
        assert_eq!(board.calls().len(), 2);
    }

    #[test]
    fn injected_failures_run_out() {
        let board = MemoryBoard::default();
        let project = ProjectId::from("p");
        board.fail_next_writes(1);
        let err = board
            .reorder_columns(&project, &[])
            .expect_err("first write fails");
        assert_eq!(err.code(), ErrorCode::ServerRejected);
        assert!(board.reorder_columns(&project, &[]).is_ok());
    }
}
