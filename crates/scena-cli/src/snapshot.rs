//! File-backed stand-in for a scena server.
//!
//! A snapshot is one JSON document `{ "columns": [...], "tasks": [...] }`.
//! Reads take a shared advisory lock on `<file>.lock`, writes an exclusive
//! one, and every write replaces the document atomically (temp file, then
//! rename) so a crashed writer never leaves a torn board behind.

use fs2::FileExt;
use scena_core::api::{ApiError, BoardApi, routes};
use scena_core::forest::descendants_of;
use scena_core::model::{
    Column, ColumnId, ColumnOrder, NewColumn, NewTask, ProjectId, Task, TaskId, TaskMove,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// On-disk board document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Clone, Copy)]
enum LockKind {
    Shared,
    Exclusive,
}

/// Held advisory lock; released on drop.
struct FileGuard {
    file: File,
}

impl FileGuard {
    fn acquire(path: &Path, timeout: Duration, kind: LockKind) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        let start = Instant::now();
        loop {
            let attempt = match kind {
                LockKind::Shared => FileExt::try_lock_shared(&file),
                LockKind::Exclusive => FileExt::try_lock_exclusive(&file),
            };
            if attempt.is_ok() {
                return Ok(Self { file });
            }
            if start.elapsed() >= timeout {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    format!("lock on {} timed out after {timeout:?}", path.display()),
                ));
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// [`BoardApi`] over a snapshot file. The project id is ignored.
pub struct SnapshotBoard {
    path: PathBuf,
    lock_path: PathBuf,
}

impl SnapshotBoard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot` as the whole board.
    ///
    /// # Errors
    ///
    /// Fails when the lock cannot be taken or the file cannot be written.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), ApiError> {
        let _guard = self.lock(LockKind::Exclusive)?;
        self.write(snapshot)
    }

    /// Read the whole board.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(&self) -> Result<Snapshot, ApiError> {
        let _guard = self.lock(LockKind::Shared)?;
        self.read()
    }

    fn lock(&self, kind: LockKind) -> Result<FileGuard, ApiError> {
        FileGuard::acquire(&self.lock_path, LOCK_TIMEOUT, kind).map_err(|e| self.storage(&e))
    }

    fn storage(&self, err: &dyn std::fmt::Display) -> ApiError {
        ApiError::Storage(format!("{}: {err}", self.path.display()))
    }

    fn read(&self) -> Result<Snapshot, ApiError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(self.storage(&e)),
        };
        serde_json::from_str(&raw).map_err(|e| self.storage(&e))
    }

    fn write(&self, snapshot: &Snapshot) -> Result<(), ApiError> {
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| self.storage(&e))?;
        fs::write(&tmp, json).map_err(|e| self.storage(&e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.storage(&e))
    }

    /// Read, modify and write back under one exclusive lock.
    fn update<T>(
        &self,
        apply: impl FnOnce(&mut Snapshot) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let _guard = self.lock(LockKind::Exclusive)?;
        let mut snapshot = self.read()?;
        let out = apply(&mut snapshot)?;
        self.write(&snapshot)?;
        Ok(out)
    }
}

fn not_found(path: String, what: &str) -> ApiError {
    ApiError::Status {
        method: "PUT",
        path,
        status: 404,
        body: format!("{what} not found"),
    }
}

/// First `<prefix>-<n>` not already taken.
fn fresh_id<'a>(prefix: &str, taken: impl Iterator<Item = &'a str> + Clone) -> String {
    (1..)
        .map(|n: u64| format!("{prefix}-{n}"))
        .find(|candidate| !taken.clone().any(|t| t == candidate))
        .unwrap_or_default()
}

impl BoardApi for SnapshotBoard {
    fn fetch_columns(&self, _project: &ProjectId) -> Result<Vec<Column>, ApiError> {
        Ok(self.load()?.columns)
    }

    fn fetch_tasks(&self, _project: &ProjectId) -> Result<Vec<Task>, ApiError> {
        Ok(self.load()?.tasks)
    }

    fn move_task(
        &self,
        project: &ProjectId,
        task: &TaskId,
        body: &TaskMove,
    ) -> Result<(), ApiError> {
        self.update(|snapshot| {
            let subtree = descendants_of(&snapshot.tasks, task);
            let Some(t) = snapshot.tasks.iter_mut().find(|t| &t.id == task) else {
                return Err(not_found(routes::task(project, task), "task"));
            };
            t.column_id = body.column_id.clone();
            t.order = body.order;
            for t in &mut snapshot.tasks {
                if subtree.contains(&t.id) {
                    t.column_id = body.column_id.clone();
                }
            }
            Ok(())
        })
    }

    fn reorder_columns(&self, project: &ProjectId, items: &[ColumnOrder]) -> Result<(), ApiError> {
        self.update(|snapshot| {
            for item in items {
                let Some(c) = snapshot.columns.iter_mut().find(|c| c.id == item.id) else {
                    return Err(not_found(routes::column_reorder(project), "column"));
                };
                c.order = item.order;
            }
            Ok(())
        })
    }

    fn create_task(&self, _project: &ProjectId, new: &NewTask) -> Result<Task, ApiError> {
        self.update(|snapshot| {
            let id = fresh_id("task", snapshot.tasks.iter().map(|t| t.id.as_str()));
            let mut task = Task::new(id, new.title.clone(), new.column_id.clone(), new.order);
            task.parent_id.clone_from(&new.parent_id);
            snapshot.tasks.push(task.clone());
            Ok(task)
        })
    }

    fn create_column(&self, _project: &ProjectId, new: &NewColumn) -> Result<Column, ApiError> {
        self.update(|snapshot| {
            let id = fresh_id("column", snapshot.columns.iter().map(|c| c.id.as_str()));
            let mut column = Column::new(ColumnId::new(id), new.name.clone(), new.order);
            column.color.clone_from(&new.color);
            snapshot.columns.push(column.clone());
            Ok(column)
        })
    }
}
