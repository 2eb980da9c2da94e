use anyhow::{Context, Result};
use scena_core::api::{ApiError, BoardApi};
use scena_core::config::EffectiveConfig;
use scena_core::model::{
    Column, ColumnOrder, NewColumn, NewTask, ProjectId, Task, TaskId, TaskMove,
};
use scena_core::sync::BoardSync;
use std::path::Path;
use std::time::Duration;

use crate::http::HttpBoard;
use crate::snapshot::SnapshotBoard;

/// Where board calls go: a live server or a snapshot file.
pub enum Backend {
    Http(HttpBoard),
    Snapshot(SnapshotBoard),
}

impl Backend {
    /// Pick the backend from `--snapshot` or the configured server.
    pub fn select(config: &EffectiveConfig, snapshot: Option<&Path>) -> Result<Self> {
        if let Some(path) = snapshot {
            tracing::debug!(path = %path.display(), "using snapshot board");
            return Ok(Self::Snapshot(SnapshotBoard::new(path)));
        }
        let url = config.server_url.as_deref().context(
            "no server configured: pass --server, set SCENA_URL, or set `server_url` in config.toml",
        )?;
        tracing::debug!(url, "using http board");
        Ok(Self::Http(HttpBoard::new(
            url,
            config.token.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )))
    }
}

impl BoardApi for Backend {
    fn fetch_columns(&self, project: &ProjectId) -> Result<Vec<Column>, ApiError> {
        match self {
            Self::Http(b) => b.fetch_columns(project),
            Self::Snapshot(b) => b.fetch_columns(project),
        }
    }

    fn fetch_tasks(&self, project: &ProjectId) -> Result<Vec<Task>, ApiError> {
        match self {
            Self::Http(b) => b.fetch_tasks(project),
            Self::Snapshot(b) => b.fetch_tasks(project),
        }
    }

    fn move_task(
        &self,
        project: &ProjectId,
        task: &TaskId,
        body: &TaskMove,
    ) -> Result<(), ApiError> {
        match self {
            Self::Http(b) => b.move_task(project, task, body),
            Self::Snapshot(b) => b.move_task(project, task, body),
        }
    }

    fn reorder_columns(&self, project: &ProjectId, items: &[ColumnOrder]) -> Result<(), ApiError> {
        match self {
            Self::Http(b) => b.reorder_columns(project, items),
            Self::Snapshot(b) => b.reorder_columns(project, items),
        }
    }

    fn create_task(&self, project: &ProjectId, new: &NewTask) -> Result<Task, ApiError> {
        match self {
            Self::Http(b) => b.create_task(project, new),
            Self::Snapshot(b) => b.create_task(project, new),
        }
    }

    fn create_column(&self, project: &ProjectId, new: &NewColumn) -> Result<Column, ApiError> {
        match self {
            Self::Http(b) => b.create_column(project, new),
            Self::Snapshot(b) => b.create_column(project, new),
        }
    }
}

/// Everything a command needs: resolved config, output mode, board access.
pub struct Session {
    pub config: EffectiveConfig,
    pub snapshot: Option<std::path::PathBuf>,
}

impl Session {
    /// Connect and load the board.
    ///
    /// With `--snapshot` a project id is optional.
    pub fn connect(&self) -> Result<BoardSync<Backend>> {
        let backend = Backend::select(&self.config, self.snapshot.as_deref())?;
        let project = match (&self.config.project, &self.snapshot) {
            (Some(project), _) => project.clone(),
            (None, Some(_)) => ProjectId::new("local"),
            (None, None) => self.config.require_project()?.clone(),
        };
        Ok(BoardSync::load(backend, project)?)
    }
}
