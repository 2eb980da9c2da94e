//! scena-core: board ordering, hierarchy and sync.
//!
//! Tasks live in columns and may have a parent. [`forest`] turns the flat
//! task list into the two views the board shows (per-column Kanban trees and
//! the global Gantt tree), [`drag`] drives drag-and-drop over a [`replica`]
//! of server state, and [`sync`] persists finished gestures through an
//! [`api::BoardApi`].
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums, each mapping to an
//!   [`error::ErrorCode`]; `anyhow::Result` only for configuration loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod api;
pub mod config;
pub mod drag;
pub mod error;
pub mod forest;
pub mod model;
pub mod replica;
pub mod sync;

pub use api::{ApiError, BoardApi, MemoryBoard};
pub use drag::{DragItem, DragSession, DropTarget};
pub use forest::{Forest, gantt_rows, project_by_column, project_global};
pub use model::{Column, ColumnId, Placement, ProjectId, Task, TaskId};
pub use replica::Replica;
pub use sync::{BoardSync, Created, DropResult, SyncError};
