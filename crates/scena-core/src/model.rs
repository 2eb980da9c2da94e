//! Board records as the scena API serves them.
//!
//! `Task` and `Column` mirror the server's JSON (camelCase field names).
//! Derived display data such as a task's level or sort key is never stored
//! here; see [`crate::forest`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw server id.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

string_id!(
    /// Opaque task identifier assigned by the server.
    TaskId
);
string_id!(
    /// Opaque column identifier assigned by the server.
    ColumnId
);
string_id!(
    /// Project whose board is being viewed.
    ProjectId
);

/// One checklist entry on a task card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// A card on the board.
///
/// `order` is the only persisted position signal: it positions the task
/// among the tasks of its column. `parent_id` links tasks into a forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub column_id: ColumnId,
    #[serde(default)]
    pub parent_id: Option<TaskId>,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_hidden_in_gantt: bool,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl Task {
    /// Minimal task with only the positional fields set.
    pub fn new(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        column_id: impl Into<ColumnId>,
        order: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            column_id: column_id.into(),
            parent_id: None,
            order,
            description: None,
            is_hidden_in_gantt: false,
            progress: 0,
            checklist: Vec::new(),
            start_date: None,
            due_date: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<TaskId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    /// Current position of this task on the board.
    #[must_use]
    pub fn placement(&self) -> Placement {
        Placement {
            column: self.column_id.clone(),
            order: self.order,
        }
    }

    /// Number of checklist entries marked done, and the total.
    #[must_use]
    pub fn checklist_progress(&self) -> (usize, usize) {
        let done = self.checklist.iter().filter(|item| item.done).count();
        (done, self.checklist.len())
    }
}

/// A kanban lane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_color: Option<String>,
}

impl Column {
    pub fn new(id: impl Into<ColumnId>, name: impl Into<String>, order: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order,
            color: None,
            card_color: None,
        }
    }
}

/// Where a task sits: its column and its order within that column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub column: ColumnId,
    pub order: i64,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.column, self.order)
    }
}

/// Body of `PUT /projects/{id}/tasks/{taskId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMove {
    pub column_id: ColumnId,
    pub order: i64,
}

impl From<&Placement> for TaskMove {
    fn from(placement: &Placement) -> Self {
        Self {
            column_id: placement.column.clone(),
            order: placement.order,
        }
    }
}

/// One entry of a column reorder request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOrder {
    pub id: ColumnId,
    pub order: i64,
}

/// Body of `PUT /projects/{id}/columns/reorder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReorder {
    pub items: Vec<ColumnOrder>,
}

/// Body of `POST /projects/{id}/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub column_id: ColumnId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub order: i64,
}

/// Body of `POST /projects/{id}/columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewColumn {
    pub name: String,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}
