use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a goal or task.
///
/// Records confirmed by the remote carry a `Server` id. Records created
/// locally and not yet confirmed carry a `Local` id; local ids never leave
/// the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    Server(i64),
    Local(Uuid),
}

impl Id {
    /// Allocate a fresh provisional id.
    pub fn new_local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The canonical server id, if this record has one.
    pub fn server(&self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Local(_) => None,
        }
    }
}

impl From<i64> for Id {
    fn from(id: i64) -> Self {
        Self::Server(id)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(uuid) => write!(f, "local-{}", uuid.simple()),
        }
    }
}

impl FromStr for Id {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix("local-") {
            return Uuid::parse_str(rest)
                .map(Self::Local)
                .map_err(|_| IdParseError(s.to_owned()));
        }
        s.parse::<i64>()
            .map(Self::Server)
            .map_err(|_| IdParseError(s.to_owned()))
    }
}

/// Error returned when parsing an invalid [`Id`] string.
#[derive(Debug, Clone)]
pub struct IdParseError(pub String);

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid id: {:?}", self.0)
    }
}

impl std::error::Error for IdParseError {}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Completion status of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Active,
    Done,
}

impl TaskStatus {
    /// The status a checkbox click moves to.
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Done,
            Self::Done => Self::Active,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "done" => Ok(Self::Done),
            other => Err(TaskStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`TaskStatus`] string.
#[derive(Debug, Clone)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid task status: {:?}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A goal: the top-level container of a task tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Id,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

/// A task: one node of a goal's hierarchy, stored flat.
///
/// The server also sends a nested `subtasks` array; it is ignored because
/// the tree is always derived from the flat collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Id,
    pub goal_id: Id,
    #[serde(default)]
    pub parent_id: Option<Id>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub order_idx: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /goals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGoal {
    pub title: String,
}

/// Body of `POST /goals/{id}/tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial goal fields for `PUT /goals/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl GoalPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
    }

    /// Apply the set fields to a local record.
    pub fn apply_to(&self, goal: &mut Goal) {
        if let Some(title) = &self.title {
            goal.title = title.clone();
        }
    }
}

/// Partial task fields for `PUT /tasks/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_idx: Option<u32>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.order_idx.is_none()
    }

    /// Apply the set fields to a local record.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(order_idx) = self.order_idx {
            task.order_idx = order_idx;
        }
    }
}

/// One entry of a batch reorder.
///
/// `parent_id` is only present for a task that changed sibling group;
/// `Some(None)` serializes as `null` and moves the task to the root group.
/// A remote that ignores the key saves only `order_idx`, so the parent
/// change is lost on the next listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderEntry {
    pub id: i64,
    pub order_idx: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<i64>>,
}

/// Body of `POST /tasks/batch-update`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReorder {
    pub updates: Vec<ReorderEntry>,
}

/// What a generate-plan request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanScope {
    Goal(i64),
    Task(i64),
}
