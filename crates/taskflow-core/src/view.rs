//! Derived, read-only projections of the task list: filtering, sorting and
//! the per-row descriptions handed to the renderer.

use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::task::{Priority, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityFilter {
    /// Every incomplete task.
    #[default]
    All,
    Low,
    Medium,
    High,
    Completed,
}

impl PriorityFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            PriorityFilter::Completed => task.completed,
            PriorityFilter::All => !task.completed,
            PriorityFilter::Low => !task.completed && task.priority == Priority::Low,
            PriorityFilter::Medium => !task.completed && task.priority == Priority::Medium,
            PriorityFilter::High => !task.completed && task.priority == Priority::High,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityFilter::All => "all",
            PriorityFilter::Low => "low",
            PriorityFilter::Medium => "medium",
            PriorityFilter::High => "high",
            PriorityFilter::Completed => "completed",
        }
    }
}

impl fmt::Display for PriorityFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(PriorityFilter::All),
            "low" => Ok(PriorityFilter::Low),
            "medium" => Ok(PriorityFilter::Medium),
            "high" => Ok(PriorityFilter::High),
            "completed" | "done" => Ok(PriorityFilter::Completed),
            other => Err(anyhow!(
                "invalid filter: {other} (expected all, low, medium, high or completed)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Insertion order, oldest first.
    #[default]
    Default,
    Newest,
    Priority,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Default => "default",
            SortOrder::Newest => "newest",
            SortOrder::Priority => "priority",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "oldest" => Ok(SortOrder::Default),
            "newest" => Ok(SortOrder::Newest),
            "priority" => Ok(SortOrder::Priority),
            other => Err(anyhow!(
                "invalid sort order: {other} (expected default, newest or priority)"
            )),
        }
    }
}

/// A task as it appears in the rendered list. `index` is its position in
/// the unfiltered list at the time the view was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView {
    pub index: usize,
    pub id: TaskId,
    pub text: String,
    pub priority: Priority,
    pub completed: bool,
}

pub fn filter_tasks(tasks: &[Task], filter: PriorityFilter) -> Vec<&Task> {
    tasks.iter().filter(|task| filter.matches(task)).collect()
}

/// Reorders a filtered copy. The priority sort is stable, so equal weights
/// keep their filtered order.
pub fn sort_tasks<'a>(tasks: &[&'a Task], order: SortOrder) -> Vec<&'a Task> {
    let mut sorted = tasks.to_vec();
    match order {
        SortOrder::Default => {}
        SortOrder::Newest => sorted.reverse(),
        SortOrder::Priority => sorted.sort_by_key(|task| Reverse(task.priority.weight())),
    }
    sorted
}

#[tracing::instrument(skip(tasks), fields(total = tasks.len()))]
pub fn visible_tasks(tasks: &[Task], filter: PriorityFilter, order: SortOrder) -> Vec<TaskView> {
    let filtered = filter_tasks(tasks, filter);
    sort_tasks(&filtered, order)
        .into_iter()
        .filter_map(|task| {
            let index = tasks.iter().position(|candidate| candidate.id == task.id)?;
            Some(TaskView {
                index,
                id: task.id,
                text: task.text.clone(),
                priority: task.priority,
                completed: task.completed,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Complete,
    Edit,
    Delete,
    Save,
    Cancel,
}

impl RowAction {
    /// Shell command that performs the action.
    pub fn label(self) -> &'static str {
        match self {
            RowAction::Complete => "toggle",
            RowAction::Edit => "edit",
            RowAction::Delete => "delete",
            RowAction::Save => "save",
            RowAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditFields {
    pub text: String,
    pub priority: Priority,
    pub choices: [Priority; 3],
}

/// Declarative description of one list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub index: usize,
    pub id: TaskId,
    pub mode: RowMode,
    pub label: String,
    pub priority: Priority,
    pub completed: bool,
    pub actions: Vec<RowAction>,
    pub edit: Option<EditFields>,
}

pub fn row_for(view: &TaskView, mode: RowMode) -> Row {
    let (actions, edit) = match mode {
        RowMode::Normal => (
            vec![RowAction::Complete, RowAction::Edit, RowAction::Delete],
            None,
        ),
        RowMode::Editing => (
            vec![RowAction::Save, RowAction::Cancel],
            Some(EditFields {
                text: view.text.clone(),
                priority: view.priority,
                choices: Priority::ALL,
            }),
        ),
    };

    Row {
        index: view.index,
        id: view.id,
        mode,
        label: view.text.clone(),
        priority: view.priority,
        completed: view.completed,
        actions,
        edit,
    }
}
