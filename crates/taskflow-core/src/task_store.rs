use chrono::Utc;
use tracing::{debug, info};

use crate::kvstore::Storage;
use crate::task::{Priority, Task, TaskId};
use crate::validation::{MAX_TASK_LENGTH, truncate_chars};

/// Owns the ordered task list and writes the whole list back after every
/// mutation.
#[derive(Debug)]
pub struct TaskStore {
    storage: Storage,
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            tasks: Vec::new(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn init(&mut self) {
        let loaded = self.storage.load_tasks();
        self.tasks = loaded.tasks;
        if loaded.backfilled {
            info!("persisting ids assigned to stored tasks");
            self.save();
        }
        info!(count = self.tasks.len(), "task store initialized");
    }

    /// Drops the in-memory list without touching storage.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    fn save(&self) {
        self.storage.set_tasks(&self.tasks);
    }

    #[tracing::instrument(skip(self, text))]
    pub fn add(&mut self, text: &str, priority: Priority) -> TaskId {
        let task = Task::new(text.trim().to_string(), priority, Utc::now());
        let id = task.id;
        self.tasks.push(task);
        self.save();
        debug!(%id, count = self.tasks.len(), "task added");
        id
    }

    #[tracing::instrument(skip(self, text))]
    pub fn update(&mut self, index: usize, text: &str, priority: Priority) -> bool {
        let Some(task) = self.tasks.get_mut(index) else {
            debug!("update ignored, index out of bounds");
            return false;
        };
        task.text = truncate_chars(text, MAX_TASK_LENGTH);
        task.priority = priority;
        self.save();
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, index: usize) -> bool {
        let Some(task) = self.tasks.get_mut(index) else {
            debug!("toggle ignored, index out of bounds");
            return false;
        };
        task.completed = !task.completed;
        debug!(completed = task.completed, "task toggled");
        self.save();
        true
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, index: usize) -> Option<Task> {
        if index >= self.tasks.len() {
            debug!("delete ignored, index out of bounds");
            return None;
        }
        let removed = self.tasks.remove(index);
        self.save();
        debug!(id = %removed.id, remaining = self.tasks.len(), "task deleted");
        Some(removed)
    }

    pub fn update_by_id(&mut self, id: TaskId, text: &str, priority: Priority) -> bool {
        self.position(id)
            .is_some_and(|index| self.update(index, text, priority))
    }

    pub fn toggle_by_id(&mut self, id: TaskId) -> bool {
        self.position(id).is_some_and(|index| self.toggle(index))
    }

    pub fn delete_by_id(&mut self, id: TaskId) -> Option<Task> {
        self.position(id).and_then(|index| self.delete(index))
    }
}
