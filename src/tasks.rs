use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{ImageGenerationResponse, Task, TaskStatus};

/// Concurrent task table and sole owner of task lifecycle state.
///
/// Callers always receive clones; every transition goes through one of the
/// methods below. Completed and Failed are terminal: once a task reaches
/// either, further transition calls are no-ops. Reads take a shared lock so
/// pollers of different tasks do not serialize against each other.
pub struct TaskManager {
    tasks: RwLock<HashMap<String, Task>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new Pending task for the given prompt.
    pub fn create(&self, prompt: &str) -> Task {
        let now = Utc::now();
        let task = Task {
            id: generate_task_id(),
            status: TaskStatus::Pending,
            prompt: prompt.to_string(),
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        self.tasks
            .write()
            .unwrap()
            .insert(task.id.clone(), task.clone());
        task
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        self.tasks.read().unwrap().get(id).cloned()
    }

    /// Pending → Processing. Unknown ids and terminal tasks are left alone.
    pub fn mark_processing(&self, id: &str) {
        let mut tasks = self.tasks.write().unwrap();
        if let Some(task) = tasks.get_mut(id) {
            if task.status.is_terminal() {
                return;
            }
            task.status = TaskStatus::Processing;
            task.updated_at = Utc::now();
        }
    }

    /// Record the successful outcome. The result is written under the same
    /// lock that flips the status, so a poller that observes Completed also
    /// observes the result.
    pub fn complete(&self, id: &str, result: ImageGenerationResponse) {
        let mut tasks = self.tasks.write().unwrap();
        if let Some(task) = tasks.get_mut(id) {
            if task.status.is_terminal() {
                return;
            }
            task.status = TaskStatus::Completed;
            task.result = Some(result);
            task.error = None;
            task.updated_at = Utc::now();
        }
    }

    /// Record the failed outcome.
    pub fn fail(&self, id: &str, message: &str) {
        let mut tasks = self.tasks.write().unwrap();
        if let Some(task) = tasks.get_mut(id) {
            if task.status.is_terminal() {
                return;
            }
            task.status = TaskStatus::Failed;
            task.error = Some(message.to_string());
            task.result = None;
            task.updated_at = Utc::now();
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_task_id() -> String {
    format!("task_{}", Uuid::new_v4().simple())
}
