use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Starting,
    Downloading,
    Downloaded,
    Processing,
    Completed,
    Error,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Error)
    }
}

#[derive(Clone)]
pub struct Task {
    pub id: Uuid,
    pub source_url: String,
    pub clip_duration: f64,
    pub status: Status,
    pub progress: u8,
    pub message: String,
    pub clips: Vec<String>,
    pub completed_at: Option<Instant>,
}

/// All task state lives here. The processor thread is the only writer for a
/// given task; the web handlers read cloned snapshots, so a poll sees either
/// the state before an update or after it, never a mix.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<Mutex<HashMap<Uuid, Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, source_url: String, clip_duration: f64) -> Uuid {
        let id = Uuid::new_v4();
        let task = Task {
            id,
            source_url,
            clip_duration,
            status: Status::Starting,
            progress: 0,
            message: "Initialising...".to_owned(),
            clips: vec![],
            completed_at: None,
        };

        self.tasks.lock().unwrap().insert(id, task);

        id
    }

    pub fn get(&self, id: Uuid) -> Option<Task> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    pub fn update(&self, id: Uuid, status: Status, progress: u8, message: String) {
        let mut tasks = self.tasks.lock().unwrap();

        if let Some(task) = tasks.get_mut(&id) {
            if status.is_terminal() {
                task.completed_at = Some(Instant::now());
            }

            task.status = status;
            task.progress = progress;
            task.message = message;
        }
    }

    pub fn push_clip(&self, id: Uuid, name: String) {
        let mut tasks = self.tasks.lock().unwrap();

        if let Some(task) = tasks.get_mut(&id) {
            task.clips.push(name);
        }
    }

    /// Drops terminal tasks older than `max_age` and returns their ids so
    /// the caller can remove whatever they left on disk.
    pub fn remove_expired(&self, max_age: Duration) -> Vec<Uuid> {
        let mut tasks = self.tasks.lock().unwrap();

        let expired: Vec<Uuid> = tasks
            .values()
            .filter(|task| matches!(task.completed_at, Some(at) if at.elapsed() > max_age))
            .map(|task| task.id)
            .collect();

        for id in &expired {
            tasks.remove(id);
        }

        expired
    }
}

pub fn task_dir(id: Uuid) -> PathBuf {
    PathBuf::from(id.to_string())
}

pub fn clip_name(index: usize) -> String {
    format!("clip_{:03}.mp4", index + 1)
}
