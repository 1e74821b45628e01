//! Deferred Task Scheduling
//!
//! Cancellable tasks keyed on the runtime clock. The owner polls with the
//! current runtime time and receives every task that has come due, so teardown
//! never races a wall-clock timer against a graph that is already gone.

/// Handle of a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug)]
struct ScheduledTask<T> {
    id: TaskId,
    due: f64,
    task: T,
}

/// Time-ordered set of pending tasks
#[derive(Debug)]
pub struct TaskScheduler<T> {
    next_id: u64,
    tasks: Vec<ScheduledTask<T>>,
}

impl<T> TaskScheduler<T> {
    /// Create an empty scheduler
    pub fn new() -> Self {
        TaskScheduler {
            next_id: 0,
            tasks: Vec::new(),
        }
    }

    /// Queue `task` to come due at runtime time `due`
    pub fn schedule(&mut self, due: f64, task: T) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        // Keep the queue sorted by due time; equal times stay in insertion order
        let index = self.tasks.partition_point(|t| t.due <= due);
        self.tasks.insert(index, ScheduledTask { id, due, task });
        id
    }

    /// Remove a pending task, returning it if it had not fired yet
    pub fn cancel(&mut self, id: TaskId) -> Option<T> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index).task)
    }

    /// Remove and return every task due at or before `now`, earliest first
    pub fn take_due(&mut self, now: f64) -> Vec<T> {
        let split = self.tasks.partition_point(|t| t.due <= now);
        self.tasks.drain(..split).map(|t| t.task).collect()
    }

    /// Remove and return every pending task regardless of due time
    pub fn drain_all(&mut self) -> Vec<T> {
        self.tasks.drain(..).map(|t| t.task).collect()
    }

    /// Due time of the earliest pending task
    pub fn next_due(&self) -> Option<f64> {
        self.tasks.first().map(|t| t.due)
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl<T> Default for TaskScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
