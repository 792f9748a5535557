//! The host task queue behind `task.spawn`.
//!
//! Spawning only queues the function. Queued tasks run in FIFO order when
//! the executor drives the queue after an async entry point returns.

use std::collections::VecDeque;

use wasmi::Func;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskStatus {
    Pending,
    /// Finished, with the pointer of its result cell.
    Done(i32),
}

#[derive(Debug)]
struct Task {
    function: Func,
    status: TaskStatus,
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: Vec<Task>,
    pending: VecDeque<u32>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `function` and return the new task's id.
    pub fn spawn(&mut self, function: Func) -> u32 {
        let id = self.tasks.len() as u32;
        self.tasks.push(Task {
            function,
            status: TaskStatus::Pending,
        });
        self.pending.push_back(id);
        id
    }

    pub fn exists(&self, id: u32) -> bool {
        (id as usize) < self.tasks.len()
    }

    pub fn is_done(&self, id: u32) -> bool {
        self.result(id).is_some()
    }

    pub fn result(&self, id: u32) -> Option<i32> {
        match self.tasks.get(id as usize)?.status {
            TaskStatus::Done(ptr) => Some(ptr),
            TaskStatus::Pending => None,
        }
    }

    /// Take the next task to run.
    pub fn next(&mut self) -> Option<(u32, Func)> {
        let id = self.pending.pop_front()?;
        let function = self.tasks.get(id as usize)?.function;
        Some((id, function))
    }

    pub fn complete(&mut self, id: u32, result: i32) {
        if let Some(task) = self.tasks.get_mut(id as usize) {
            task.status = TaskStatus::Done(result);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
