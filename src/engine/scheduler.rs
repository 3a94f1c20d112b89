// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deferred-task scheduling for single-threaded cooperative streams.
//!
//! Streams never block and never call a completion that carries
//! backpressure implications inline: anything that "might not be immediate"
//! is handed to a [`Scheduler`] and runs later, in FIFO order, on the same
//! thread.
//!
//! Two implementations are provided:
//! * [`TaskQueue`] - an explicit queue the owner drains by hand. Tests use it
//!   to single-step a pipeline deterministically.
//! * [`TokioScheduler`] - hands each task to `tokio::task::spawn_local`, so
//!   streams run inside a tokio `LocalSet`.
//!
//! # Examples
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use the_sluice::engine::{Scheduler, TaskQueue};
//!
//! let queue = TaskQueue::new();
//! let ran = Rc::new(Cell::new(false));
//! let flag = Rc::clone(&ran);
//! queue.defer(Box::new(move || flag.set(true)));
//!
//! assert!(!ran.get());
//! queue.run_until_idle();
//! assert!(ran.get());
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Deferred-invocation primitive injected into every stream.
pub trait Scheduler {
    /// Run `task` later, after the current call stack unwinds.
    fn defer(&self, task: Task);
}

/// Upper bound on tasks drained by one `run_until_idle` call.
///
/// A pipeline that keeps rescheduling itself forever is a bug in a producer
/// or transform step; the bound turns that into a visible stop.
pub const MAX_TASKS_PER_RUN: usize = 1_000_000;

/// Deterministic FIFO task queue drained explicitly by its owner.
#[derive(Default)]
pub struct TaskQueue {
    tasks: RefCell<VecDeque<Task>>,
}

impl TaskQueue {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run the oldest pending task. Returns false when the queue was empty.
    pub fn step(&self) -> bool {
        // Pop before running so the task can defer more work.
        let task = self.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks, including ones deferred while draining, until the queue is
    /// empty. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while ran < MAX_TASKS_PER_RUN && self.step() {
            ran += 1;
        }
        if ran == MAX_TASKS_PER_RUN && self.pending() > 0 {
            tracing::warn!(
                pending = self.pending(),
                "task queue still busy after {} tasks; stopping",
                MAX_TASKS_PER_RUN
            );
        }
        ran
    }
}

impl Scheduler for TaskQueue {
    fn defer(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/// Scheduler backed by the current tokio `LocalSet`.
///
/// Deferring a task outside a `LocalSet` panics inside tokio, so every
/// stream using this scheduler must be driven from `LocalSet::run_until` or
/// a task spawned onto one.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl TokioScheduler {
    pub fn new() -> Rc<Self> {
        Rc::new(TokioScheduler)
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        tokio::task::spawn_local(async move { task() });
    }
}
