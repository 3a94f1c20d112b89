// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Push-side buffering engine.
//!
//! A [`Writable`] queues written chunks and hands them one at a time to its
//! [`WriteTarget`]. `write` answers `false` once `high_water_mark` units are
//! queued; [`Event::Drain`] follows when the queue has worked itself down to
//! `low_water_mark`. After `end`, [`Event::Finish`] is raised once the last
//! queued chunk has been written.

use crate::config::WritableOptions;
use crate::engine::events::{Emitter, Event, StreamId};
use crate::engine::scheduler::Scheduler;
use crate::errors::StreamError;
use crate::observability::messages::transform::{WritableFinished, WriteRejected};
use crate::observability::messages::StructuredLog;
use crate::traits::{Chunk, Sink};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

/// Completion of one chunk write. Invoke exactly once.
pub type WriteCallback = Box<dyn FnOnce(Result<(), StreamError>)>;

/// Where a [`Writable`] puts its chunks.
pub trait WriteTarget<C> {
    /// Consume `chunk` and call `done` when finished, inline or later.
    /// The next chunk is not handed over before `done` has been called.
    fn write_chunk(&self, chunk: C, done: WriteCallback);
}

struct WritableState<C> {
    queue: VecDeque<C>,
    /// Units written but not completed yet, including the chunk in flight.
    queued_size: usize,
    writing: bool,
    need_drain: bool,
    ending: bool,
    ended: bool,
    finished: bool,
    errored: bool,
}

pub(crate) struct WritableInner<C> {
    id: StreamId,
    options: WritableOptions,
    state: RefCell<WritableState<C>>,
    target: Box<dyn WriteTarget<C>>,
    scheduler: Rc<dyn Scheduler>,
    events: Emitter<C>,
}

/// Handle to a push-side stream. Clones share the same stream.
pub struct Writable<C: Chunk> {
    inner: Rc<WritableInner<C>>,
}

impl<C: Chunk> Clone for Writable<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Writable`].
pub(crate) struct WeakWritable<C>(Weak<WritableInner<C>>);

impl<C: Chunk> WeakWritable<C> {
    pub(crate) fn upgrade(&self) -> Option<Writable<C>> {
        self.0.upgrade().map(|inner| Writable { inner })
    }
}

impl<C: Chunk> Writable<C> {
    pub fn new(
        target: impl WriteTarget<C> + 'static,
        options: WritableOptions,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Rc::new(WritableInner {
                id: StreamId::next(),
                options,
                state: RefCell::new(WritableState {
                    queue: VecDeque::new(),
                    queued_size: 0,
                    writing: false,
                    need_drain: false,
                    ending: false,
                    ended: false,
                    finished: false,
                    errored: false,
                }),
                target: Box::new(target),
                scheduler,
                events: Emitter::new(),
            }),
        }
    }

    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    pub fn options(&self) -> WritableOptions {
        self.inner.options
    }

    pub fn events(&self) -> &Emitter<C> {
        &self.inner.events
    }

    /// Queue `chunk` for writing. Returns false when the caller should hold
    /// off until [`Event::Drain`]. Writing after `end` raises
    /// [`StreamError::WriteAfterEnd`] and drops the chunk.
    pub fn write(&self, chunk: C) -> bool {
        let (accepted, start) = {
            let mut state = self.inner.state.borrow_mut();
            if state.ending {
                drop(state);
                self.reject(StreamError::WriteAfterEnd);
                return false;
            }
            if state.errored {
                return false;
            }

            state.queued_size += chunk.size();
            state.queue.push_back(chunk);
            let accepted = state.queued_size < self.inner.options.high_water_mark;
            if !accepted {
                state.need_drain = true;
            }
            (accepted, !state.writing)
        };

        if start {
            self.write_next();
        }
        accepted
    }

    /// Signal that nothing more will be written. `Finish` follows once the
    /// queue is empty.
    pub fn end(&self) {
        let finish = {
            let mut state = self.inner.state.borrow_mut();
            if state.ending {
                return;
            }
            state.ending = true;
            state.ended = true;
            let finish = !state.writing && state.queue.is_empty() && !state.errored;
            if finish {
                state.finished = true;
            }
            finish
        };
        if finish {
            self.emit_finish();
        }
    }

    /// `end` has been called; no more writes are accepted.
    pub fn is_ending(&self) -> bool {
        self.inner.state.borrow().ending
    }

    pub fn is_ended(&self) -> bool {
        self.inner.state.borrow().ended
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.borrow().finished
    }

    pub fn is_errored(&self) -> bool {
        self.inner.state.borrow().errored
    }

    pub fn queued_size(&self) -> usize {
        self.inner.state.borrow().queued_size
    }

    pub(crate) fn downgrade(&self) -> WeakWritable<C> {
        WeakWritable(Rc::downgrade(&self.inner))
    }

    /// Halt the stream and raise `error`. Later failures are dropped.
    pub(crate) fn fail(&self, error: StreamError) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.errored {
                return;
            }
            state.errored = true;
            state.queue.clear();
        }
        self.inner.events.emit(&Event::Error(error));
    }

    fn reject(&self, error: StreamError) {
        WriteRejected {
            stream: self.inner.id,
            error: &error,
        }
        .log();
        self.inner.events.emit(&Event::Error(error));
    }

    fn write_next(&self) {
        let chunk = {
            let mut state = self.inner.state.borrow_mut();
            if state.writing || state.errored {
                return;
            }
            let Some(chunk) = state.queue.pop_front() else {
                return;
            };
            state.writing = true;
            chunk
        };
        let size = chunk.size();

        let in_write_call = Rc::new(Cell::new(true));
        let sync = Rc::clone(&in_write_call);
        let writable = self.clone();
        self.inner.target.write_chunk(
            chunk,
            Box::new(move |result| {
                if sync.get() {
                    let scheduler = Rc::clone(&writable.inner.scheduler);
                    scheduler.defer(Box::new(move || writable.on_written(size, result)));
                } else {
                    writable.on_written(size, result);
                }
            }),
        );
        in_write_call.set(false);
    }

    fn on_written(&self, size: usize, result: Result<(), StreamError>) {
        if let Err(error) = result {
            self.inner.state.borrow_mut().writing = false;
            self.fail(error);
            return;
        }

        let (drain, more, finish) = {
            let mut state = self.inner.state.borrow_mut();
            state.writing = false;
            state.queued_size -= size;
            if state.errored {
                return;
            }

            let drain = state.need_drain && state.queued_size <= self.inner.options.low_water_mark;
            if drain {
                state.need_drain = false;
            }
            let more = !state.queue.is_empty();
            let finish = !more && state.ending && !state.finished;
            if finish {
                state.finished = true;
            }
            (drain, more, finish)
        };

        if drain {
            self.inner.events.emit(&Event::Drain);
        }
        if more {
            self.write_next();
        } else if finish {
            self.emit_finish();
        }
    }

    fn emit_finish(&self) {
        WritableFinished {
            stream: self.inner.id,
        }
        .log();
        self.inner.events.emit(&Event::Finish);
    }
}

impl<C: Chunk> Sink<C> for Writable<C> {
    fn write(&self, chunk: C) -> bool {
        Writable::write(self, chunk)
    }

    fn end(&self) {
        Writable::end(self)
    }

    fn events(&self) -> &Emitter<C> {
        Writable::events(self)
    }
}

impl<C: Chunk> fmt::Debug for Writable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Writable")
            .field("id", &self.inner.id)
            .field("queued_size", &state.queued_size)
            .field("writing", &state.writing)
            .field("ending", &state.ending)
            .field("finished", &state.finished)
            .finish()
    }
}
