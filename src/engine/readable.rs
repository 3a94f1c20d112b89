// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Demand-driven pull engine.
//!
//! A [`Readable`] serves `read` calls from its buffer and keeps the buffer
//! topped up by pulling from its [`Source`]:
//!
//! - A read that asks for more than is buffered while the buffer sits below
//!   the low-water mark (and the source has not ended) is deferred: it
//!   returns `None`, consumes nothing and marks the consumer as waiting.
//!   Otherwise the read is satisfied with at most what is buffered.
//! - Whenever the buffer ends up below the low-water mark, one pull of
//!   `buffer_size` units is issued. There is never more than one pull in
//!   flight per stream.
//! - Pull replies that keep the buffer below the low-water mark chain the
//!   next pull; a waiting consumer gets exactly one [`Event::Readable`].
//! - End-of-data is raised once, after the buffer has fully drained.
//!
//! Replies that arrive inside the `pull` call itself are turned around on the
//! scheduler so the consumer is never re-entered from its own `read`.
//!
//! # Examples
//!
//! ```rust
//! use the_sluice::config::StreamOptions;
//! use the_sluice::engine::{Readable, TaskQueue};
//! use the_sluice::traits::IterSource;
//!
//! let queue = TaskQueue::new();
//! let source = IterSource::new(vec![b"hello ".to_vec(), b"world".to_vec()]);
//! let stream = Readable::new(source, StreamOptions::default(), queue.clone());
//!
//! // The first read finds nothing buffered and kicks off prefetching.
//! assert_eq!(stream.read(None), None);
//! queue.run_until_idle();
//! assert_eq!(stream.read(None), Some(b"hello world".to_vec()));
//! ```

use crate::config::StreamOptions;
use crate::engine::buffer_state::BufferState;
use crate::engine::events::{Emitter, Event, EventKind, ListenerId, StreamId};
use crate::engine::pipe::FlowState;
use crate::engine::scheduler::Scheduler;
use crate::errors::StreamError;
use crate::observability::messages::readable::{
    ChunkBuffered, PullIssued, ReadDeferred, SourceExhausted, StreamEnded, StreamFailed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Chunk, Pulled, Sink, Source};
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// Everything a stream mutates, owned by the stream alone.
pub(crate) struct ReadableState<C: Chunk> {
    pub(crate) buffer: BufferState<C>,
    pub(crate) flow: FlowState<C>,
}

pub(crate) struct ReadableInner<C: Chunk> {
    id: StreamId,
    options: StreamOptions,
    pub(crate) state: RefCell<ReadableState<C>>,
    source: Box<dyn Source<C>>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    pub(crate) events: Emitter<C>,
}

/// Outcome of appending a chunk pushed in from outside the pull path.
pub(crate) struct Enqueued {
    pub(crate) consumer_waiting: bool,
    pub(crate) buffered: usize,
}

/// Handle to a pull-based stream. Clones share the same stream.
pub struct Readable<C: Chunk> {
    pub(crate) inner: Rc<ReadableInner<C>>,
}

impl<C: Chunk> Clone for Readable<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: Chunk> Readable<C> {
    pub fn new(
        source: impl Source<C> + 'static,
        options: StreamOptions,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Rc::new(ReadableInner {
                id: StreamId::next(),
                options,
                state: RefCell::new(ReadableState {
                    buffer: BufferState::new(options),
                    flow: FlowState::new(),
                }),
                source: Box::new(source),
                scheduler,
                events: Emitter::new(),
            }),
        }
    }

    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    pub fn options(&self) -> StreamOptions {
        self.inner.options
    }

    /// Raw access to the stream's observer registry.
    ///
    /// Registering a [`EventKind::Data`] listener here does not switch the
    /// stream to push mode; use [`Readable::on`] for that.
    pub fn events(&self) -> &Emitter<C> {
        &self.inner.events
    }

    /// Register a listener. A `Data` listener registered while the stream
    /// is not flowing switches it to push mode (see [`Readable::on_data`]).
    pub fn on(&self, kind: EventKind, listener: impl Fn(&Event<C>) + 'static) -> ListenerId {
        if kind == EventKind::Data {
            return self.on_data(listener);
        }
        self.inner.events.on(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn buffered_size(&self) -> usize {
        self.state().buffer.total_size()
    }

    pub fn is_ended(&self) -> bool {
        self.state().buffer.is_ended()
    }

    pub fn is_pulling(&self) -> bool {
        self.state().buffer.pulling
    }

    pub fn is_errored(&self) -> bool {
        self.state().buffer.is_errored()
    }

    /// Whether a consumer is waiting for an availability notification.
    pub fn is_consumer_waiting(&self) -> bool {
        self.state().buffer.need_notify
    }

    /// Read up to `n` units. `None` or `Some(0)` means "everything buffered
    /// now". Returns `None` when nothing is handed over: the stream is
    /// empty, ended, errored, or the read was deferred until more data
    /// arrives.
    pub fn read(&self, n: Option<usize>) -> Option<C> {
        let (chunk, pull, drained_at_end) = {
            let mut state = self.inner.state.borrow_mut();
            let buffer = &mut state.buffer;

            if buffer.is_errored() {
                return None;
            }
            if buffer.is_empty() && buffer.is_ended() {
                drop(state);
                self.end_readable();
                return None;
            }

            let total = buffer.total_size();
            let mut n = match n {
                Some(n) if n > 0 => n,
                _ => total,
            };
            if n > total {
                // Short of the request: wait for more unless the producer is
                // done or the buffer is already at the watermark.
                if !buffer.is_ended() && buffer.is_below_low_water_mark() {
                    ReadDeferred {
                        stream: self.inner.id,
                        requested: n,
                        buffered: total,
                    }
                    .log();
                    n = 0;
                } else {
                    n = total;
                }
            }

            let chunk = buffer.take(n);
            if chunk.is_none() {
                buffer.need_notify = true;
            }

            let pull = !buffer.is_ended() && buffer.is_below_low_water_mark() && !buffer.pulling;
            if pull {
                buffer.pulling = true;
            }
            (chunk, pull, buffer.is_empty() && buffer.is_ended())
        };

        if pull {
            self.start_pull();
        }
        if drained_at_end {
            self.end_readable();
        }
        chunk
    }

    pub(crate) fn state(&self) -> Ref<'_, ReadableState<C>> {
        self.inner.state.borrow()
    }

    fn start_pull(&self) {
        let (size, buffered) = {
            let state = self.state();
            (state.buffer.buffer_size, state.buffer.total_size())
        };
        let msg = PullIssued {
            stream: self.inner.id,
            size,
            buffered,
        };
        msg.log();
        let _span = msg.span("start_pull").entered();

        let in_pull_call = Rc::new(Cell::new(true));
        let sync = Rc::clone(&in_pull_call);
        let stream = self.clone();
        self.inner.source.pull(
            size,
            Box::new(move |result| stream.on_pulled(result, sync.get())),
        );
        in_pull_call.set(false);
    }

    /// Issue the next pull of a prefetch chain on the scheduler. `pulling`
    /// is already set, so no other pull can start in between.
    fn defer_pull(&self) {
        let stream = self.clone();
        self.inner.scheduler.defer(Box::new(move || stream.start_pull()));
    }

    fn on_pulled(&self, result: Result<Pulled<C>, StreamError>, sync: bool) {
        let mut state = self.inner.state.borrow_mut();
        state.buffer.pulling = false;
        if state.buffer.is_errored() {
            return;
        }

        match result {
            Err(error) => {
                drop(state);
                self.fail(error);
            }
            Ok(Pulled::Idle) => {}
            Ok(Pulled::End) => {
                drop(state);
                self.on_source_end(sync);
            }
            Ok(Pulled::Chunk(chunk)) if chunk.size() == 0 => {
                drop(state);
                self.on_source_end(sync);
            }
            Ok(Pulled::Chunk(chunk)) => {
                let buffer = &mut state.buffer;
                if buffer.is_ended() {
                    tracing::debug!(stream = %self.inner.id, "dropping chunk pulled after end of data");
                    return;
                }
                let size = chunk.size();
                buffer.push(chunk);
                ChunkBuffered {
                    stream: self.inner.id,
                    size,
                    buffered: buffer.total_size(),
                }
                .log();

                let again = buffer.is_below_low_water_mark();
                if again {
                    buffer.pulling = true;
                }
                let notify = std::mem::take(&mut buffer.need_notify);
                drop(state);

                if again {
                    if sync {
                        self.defer_pull();
                    } else {
                        self.start_pull();
                    }
                }
                if notify {
                    if sync {
                        self.schedule_readable();
                    } else {
                        self.emit_readable();
                    }
                }
            }
        }
    }

    /// The producer will never deliver again: latch `ended`, then either let
    /// the consumer drain the remainder or raise end-of-data.
    pub(crate) fn on_source_end(&self, sync: bool) {
        let buffered = {
            let mut state = self.inner.state.borrow_mut();
            state.buffer.mark_ended();
            state.buffer.total_size()
        };
        SourceExhausted {
            stream: self.inner.id,
            buffered,
        }
        .log();

        if buffered > 0 {
            if sync {
                self.schedule_readable();
            } else {
                self.emit_readable();
            }
        } else {
            self.end_readable();
        }
    }

    /// Append a chunk that arrived from outside the pull path (transform
    /// output, foreign source). Clears and reports the waiting flag.
    pub(crate) fn enqueue(&self, chunk: C) -> Enqueued {
        let mut state = self.inner.state.borrow_mut();
        let buffer = &mut state.buffer;
        if buffer.is_ended() || buffer.is_errored() {
            tracing::debug!(stream = %self.inner.id, "dropping chunk pushed after end of data");
            return Enqueued {
                consumer_waiting: false,
                buffered: buffer.total_size(),
            };
        }
        let size = chunk.size();
        let queued = buffer.push(chunk);
        if queued {
            ChunkBuffered {
                stream: self.inner.id,
                size,
                buffered: buffer.total_size(),
            }
            .log();
        }
        let consumer_waiting = queued && std::mem::take(&mut buffer.need_notify);
        Enqueued {
            consumer_waiting,
            buffered: buffer.total_size(),
        }
    }

    /// Mark the output of a push-fed stream complete. Remaining data is
    /// announced so it can be drained; an empty stream ends right away.
    pub(crate) fn finish_output(&self) {
        let buffered = {
            let mut state = self.inner.state.borrow_mut();
            state.buffer.mark_ended();
            state.buffer.total_size()
        };
        if buffered > 0 {
            self.emit_readable();
        } else if self.inner.state.borrow_mut().buffer.claim_end_notification() {
            self.emit_end();
        }
    }

    /// Deliver an availability notification now.
    pub(crate) fn emit_readable(&self) {
        let (resume_flow, push_mode) = {
            let mut state = self.inner.state.borrow_mut();
            state.buffer.need_notify = false;
            let armed = std::mem::take(&mut state.flow.flow_armed);
            (armed, state.flow.push.is_some())
        };
        if resume_flow {
            self.flow();
        }
        if push_mode {
            self.drain_push_mode();
        }
        self.inner.events.emit(&Event::Readable);
    }

    pub(crate) fn schedule_readable(&self) {
        let stream = self.clone();
        self.inner
            .scheduler
            .defer(Box::new(move || stream.emit_readable()));
    }

    /// Raise end-of-data on the scheduler, at most once per stream.
    pub(crate) fn end_readable(&self) {
        if !self.inner.state.borrow_mut().buffer.claim_end_notification() {
            return;
        }
        let stream = self.clone();
        self.inner.scheduler.defer(Box::new(move || stream.emit_end()));
    }

    fn emit_end(&self) {
        let sinks: Vec<Rc<dyn Sink<C>>> = self
            .state()
            .flow
            .pipes
            .iter()
            .filter(|entry| entry.end)
            .map(|entry| Rc::clone(&entry.sink))
            .collect();
        StreamEnded {
            stream: self.inner.id,
            sinks_ended: sinks.len(),
        }
        .log();

        for sink in sinks {
            sink.end();
        }
        self.inner.events.emit(&Event::End);
    }

    /// Halt the stream and raise `error`. Later failures are dropped.
    pub(crate) fn fail(&self, error: StreamError) {
        {
            let mut state = self.inner.state.borrow_mut();
            if state.buffer.is_errored() {
                return;
            }
            state.buffer.mark_errored();
        }
        StreamFailed {
            stream: self.inner.id,
            error: &error,
        }
        .log();
        self.inner.events.emit(&Event::Error(error));
    }
}

impl<C: Chunk> fmt::Debug for Readable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Readable")
            .field("id", &self.inner.id)
            .field("buffered", &state.buffer.total_size())
            .field("ended", &state.buffer.is_ended())
            .field("pulling", &state.buffer.pulling)
            .field("flowing", &state.flow.flowing)
            .field("sinks", &state.flow.pipes.len())
            .finish()
    }
}
