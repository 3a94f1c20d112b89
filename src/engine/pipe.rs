// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Fan-out piping with backpressure.
//!
//! The flow loop reads from the stream and hands every chunk to each
//! registered sink, in registration order, before reading the next one.
//! A sink that answers `false` to `write` holds the loop until it raises
//! [`Event::Drain`]; with several backpressured sinks the loop resumes only
//! after the last of them has drained. When a read comes back empty the loop
//! parks until the stream's next availability notification.

use crate::config::PipeOptions;
use crate::engine::events::{Event, EventKind, ListenerId};
use crate::engine::push_mode::PushState;
use crate::engine::readable::Readable;
use crate::observability::messages::pipe::{
    BackpressureEngaged, BackpressureReleased, FlowStarted, SinkPiped, SinkUnpiped,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Chunk, Sink};
use std::rc::Rc;

/// Identity of a sink, independent of how the caller holds it.
type SinkKey = *const ();

fn sink_key<C: Chunk>(sink: &dyn Sink<C>) -> SinkKey {
    std::ptr::from_ref(sink).cast()
}

pub(crate) struct PipeEntry<C: Chunk> {
    key: SinkKey,
    pub(crate) sink: Rc<dyn Sink<C>>,
    pub(crate) end: bool,
    drain_listener: ListenerId,
    awaiting_release: bool,
}

/// Pipe set and mode flags of one stream.
pub(crate) struct FlowState<C: Chunk> {
    pub(crate) pipes: Vec<PipeEntry<C>>,
    /// Committed to auto-draining, either through pipes or push mode.
    pub(crate) flowing: bool,
    /// Sinks that signalled backpressure and have not drained yet.
    awaiting_release: usize,
    /// The flow loop found the buffer empty and waits for `Readable`.
    pub(crate) flow_armed: bool,
    in_flow: bool,
    chunk_size: Option<usize>,
    pub(crate) push: Option<PushState>,
}

impl<C: Chunk> FlowState<C> {
    pub(crate) fn new() -> Self {
        Self {
            pipes: Vec::new(),
            flowing: false,
            awaiting_release: 0,
            flow_armed: false,
            in_flow: false,
            chunk_size: None,
            push: None,
        }
    }
}

impl<C: Chunk> Readable<C> {
    /// Register `sink` and start forwarding data to it.
    ///
    /// The flow loop is started on the scheduler, never inline, so the
    /// caller can finish wiring up before the first chunk moves. Returns
    /// `sink` so stages can be chained.
    ///
    /// The `chunk_size` of the pipe that starts the flow loop applies to
    /// every read the loop issues. Piping a sink that is already piped
    /// changes nothing.
    pub fn pipe<S: Sink<C> + 'static>(&self, sink: Rc<S>, options: PipeOptions) -> Rc<S> {
        let erased: Rc<dyn Sink<C>> = sink.clone();
        let key = sink_key(erased.as_ref());
        if self.is_piped(key) {
            return sink;
        }

        let stream = Rc::downgrade(&self.inner);
        let drain_listener = sink.events().on(EventKind::Drain, move |_| {
            if let Some(inner) = stream.upgrade() {
                Readable { inner }.on_sink_drain(key);
            }
        });

        let (start, sink_count) = {
            let mut state = self.inner.state.borrow_mut();
            let flow = &mut state.flow;
            flow.pipes.push(PipeEntry {
                key,
                sink: erased,
                end: options.end,
                drain_listener,
                awaiting_release: false,
            });
            let start = !flow.flowing;
            if start {
                flow.flowing = true;
                flow.chunk_size = options.chunk_size;
            }
            (start, flow.pipes.len())
        };
        SinkPiped {
            stream: self.id(),
            sink_count,
            end: options.end,
        }
        .log();

        sink.events().emit(&Event::Pipe(self.id()));

        if start {
            let stream = self.clone();
            self.inner.scheduler.defer(Box::new(move || stream.flow()));
        }
        sink
    }

    /// Detach `sink`. Chunks already handed to it stay delivered; nothing
    /// reaches it afterwards. Returns false if it was not piped.
    pub fn unpipe(&self, sink: &dyn Sink<C>) -> bool {
        self.detach(Some(sink_key(sink))) > 0
    }

    /// Detach every sink. Returns how many were removed.
    pub fn unpipe_all(&self) -> usize {
        self.detach(None)
    }

    fn detach(&self, key: Option<SinkKey>) -> usize {
        let (removed, remaining, resume, stop) = {
            let mut state = self.inner.state.borrow_mut();
            let flow = &mut state.flow;
            let removed: Vec<PipeEntry<C>> = match key {
                Some(key) => match flow.pipes.iter().position(|entry| entry.key == key) {
                    Some(index) => vec![flow.pipes.remove(index)],
                    None => Vec::new(),
                },
                None => std::mem::take(&mut flow.pipes),
            };

            let released = removed.iter().filter(|entry| entry.awaiting_release).count();
            flow.awaiting_release -= released;

            let stop = flow.pipes.is_empty()
                && !removed.is_empty()
                && flow.push.is_none()
                && !flow.in_flow;
            if stop {
                flow.flowing = false;
                flow.flow_armed = false;
            }
            let resume = !stop
                && released > 0
                && flow.awaiting_release == 0
                && flow.flowing
                && !flow.in_flow;
            (removed, flow.pipes.len(), resume, stop)
        };

        for entry in &removed {
            entry.sink.events().off(entry.drain_listener);
            entry.sink.events().emit(&Event::Unpipe(self.id()));
        }
        SinkUnpiped {
            stream: self.id(),
            removed: removed.len(),
            remaining,
        }
        .log();

        if stop && self.inner.events.listener_count(EventKind::Data) > 0 {
            self.switch_to_push_mode();
        }
        if resume {
            let stream = self.clone();
            self.inner.scheduler.defer(Box::new(move || stream.release()));
        }
        removed.len()
    }

    pub fn is_flowing(&self) -> bool {
        self.state().flow.flowing
    }

    pub fn sink_count(&self) -> usize {
        self.state().flow.pipes.len()
    }

    /// Number of sinks currently holding the flow loop back.
    pub fn awaiting_release(&self) -> usize {
        self.state().flow.awaiting_release
    }

    /// Run the flow loop until it runs dry, hits backpressure, or loses its
    /// last sink.
    pub(crate) fn flow(&self) {
        let (chunk_size, sink_count) = {
            let mut state = self.inner.state.borrow_mut();
            let flow = &mut state.flow;
            if flow.in_flow || flow.awaiting_release > 0 {
                return;
            }
            flow.in_flow = true;
            flow.flow_armed = false;
            (flow.chunk_size, flow.pipes.len())
        };
        let msg = FlowStarted {
            stream: self.id(),
            sink_count,
        };
        msg.log();
        let _span = msg.span("flow").entered();

        loop {
            if self.state().flow.pipes.is_empty() {
                break;
            }
            let Some(chunk) = self.read(chunk_size) else {
                let mut state = self.inner.state.borrow_mut();
                let rearm = state.flow.flowing && !state.buffer.is_errored();
                state.flow.in_flow = false;
                state.flow.flow_armed = rearm;
                return;
            };

            self.deliver(chunk);

            let awaiting = self.state().flow.awaiting_release;
            if awaiting > 0 {
                BackpressureEngaged {
                    stream: self.id(),
                    awaiting_release: awaiting,
                }
                .log();
                self.inner.state.borrow_mut().flow.in_flow = false;
                return;
            }
        }

        // Every sink went away while flowing.
        {
            let mut state = self.inner.state.borrow_mut();
            state.flow.in_flow = false;
            if state.flow.push.is_some() {
                return;
            }
            state.flow.flowing = false;
        }
        if self.inner.events.listener_count(EventKind::Data) > 0 {
            self.switch_to_push_mode();
        }
    }

    /// Hand one chunk to every sink in registration order, then broadcast it.
    pub(crate) fn deliver(&self, chunk: C) {
        let sinks: Vec<(SinkKey, Rc<dyn Sink<C>>)> = self
            .state()
            .flow
            .pipes
            .iter()
            .map(|entry| (entry.key, Rc::clone(&entry.sink)))
            .collect();

        for (key, sink) in sinks {
            // A sink unpiped by an earlier sink's write gets nothing more.
            if !self.is_piped(key) {
                continue;
            }
            if !sink.write(chunk.clone()) {
                let mut state = self.inner.state.borrow_mut();
                let flow = &mut state.flow;
                if let Some(entry) = flow.pipes.iter_mut().find(|entry| entry.key == key) {
                    if !entry.awaiting_release {
                        entry.awaiting_release = true;
                        flow.awaiting_release += 1;
                    }
                }
            }
        }
        self.inner.events.emit(&Event::Data(chunk));
    }

    fn is_piped(&self, key: SinkKey) -> bool {
        self.state().flow.pipes.iter().any(|entry| entry.key == key)
    }

    fn on_sink_drain(&self, key: SinkKey) {
        let (resume, awaiting) = {
            let mut state = self.inner.state.borrow_mut();
            let flow = &mut state.flow;
            let Some(entry) = flow.pipes.iter_mut().find(|entry| entry.key == key) else {
                return;
            };
            if !entry.awaiting_release {
                return;
            }
            entry.awaiting_release = false;
            flow.awaiting_release -= 1;
            (
                flow.awaiting_release == 0 && !flow.in_flow,
                flow.awaiting_release,
            )
        };
        BackpressureReleased {
            stream: self.id(),
            awaiting_release: awaiting,
        }
        .log();

        if resume {
            self.release();
        }
    }

    /// Pick delivery back up once no sink is holding it.
    fn release(&self) {
        if self.is_push_mode() {
            self.drain_push_mode();
        } else {
            self.flow();
        }
    }
}
