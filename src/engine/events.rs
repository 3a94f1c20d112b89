// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed notifications and the observer registry that delivers them.
//!
//! Every stream owns one [`Emitter`]. Listeners register for a single
//! [`EventKind`] and get back a [`ListenerId`] for explicit removal.
//! Emission works on a snapshot of the matching listeners, so a listener may
//! register or remove listeners (its own included) while being called.

use crate::errors::StreamError;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identity of a stream instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        StreamId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// A notification raised by a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<C> {
    /// Data is available to `read`.
    Readable,
    /// A chunk was delivered (flow loop broadcast or push mode).
    Data(C),
    /// No more data will ever be produced.
    End,
    Error(StreamError),
    /// This sink was registered as a pipe target of the given stream.
    Pipe(StreamId),
    /// This sink was removed from the pipe set of the given stream.
    Unpipe(StreamId),
    /// Previously signalled backpressure has cleared.
    Drain,
    Close,
    Destroy,
    Pause,
    Resume,
    /// Every chunk written before `end()` has been processed.
    Finish,
}

/// Fieldless mirror of [`Event`] used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Readable,
    Data,
    End,
    Error,
    Pipe,
    Unpipe,
    Drain,
    Close,
    Destroy,
    Pause,
    Resume,
    Finish,
}

impl<C> Event<C> {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Readable => EventKind::Readable,
            Event::Data(_) => EventKind::Data,
            Event::End => EventKind::End,
            Event::Error(_) => EventKind::Error,
            Event::Pipe(_) => EventKind::Pipe,
            Event::Unpipe(_) => EventKind::Unpipe,
            Event::Drain => EventKind::Drain,
            Event::Close => EventKind::Close,
            Event::Destroy => EventKind::Destroy,
            Event::Pause => EventKind::Pause,
            Event::Resume => EventKind::Resume,
            Event::Finish => EventKind::Finish,
        }
    }
}

/// Handle returned by registration, used for explicit removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener<C> = Rc<dyn Fn(&Event<C>)>;

struct Registration<C> {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    listener: Listener<C>,
}

/// Observer registry for one stream.
pub struct Emitter<C> {
    registrations: RefCell<Vec<Registration<C>>>,
    next_id: Cell<u64>,
}

impl<C> Default for Emitter<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Emitter<C> {
    pub fn new() -> Self {
        Self {
            registrations: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Register `listener` for every future event of `kind`.
    pub fn on(&self, kind: EventKind, listener: impl Fn(&Event<C>) + 'static) -> ListenerId {
        self.register(kind, false, Rc::new(listener))
    }

    /// Register `listener` for the next event of `kind` only.
    pub fn once(&self, kind: EventKind, listener: impl Fn(&Event<C>) + 'static) -> ListenerId {
        self.register(kind, true, Rc::new(listener))
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations
            .borrow()
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Deliver `event` to every listener registered for its kind, in
    /// registration order. Returns whether anyone was listening.
    pub fn emit(&self, event: &Event<C>) -> bool {
        let kind = event.kind();
        let listeners: Vec<Listener<C>> = {
            let mut registrations = self.registrations.borrow_mut();
            let matched = registrations
                .iter()
                .filter(|r| r.kind == kind)
                .map(|r| Rc::clone(&r.listener))
                .collect();
            registrations.retain(|r| !(r.once && r.kind == kind));
            matched
        };

        for listener in &listeners {
            listener(event);
        }
        !listeners.is_empty()
    }

    fn register(&self, kind: EventKind, once: bool, listener: Listener<C>) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.registrations.borrow_mut().push(Registration {
            id,
            kind,
            once,
            listener,
        });
        id
    }
}

impl<C> fmt::Debug for Emitter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listener_count", &self.registrations.borrow().len())
            .finish()
    }
}
