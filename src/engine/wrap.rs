// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Adapter that gives a push-driven [`ForeignSource`] the pull contract.

use crate::config::StreamOptions;
use crate::engine::events::Event;
use crate::engine::readable::{Readable, ReadableInner};
use crate::engine::scheduler::Scheduler;
use crate::observability::messages::readable::ForeignValve;
use crate::observability::messages::StructuredLog;
use crate::traits::{Chunk, ForeignEvent, ForeignSource, PullCallback, Pulled, Source};
use std::cell::Cell;
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// A foreign source behind the pull contract.
///
/// Dereferences to the wrapping [`Readable`]; everything else the foreign
/// source offers is reachable through [`Wrapped::inner`].
pub struct Wrapped<C: Chunk, S> {
    stream: Readable<C>,
    source: Rc<S>,
}

impl<C: Chunk, S> Wrapped<C, S> {
    pub fn inner(&self) -> &Rc<S> {
        &self.source
    }

    pub fn stream(&self) -> &Readable<C> {
        &self.stream
    }
}

impl<C: Chunk, S> Deref for Wrapped<C, S> {
    type Target = Readable<C>;

    fn deref(&self) -> &Readable<C> {
        &self.stream
    }
}

/// Pull side of a wrapped source: demand reopens the valve, data arrives on
/// its own through the subscription.
struct ForeignDemand<S> {
    source: Rc<S>,
    paused: Rc<Cell<bool>>,
}

impl<C, S> Source<C> for ForeignDemand<S>
where
    C: Chunk,
    S: ForeignSource<C>,
{
    fn pull(&self, _size: usize, done: PullCallback<C>) {
        done(Ok(Pulled::Idle));
        if self.paused.replace(false) {
            tracing::trace!("demand below watermark, resuming foreign source");
            self.source.resume();
        }
    }
}

impl<C: Chunk> Readable<C> {
    /// Wrap a push-driven source.
    ///
    /// Every chunk it emits is buffered and announced. Once more than
    /// `low_water_mark` units are buffered the source is paused, and the
    /// next read that finds the buffer below the watermark resumes it. The
    /// source's end is held back until the buffer has been drained.
    /// `Error`, `Close`, `Destroy`, `Pause` and `Resume` are re-raised on
    /// the wrapper.
    pub fn wrap<S>(source: Rc<S>, options: StreamOptions, scheduler: Rc<dyn Scheduler>) -> Wrapped<C, S>
    where
        S: ForeignSource<C> + 'static,
    {
        let paused = Rc::new(Cell::new(false));
        let stream = Readable::new(
            ForeignDemand {
                source: Rc::clone(&source),
                paused: Rc::clone(&paused),
            },
            options,
            scheduler,
        );

        let weak = Rc::downgrade(&stream.inner);
        let valve = Rc::downgrade(&source);
        source.subscribe(Box::new(move |event| {
            on_foreign_event(&weak, &valve, &paused, event);
        }));

        Wrapped { stream, source }
    }
}

fn on_foreign_event<C, S>(
    stream: &Weak<ReadableInner<C>>,
    source: &Weak<S>,
    paused: &Cell<bool>,
    event: ForeignEvent<C>,
) where
    C: Chunk,
    S: ForeignSource<C>,
{
    let Some(inner) = stream.upgrade() else {
        return;
    };
    let stream = Readable { inner };

    match event {
        ForeignEvent::Data(chunk) => {
            let buffered = stream.enqueue(chunk).buffered;
            stream.emit_readable();

            let over = buffered > stream.options().low_water_mark;
            if over && !paused.get() {
                if let Some(source) = source.upgrade() {
                    paused.set(true);
                    ForeignValve {
                        stream: stream.id(),
                        paused: true,
                        buffered,
                    }
                    .log();
                    source.pause();
                }
            }
        }
        ForeignEvent::End => stream.on_source_end(false),
        ForeignEvent::Error(error) => stream.fail(error),
        ForeignEvent::Close => {
            stream.events().emit(&Event::Close);
        }
        ForeignEvent::Destroy => {
            stream.events().emit(&Event::Destroy);
        }
        ForeignEvent::Pause => {
            stream.events().emit(&Event::Pause);
        }
        ForeignEvent::Resume => {
            stream.events().emit(&Event::Resume);
        }
    }
}
