// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Duplex transform stage.
//!
//! A [`Transform`] is a [`Writable`] input side and a [`Readable`] output
//! side joined by a [`TransformStep`]. Every chunk written to the input is
//! handed to the step together with a [`TransformOutput`] handle; whatever
//! the step pushes there lands in the output buffer. The next input chunk is
//! only handed over after the step has called `done`, and that completion
//! always reaches the input side one scheduler tick later.
//!
//! When the input side finishes, the step's `flush` runs once and the output
//! is then marked ended. Errors from the step or from `flush` halt both
//! sides.
//!
//! # Examples
//!
//! ```rust
//! use the_sluice::config::TransformOptions;
//! use the_sluice::engine::{TaskQueue, Transform, TransformOutput};
//! use the_sluice::traits::{transform_fn, StepCallback};
//!
//! let queue = TaskQueue::new();
//! let upper = Transform::new(
//!     transform_fn(|chunk: Vec<u8>, output: TransformOutput<Vec<u8>>, done: StepCallback| {
//!         output.push(chunk.to_ascii_uppercase());
//!         done(Ok(()));
//!     }),
//!     TransformOptions::default(),
//!     queue.clone(),
//! );
//!
//! upper.write(b"shout".to_vec());
//! queue.run_until_idle();
//! assert_eq!(upper.read(None), Some(b"SHOUT".to_vec()));
//! ```

use crate::config::TransformOptions;
use crate::engine::events::{Emitter, Event, EventKind, StreamId};
use crate::engine::readable::{Readable, ReadableInner};
use crate::engine::scheduler::Scheduler;
use crate::engine::writable::{Writable, WriteCallback, WriteTarget};
use crate::observability::messages::transform::{FlushStarted, StepInvoked, TransformFinalized};
use crate::observability::messages::StructuredLog;
use crate::traits::{Chunk, PullCallback, Pulled, Sink, Source, TransformStep};
use std::ops::Deref;
use std::rc::{Rc, Weak};

/// Handle a [`TransformStep`] pushes its output through.
pub struct TransformOutput<O: Chunk> {
    stream: Weak<ReadableInner<O>>,
}

impl<O: Chunk> Clone for TransformOutput<O> {
    fn clone(&self) -> Self {
        Self {
            stream: Weak::clone(&self.stream),
        }
    }
}

impl<O: Chunk> TransformOutput<O> {
    fn new(stream: &Readable<O>) -> Self {
        Self {
            stream: Rc::downgrade(&stream.inner),
        }
    }

    /// Append one chunk to the output buffer. Zero-size chunks and chunks
    /// pushed after the output has ended are dropped.
    ///
    /// A waiting consumer is notified on the next scheduler tick, so chunks
    /// pushed back to back by one step invocation are read together.
    pub fn push(&self, chunk: O) {
        let Some(inner) = self.stream.upgrade() else {
            return;
        };
        let stream = Readable { inner };
        if stream.enqueue(chunk).consumer_waiting {
            stream.schedule_readable();
        }
    }
}

/// Output-side demand. Input arrives by push, so a pull never produces
/// anything; the output is ended by [`run_flush`] once the input side has
/// finished.
struct TransformDemand;

impl<O: Chunk> Source<O> for TransformDemand {
    fn pull(&self, _size: usize, done: PullCallback<O>) {
        done(Ok(Pulled::Idle));
    }
}

/// Input side target: runs the step for each written chunk.
struct StepTarget<I, O: Chunk> {
    step: Rc<dyn TransformStep<I, O>>,
    output: TransformOutput<O>,
    stream: StreamId,
    scheduler: Rc<dyn Scheduler>,
}

impl<I: Chunk, O: Chunk> WriteTarget<I> for StepTarget<I, O> {
    fn write_chunk(&self, chunk: I, done: WriteCallback) {
        let msg = StepInvoked {
            stream: self.stream,
            input_size: chunk.size(),
        };
        msg.log();
        let _span = msg.span("transform").entered();

        let scheduler = Rc::clone(&self.scheduler);
        self.step.transform(
            chunk,
            self.output.clone(),
            Box::new(move |result| {
                scheduler.defer(Box::new(move || done(result)));
            }),
        );
    }
}

/// A duplex stage: write `I` chunks in, read `O` chunks out.
///
/// Dereferences to the output [`Readable`]; the [`Sink`] implementation and
/// [`Transform::writable`] reach the input side.
pub struct Transform<I: Chunk, O: Chunk> {
    output: Readable<O>,
    input: Writable<I>,
}

impl<I: Chunk, O: Chunk> Transform<I, O> {
    pub fn new(
        step: impl TransformStep<I, O> + 'static,
        options: TransformOptions,
        scheduler: Rc<dyn Scheduler>,
    ) -> Rc<Self> {
        let step: Rc<dyn TransformStep<I, O>> = Rc::new(step);

        let output = Readable::new(
            TransformDemand,
            options.readable,
            Rc::clone(&scheduler),
        );
        let input = Writable::new(
            StepTarget {
                step: Rc::clone(&step),
                output: TransformOutput::new(&output),
                stream: output.id(),
                scheduler: Rc::clone(&scheduler),
            },
            options.writable,
            scheduler,
        );

        let weak_output = Rc::downgrade(&output.inner);
        input.events().on(EventKind::Error, move |event| {
            if let (Some(inner), Event::Error(error)) = (weak_output.upgrade(), event) {
                Readable { inner }.fail(error.clone());
            }
        });

        let weak_output = Rc::downgrade(&output.inner);
        let weak_input = input.downgrade();
        input.events().on(EventKind::Finish, move |_| {
            if let Some(inner) = weak_output.upgrade() {
                let output = Readable { inner };
                output.events().emit(&Event::Finish);
                run_flush(&step, output, weak_input.upgrade());
            }
        });

        Rc::new(Self { output, input })
    }

    /// The input side.
    pub fn writable(&self) -> &Writable<I> {
        &self.input
    }

    /// The output side.
    pub fn readable(&self) -> &Readable<O> {
        &self.output
    }

    pub fn write(&self, chunk: I) -> bool {
        self.input.write(chunk)
    }

    pub fn end(&self) {
        self.input.end()
    }
}

fn run_flush<I: Chunk, O: Chunk>(
    step: &Rc<dyn TransformStep<I, O>>,
    output: Readable<O>,
    input: Option<Writable<I>>,
) {
    FlushStarted {
        stream: output.id(),
    }
    .log();

    let handle = TransformOutput::new(&output);
    step.flush(
        handle,
        Box::new(move |result| match result {
            Ok(()) => {
                TransformFinalized {
                    stream: output.id(),
                    buffered: output.buffered_size(),
                }
                .log();
                output.finish_output();
            }
            Err(error) => match input {
                Some(input) => input.fail(error),
                None => output.fail(error),
            },
        }),
    );
}

impl<I: Chunk, O: Chunk> Deref for Transform<I, O> {
    type Target = Readable<O>;

    fn deref(&self) -> &Readable<O> {
        &self.output
    }
}

impl<I: Chunk, O: Chunk> Sink<I> for Transform<I, O> {
    fn write(&self, chunk: I) -> bool {
        self.input.write(chunk)
    }

    fn end(&self) {
        self.input.end()
    }

    fn events(&self) -> &Emitter<I> {
        self.input.events()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scheduler::TaskQueue;
    use crate::errors::StreamError;
    use crate::traits::{transform_fn, PassThrough, StepCallback};
    use std::cell::{Cell, RefCell};

    fn count(stream: &Readable<Vec<u8>>, kind: EventKind) -> Rc<Cell<usize>> {
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        stream
            .events()
            .on(kind, move |_| counter.set(counter.get() + 1));
        count
    }

    #[test]
    fn pass_through_reemits_input() {
        let queue = TaskQueue::new();
        let stage = Transform::new(PassThrough, TransformOptions::default(), queue.clone());

        stage.write(b"as ".to_vec());
        stage.write(b"is".to_vec());
        queue.run_until_idle();

        assert_eq!(stage.read(None), Some(b"as is".to_vec()));
    }

    #[test]
    fn step_completion_is_deferred_even_when_inline() {
        let queue = TaskQueue::new();
        let stage = Transform::new(PassThrough, TransformOptions::default(), queue.clone());

        stage.write(b"x".to_vec());
        assert_eq!(stage.writable().queued_size(), 1);
        queue.run_until_idle();
        assert_eq!(stage.writable().queued_size(), 0);
    }

    #[test]
    fn one_input_may_produce_many_or_no_outputs() {
        let queue = TaskQueue::new();
        let stage = Transform::new(
            transform_fn(|chunk: Vec<u8>, output: TransformOutput<Vec<u8>>, done: StepCallback| {
                for byte in chunk.into_iter().filter(|b| !b.is_ascii_whitespace()) {
                    output.push(vec![byte, byte]);
                }
                done(Ok(()));
            }),
            TransformOptions::default(),
            queue.clone(),
        );

        stage.write(b"   ".to_vec());
        stage.write(b"a b".to_vec());
        queue.run_until_idle();

        assert_eq!(stage.read(None), Some(b"aabb".to_vec()));
    }

    #[test]
    fn reading_before_any_input_waits_for_end_of_input() {
        let queue = TaskQueue::new();
        let stage = Transform::new(PassThrough, TransformOptions::default(), queue.clone());
        let ends = count(&stage, EventKind::End);

        assert_eq!(stage.read(None), None);
        queue.run_until_idle();
        assert!(!stage.is_ended());
        assert!(!stage.is_pulling());
        assert!(stage.is_consumer_waiting());
        assert_eq!(ends.get(), 0);

        stage.end();
        queue.run_until_idle();
        assert!(stage.is_ended());
        assert_eq!(ends.get(), 1);
    }

    #[test]
    fn empty_stage_ends_immediately_on_finalize() {
        let queue = TaskQueue::new();
        let stage = Transform::new(PassThrough, TransformOptions::default(), queue.clone());
        let ends = count(&stage, EventKind::End);
        let finishes = count(&stage, EventKind::Finish);

        stage.end();

        assert_eq!(finishes.get(), 1);
        assert_eq!(ends.get(), 1);
        assert!(stage.is_ended());
    }

    #[test]
    fn flush_output_is_drained_before_end() {
        struct Trailer;
        impl TransformStep<Vec<u8>, Vec<u8>> for Trailer {
            fn transform(&self, chunk: Vec<u8>, output: TransformOutput<Vec<u8>>, done: StepCallback) {
                output.push(chunk);
                done(Ok(()));
            }

            fn flush(&self, output: TransformOutput<Vec<u8>>, done: StepCallback) {
                output.push(b"!".to_vec());
                done(Ok(()));
            }
        }

        let queue = TaskQueue::new();
        let stage = Transform::new(Trailer, TransformOptions::default(), queue.clone());
        let ends = count(&stage, EventKind::End);

        stage.write(b"done".to_vec());
        stage.end();
        queue.run_until_idle();
        assert_eq!(ends.get(), 0);

        assert_eq!(stage.read(None), Some(b"done!".to_vec()));
        queue.run_until_idle();
        assert_eq!(ends.get(), 1);
    }

    #[test]
    fn step_error_halts_both_sides() {
        let queue = TaskQueue::new();
        let stage = Transform::new(
            transform_fn(|_chunk: Vec<u8>, _output: TransformOutput<Vec<u8>>, done: StepCallback| {
                done(Err(StreamError::transform("bad record")));
            }),
            TransformOptions::default(),
            queue.clone(),
        );
        let errors = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&errors);
        stage.on(EventKind::Error, move |event| {
            if let Event::Error(error) = event {
                seen.borrow_mut().push(error.clone());
            }
        });

        stage.write(b"x".to_vec());
        stage.write(b"y".to_vec());
        queue.run_until_idle();

        assert_eq!(*errors.borrow(), vec![StreamError::transform("bad record")]);
        assert!(stage.is_errored());
        assert!(stage.writable().is_errored());
        assert_eq!(stage.read(None), None);
    }

    #[test]
    fn flush_error_replaces_normal_completion() {
        struct FailingFlush;
        impl TransformStep<Vec<u8>, Vec<u8>> for FailingFlush {
            fn transform(&self, _chunk: Vec<u8>, _output: TransformOutput<Vec<u8>>, done: StepCallback) {
                done(Ok(()));
            }

            fn flush(&self, _output: TransformOutput<Vec<u8>>, done: StepCallback) {
                done(Err(StreamError::flush("trailer unavailable")));
            }
        }

        let queue = TaskQueue::new();
        let stage = Transform::new(FailingFlush, TransformOptions::default(), queue.clone());
        let ends = count(&stage, EventKind::End);
        let errors = count(&stage, EventKind::Error);

        stage.end();
        queue.run_until_idle();

        assert_eq!(errors.get(), 1);
        assert_eq!(ends.get(), 0);
    }

    #[test]
    fn output_type_may_differ_from_input() {
        let queue = TaskQueue::new();
        let lengths = Transform::new(
            transform_fn(|chunk: Vec<u8>, output: TransformOutput<Vec<usize>>, done: StepCallback| {
                output.push(vec![chunk.len()]);
                done(Ok(()));
            }),
            TransformOptions::default(),
            queue.clone(),
        );

        lengths.write(b"abc".to_vec());
        lengths.write(b"de".to_vec());
        queue.run_until_idle();

        assert_eq!(lengths.read(None), Some(vec![3, 2]));
    }
}
