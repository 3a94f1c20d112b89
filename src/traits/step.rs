// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::TransformOutput;
use crate::errors::StreamError;
use crate::traits::Chunk;

/// Completion of a transform or flush step. Invoke exactly once.
pub type StepCallback = Box<dyn FnOnce(Result<(), StreamError>)>;

/// The user-supplied processing of a [`Transform`](crate::engine::Transform).
///
/// `transform` is called once per input chunk, never concurrently: the
/// next chunk is only handed over after `done` has been called. Output may
/// be pushed through `output` any number of times, inline or later, before
/// `done`.
pub trait TransformStep<I, O: Chunk> {
    fn transform(&self, chunk: I, output: TransformOutput<O>, done: StepCallback);

    /// Runs once after the last input chunk was processed. The default emits
    /// nothing and finishes immediately.
    fn flush(&self, output: TransformOutput<O>, done: StepCallback) {
        let _ = output;
        done(Ok(()));
    }
}

/// Closure adapter for [`TransformStep`] without a flush step.
pub struct FnStep<F> {
    step: F,
}

/// Build a transform step from a `(chunk, output, done)` closure.
pub fn transform_fn<I, O, F>(step: F) -> FnStep<F>
where
    O: Chunk,
    F: Fn(I, TransformOutput<O>, StepCallback),
{
    FnStep { step }
}

impl<I, O, F> TransformStep<I, O> for FnStep<F>
where
    O: Chunk,
    F: Fn(I, TransformOutput<O>, StepCallback),
{
    fn transform(&self, chunk: I, output: TransformOutput<O>, done: StepCallback) {
        (self.step)(chunk, output, done)
    }
}

/// Identity step: every input chunk is re-emitted unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl<C: Chunk> TransformStep<C, C> for PassThrough {
    fn transform(&self, chunk: C, output: TransformOutput<C>, done: StepCallback) {
        output.push(chunk);
        done(Ok(()));
    }
}
