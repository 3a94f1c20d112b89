// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The producer override point of the pull engine.

use crate::errors::StreamError;
use crate::traits::Chunk;
use std::cell::RefCell;

/// Outcome of one pull.
#[derive(Debug, Clone, PartialEq)]
pub enum Pulled<C> {
    /// One chunk of data. A zero-size chunk counts as [`Pulled::End`].
    Chunk(C),
    /// No more data will ever be produced.
    End,
    /// Nothing to hand over right now; the demand is released without data
    /// and the next `read` may pull again. Used by push-fed sides.
    Idle,
}

/// Completion of a pull. May be invoked inline or later, exactly once.
pub type PullCallback<C> = Box<dyn FnOnce(Result<Pulled<C>, StreamError>)>;

/// A producer of chunks for a [`Readable`](crate::engine::Readable).
///
/// The engine calls `pull` with a size hint (the stream's `buffer_size`)
/// and never has more than one pull outstanding. A source that never calls
/// `done` stalls its stream permanently.
pub trait Source<C: Chunk> {
    /// Produce up to `size` units. The default always fails with
    /// [`StreamError::NotImplemented`].
    fn pull(&self, size: usize, done: PullCallback<C>) {
        let _ = size;
        done(Err(StreamError::NotImplemented));
    }
}

/// A source that does not override `pull`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSource;

impl<C: Chunk> Source<C> for NoSource {}

/// Source that answers every pull synchronously from an iterator.
///
/// The size hint is ignored: each pull yields the next item, and an
/// exhausted iterator ends the stream.
pub struct IterSource<I> {
    items: RefCell<I>,
}

impl<I> IterSource<I> {
    pub fn new<T>(items: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            items: RefCell::new(items.into_iter()),
        }
    }
}

impl<C, I> Source<C> for IterSource<I>
where
    C: Chunk,
    I: Iterator<Item = C>,
{
    fn pull(&self, _size: usize, done: PullCallback<C>) {
        let next = self.items.borrow_mut().next();
        match next {
            Some(chunk) => done(Ok(Pulled::Chunk(chunk))),
            None => done(Ok(Pulled::End)),
        }
    }
}

/// Closure adapter for [`Source`].
pub struct FnSource<F> {
    pull: F,
}

/// Build a source from a `(size, done)` closure.
pub fn source_fn<C, F>(pull: F) -> FnSource<F>
where
    C: Chunk,
    F: Fn(usize, PullCallback<C>),
{
    FnSource { pull }
}

impl<C, F> Source<C> for FnSource<F>
where
    C: Chunk,
    F: Fn(usize, PullCallback<C>),
{
    fn pull(&self, size: usize, done: PullCallback<C>) {
        (self.pull)(size, done)
    }
}
