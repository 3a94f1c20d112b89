// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised by streams.
//!
//! Stream errors never cross an asynchronous boundary as a return value: they
//! are handed to a completion callback or broadcast as an
//! [`Event::Error`](crate::engine::Event::Error). They are `Clone` so the same
//! error can reach every listener.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The source never overrode the pull operation.
    #[error("pull is not implemented for this source")]
    NotImplemented,

    /// The producer failed while serving a pull.
    #[error("producer failed: {0}")]
    Producer(String),

    /// A transform step reported failure for an input chunk.
    #[error("transform step failed: {0}")]
    Transform(String),

    /// The flush step failed at end of input.
    #[error("flush failed: {0}")]
    Flush(String),

    /// A chunk was written after `end()` was called.
    #[error("write after end")]
    WriteAfterEnd,

    /// Push mode was requested while the stream was already flowing.
    #[error("cannot switch to push mode: stream is already flowing")]
    AlreadyFlowing,

    /// An error re-raised from a wrapped foreign source.
    #[error("foreign source error: {0}")]
    Foreign(String),
}

impl StreamError {
    pub fn producer(reason: impl Into<String>) -> Self {
        Self::Producer(reason.into())
    }

    pub fn transform(reason: impl Into<String>) -> Self {
        Self::Transform(reason.into())
    }

    pub fn flush(reason: impl Into<String>) -> Self {
        Self::Flush(reason.into())
    }

    pub fn foreign(reason: impl Into<String>) -> Self {
        Self::Foreign(reason.into())
    }
}
