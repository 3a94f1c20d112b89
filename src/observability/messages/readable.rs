// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the pull engine.
//!
//! This module contains message types for logging events related to:
//! * Producer pulls (issue, completion, failure)
//! * End-of-data detection
//! * Mode transitions and foreign-source valve changes

use crate::engine::StreamId;
use crate::errors::StreamError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A pull was issued to the producer.
///
/// # Log Level
/// `trace!` - High-frequency internal event
///
/// # Example
/// ```
/// use the_sluice::observability::messages::readable::PullIssued;
/// use the_sluice::observability::messages::StructuredLog;
///
/// # let stream = the_sluice::engine::Readable::<Vec<u8>>::new(
/// #     the_sluice::traits::NoSource,
/// #     Default::default(),
/// #     the_sluice::engine::TaskQueue::new(),
/// # ).id();
/// let msg = PullIssued {
///     stream,
///     size: 16384,
///     buffered: 200,
/// };
///
/// msg.log();
/// ```
pub struct PullIssued {
    pub stream: StreamId,
    pub size: usize,
    pub buffered: usize,
}

impl Display for PullIssued {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: pulling up to {} units ({} buffered)",
            self.stream, self.size, self.buffered
        )
    }
}

impl StructuredLog for PullIssued {
    fn log(&self) {
        tracing::trace!(
            stream = %self.stream,
            size = self.size,
            buffered = self.buffered,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "pull",
            span_name = name,
            stream = %self.stream,
            size = self.size,
        )
    }
}

/// A pulled chunk was appended to the buffer.
///
/// # Log Level
/// `trace!` - High-frequency internal event
pub struct ChunkBuffered {
    pub stream: StreamId,
    pub size: usize,
    pub buffered: usize,
}

impl Display for ChunkBuffered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: buffered chunk of {} units (now {})",
            self.stream, self.size, self.buffered
        )
    }
}

impl StructuredLog for ChunkBuffered {
    fn log(&self) {
        tracing::trace!(
            stream = %self.stream,
            size = self.size,
            buffered = self.buffered,
            "{}", self
        );
    }
}

/// A read asked for more than is buffered and was deferred.
///
/// # Log Level
/// `trace!` - High-frequency internal event
pub struct ReadDeferred {
    pub stream: StreamId,
    pub requested: usize,
    pub buffered: usize,
}

impl Display for ReadDeferred {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: read({}) deferred with {} buffered",
            self.stream, self.requested, self.buffered
        )
    }
}

impl StructuredLog for ReadDeferred {
    fn log(&self) {
        tracing::trace!(
            stream = %self.stream,
            requested = self.requested,
            buffered = self.buffered,
            "{}", self
        );
    }
}

/// The producer signalled that no more data will arrive.
///
/// # Log Level
/// `debug!` - Lifecycle event
pub struct SourceExhausted {
    pub stream: StreamId,
    pub buffered: usize,
}

impl Display for SourceExhausted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: source exhausted with {} units still buffered",
            self.stream, self.buffered
        )
    }
}

impl StructuredLog for SourceExhausted {
    fn log(&self) {
        tracing::debug!(
            stream = %self.stream,
            buffered = self.buffered,
            "{}", self
        );
    }
}

/// End-of-data was delivered to listeners.
///
/// # Log Level
/// `debug!` - Lifecycle event
pub struct StreamEnded {
    pub stream: StreamId,
    pub sinks_ended: usize,
}

impl Display for StreamEnded {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: end of data ({} piped sinks ended)",
            self.stream, self.sinks_ended
        )
    }
}

impl StructuredLog for StreamEnded {
    fn log(&self) {
        tracing::debug!(
            stream = %self.stream,
            sinks_ended = self.sinks_ended,
            "{}", self
        );
    }
}

/// The stream failed and halted.
///
/// # Log Level
/// `warn!` - Failure surfaced to listeners
pub struct StreamFailed<'a> {
    pub stream: StreamId,
    pub error: &'a StreamError,
}

impl Display for StreamFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: stream failed: {}", self.stream, self.error)
    }
}

impl StructuredLog for StreamFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            stream = %self.stream,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "stream_failed",
            span_name = name,
            stream = %self.stream,
            error = %self.error,
        )
    }
}

/// The stream committed to push mode.
///
/// # Log Level
/// `debug!` - Lifecycle event
pub struct PushModeEntered {
    pub stream: StreamId,
}

impl Display for PushModeEntered {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: switched to push mode", self.stream)
    }
}

impl StructuredLog for PushModeEntered {
    fn log(&self) {
        tracing::debug!(stream = %self.stream, "{}", self);
    }
}

/// A wrapped foreign source was paused or resumed by the wrapper.
///
/// # Log Level
/// `trace!` - High-frequency internal event
pub struct ForeignValve {
    pub stream: StreamId,
    pub paused: bool,
    pub buffered: usize,
}

impl Display for ForeignValve {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let action = if self.paused { "paused" } else { "resumed" };
        write!(
            f,
            "{}: foreign source {} at {} buffered",
            self.stream, action, self.buffered
        )
    }
}

impl StructuredLog for ForeignValve {
    fn log(&self) {
        tracing::trace!(
            stream = %self.stream,
            paused = self.paused,
            buffered = self.buffered,
            "{}", self
        );
    }
}
