// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for transform stages and their push side.

use crate::engine::StreamId;
use crate::errors::StreamError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// The transform step was handed an input chunk.
///
/// # Log Level
/// `trace!` - Per-chunk event
pub struct StepInvoked {
    pub stream: StreamId,
    pub input_size: usize,
}

impl Display for StepInvoked {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: transforming input chunk of {} units",
            self.stream, self.input_size
        )
    }
}

impl StructuredLog for StepInvoked {
    fn log(&self) {
        tracing::trace!(
            stream = %self.stream,
            input_size = self.input_size,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "transform_step",
            span_name = name,
            stream = %self.stream,
            input_size = self.input_size,
        )
    }
}

/// The flush step started after the last input chunk.
///
/// # Log Level
/// `debug!` - Lifecycle event
pub struct FlushStarted {
    pub stream: StreamId,
}

impl Display for FlushStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: input finished, flushing", self.stream)
    }
}

impl StructuredLog for FlushStarted {
    fn log(&self) {
        tracing::debug!(stream = %self.stream, "{}", self);
    }
}

/// The output side was finalized.
///
/// # Log Level
/// `debug!` - Lifecycle event
pub struct TransformFinalized {
    pub stream: StreamId,
    pub buffered: usize,
}

impl Display for TransformFinalized {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: output finalized with {} units left to drain",
            self.stream, self.buffered
        )
    }
}

impl StructuredLog for TransformFinalized {
    fn log(&self) {
        tracing::debug!(
            stream = %self.stream,
            buffered = self.buffered,
            "{}", self
        );
    }
}

/// A write was rejected because the push side already ended.
///
/// # Log Level
/// `warn!` - Caller contract violation
pub struct WriteRejected<'a> {
    pub stream: StreamId,
    pub error: &'a StreamError,
}

impl Display for WriteRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: write rejected: {}", self.stream, self.error)
    }
}

impl StructuredLog for WriteRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            stream = %self.stream,
            error = %self.error,
            "{}", self
        );
    }
}

/// Every chunk written before `end()` has been processed.
///
/// # Log Level
/// `debug!` - Lifecycle event
pub struct WritableFinished {
    pub stream: StreamId,
}

impl Display for WritableFinished {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: all writes processed", self.stream)
    }
}

impl StructuredLog for WritableFinished {
    fn log(&self) {
        tracing::debug!(stream = %self.stream, "{}", self);
    }
}
