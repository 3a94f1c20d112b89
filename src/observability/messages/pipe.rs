// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for piping and backpressure.

use crate::engine::StreamId;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A sink was registered on a stream.
///
/// # Log Level
/// `debug!` - Topology change
///
/// # Example
/// ```
/// use the_sluice::engine::{Readable, TaskQueue};
/// use the_sluice::observability::messages::pipe::SinkPiped;
/// use the_sluice::traits::NoSource;
///
/// let stream = Readable::<Vec<u8>>::new(NoSource, Default::default(), TaskQueue::new()).id();
/// let msg = SinkPiped {
///     stream,
///     sink_count: 2,
///     end: true,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct SinkPiped {
    pub stream: StreamId,
    pub sink_count: usize,
    pub end: bool,
}

impl Display for SinkPiped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: piped into sink #{} (end propagation {})",
            self.stream,
            self.sink_count,
            if self.end { "on" } else { "off" }
        )
    }
}

impl StructuredLog for SinkPiped {
    fn log(&self) {
        tracing::debug!(
            stream = %self.stream,
            sink_count = self.sink_count,
            end = self.end,
            "{}", self
        );
    }
}

/// One or more sinks were removed from a stream.
///
/// # Log Level
/// `debug!` - Topology change
pub struct SinkUnpiped {
    pub stream: StreamId,
    pub removed: usize,
    pub remaining: usize,
}

impl Display for SinkUnpiped {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: unpiped {} sink(s), {} remaining",
            self.stream, self.removed, self.remaining
        )
    }
}

impl StructuredLog for SinkUnpiped {
    fn log(&self) {
        tracing::debug!(
            stream = %self.stream,
            removed = self.removed,
            remaining = self.remaining,
            "{}", self
        );
    }
}

/// The flow loop started a run.
///
/// # Log Level
/// `trace!` - High-frequency internal event
pub struct FlowStarted {
    pub stream: StreamId,
    pub sink_count: usize,
}

impl Display for FlowStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}: flowing into {} sink(s)", self.stream, self.sink_count)
    }
}

impl StructuredLog for FlowStarted {
    fn log(&self) {
        tracing::trace!(
            stream = %self.stream,
            sink_count = self.sink_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "flow",
            span_name = name,
            stream = %self.stream,
            sink_count = self.sink_count,
        )
    }
}

/// A sink answered a delivery with backpressure.
///
/// # Log Level
/// `debug!` - Flow-control event
pub struct BackpressureEngaged {
    pub stream: StreamId,
    pub awaiting_release: usize,
}

impl Display for BackpressureEngaged {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: backpressure, waiting on {} sink(s)",
            self.stream, self.awaiting_release
        )
    }
}

impl StructuredLog for BackpressureEngaged {
    fn log(&self) {
        tracing::debug!(
            stream = %self.stream,
            awaiting_release = self.awaiting_release,
            "{}", self
        );
    }
}

/// A backpressured sink released.
///
/// # Log Level
/// `debug!` - Flow-control event
pub struct BackpressureReleased {
    pub stream: StreamId,
    pub awaiting_release: usize,
}

impl Display for BackpressureReleased {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}: sink released, still waiting on {}",
            self.stream, self.awaiting_release
        )
    }
}

impl StructuredLog for BackpressureReleased {
    fn log(&self) {
        tracing::debug!(
            stream = %self.stream,
            awaiting_release = self.awaiting_release,
            "{}", self
        );
    }
}
