// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output and
//! [`StructuredLog`] to emit itself with its fields attached.
//!
//! # Organization
//!
//! * `readable` - Pull engine: pulls, buffering, end-of-data, mode switches
//! * `pipe` - Sink registration, the flow loop and backpressure
//! * `transform` - Transform steps, flush, and the push side
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_sluice::engine::{Readable, TaskQueue};
//! use the_sluice::observability::messages::readable::StreamEnded;
//! use the_sluice::observability::messages::StructuredLog;
//! use the_sluice::traits::NoSource;
//!
//! let stream = Readable::<Vec<u8>>::new(NoSource, Default::default(), TaskQueue::new()).id();
//! StreamEnded { stream, sinks_ended: 1 }.log();
//! ```

use tracing::Span;

pub mod pipe;
pub mod readable;
pub mod transform;

/// A log message that knows its level and structured fields.
pub trait StructuredLog {
    /// Emit the message at its documented level.
    fn log(&self);

    /// A span carrying the message's fields. Messages without a natural
    /// scope return a disabled span.
    fn span(&self, name: &str) -> Span {
        let _ = name;
        Span::none()
    }
}
