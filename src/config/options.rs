// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_BUFFER_SIZE, DEFAULT_HIGH_WATER_MARK, DEFAULT_LOW_WATER_MARK,
    DEFAULT_WRITABLE_LOW_WATER_MARK,
};
use serde::Deserialize;

/// Construction options for the pull side of a stream.
///
/// # Fields
/// * `buffer_size` - Size hint handed to the producer on every pull
/// * `low_water_mark` - Buffered size below which the engine prefetches
///
/// # Example
/// ```yaml
/// readable:
///   buffer_size: 16384
///   low_water_mark: 1024
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    pub buffer_size: usize,
    pub low_water_mark: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            low_water_mark: DEFAULT_LOW_WATER_MARK,
        }
    }
}

impl StreamOptions {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_low_water_mark(mut self, low_water_mark: usize) -> Self {
        self.low_water_mark = low_water_mark;
        self
    }
}

/// Construction options for the push side of a stream.
///
/// `write` reports backpressure once the queued size reaches
/// `high_water_mark`; a release is raised when it falls back to
/// `low_water_mark` or below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WritableOptions {
    pub high_water_mark: usize,
    pub low_water_mark: usize,
}

impl Default for WritableOptions {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            low_water_mark: DEFAULT_WRITABLE_LOW_WATER_MARK,
        }
    }
}

impl WritableOptions {
    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark;
        self
    }

    pub fn with_low_water_mark(mut self, low_water_mark: usize) -> Self {
        self.low_water_mark = low_water_mark;
        self
    }
}

/// Options for a single `pipe` registration.
///
/// # Fields
/// * `end` - Whether the source's end-of-data ends the sink (default true)
/// * `chunk_size` - Size passed to every `read` the flow loop issues; `None`
///   drains everything buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipeOptions {
    pub end: bool,
    pub chunk_size: Option<usize>,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            end: true,
            chunk_size: None,
        }
    }
}

impl PipeOptions {
    /// Pipe without propagating end-of-data to the sink.
    pub fn keep_open() -> Self {
        Self {
            end: false,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }
}

/// Options for a duplex transform stage: one set per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub readable: StreamOptions,
    pub writable: WritableOptions,
}
