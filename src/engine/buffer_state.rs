// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-stream record of queued chunks and demand flags.
//!
//! `total_size` always equals the sum of the sizes of the queued chunks:
//! every mutation of the queue goes through [`BufferState::push`] or
//! [`BufferState::take`], which keep the two in step.

use crate::config::StreamOptions;
use crate::traits::Chunk;
use std::collections::VecDeque;

#[derive(Debug)]
pub struct BufferState<C> {
    chunks: VecDeque<C>,
    total_size: usize,
    /// Size hint passed to the producer on every pull.
    pub buffer_size: usize,
    /// Buffered size below which prefetching is triggered.
    pub low_water_mark: usize,
    ended: bool,
    /// Set while the single permitted producer request is outstanding.
    pub pulling: bool,
    /// Set while a consumer waits for an availability notification.
    pub need_notify: bool,
    end_emitted: bool,
    errored: bool,
}

impl<C: Chunk> BufferState<C> {
    pub fn new(options: StreamOptions) -> Self {
        Self {
            chunks: VecDeque::new(),
            total_size: 0,
            buffer_size: options.buffer_size,
            low_water_mark: options.low_water_mark,
            ended: false,
            pulling: false,
            need_notify: false,
            end_emitted: false,
            errored: false,
        }
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Number of queued chunks (not units).
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    pub fn is_below_low_water_mark(&self) -> bool {
        self.total_size < self.low_water_mark
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Latch end-of-data. Never reverts.
    pub fn mark_ended(&mut self) {
        self.ended = true;
    }

    pub fn is_errored(&self) -> bool {
        self.errored
    }

    pub fn mark_errored(&mut self) {
        self.errored = true;
        self.pulling = false;
    }

    /// Claim the one-time end-of-data notification. Returns true exactly
    /// once per stream, and latches `ended` on the way.
    pub fn claim_end_notification(&mut self) -> bool {
        if self.end_emitted {
            return false;
        }
        self.ended = true;
        self.end_emitted = true;
        true
    }

    pub fn end_emitted(&self) -> bool {
        self.end_emitted
    }

    /// Append a chunk at the back of the queue. Zero-size chunks are
    /// dropped; returns whether the chunk was queued.
    pub fn push(&mut self, chunk: C) -> bool {
        let size = chunk.size();
        if size == 0 {
            return false;
        }
        self.total_size += size;
        self.chunks.push_back(chunk);
        true
    }

    /// Consume exactly `n` units from the front of the queue, splitting the
    /// last chunk touched if needed. `n` is clamped to `total_size`;
    /// returns `None` when nothing would be consumed.
    pub fn take(&mut self, n: usize) -> Option<C> {
        let n = n.min(self.total_size);
        if n == 0 {
            return None;
        }

        let mut parts = Vec::new();
        let mut remaining = n;
        while remaining > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.size() <= remaining {
                if let Some(chunk) = self.chunks.pop_front() {
                    remaining -= chunk.size();
                    parts.push(chunk);
                }
            } else {
                parts.push(front.split_to(remaining));
                remaining = 0;
            }
        }

        self.total_size -= n - remaining;
        Some(C::concat(parts))
    }

    /// Consume everything buffered.
    pub fn take_all(&mut self) -> Option<C> {
        self.take(self.total_size)
    }

    #[cfg(test)]
    pub(crate) fn queued_sizes_sum(&self) -> usize {
        self.chunks.iter().map(Chunk::size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> BufferState<Vec<u8>> {
        BufferState::new(StreamOptions::default())
    }

    #[test]
    fn push_tracks_total_size() {
        let mut buf = state();
        buf.push(b"abc".to_vec());
        buf.push(b"de".to_vec());

        assert_eq!(buf.total_size(), 5);
        assert_eq!(buf.chunk_count(), 2);
        assert_eq!(buf.total_size(), buf.queued_sizes_sum());
    }

    #[test]
    fn zero_size_chunks_are_not_queued() {
        let mut buf = state();
        assert!(!buf.push(Vec::new()));
        assert_eq!(buf.chunk_count(), 0);
    }

    #[test]
    fn take_splits_across_chunk_boundaries() {
        let mut buf = state();
        buf.push(b"abc".to_vec());
        buf.push(b"def".to_vec());

        assert_eq!(buf.take(4), Some(b"abcd".to_vec()));
        assert_eq!(buf.total_size(), 2);
        assert_eq!(buf.take(10), Some(b"ef".to_vec()));
        assert!(buf.is_empty());
        assert_eq!(buf.take(1), None);
    }

    #[test]
    fn total_size_matches_queue_after_mixed_operations() {
        let mut buf = state();
        let script: [(bool, usize); 8] = [
            (true, 7),
            (false, 3),
            (true, 1),
            (true, 12),
            (false, 9),
            (false, 0),
            (true, 4),
            (false, 100),
        ];
        for (is_push, n) in script {
            if is_push {
                buf.push(vec![0u8; n]);
            } else {
                buf.take(n);
            }
            assert_eq!(buf.total_size(), buf.queued_sizes_sum());
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn end_notification_is_claimed_once() {
        let mut buf = state();
        assert!(buf.claim_end_notification());
        assert!(!buf.claim_end_notification());
        assert!(buf.is_ended());
    }

    #[test]
    fn low_water_mark_is_a_strict_threshold() {
        let mut buf = BufferState::new(StreamOptions::default().with_low_water_mark(4));
        buf.push(vec![0u8; 3]);
        assert!(buf.is_below_low_water_mark());
        buf.push(vec![0u8; 1]);
        assert!(!buf.is_below_low_water_mark());
    }
}
