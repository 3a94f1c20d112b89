// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Legacy push mode.
//!
//! A stream switches to push mode, once and for good, the first time a
//! [`EventKind::Data`] listener is registered while it is not flowing. From
//! then on every availability notification drains the buffer with `read`
//! and re-broadcasts each chunk as [`Event::Data`]. `pause` and `resume`
//! only gate that delivery; reads keep filling the buffer underneath.

use crate::engine::events::{Event, EventKind, ListenerId};
use crate::engine::readable::Readable;
use crate::errors::StreamError;
use crate::observability::messages::readable::PushModeEntered;
use crate::observability::messages::StructuredLog;
use crate::traits::Chunk;

#[derive(Debug, Default)]
pub(crate) struct PushState {
    paused: bool,
    /// Data became available and has not been fully drained yet.
    readable: bool,
}

impl<C: Chunk> Readable<C> {
    /// Register a [`EventKind::Data`] listener, switching the stream to push
    /// mode if it is not flowing yet. A stream that is already flowing
    /// (piped, or in push mode) just gains the listener.
    pub fn on_data(&self, listener: impl Fn(&Event<C>) + 'static) -> ListenerId {
        let id = self.inner.events.on(EventKind::Data, listener);
        if !self.is_flowing() {
            self.switch_to_push_mode();
        }
        id
    }

    /// Commit the stream to push mode.
    ///
    /// Fails with [`StreamError::AlreadyFlowing`] if the stream is already
    /// flowing; there is no way back to pull mode.
    pub fn enter_push_mode(&self) -> Result<(), StreamError> {
        if self.is_flowing() {
            return Err(StreamError::AlreadyFlowing);
        }
        self.switch_to_push_mode();
        Ok(())
    }

    /// Commit to push mode on behalf of a caller that has already checked
    /// the stream is not flowing.
    pub(crate) fn switch_to_push_mode(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            debug_assert!(!state.flow.flowing, "push mode entered on a flowing stream");
            state.flow.flowing = true;
            state.flow.push = Some(PushState::default());
        }
        PushModeEntered { stream: self.id() }.log();

        // Kick off delivery of whatever is (or will be) available.
        self.schedule_readable();
    }

    pub fn is_push_mode(&self) -> bool {
        self.state().flow.push.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.state()
            .flow
            .push
            .as_ref()
            .is_some_and(|push| push.paused)
    }

    /// Stop delivering [`Event::Data`]. Enters push mode first if needed.
    pub fn pause(&self) -> Result<(), StreamError> {
        if !self.is_push_mode() {
            self.enter_push_mode()?;
        }
        if let Some(push) = self.inner.state.borrow_mut().flow.push.as_mut() {
            push.paused = true;
        }
        self.inner.events.emit(&Event::Pause);
        Ok(())
    }

    /// Resume delivery. Data that became available while paused is
    /// announced again right away.
    pub fn resume(&self) -> Result<(), StreamError> {
        if !self.is_push_mode() {
            self.enter_push_mode()?;
        }
        let available = {
            let mut state = self.inner.state.borrow_mut();
            match state.flow.push.as_mut() {
                Some(push) => {
                    push.paused = false;
                    push.readable
                }
                None => false,
            }
        };
        if available {
            self.schedule_readable();
        } else {
            self.drain_push_mode();
        }
        self.inner.events.emit(&Event::Resume);
        Ok(())
    }

    /// Drain the buffer into [`Event::Data`], and into any piped sinks,
    /// until a read yields nothing, delivery is paused, or a sink pushes
    /// back.
    pub(crate) fn drain_push_mode(&self) {
        loop {
            {
                let mut state = self.inner.state.borrow_mut();
                let Some(push) = state.flow.push.as_mut() else {
                    return;
                };
                push.readable = true;
                if push.paused {
                    return;
                }
            }
            if self.awaiting_release() > 0 {
                return;
            }

            match self.read(None) {
                Some(chunk) => self.deliver(chunk),
                None => {
                    let mut state = self.inner.state.borrow_mut();
                    if let Some(push) = state.flow.push.as_mut() {
                        push.readable = false;
                    }
                    if !state.buffer.is_ended() {
                        state.buffer.need_notify = true;
                    }
                    return;
                }
            }
        }
    }
}
