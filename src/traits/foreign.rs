// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::StreamError;

/// Notification emitted by an externally push-driven source.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignEvent<C> {
    Data(C),
    End,
    Error(StreamError),
    Close,
    Destroy,
    Pause,
    Resume,
}

pub type ForeignListener<C> = Box<dyn Fn(ForeignEvent<C>)>;

/// A source that pushes data at its own pace and offers no pull contract,
/// only notifications plus a pause/resume valve.
///
/// See [`Readable::wrap`](crate::engine::Readable::wrap).
pub trait ForeignSource<C> {
    /// Register the single listener that receives every notification.
    fn subscribe(&self, listener: ForeignListener<C>);

    /// Stop emitting data until `resume` is called.
    fn pause(&self);

    fn resume(&self);
}
