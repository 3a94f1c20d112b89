use crate::engine::Emitter;
use crate::traits::Chunk;

/// A downstream consumer a readable can pipe into.
///
/// This is the push-side contract: `write` answers `false` to signal
/// backpressure, and the sink later raises [`Event::Drain`] on its emitter
/// exactly when that backpressure clears. Piping also raises
/// [`Event::Pipe`] and [`Event::Unpipe`] on the sink's emitter.
///
/// [`Event::Drain`]: crate::engine::Event::Drain
/// [`Event::Pipe`]: crate::engine::Event::Pipe
/// [`Event::Unpipe`]: crate::engine::Event::Unpipe
pub trait Sink<C: Chunk> {
    /// Accept a chunk. `false` means "stop until I drain".
    fn write(&self, chunk: C) -> bool;

    /// No more chunks will be written.
    fn end(&self);

    fn events(&self) -> &Emitter<C>;
}
