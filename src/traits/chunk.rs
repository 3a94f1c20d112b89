/// One opaque unit of stream data with a measurable size.
///
/// The engine never looks inside a chunk: it only measures it, cuts a prefix
/// off the front of it, and joins consecutive pieces back together when a
/// `read` spans more than one queued chunk.
pub trait Chunk: Clone + 'static {
    /// Size of this chunk in stream units.
    fn size(&self) -> usize;

    /// Remove and return the first `at` units, leaving the remainder in
    /// `self`. Callers guarantee `0 < at < self.size()`.
    fn split_to(&mut self, at: usize) -> Self;

    /// Join pieces in order into a single chunk.
    fn concat(parts: Vec<Self>) -> Self;
}

impl<T: Clone + 'static> Chunk for Vec<T> {
    fn size(&self) -> usize {
        self.len()
    }

    fn split_to(&mut self, at: usize) -> Self {
        let tail = self.split_off(at);
        std::mem::replace(self, tail)
    }

    fn concat(parts: Vec<Self>) -> Self {
        if parts.len() == 1 {
            return parts.into_iter().next().unwrap_or_default();
        }
        parts.into_iter().flatten().collect()
    }
}
