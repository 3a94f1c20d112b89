/// Default producer-side prefetch unit (units requested per pull)
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;
/// Default buffered size below which prefetching is triggered
pub const DEFAULT_LOW_WATER_MARK: usize = 1024;
/// Default queued size at which a writable starts signalling backpressure
pub const DEFAULT_HIGH_WATER_MARK: usize = 16 * 1024;
/// Default queued size at or below which a backpressured writable drains
pub const DEFAULT_WRITABLE_LOW_WATER_MARK: usize = 1024;
