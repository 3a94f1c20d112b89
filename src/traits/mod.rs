pub mod chunk;
pub mod foreign;
pub mod sink;
pub mod source;
pub mod step;

pub use chunk::Chunk;
pub use foreign::{ForeignEvent, ForeignListener, ForeignSource};
pub use sink::Sink;
pub use source::{source_fn, FnSource, IterSource, NoSource, PullCallback, Pulled, Source};
pub use step::{transform_fn, FnStep, PassThrough, StepCallback, TransformStep};
