pub mod buffer_state;
pub mod events;
pub mod pipe;
pub mod push_mode;
pub mod readable;
pub mod scheduler;
pub mod transform;
pub mod wrap;
pub mod writable;
#[cfg(test)]
pub mod integration_tests;

pub use buffer_state::BufferState;
pub use events::{Emitter, Event, EventKind, Listener, ListenerId, StreamId};
pub use readable::Readable;
pub use scheduler::{Scheduler, Task, TaskQueue, TokioScheduler, MAX_TASKS_PER_RUN};
pub use transform::{Transform, TransformOutput};
pub use wrap::Wrapped;
pub use writable::{Writable, WriteCallback, WriteTarget};
