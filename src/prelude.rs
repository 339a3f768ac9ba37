//! Commonly used imports
//!
//! Use `use later::prelude::*;` for quick access to the most common types
//! and functions.

// Core traits and types
pub use crate::compose::{Composable, ComposableExt, Continuation, Pipe, Stage};
pub use crate::fault::{Fault, Outcome, Stopped};
pub use crate::interrupt::{Handler, Interrupt};
pub use crate::scheduler::{Context, Scheduler};

// Primitives
pub use crate::branch::when;
pub use crate::catch::catch;
pub use crate::eventual::{Eventual, Resume};
pub use crate::finally::finally;
pub use crate::just::just;
pub use crate::raise::raise;
pub use crate::reschedule::reschedule;
pub use crate::then::{and_then, then};

// Type-erased handles
pub use crate::task::{Task, TaskOf};

// Streams
pub use crate::stream::{
    collect, flat_map, head, iterate, map, range, reduce, repeat, take, Emitter,
    Generator, Loop, Stream, StreamComposable, StreamComposableExt, StreamConsumer,
    StreamHandle,
};

// Drivers
pub use crate::terminal::{build, run, run_interruptible, terminal, terminate};
