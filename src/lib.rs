//! A double-ended queue of owned byte strings on a singly linked chain, with
//! an instrumented allocator and a command console for exercising it.

pub mod config;
pub mod console;
pub mod error;
pub mod handle;
pub mod memory;
pub mod queue;

pub use error::{AllocError, CommandError, QueueError, Result};
pub use handle::QueueHandle;
pub use memory::{Allocator, BlockKind, FailPolicy, Harness, SystemAllocator};
pub use queue::{bounded_copy, Iter, Queue};
