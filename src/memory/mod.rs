pub mod allocator;
pub mod harness;

pub use allocator::{Allocator, BlockKind, SystemAllocator};
pub use harness::{AllocStats, FailPolicy, Harness};
