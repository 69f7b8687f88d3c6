use std::fmt::{self, Display};
use std::sync::Arc;

use crate::error::AllocError;

/// What a queue is allocating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Header,
    Node,
    Payload,
}

impl BlockKind {
    pub const ALL: [BlockKind; 3] = [BlockKind::Header, BlockKind::Node, BlockKind::Payload];

    pub fn index(self) -> usize {
        match self {
            BlockKind::Header => 0,
            BlockKind::Node => 1,
            BlockKind::Payload => 2,
        }
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKind::Header => write!(f, "header"),
            BlockKind::Node => write!(f, "node"),
            BlockKind::Payload => write!(f, "payload"),
        }
    }
}

/// Gate through which every queue allocation passes.
///
/// `acquire` is called before a block is created and may refuse it; `release`
/// is called exactly once for every successful `acquire` when the block is
/// freed. Implementations use interior mutability so a single allocator can be
/// shared between a queue and whoever inspects it.
pub trait Allocator {
    fn acquire(&self, kind: BlockKind, size: usize) -> Result<(), AllocError>;

    fn release(&self, kind: BlockKind, size: usize);
}

/// The process allocator. Never refuses a block.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn acquire(&self, _kind: BlockKind, _size: usize) -> Result<(), AllocError> {
        Ok(())
    }

    fn release(&self, _kind: BlockKind, _size: usize) {}
}

impl<A: Allocator + ?Sized> Allocator for &A {
    fn acquire(&self, kind: BlockKind, size: usize) -> Result<(), AllocError> {
        (**self).acquire(kind, size)
    }

    fn release(&self, kind: BlockKind, size: usize) {
        (**self).release(kind, size)
    }
}

impl<A: Allocator + ?Sized> Allocator for Arc<A> {
    fn acquire(&self, kind: BlockKind, size: usize) -> Result<(), AllocError> {
        (**self).acquire(kind, size)
    }

    fn release(&self, kind: BlockKind, size: usize) {
        (**self).release(kind, size)
    }
}

/// Copies `bytes` into a fresh buffer of exactly `bytes.len() + 1` bytes, the
/// last one being a NUL terminator.
///
/// The reservation is fallible so an exhausted heap surfaces as an error
/// instead of aborting the process.
pub fn copy_terminated(bytes: &[u8]) -> Result<Box<[u8]>, AllocError> {
    let size = bytes.len() + 1;
    let mut buffer: Vec<u8> = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| AllocError::OutOfMemory { size })?;
    buffer.extend_from_slice(bytes);
    buffer.push(0);
    Ok(buffer.into_boxed_slice())
}
