use thiserror::Error;

use crate::memory::BlockKind;

/// Errors reported by queue operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("operation on an absent queue")]
    InvalidHandle,

    #[error("queue is empty")]
    Empty,

    #[error("could not allocate {kind} block of {size} bytes")]
    AllocationFailure { kind: BlockKind, size: usize },

    #[error("corrupt queue: {0}")]
    Corrupt(String),
}

impl QueueError {
    pub fn is_allocation_failure(&self) -> bool {
        matches!(self, QueueError::AllocationFailure { .. })
    }
}

/// Errors reported by an [`Allocator`](crate::memory::Allocator).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("allocation of {kind} block refused by fail policy")]
    Refused { kind: BlockKind },

    #[error("out of memory allocating {size} bytes")]
    OutOfMemory { size: usize },

    #[error("{blocks} {kind} block(s) ({bytes} bytes) still allocated")]
    Leaked {
        kind: BlockKind,
        blocks: usize,
        bytes: usize,
    },

    #[error("{kind} block released more times than it was allocated")]
    DoubleFree { kind: BlockKind },
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors raised while reading or running console commands.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{file}:{line}:{column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("value {value} out of range for option '{name}'")]
    InvalidOption { name: String, value: i64 },

    #[error("{0}")]
    Check(String),

    #[error("error limit of {0} reached")]
    ErrorLimit(usize),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
