use crate::error::{QueueError, Result};
use crate::memory::Allocator;
use crate::queue::Queue;

/// Queue operations on a possibly absent queue.
///
/// An absent queue never panics: mutators report `InvalidHandle`, `q_size`
/// reports zero and `q_reverse`/`q_sort` do nothing.
pub trait QueueHandle {
    fn q_insert_head(&mut self, s: &[u8]) -> Result<()>;

    fn q_insert_tail(&mut self, s: &[u8]) -> Result<()>;

    fn q_remove_head(&mut self, out: Option<&mut [u8]>) -> Result<usize>;

    fn q_size(&self) -> usize;

    fn q_reverse(&mut self);

    fn q_sort(&mut self);

    /// Frees the queue, if any, leaving the handle absent.
    fn q_free(&mut self);
}

impl<A: Allocator> QueueHandle for Option<Queue<A>> {
    fn q_insert_head(&mut self, s: &[u8]) -> Result<()> {
        self.as_mut()
            .ok_or(QueueError::InvalidHandle)?
            .insert_head(s)
    }

    fn q_insert_tail(&mut self, s: &[u8]) -> Result<()> {
        self.as_mut()
            .ok_or(QueueError::InvalidHandle)?
            .insert_tail(s)
    }

    fn q_remove_head(&mut self, out: Option<&mut [u8]>) -> Result<usize> {
        self.as_mut()
            .ok_or(QueueError::InvalidHandle)?
            .remove_head(out)
    }

    fn q_size(&self) -> usize {
        self.as_ref().map_or(0, |q| q.size())
    }

    fn q_reverse(&mut self) {
        if let Some(q) = self {
            q.reverse();
        }
    }

    fn q_sort(&mut self) {
        if let Some(q) = self {
            q.sort();
        }
    }

    fn q_free(&mut self) {
        if let Some(q) = self.take() {
            q.free();
        }
    }
}
