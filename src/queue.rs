use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr::NonNull;

use tracing::{debug, trace, warn};

use crate::error::{QueueError, Result};
use crate::memory::allocator::copy_terminated;
use crate::memory::{Allocator, BlockKind, SystemAllocator};

type Link = Option<NonNull<Node>>;

struct Node {
    /// String bytes followed by a single NUL terminator.
    value: Box<[u8]>,
    next: Link,
}

impl Node {
    fn bytes(&self) -> &[u8] {
        &self.value[..self.value.len() - 1]
    }
}

/// Double-ended queue of owned byte strings on a singly linked chain.
///
/// Nodes are leaked out of their `Box` on insertion and reclaimed with
/// `Box::from_raw` on removal or teardown, so `head`, every `next` link and
/// `tail` are plain raw pointers into the same chain and none of them claims
/// unique ownership over another.
pub struct Queue<A: Allocator = SystemAllocator> {
    head: Link,
    tail: Link,
    len: usize,
    alloc: A,
    _owns: PhantomData<Box<Node>>,
}

// Every node is reachable only through this queue.
unsafe impl<A: Allocator + Send> Send for Queue<A> {}

impl Queue<SystemAllocator> {
    pub fn new() -> Queue<SystemAllocator> {
        Queue::unaccounted(SystemAllocator)
    }
}

impl Default for Queue<SystemAllocator> {
    fn default() -> Self {
        Queue::new()
    }
}

impl<A: Allocator> Queue<A> {
    fn unaccounted(alloc: A) -> Queue<A> {
        Queue {
            head: None,
            tail: None,
            len: 0,
            alloc,
            _owns: PhantomData,
        }
    }

    /// Creates an empty queue whose blocks are accounted by `alloc`.
    pub fn with_allocator(alloc: A) -> Result<Queue<A>> {
        let size = size_of::<Self>();
        alloc
            .acquire(BlockKind::Header, size)
            .map_err(|_| QueueError::AllocationFailure {
                kind: BlockKind::Header,
                size,
            })?;
        Ok(Queue::unaccounted(alloc))
    }

    pub fn allocator(&self) -> &A {
        &self.alloc
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Releases every node and payload, then the queue itself.
    pub fn free(self) {
        drop(self)
    }

    /// Builds a detached node. Nothing stays acquired when this fails.
    fn new_node(&self, s: &[u8]) -> Result<NonNull<Node>> {
        let node_size = size_of::<Node>();
        self.alloc
            .acquire(BlockKind::Node, node_size)
            .map_err(|_| QueueError::AllocationFailure {
                kind: BlockKind::Node,
                size: node_size,
            })?;

        let payload_size = s.len() + 1;
        let value = self
            .alloc
            .acquire(BlockKind::Payload, payload_size)
            .and_then(|_| {
                copy_terminated(s).map_err(|e| {
                    self.alloc.release(BlockKind::Payload, payload_size);
                    e
                })
            });
        match value {
            Ok(value) => Ok(NonNull::from(Box::leak(Box::new(Node {
                value,
                next: None,
            })))),
            Err(e) => {
                self.alloc.release(BlockKind::Node, node_size);
                warn!(error = %e, size = payload_size, "payload allocation failed");
                Err(QueueError::AllocationFailure {
                    kind: BlockKind::Payload,
                    size: payload_size,
                })
            }
        }
    }

    fn release_node(&self, node: Box<Node>) {
        self.alloc.release(BlockKind::Payload, node.value.len());
        drop(node);
        self.alloc.release(BlockKind::Node, size_of::<Node>());
    }

    /// Copies `s` into a new node placed before the current head.
    pub fn insert_head(&mut self, s: impl AsRef<[u8]>) -> Result<()> {
        let s = s.as_ref();
        let node = self.new_node(s)?;
        // SAFETY: `node` was just leaked by `new_node` and is not linked yet.
        unsafe { (*node.as_ptr()).next = self.head };
        self.head = Some(node);
        if self.tail.is_none() {
            self.tail = Some(node);
        }
        self.len += 1;
        trace!(len = self.len, bytes = s.len(), "inserted at head");
        Ok(())
    }

    /// Copies `s` into a new node placed after the current tail.
    pub fn insert_tail(&mut self, s: impl AsRef<[u8]>) -> Result<()> {
        let s = s.as_ref();
        let node = self.new_node(s)?;
        match self.tail {
            // SAFETY: `tail` is the last live node of this queue's chain.
            Some(tail) => unsafe { (*tail.as_ptr()).next = Some(node) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
        trace!(len = self.len, bytes = s.len(), "inserted at tail");
        Ok(())
    }

    /// Removes the head element.
    ///
    /// When `out` is given, up to `out.len() - 1` bytes of the removed string
    /// are copied into it followed by a NUL; longer strings are truncated.
    /// Returns the number of string bytes copied.
    pub fn remove_head(&mut self, out: Option<&mut [u8]>) -> Result<usize> {
        let head = self.head.ok_or(QueueError::Empty)?;
        // SAFETY: `head` came from `Box::leak` in `new_node` and is unlinked
        // below before anything else can reach it.
        let node = unsafe { Box::from_raw(head.as_ptr()) };
        self.head = node.next;
        if self.head.is_none() {
            self.tail = None;
        }
        self.len -= 1;

        let copied = match out {
            Some(buffer) => bounded_copy(node.bytes(), buffer),
            None => 0,
        };
        trace!(len = self.len, copied, "removed head");
        self.release_node(node);
        Ok(copied)
    }

    /// Bytes of the head element, without the terminator.
    pub fn peek_head(&self) -> Option<&[u8]> {
        // SAFETY: the head node lives as long as the shared borrow of `self`.
        self.head.map(|node| unsafe { &*node.as_ptr() }.bytes())
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            next: self.head,
            _queue: PhantomData,
        }
    }

    /// Reverses the chain in place. Nodes are relinked, never reallocated.
    pub fn reverse(&mut self) {
        if self.len <= 1 {
            return;
        }
        let old_head = self.head;
        let mut previous: Link = None;
        let mut current = self.head;
        while let Some(node) = current {
            // SAFETY: every node on the chain is live and owned by `self`.
            unsafe {
                current = (*node.as_ptr()).next;
                (*node.as_ptr()).next = previous;
            }
            previous = Some(node);
        }
        self.head = previous;
        self.tail = old_head;
        debug!(len = self.len, "reversed");
    }

    /// Stable ascending sort by byte-wise comparison of the strings.
    pub fn sort(&mut self) {
        if self.len <= 1 {
            return;
        }
        // SAFETY: the chain from `head` is well formed and owned by `self`.
        unsafe {
            self.head = merge_sort(self.head);
            self.tail = last_node(self.head);
        }
        debug!(len = self.len, "sorted");
    }

    /// Walks the chain and verifies the count, head and tail bookkeeping.
    pub fn check_invariants(&self) -> Result<()> {
        match (self.head, self.tail, self.len) {
            (None, None, 0) => return Ok(()),
            (None, _, _) | (_, None, _) | (_, _, 0) => {
                return Err(QueueError::Corrupt(format!(
                    "len {} disagrees with head/tail presence",
                    self.len
                )))
            }
            _ => {}
        }

        let mut steps = 0;
        let mut last: Link = None;
        let mut cursor = self.head;
        while let Some(node) = cursor {
            steps += 1;
            if steps > self.len {
                return Err(QueueError::Corrupt(format!(
                    "chain is longer than len {}",
                    self.len
                )));
            }
            last = Some(node);
            // SAFETY: the walk is bounded by `len`, so it stays on live nodes.
            cursor = unsafe { (*node.as_ptr()).next };
        }
        if steps != self.len {
            return Err(QueueError::Corrupt(format!(
                "chain has {} nodes but len is {}",
                steps, self.len
            )));
        }
        if last != self.tail {
            return Err(QueueError::Corrupt("tail is not the last node".into()));
        }
        Ok(())
    }
}

impl<A: Allocator> Drop for Queue<A> {
    fn drop(&mut self) {
        let freed = self.len;
        self.tail = None;
        let mut current = self.head.take();
        while let Some(node) = current {
            // SAFETY: each node is reclaimed exactly once, after its
            // successor has been read.
            let node = unsafe { Box::from_raw(node.as_ptr()) };
            current = node.next;
            self.release_node(node);
        }
        self.len = 0;
        self.alloc.release(BlockKind::Header, size_of::<Self>());
        debug!(freed, "queue freed");
    }
}

impl<A: Allocator> Debug for Queue<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(String::from_utf8_lossy))
            .finish()
    }
}

/// Front-to-back iterator over the stored strings.
pub struct Iter<'a> {
    next: Link,
    _queue: PhantomData<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.next.map(|node| {
            // SAFETY: the queue is borrowed for `'a`, so its nodes stay put.
            let node: &'a Node = unsafe { &*node.as_ptr() };
            self.next = node.next;
            node.bytes()
        })
    }
}

impl<'a, A: Allocator> IntoIterator for &'a Queue<A> {
    type Item = &'a [u8];
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Copies at most `buffer.len() - 1` bytes of `source` and terminates with NUL.
pub fn bounded_copy(source: &[u8], buffer: &mut [u8]) -> usize {
    let Some(room) = buffer.len().checked_sub(1) else {
        return 0;
    };
    let copied = source.len().min(room);
    buffer[..copied].copy_from_slice(&source[..copied]);
    buffer[copied] = 0;
    copied
}

// The helpers below take raw chains. Callers hold `&mut Queue`, so every node
// reachable from the links they pass is live and referenced nowhere else.

unsafe fn last_node(mut link: Link) -> Link {
    let mut last = None;
    while let Some(node) = link {
        last = Some(node);
        link = (*node.as_ptr()).next;
    }
    last
}

unsafe fn merge_sort(head: Link) -> Link {
    let head = match head {
        Some(node) if (*node.as_ptr()).next.is_some() => node,
        short => return short,
    };
    let back = split(head);
    let front = merge_sort(Some(head));
    let back = merge_sort(back);
    merge(front, back)
}

/// Cuts the chain after its midpoint and returns the second half.
unsafe fn split(head: NonNull<Node>) -> Link {
    // fast moves two links for every one link slow moves
    let mut slow = head;
    let mut fast = (*head.as_ptr()).next;
    while let Some(node) = fast {
        let Some(two) = (*node.as_ptr()).next else {
            break;
        };
        let Some(next) = (*slow.as_ptr()).next else {
            break;
        };
        slow = next;
        fast = (*two.as_ptr()).next;
    }
    (*slow.as_ptr()).next.take()
}

/// Splices two sorted chains into one, taking from `left` on ties.
unsafe fn merge(mut left: Link, mut right: Link) -> Link {
    let mut merged: Link = None;
    let mut last: Link = None;
    loop {
        let next = match (left, right) {
            (Some(l), Some(r)) => {
                if (*l.as_ptr()).bytes() <= (*r.as_ptr()).bytes() {
                    left = (*l.as_ptr()).next;
                    l
                } else {
                    right = (*r.as_ptr()).next;
                    r
                }
            }
            (rest, None) | (None, rest) => {
                match last {
                    Some(last) => (*last.as_ptr()).next = rest,
                    None => merged = rest,
                }
                break;
            }
        };
        match last {
            Some(last) => (*last.as_ptr()).next = Some(next),
            None => merged = Some(next),
        }
        last = Some(next);
    }
    merged
}
