//! Pending register writes
//!
//! Writes are submitted by the host emulator ahead of simulated time and
//! applied by the clock stepper, one per full cycle, strictly in submission
//! order.

use crate::{HarnessError, Result, SID_REGISTER_COUNT};
use std::collections::VecDeque;

/// Default bound on queued writes
///
/// A full SID register dump is 25 writes, so this covers thousands of frames
/// of backlog before the host is told to slow down.
pub const DEFAULT_QUEUE_CAPACITY: usize = 65_536;

/// A single register write waiting to be strobed onto the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    register: u8,
    value: u8,
}

impl PendingWrite {
    /// Create a write, rejecting addresses outside 0..=31
    pub fn new(register: u8, value: u8) -> Result<Self> {
        if register >= SID_REGISTER_COUNT {
            return Err(HarnessError::InvalidRegister(register));
        }
        Ok(Self { register, value })
    }

    /// Register address (0-31)
    pub fn register(&self) -> u8 {
        self.register
    }

    /// Value to write
    pub fn value(&self) -> u8 {
        self.value
    }
}

/// Bounded FIFO of pending writes
///
/// No peeking, reordering or coalescing: two writes to the same register are
/// both delivered, in order.
#[derive(Debug, Clone)]
pub struct WriteQueue {
    entries: VecDeque<PendingWrite>,
    capacity: usize,
}

impl WriteQueue {
    /// Create a queue holding at most `capacity` writes
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "write queue must hold at least one entry");
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append a write to the tail
    ///
    /// Returns [`HarnessError::QueueFull`] and leaves the queue untouched when
    /// the bound is reached.
    pub fn enqueue(&mut self, write: PendingWrite) -> Result<()> {
        if self.entries.len() >= self.capacity {
            return Err(HarnessError::QueueFull {
                capacity: self.capacity,
            });
        }
        self.entries.push_back(write);
        Ok(())
    }

    /// Remove and return the head, if any
    pub fn dequeue_if_any(&mut self) -> Option<PendingWrite> {
        self.entries.pop_front()
    }

    /// Number of writes waiting
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is waiting
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured bound
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all pending writes, returning how many were discarded
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

impl Default for WriteQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
