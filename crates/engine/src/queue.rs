//! Bounded drop-oldest queues used for steering messages and method-body
//! updates (spec §4.3, §5, §9): "at most K pending messages, newest wins".

use std::collections::VecDeque;

use parking_lot::Mutex;

pub struct DropOldestQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> DropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, items: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    /// Push a new item, discarding the oldest one if already at capacity.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock();
        if items.len() >= self.capacity {
            items.pop_front();
            tracing::debug!("steering queue at capacity, dropped oldest entry");
        }
        items.push_back(item);
    }

    /// Drain every pending item in FIFO order, non-blocking.
    pub fn drain(&self) -> Vec<T> {
        let mut items = self.items.lock();
        items.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
