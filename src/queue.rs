use std::collections::VecDeque;

use tracing::warn;

/// Bounded FIFO between the terminal and the consumer of its events.
///
/// When full, the oldest entry is dropped to make room for the new one so
/// that the most recent input is never lost.
#[derive(Debug)]
pub struct EventQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    dropped: usize,
}

impl<T> EventQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Appends an item, returning the entry that was evicted to make room.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.dropped += 1;
            warn!("Event queue full ({}), dropping oldest event", self.capacity);
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Number of events evicted since creation.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_fifo_order() {
        let mut queue = EventQueue::new(4);
        queue.push(1);
        queue.push(2);
        queue.push(3);

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut queue = EventQueue::new(2);
        assert_eq!(queue.push('a'), None);
        assert_eq!(queue.push('b'), None);
        assert_eq!(queue.push('c'), Some('a'));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.pop(), Some('b'));
        assert_eq!(queue.pop(), Some('c'));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut queue = EventQueue::new(0);
        queue.push(7);
        assert_eq!(queue.pop(), Some(7));
    }
}
