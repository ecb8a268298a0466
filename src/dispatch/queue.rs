use std::collections::VecDeque;

use super::Priority;

/// Two FIFO lanes of waiting items: [urgent][Priority::Urgent] and
/// [normal][Priority::Normal].
///
/// [`pop`][PriorityQueue::pop] takes from the urgent lane for as long as it is
/// non-empty, regardless of how long normal items have waited.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    urgent: VecDeque<T>,
    normal: VecDeque<T>,
}

impl<T> PriorityQueue<T> {
    pub const fn new() -> Self {
        Self {
            urgent: VecDeque::new(),
            normal: VecDeque::new(),
        }
    }

    /// Append an item to the tail of the `priority` lane.
    pub fn push(&mut self, item: T, priority: Priority) {
        match priority {
            Priority::Urgent => self.urgent.push_back(item),
            Priority::Normal => self.normal.push_back(item),
        }
    }

    /// Remove the oldest urgent item, or if there are none, the oldest normal
    /// item.
    pub fn pop(&mut self) -> Option<T> {
        self.urgent.pop_front().or_else(|| self.normal.pop_front())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.urgent.len() + self.normal.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.urgent.is_empty() && self.normal.is_empty()
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
