use std::collections::VecDeque;
use uuid::Uuid;

/// FIFO queue of task ids awaiting an agent.
///
/// Priority is not consulted: requeued and retried tasks go to the tail.
#[derive(Debug, Default)]
pub struct TaskQueue {
    ids: VecDeque<Uuid>,
}

impl TaskQueue {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task at the tail.
    pub fn push(&mut self, id: Uuid) {
        self.ids.push_back(id);
    }

    /// Take the task at the head.
    pub fn pop(&mut self) -> Option<Uuid> {
        self.ids.pop_front()
    }

    /// Whether `id` is waiting.
    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    /// Number of queued ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_queue() {
        let mut queue = TaskQueue::new();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_fifo_order_with_requeue_at_tail() {
        let mut queue = TaskQueue::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        queue.push(a);
        queue.push(b);
        queue.push(c);

        let head = queue.pop().unwrap_or_default();
        assert_eq!(head, a);
        queue.push(head);

        let order: Vec<Uuid> = std::iter::from_fn(|| queue.pop()).collect();
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn test_contains_and_len() {
        let mut queue = TaskQueue::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        queue.push(a);
        queue.push(b);
        assert!(queue.contains(a));
        assert_eq!(queue.pop(), Some(a));
        assert!(!queue.contains(a));
        assert_eq!(queue.len(), 1);
    }
}
