//! Priority task queue with delayed entries.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

pub(crate) type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling priority. Higher priorities run first; equal priorities run
/// in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Idle,
    Normal,
    High,
    Now,
}

struct ReadyTask {
    priority: Priority,
    seq: u64,
    task: Task,
}

impl PartialEq for ReadyTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ReadyTask {}

impl PartialOrd for ReadyTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReadyTask {
    // Max-heap: highest priority first, then lowest sequence number
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct DelayedTask {
    deadline: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for DelayedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DelayedTask {}

impl PartialOrd for DelayedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

#[derive(Default)]
pub(crate) struct TaskQueue {
    ready: BinaryHeap<ReadyTask>,
    delayed: BinaryHeap<Reverse<DelayedTask>>,
    next_seq: u64,
}

impl TaskQueue {
    fn seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub fn push(&mut self, priority: Priority, task: Task) {
        let seq = self.seq();
        self.ready.push(ReadyTask {
            priority,
            seq,
            task,
        });
    }

    pub fn push_delayed(&mut self, deadline: Instant, task: Task) {
        let seq = self.seq();
        self.delayed.push(Reverse(DelayedTask {
            deadline,
            seq,
            task,
        }));
    }

    /// Move every delayed task whose deadline has passed into the ready
    /// queue at normal priority.
    pub fn promote_due(&mut self, now: Instant) -> usize {
        let mut promoted = 0;
        while self
            .delayed
            .peek()
            .is_some_and(|Reverse(t)| t.deadline <= now)
        {
            if let Some(Reverse(due)) = self.delayed.pop() {
                let seq = self.seq();
                self.ready.push(ReadyTask {
                    priority: Priority::Normal,
                    seq,
                    task: due.task,
                });
                promoted += 1;
            }
        }
        promoted
    }

    pub fn pop(&mut self) -> Option<Task> {
        self.ready.pop().map(|t| t.task)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.delayed.peek().map(|Reverse(t)| t.deadline)
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Discard delayed tasks that never became due.
    pub fn clear_delayed(&mut self) -> usize {
        let count = self.delayed.len();
        self.delayed.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Task {
        let log = log.clone();
        Box::new(move || log.lock().unwrap().push(label))
    }

    fn drain(queue: &mut TaskQueue) {
        while let Some(task) = queue.pop() {
            task();
        }
    }

    #[test]
    fn test_priority_then_fifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::default();

        queue.push(Priority::Idle, recording(&log, "idle"));
        queue.push(Priority::Normal, recording(&log, "normal-1"));
        queue.push(Priority::High, recording(&log, "high"));
        queue.push(Priority::Normal, recording(&log, "normal-2"));
        queue.push(Priority::Now, recording(&log, "now"));
        queue.push(Priority::Normal, recording(&log, "normal-3"));

        drain(&mut queue);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["now", "high", "normal-1", "normal-2", "normal-3", "idle"]
        );
    }

    #[test]
    fn test_delayed_promotion() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = TaskQueue::default();
        let start = Instant::now();

        queue.push_delayed(start + Duration::from_millis(20), recording(&log, "late"));
        queue.push_delayed(start + Duration::from_millis(10), recording(&log, "early"));
        assert_eq!(queue.next_deadline(), Some(start + Duration::from_millis(10)));

        assert_eq!(queue.promote_due(start), 0);
        assert!(queue.pop().is_none());

        assert_eq!(queue.promote_due(start + Duration::from_millis(15)), 1);
        queue.push(Priority::Normal, recording(&log, "submitted"));
        drain(&mut queue);

        assert_eq!(queue.promote_due(start + Duration::from_millis(25)), 1);
        drain(&mut queue);

        assert_eq!(*log.lock().unwrap(), vec!["early", "submitted", "late"]);
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_clear_delayed() {
        let mut queue = TaskQueue::default();
        queue.push_delayed(Instant::now() + Duration::from_secs(60), Box::new(|| {}));
        queue.push(Priority::Normal, Box::new(|| {}));

        assert_eq!(queue.clear_delayed(), 1);
        assert_eq!(queue.ready_len(), 1);
    }
}
