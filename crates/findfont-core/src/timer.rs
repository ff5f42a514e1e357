#![forbid(unsafe_code)]

//! Cancellable timers on a host-supplied clock.
//!
//! [`TimerQueue`] stores tasks as data with absolute deadlines; nothing here
//! sleeps or owns an event loop. The host reports the current time and the
//! owner drains due tasks with [`TimerQueue::pop_due`].
//!
//! [`Debouncer`] layers trailing-edge debounce on top: each `schedule`
//! cancels the previous pending timer, so only the last call in a window
//! fires.

use std::time::Duration;

/// Handle for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<T> {
    id: TimerId,
    deadline: Duration,
    task: T,
}

/// Deadline-ordered task queue.
#[derive(Debug)]
pub struct TimerQueue<T> {
    // Sorted by (deadline, id); ids grow monotonically so equal deadlines stay FIFO.
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl<T> TimerQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run `delay` after `now`.
    pub fn schedule(&mut self, now: Duration, delay: Duration, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let deadline = now.saturating_add(delay);
        let pos = self
            .entries
            .partition_point(|entry| (entry.deadline, entry.id) <= (deadline, id));
        self.entries.insert(pos, Entry { id, deadline, task });
        id
    }

    /// Cancel a pending task. Returns `false` if it already ran or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove and return the earliest task whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<T> {
        if self.entries.first()?.deadline <= now {
            Some(self.entries.remove(0).task)
        } else {
            None
        }
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.entries.first().map(|entry| entry.deadline)
    }

    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Trailing-edge debounce over a [`TimerQueue`].
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<TimerId>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending call with `task`, due one window from `now`.
    pub fn schedule<T>(&mut self, queue: &mut TimerQueue<T>, now: Duration, task: T) -> TimerId {
        self.cancel(queue);
        let id = queue.schedule(now, self.delay, task);
        self.pending = Some(id);
        id
    }

    /// Cancel the pending call, if any.
    pub fn cancel<T>(&mut self, queue: &mut TimerQueue<T>) -> bool {
        self.pending.take().is_some_and(|id| queue.cancel(id))
    }

    /// Forget the pending id once its task has been popped.
    pub fn fired(&mut self) {
        self.pending = None;
    }

    #[must_use]
    pub fn is_pending<T>(&self, queue: &TimerQueue<T>) -> bool {
        self.pending.is_some_and(|id| queue.is_pending(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn tasks_pop_in_deadline_order() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(0), ms(30), "late");
        queue.schedule(ms(0), ms(10), "early");
        assert_eq!(queue.pop_due(ms(5)), None);
        assert_eq!(queue.pop_due(ms(40)), Some("early"));
        assert_eq!(queue.pop_due(ms(40)), Some("late"));
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_deadlines_are_fifo() {
        let mut queue = TimerQueue::new();
        queue.schedule(ms(0), ms(10), 1);
        queue.schedule(ms(0), ms(10), 2);
        queue.schedule(ms(0), ms(10), 3);
        let order: Vec<_> = std::iter::from_fn(|| queue.pop_due(ms(10))).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn cancel_removes_task_once() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule(ms(0), ms(10), ());
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert_eq!(queue.pop_due(ms(100)), None);
    }

    #[test]
    fn debounce_keeps_only_last_call() {
        let mut queue = TimerQueue::new();
        let mut debounce = Debouncer::new(ms(150));
        debounce.schedule(&mut queue, ms(0), "first");
        debounce.schedule(&mut queue, ms(100), "second");
        debounce.schedule(&mut queue, ms(200), "third");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_due(ms(349)), None);
        assert_eq!(queue.pop_due(ms(350)), Some("third"));
    }

    #[test]
    fn debounce_cancel_clears_pending() {
        let mut queue = TimerQueue::new();
        let mut debounce = Debouncer::new(ms(150));
        debounce.schedule(&mut queue, ms(0), ());
        assert!(debounce.is_pending(&queue));
        assert!(debounce.cancel(&mut queue));
        assert!(!debounce.is_pending(&queue));
        assert!(!debounce.cancel(&mut queue));
        assert!(queue.is_empty());
    }
}
