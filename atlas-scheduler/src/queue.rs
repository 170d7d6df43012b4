use atlas_types::Job;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;
use tokio::sync::Notify;

struct ReadyEntry {
    priority: i32,
    seq: u64,
    job: Job,
}

impl PartialEq for ReadyEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for ReadyEntry {}

impl Ord for ReadyEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; among equals, earlier arrival first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for ReadyEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of dispatchable jobs. Not strictly FIFO: higher priority
/// always pops before lower while both are present.
#[derive(Default)]
pub struct ReadyQueue {
    heap: Mutex<BinaryHeap<ReadyEntry>>,
    seq: AtomicU64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: Job) {
        let entry = ReadyEntry {
            priority: job.priority,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            job,
        };
        self.heap.lock().unwrap().push(entry);
    }

    pub fn pop(&self) -> Option<Job> {
        self.heap.lock().unwrap().pop().map(|e| e.job)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().unwrap().is_empty()
    }
}

struct DelayedEntry {
    scheduled_at: DateTime<Utc>,
    seq: u64,
    job: Job,
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.scheduled_at == other.scheduled_at && self.seq == other.seq
    }
}
impl Eq for DelayedEntry {}

impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the soonest deadline sits on top of the max-heap.
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Time-ordered waiting room for delayed jobs. `take_due` blocks until the
/// earliest scheduled time arrives, waking early when a sooner job is pushed.
#[derive(Default)]
pub struct DelayQueue {
    heap: Mutex<BinaryHeap<DelayedEntry>>,
    notify: Notify,
    seq: AtomicU64,
}

impl DelayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, job: Job) {
        let entry = DelayedEntry {
            scheduled_at: job.scheduled_at,
            seq: self.seq.fetch_add(1, AtomicOrdering::Relaxed),
            job,
        };
        self.heap.lock().unwrap().push(entry);
        self.notify.notify_one();
    }

    /// Blocks until the soonest job is due, then removes and returns it.
    pub async fn take_due(&self) -> Job {
        loop {
            let wait = {
                let mut heap = self.heap.lock().unwrap();
                let now = Utc::now();
                match heap.peek() {
                    Some(top) if top.scheduled_at <= now => {
                        return heap.pop().map(|e| e.job).unwrap();
                    }
                    Some(top) => Some(top.scheduled_at - now),
                    None => None,
                }
            };

            match wait.and_then(|d| d.to_std().ok()) {
                Some(dur) => {
                    tokio::select! {
                        _ = tokio::time::sleep(dur) => {}
                        _ = self.notify.notified() => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::{PRIORITY_HIGH, PRIORITY_LOW, PRIORITY_NORMAL};
    use std::time::Duration;

    #[test]
    fn higher_priority_pops_first() {
        let queue = ReadyQueue::new();
        queue.push(Job::new("TEST|low", PRIORITY_LOW, 0));
        queue.push(Job::new("TEST|high", PRIORITY_HIGH, 0));
        queue.push(Job::new("TEST|normal", PRIORITY_NORMAL, 0));

        assert_eq!(queue.pop().unwrap().payload, "TEST|high");
        assert_eq!(queue.pop().unwrap().payload, "TEST|normal");
        assert_eq!(queue.pop().unwrap().payload, "TEST|low");
        assert!(queue.pop().is_none());
    }

    #[test]
    fn equal_priority_keeps_arrival_order() {
        let queue = ReadyQueue::new();
        for i in 0..5 {
            queue.push(Job::new(format!("TEST|{i}"), PRIORITY_NORMAL, 0));
        }
        for i in 0..5 {
            assert_eq!(queue.pop().unwrap().payload, format!("TEST|{i}"));
        }
    }

    #[tokio::test]
    async fn due_job_is_returned_immediately() {
        let queue = DelayQueue::new();
        queue.push(Job::new("TEST|x", PRIORITY_NORMAL, 0));
        let job = tokio::time::timeout(Duration::from_millis(100), queue.take_due())
            .await
            .expect("due job should not block");
        assert_eq!(job.payload, "TEST|x");
    }

    #[tokio::test]
    async fn waits_until_scheduled_time() {
        let queue = DelayQueue::new();
        queue.push(Job::new("TEST|x", PRIORITY_NORMAL, 150));

        let early = tokio::time::timeout(Duration::from_millis(30), queue.take_due()).await;
        assert!(early.is_err(), "job must not surface before its deadline");

        let job = tokio::time::timeout(Duration::from_millis(500), queue.take_due())
            .await
            .expect("job should surface once due");
        assert_eq!(job.payload, "TEST|x");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn sooner_push_preempts_the_current_wait() {
        let queue = std::sync::Arc::new(DelayQueue::new());
        queue.push(Job::new("TEST|late", PRIORITY_NORMAL, 2_000));

        let q = queue.clone();
        let waiter = tokio::spawn(async move { q.take_due().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(Job::new("TEST|soon", PRIORITY_NORMAL, 50));

        let job = tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .expect("sooner job should wake the waiter")
            .unwrap();
        assert_eq!(job.payload, "TEST|soon");
        assert_eq!(queue.len(), 1);
    }
}
