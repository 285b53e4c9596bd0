// src/crawl/queue.rs
// =============================================================================
// The task queue shared by the driver and all workers.
//
// How it works:
// 1. enqueue() appends a task at the back and wakes one waiting consumer
// 2. dequeue() waits while the queue is empty, then pops the front task and
//    hands it out as a TaskLease
// 3. While a lease is alive the task counts as "in flight"; dropping the
//    lease (success, failure or panic unwind) finishes it
// 4. close() tells every waiting consumer that no more work will come
//
// Completion is "pending empty AND nothing in flight". Workers push their
// follow-up tasks before their lease is dropped, so once that condition holds
// no one can add more work. wait_idle() is woken by events, it never polls.
// =============================================================================

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::task::Task;
use crate::error::QueueClosed;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Task>,
    in_flight: usize,
    closed: bool,
}

impl QueueState {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }
}

#[derive(Debug, Default)]
pub struct TaskQueue {
    state: Mutex<QueueState>,
    // Signaled on enqueue (one waiter) and on close (all waiters)
    work: Notify,
    // Signaled whenever the queue may have become idle
    idle: Notify,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a task in FIFO order.
    ///
    /// Fails once `close()` has been called.
    pub fn enqueue(&self, task: Task) -> Result<(), QueueClosed> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueClosed);
            }
            state.pending.push_back(task);
        }
        self.work.notify_one();
        Ok(())
    }

    /// Waits for the next task.
    ///
    /// Returns None once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<TaskLease<'_>> {
        loop {
            // Register interest before looking at the state so a close() or
            // enqueue() racing with the check is not lost.
            let notified = self.work.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(task) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(TaskLease {
                        queue: self,
                        task,
                    });
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Snapshot only. A worker may be about to enqueue more work.
    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    /// True when nothing is pending and nothing is being executed.
    pub fn is_idle(&self) -> bool {
        self.state.lock().is_idle()
    }

    /// Resolves once the queue is idle.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }

            notified.await;
        }
    }

    /// No more work will ever be enqueued. Wakes every blocked consumer.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.work.notify_waiters();
    }

    fn finish(&self) {
        let became_idle = {
            let mut state = self.state.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.is_idle()
        };
        if became_idle {
            self.idle.notify_waiters();
        }
    }
}

/// A dequeued task. The task stays in flight until the lease is dropped.
#[derive(Debug)]
pub struct TaskLease<'a> {
    queue: &'a TaskQueue,
    task: Task,
}

impl TaskLease<'_> {
    pub fn task(&self) -> &Task {
        &self.task
    }
}

impl Drop for TaskLease<'_> {
    fn drop(&mut self) {
        self.queue.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = TaskQueue::new();
        for i in 0..3 {
            queue.enqueue(Task::download(format!("https://e.com/{i}"))).unwrap();
        }
        for i in 0..3 {
            let lease = queue.dequeue().await.unwrap();
            assert_eq!(lease.task().url(), format!("https://e.com/{i}"));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_lease_tracks_in_flight() {
        let queue = TaskQueue::new();
        queue.enqueue(Task::download("https://e.com/")).unwrap();
        assert!(!queue.is_idle());

        let lease = queue.dequeue().await.unwrap();
        // Pending is empty but the task is still executing
        assert!(queue.is_empty());
        assert_eq!(queue.in_flight(), 1);
        assert!(!queue.is_idle());

        drop(lease);
        assert_eq!(queue.in_flight(), 0);
        assert!(queue.is_idle());
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_consumers() {
        let queue = Arc::new(TaskQueue::new());
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.dequeue().await.is_none() })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        for consumer in consumers {
            let woke_empty = tokio::time::timeout(Duration::from_secs(2), consumer)
                .await
                .expect("consumer stayed blocked after close")
                .unwrap();
            assert!(woke_empty);
        }
    }

    #[tokio::test]
    async fn test_enqueue_after_close_is_rejected() {
        let queue = TaskQueue::new();
        queue.close();
        assert_eq!(queue.enqueue(Task::download("https://e.com/")), Err(QueueClosed));
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_queue_still_drains_pending() {
        let queue = TaskQueue::new();
        queue.enqueue(Task::download("https://e.com/a")).unwrap();
        queue.close();
        assert!(queue.dequeue().await.is_some());
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_follow_ups() {
        let queue = Arc::new(TaskQueue::new());
        queue.enqueue(Task::download("https://e.com/")).unwrap();

        let worker = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let lease = queue.dequeue().await.unwrap();
                tokio::time::sleep(Duration::from_millis(30)).await;
                // Follow-up pushed while the parent is still in flight
                queue.enqueue(Task::download("https://e.com/next")).unwrap();
                drop(lease);

                let lease = queue.dequeue().await.unwrap();
                tokio::time::sleep(Duration::from_millis(30)).await;
                drop(lease);
            })
        };

        tokio::time::timeout(Duration::from_secs(2), queue.wait_idle())
            .await
            .unwrap();
        // Idle can only be observed after both tasks finished
        worker.await.unwrap();
        assert!(queue.is_idle());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_and_consumers_lose_nothing() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 250;

        let queue = Arc::new(TaskQueue::new());

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let mut seen = Vec::new();
                    while let Some(lease) = queue.dequeue().await {
                        seen.push(lease.task().url().to_string());
                    }
                    seen
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    for i in 0..PER_PRODUCER {
                        queue
                            .enqueue(Task::download(format!("https://e.com/{p}/{i}")))
                            .unwrap();
                        if i % 50 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.await.unwrap();
        }
        queue.wait_idle().await;
        queue.close();

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.await.unwrap());
        }
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
        assert_eq!(unique.len(), all.len());
    }
}
