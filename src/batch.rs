//! Batch runners: drive one independent call per task ID.
//!
//! Items never affect each other; a failed item is recorded and the batch
//! moves on. The parallel runner hands results back in completion order.

use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

/// Worker count for parallel batches unless told otherwise.
pub const DEFAULT_WORKERS: usize = 3;

/// The result of one item.
#[derive(Debug)]
pub struct BatchItem<T, E> {
    pub task_id: Uuid,
    pub outcome: Result<T, E>,
}

/// Success and failure counts over a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of<T, E>(items: &[BatchItem<T, E>]) -> Self {
        let succeeded = items.iter().filter(|i| i.outcome.is_ok()).count();
        Self {
            succeeded,
            failed: items.len() - succeeded,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Run items one at a time, in order, pausing `delay` between items.
pub fn run_sequential<T, E>(
    task_ids: &[Uuid],
    delay: Duration,
    mut run: impl FnMut(Uuid) -> Result<T, E>,
    mut on_item: impl FnMut(usize, &BatchItem<T, E>),
) -> Vec<BatchItem<T, E>> {
    let mut items = Vec::with_capacity(task_ids.len());
    for (index, &task_id) in task_ids.iter().enumerate() {
        if index > 0 {
            thread::sleep(delay);
        }
        let item = BatchItem {
            task_id,
            outcome: run(task_id),
        };
        on_item(index, &item);
        items.push(item);
    }
    items
}

/// Run items on a bounded pool of `workers` threads.
///
/// Workers pull task IDs from a shared queue. `on_item` sees each result as it
/// completes, on the calling thread; the returned vec is in completion order.
pub fn run_parallel<T, E>(
    task_ids: &[Uuid],
    workers: usize,
    run: impl Fn(Uuid) -> Result<T, E> + Sync,
    mut on_item: impl FnMut(&BatchItem<T, E>),
) -> Vec<BatchItem<T, E>>
where
    T: Send,
    E: Send,
{
    let queue = Mutex::new(task_ids.iter().copied().collect::<VecDeque<_>>());
    let workers = workers.clamp(1, task_ids.len().max(1));
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let run = &run;
            scope.spawn(move || {
                loop {
                    // Release the lock before running the item.
                    let next = queue.lock().ok().and_then(|mut q| q.pop_front());
                    let Some(task_id) = next else { break };
                    let item = BatchItem {
                        task_id,
                        outcome: run(task_id),
                    };
                    if tx.send(item).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut items = Vec::with_capacity(task_ids.len());
        for item in rx {
            on_item(&item);
            items.push(item);
        }
        items
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn sequential_keeps_order_and_isolates_failures() {
        let task_ids = ids(3);
        let failing = task_ids[1];
        let items = run_sequential(
            &task_ids,
            Duration::ZERO,
            |id| if id == failing { Err("bad") } else { Ok(id) },
            |_, _| {},
        );

        let order: Vec<Uuid> = items.iter().map(|i| i.task_id).collect();
        assert_eq!(order, task_ids);
        assert_eq!(
            Summary::of(&items),
            Summary {
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn sequential_pauses_between_items_only() {
        let started = Instant::now();
        run_sequential(
            &ids(3),
            Duration::from_millis(30),
            |_| Ok::<_, ()>(()),
            |_, _| {},
        );
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_millis(90));
    }

    #[test]
    fn parallel_returns_one_result_per_task() {
        let task_ids = ids(7);
        let failing: HashSet<Uuid> = task_ids.iter().step_by(3).copied().collect();
        let items = run_parallel(
            &task_ids,
            DEFAULT_WORKERS,
            |id| {
                // Stagger completions so they don't arrive in submission order.
                let jitter = u64::from(id.as_bytes()[0] % 20);
                thread::sleep(Duration::from_millis(jitter));
                if failing.contains(&id) { Err(id) } else { Ok(id) }
            },
            |_| {},
        );

        assert_eq!(items.len(), task_ids.len());
        let returned: HashSet<Uuid> = items.iter().map(|i| i.task_id).collect();
        assert_eq!(returned, task_ids.iter().copied().collect());
        assert_eq!(Summary::of(&items).failed, failing.len());
        assert_eq!(Summary::of(&items).total(), 7);
    }

    #[test]
    fn parallel_reports_in_completion_order() {
        let task_ids = ids(2);
        let slow = task_ids[0];
        let mut reported = Vec::new();
        let items = run_parallel(
            &task_ids,
            2,
            |id| {
                if id == slow {
                    thread::sleep(Duration::from_millis(150));
                }
                Ok::<_, ()>(())
            },
            |item| reported.push(item.task_id),
        );

        assert_eq!(reported, vec![task_ids[1], task_ids[0]]);
        assert_eq!(items[0].task_id, task_ids[1]);
    }

    #[test]
    fn parallel_never_exceeds_the_pool_size() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        run_parallel(
            &ids(9),
            3,
            |_| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            },
            |_| {},
        );
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn empty_batch_is_empty() {
        let items = run_parallel(&[], 3, |_| Ok::<(), ()>(()), |_| {});
        assert!(items.is_empty());
        assert_eq!(Summary::of(&items).total(), 0);
    }
}
