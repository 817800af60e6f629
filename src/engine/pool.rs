// -----------------------------------------------------------------------------
// Priority thread pool: highest-priority task runs next
// -----------------------------------------------------------------------------

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use log::debug;
use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueuedTask {
    priority: i32,
    seq: u64,
    job: Job,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; the sequence number only makes ties
        // deterministic within a run, callers must not rely on it.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct PoolState {
    queue: BinaryHeap<QueuedTask>,
    next_seq: u64,
    shutdown: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    available: Condvar,
}

/// Fixed set of workers draining a max-priority queue. `submit` is safe from
/// any thread, including workers; pushing never blocks on anything but the
/// queue lock, so recursive submission cannot deadlock the queue itself.
pub struct PriorityPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl PriorityPool {
    /// Sentinel thread count: use all available hardware parallelism.
    pub const ALL_THREADS: usize = 0;

    pub fn new(n_threads: usize) -> Self {
        let n = if n_threads == Self::ALL_THREADS {
            num_cpus::get().max(1)
        } else {
            n_threads
        };
        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                queue: BinaryHeap::new(),
                next_seq: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
        });
        let workers = (0..n)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(&shared))
            })
            .collect();
        debug!("priority pool started with {n} workers");
        Self { shared, workers }
    }

    pub fn n_threads(&self) -> usize {
        self.workers.len()
    }

    /// Queues `f` with the given priority (higher runs sooner) and returns a
    /// handle delivering its result. A panic inside `f` is captured and
    /// re-raised as [`Error::TaskFailure`] to whoever waits on the handle; it
    /// never takes down a worker.
    pub fn submit<T, F>(&self, priority: i32, f: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let slot = Arc::new(TaskSlot {
            result: Mutex::new(None),
            done: Condvar::new(),
        });
        let task_slot = Arc::clone(&slot);
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
                Error::TaskFailure(panic_message(payload.as_ref()))
            });
            *task_slot.result.lock() = Some(outcome);
            task_slot.done.notify_all();
        });
        {
            let mut state = self.shared.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.queue.push(QueuedTask { priority, seq, job });
        }
        self.shared.available.notify_one();
        TaskHandle { slot }
    }
}

impl Drop for PriorityPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            // Cooperative shutdown: tasks still queued are dropped, in-flight
            // ones run to completion.
            state.queue.clear();
        }
        self.shared.available.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(task) = state.queue.pop() {
                    break task;
                }
                shared.available.wait(&mut state);
            }
        };
        (task.job)();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

struct TaskSlot<T> {
    result: Mutex<Option<Result<T>>>,
    done: Condvar,
}

/// Single-use handle to one submitted task's result.
pub struct TaskHandle<T> {
    slot: Arc<TaskSlot<T>>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task has run and takes its result.
    pub fn wait(self) -> Result<T> {
        let mut guard = self.slot.result.lock();
        loop {
            if let Some(outcome) = guard.take() {
                return outcome;
            }
            self.slot.done.wait(&mut guard);
        }
    }
}
