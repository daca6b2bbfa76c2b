use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;

use super::context::TaskContext;
use super::events::{TaskEvent, TaskEventBus};
use super::task::{TaskError, TaskFlags, TaskFn, TaskState, WorkItem};

/// Bookkeeping for one tracked work item.
pub(crate) struct Entry<T> {
    pub(crate) state: TaskState,
    pub(crate) flags: Arc<TaskFlags>,
    pub(crate) progress: u8,
    pub(crate) message: String,
    job: Option<TaskFn<T>>,
    started: bool,
    in_flight: bool,
}

pub(crate) struct Table<T> {
    pub(crate) entries: HashMap<String, Entry<T>>,
    completed: usize,
    total: usize,
    in_flight: usize,
    /// Callables currently executing on a pool thread.
    running: usize,
    /// Cap on `running`, adjustable at runtime.
    max_running: usize,
}

/// State shared between the runner handle, pool threads and task contexts.
pub(crate) struct Shared<T> {
    table: Mutex<Table<T>>,
    drained: Condvar,
    slot_freed: Condvar,
    /// Only set while holding the table lock.
    shutdown: AtomicBool,
    pub(crate) events: TaskEventBus<T>,
}

impl<T> Shared<T> {
    fn new(max_running: usize) -> Self {
        Self {
            table: Mutex::new(Table {
                entries: HashMap::new(),
                completed: 0,
                total: 0,
                in_flight: 0,
                running: 0,
                max_running,
            }),
            drained: Condvar::new(),
            slot_freed: Condvar::new(),
            shutdown: AtomicBool::new(false),
            events: TaskEventBus::new(),
        }
    }

    pub(crate) fn lock_table(&self) -> MutexGuard<'_, Table<T>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Updates the state, emitting `StatusChanged` only on an actual change.
    fn set_state(&self, id: &str, entry: &mut Entry<T>, state: TaskState) {
        if entry.state != state {
            entry.state = state;
            self.events.publish(TaskEvent::StatusChanged {
                id: id.to_string(),
                state,
            });
        }
    }

    /// Cancels an item that will never run and finishes it. Items already
    /// marked cancelled are not announced twice. Caller holds the lock.
    fn abandon_locked(&self, table: &mut Table<T>, id: &str) {
        if let Some(entry) = table.entries.get_mut(id) {
            if entry.state != TaskState::Cancelled {
                entry.flags.request_cancel();
                self.set_state(id, entry, TaskState::Cancelled);
                self.events
                    .publish(TaskEvent::Cancelled { id: id.to_string() });
            }
        }
        self.finish_locked(table, id);
    }

    /// Emits `Finished` and drops the item from the table. Caller holds the lock.
    fn finish_locked(&self, table: &mut Table<T>, id: &str) {
        let Some(entry) = table.entries.remove(id) else {
            return;
        };
        if entry.in_flight {
            table.in_flight -= 1;
        }
        table.completed += 1;

        self.events.publish(TaskEvent::Finished { id: id.to_string() });
        self.events.publish(TaskEvent::GlobalProgress {
            completed: table.completed,
            total: table.total,
        });
        if table.completed >= table.total {
            self.events.publish(TaskEvent::AllFinished);
        }
        if table.in_flight == 0 {
            self.drained.notify_all();
        }
    }
}

struct QueuedTask<T> {
    id: String,
    job: TaskFn<T>,
}

/// Runs callables on a set of pool threads.
///
/// At most `max_threads` callables run at once; started items wait in an
/// unbounded queue until a slot frees up. The cap can be changed while the
/// runner is live with [`set_max_threads`](Self::set_max_threads).
pub struct TaskRunner<T> {
    job_sender: Sender<QueuedTask<T>>,
    job_receiver: Receiver<QueuedTask<T>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared<T>>,
}

impl<T: Send + Sync + 'static> TaskRunner<T> {
    pub fn new(max_threads: usize) -> Result<Self, WorkerError> {
        if max_threads == 0 {
            return Err(WorkerError::SpawnFailed(
                "max_threads must be > 0".to_string(),
            ));
        }

        let (job_sender, job_receiver) = unbounded::<QueuedTask<T>>();
        let shared = Arc::new(Shared::new(max_threads));

        let mut workers = Vec::with_capacity(max_threads);
        for worker_id in 0..max_threads {
            workers.push(spawn_worker(
                worker_id,
                job_receiver.clone(),
                Arc::clone(&shared),
            )?);
        }

        info!("Started {} task runner threads", max_threads);

        Ok(Self {
            job_sender,
            job_receiver,
            workers: Mutex::new(workers),
            shared,
        })
    }

    /// Creates a runner with one thread per CPU.
    pub fn with_default_threads() -> Result<Self, WorkerError> {
        Self::new(num_cpus::get())
    }

    /// Registers a callable in the `Idle` state without starting it.
    ///
    /// A fresh UUID is generated when `id` is `None`.
    pub fn submit<F>(&self, job: F, id: Option<String>) -> Result<WorkItem, WorkerError>
    where
        F: FnOnce(&TaskContext<T>) -> Result<T, TaskError> + Send + 'static,
    {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let flags = Arc::new(TaskFlags::default());

        let mut table = self.shared.lock_table();
        if self.shared.is_shutting_down() {
            return Err(WorkerError::ChannelClosed);
        }
        if table.entries.contains_key(&id) {
            return Err(WorkerError::DuplicateTask(id));
        }

        table.entries.insert(
            id.clone(),
            Entry {
                state: TaskState::Idle,
                flags: Arc::clone(&flags),
                progress: 0,
                message: String::new(),
                job: Some(Box::new(job)),
                started: false,
                in_flight: false,
            },
        );
        table.total += 1;

        self.shared.events.publish(TaskEvent::GlobalProgress {
            completed: table.completed,
            total: table.total,
        });

        debug!("Submitted task {}", id);
        Ok(WorkItem::new(id, flags))
    }

    /// Submits and immediately starts a callable.
    pub fn submit_and_start<F>(&self, job: F, id: Option<String>) -> Result<WorkItem, WorkerError>
    where
        F: FnOnce(&TaskContext<T>) -> Result<T, TaskError> + Send + 'static,
    {
        let item = self.submit(job, id)?;
        if !self.start(item.id()) {
            // Only reachable if another caller cancelled or started it in between.
            debug!("Task {} was not startable after submit", item.id());
        }
        Ok(item)
    }

    /// Queues an `Idle` item for execution.
    ///
    /// Returns false when the id is unknown, the item was already started,
    /// or the runner is shutting down.
    pub fn start(&self, id: &str) -> bool {
        let mut table = self.shared.lock_table();
        if self.shared.is_shutting_down() {
            return false;
        }
        let Some(entry) = table.entries.get_mut(id) else {
            return false;
        };
        if entry.state != TaskState::Idle {
            return false;
        }
        let Some(job) = entry.job.take() else {
            return false;
        };

        entry.in_flight = true;
        self.shared.set_state(id, entry, TaskState::Queued);
        table.in_flight += 1;

        let queued = QueuedTask {
            id: id.to_string(),
            job,
        };
        if self.job_sender.send(queued).is_err() {
            // Every pool thread has exited; nothing will ever pick this item up.
            error!("Task {} could not be queued: worker pool is not running", id);
            if let Some(entry) = table.entries.get_mut(id) {
                self.shared.events.publish(TaskEvent::Error {
                    id: id.to_string(),
                    message: "worker pool is not running".to_string(),
                    trace: String::new(),
                });
                self.shared.set_state(id, entry, TaskState::Failed);
            }
            self.shared.finish_locked(&mut table, id);
        }
        true
    }

    /// Requests cooperative cancellation.
    ///
    /// An item that never started is cancelled and finished on the spot. A
    /// queued or running item is marked cancelled and finishes once its pool
    /// thread observes the flag. Returns false for unknown or terminal items.
    pub fn cancel(&self, id: &str) -> bool {
        let mut table = self.shared.lock_table();
        let Some(entry) = table.entries.get_mut(id) else {
            return false;
        };

        match entry.state {
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled => false,
            TaskState::Idle => {
                entry.job = None;
                self.shared.abandon_locked(&mut table, id);
                debug!("Cancelled idle task {}", id);
                true
            }
            TaskState::Queued | TaskState::Running | TaskState::Paused => {
                entry.flags.request_cancel();
                self.shared.set_state(id, entry, TaskState::Cancelled);
                self.shared
                    .events
                    .publish(TaskEvent::Cancelled { id: id.to_string() });
                debug!("Cancellation requested for task {}", id);
                true
            }
        }
    }

    /// Cancels every tracked item, returning how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<String> = self.shared.lock_table().entries.keys().cloned().collect();
        ids.iter().filter(|id| self.cancel(id)).count()
    }

    /// Sets the pause flag on a queued or running item.
    pub fn pause(&self, id: &str) -> bool {
        let mut table = self.shared.lock_table();
        let Some(entry) = table.entries.get_mut(id) else {
            return false;
        };

        match entry.state {
            TaskState::Queued | TaskState::Running => {
                entry.flags.set_paused(true);
                self.shared.set_state(id, entry, TaskState::Paused);
                true
            }
            TaskState::Paused => true,
            _ => false,
        }
    }

    /// Clears the pause flag on a paused item.
    pub fn resume(&self, id: &str) -> bool {
        let mut table = self.shared.lock_table();
        let Some(entry) = table.entries.get_mut(id) else {
            return false;
        };
        if entry.state != TaskState::Paused {
            return false;
        }

        entry.flags.set_paused(false);
        let state = if entry.started {
            TaskState::Running
        } else {
            TaskState::Queued
        };
        self.shared.set_state(id, entry, state);
        true
    }

    pub fn status(&self, id: &str) -> Option<TaskState> {
        self.shared.lock_table().entries.get(id).map(|e| e.state)
    }

    /// Last reported progress percentage and message.
    pub fn progress(&self, id: &str) -> Option<(u8, String)> {
        self.shared
            .lock_table()
            .entries
            .get(id)
            .map(|e| (e.progress, e.message.clone()))
    }

    /// Ids of every tracked (not yet finished) item.
    pub fn task_ids(&self) -> Vec<String> {
        self.shared.lock_table().entries.keys().cloned().collect()
    }

    /// Number of queued, running or paused items.
    pub fn active_count(&self) -> usize {
        self.shared
            .lock_table()
            .entries
            .values()
            .filter(|e| e.state.is_active())
            .count()
    }

    pub fn max_threads(&self) -> usize {
        self.shared.lock_table().max_running
    }

    /// Changes how many callables may run at once.
    ///
    /// Growing spawns pool threads as needed. Shrinking never interrupts a
    /// running callable; later items wait until the running count drops
    /// below the new cap.
    pub fn set_max_threads(&self, max_threads: usize) -> Result<(), WorkerError> {
        if max_threads == 0 {
            return Err(WorkerError::SpawnFailed(
                "max_threads must be > 0".to_string(),
            ));
        }
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        while workers.len() < max_threads {
            let handle = spawn_worker(
                workers.len(),
                self.job_receiver.clone(),
                Arc::clone(&self.shared),
            )?;
            workers.push(handle);
        }

        let mut table = self.shared.lock_table();
        let previous = std::mem::replace(&mut table.max_running, max_threads);
        self.shared.slot_freed.notify_all();

        info!(
            "Task runner thread cap changed from {} to {}",
            previous, max_threads
        );
        Ok(())
    }

    pub fn subscribe(&self) -> Receiver<TaskEvent<T>> {
        self.shared.events.subscribe()
    }

    /// Blocks until every started item has finished.
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait_for_all(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut table = self.shared.lock_table();

        while table.in_flight > 0 {
            match deadline {
                None => {
                    table = self
                        .shared
                        .drained
                        .wait(table)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self
                        .shared
                        .drained
                        .wait_timeout(table, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner);
                    table = guard;
                }
            }
        }
        true
    }

    /// Stops accepting work.
    ///
    /// Items still waiting in the queue are cancelled and finished right
    /// away; callables already running are left to complete.
    pub fn shutdown(&self) {
        info!("Shutting down task runner...");

        let mut table = self.shared.lock_table();
        self.shared.shutdown.store(true, Ordering::Release);

        let mut abandoned = 0;
        while let Ok(task) = self.job_receiver.try_recv() {
            self.shared.abandon_locked(&mut table, &task.id);
            abandoned += 1;
        }
        if abandoned > 0 {
            info!("Cancelled {} queued tasks on shutdown", abandoned);
        }

        // Threads parked on the run-slot gate must see the flag
        self.shared.slot_freed.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.is_shutting_down()
    }

    /// Stops accepting work and joins every pool thread.
    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.job_sender);

        let workers = self
            .workers
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All task runner threads have stopped");
    }
}

fn spawn_worker<T: Send + Sync + 'static>(
    worker_id: usize,
    job_receiver: Receiver<QueuedTask<T>>,
    shared: Arc<Shared<T>>,
) -> Result<JoinHandle<()>, WorkerError> {
    thread::Builder::new()
        .name(format!("prodex-worker-{}", worker_id))
        .spawn(move || run_worker(worker_id, job_receiver, shared))
        .map_err(|e| WorkerError::SpawnFailed(e.to_string()))
}

fn run_worker<T: Send + Sync + 'static>(
    worker_id: usize,
    job_receiver: Receiver<QueuedTask<T>>,
    shared: Arc<Shared<T>>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shared.is_shutting_down() {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => {
                debug!("Worker {} running task {}", worker_id, task.id);
                execute(&shared, task);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn execute<T: Send + Sync + 'static>(shared: &Arc<Shared<T>>, task: QueuedTask<T>) {
    let QueuedTask { id, job } = task;

    let flags = {
        let mut table = shared.lock_table();

        // Wait for a run slot. Cancelled items and items dequeued after
        // shutdown never run the callable.
        loop {
            let Some(entry) = table.entries.get(&id) else {
                return;
            };
            if shared.is_shutting_down() || entry.flags.is_cancel_requested() {
                shared.abandon_locked(&mut table, &id);
                return;
            }
            if table.running < table.max_running {
                break;
            }
            table = shared
                .slot_freed
                .wait(table)
                .unwrap_or_else(PoisonError::into_inner);
        }

        let flags = match table.entries.get_mut(&id) {
            Some(entry) => {
                entry.started = true;
                if entry.state != TaskState::Paused {
                    shared.set_state(&id, entry, TaskState::Running);
                }
                Arc::clone(&entry.flags)
            }
            None => return,
        };
        table.running += 1;
        shared
            .events
            .publish(TaskEvent::Started { id: id.clone() });
        flags
    };

    let ctx = TaskContext::new(id.clone(), Arc::clone(&flags), Arc::clone(shared));
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&ctx)));

    let mut table = shared.lock_table();
    table.running -= 1;
    shared.slot_freed.notify_all();

    if let Some(entry) = table.entries.get_mut(&id) {
        if flags.is_cancel_requested() {
            // `cancel` already moved the item to Cancelled and announced it.
            debug!("Task {} stopped after cancellation", id);
        } else {
            match outcome {
                Ok(Ok(value)) => {
                    shared.events.publish(TaskEvent::Result {
                        id: id.clone(),
                        value: Arc::new(value),
                    });
                    shared.set_state(&id, entry, TaskState::Completed);
                }
                Ok(Err(TaskError::Cancelled)) => {
                    shared.set_state(&id, entry, TaskState::Cancelled);
                    shared
                        .events
                        .publish(TaskEvent::Cancelled { id: id.clone() });
                }
                Ok(Err(e)) => {
                    warn!("Task {} failed: {}", id, e);
                    shared.events.publish(TaskEvent::Error {
                        id: id.clone(),
                        message: e.to_string(),
                        trace: e.trace(),
                    });
                    shared.set_state(&id, entry, TaskState::Failed);
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("Task {} panicked: {}", id, message);
                    shared.events.publish(TaskEvent::Error {
                        id: id.clone(),
                        message: message.clone(),
                        trace: format!(
                            "panicked: {}\n{}",
                            message,
                            Backtrace::force_capture()
                        ),
                    });
                    shared.set_state(&id, entry, TaskState::Failed);
                }
            }
        }
    }
    shared.finish_locked(&mut table, &id);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
