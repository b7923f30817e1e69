// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Global hotkey listener
//!
//! One background thread consumes the key event stream. For every key-down:
//!
//! 1. The raw token is normalised and checked against the start key
//!    allow-list; anything else is ignored before the store is consulted
//! 2. A start key that is already held (OS auto-repeat) is ignored while
//!    its run is in flight; the hold ends at key-up or when the run exits,
//!    so sources that only report key-downs still retrigger
//! 3. The store's active mapping for that start key is looked up
//! 4. The sequence is handed to a worker thread
//!
//! Workers are tracked per start key: at most one run per start key is in
//! flight, while different start keys run concurrently. A trigger that
//! arrives while its start key is busy is dropped or restarts the run,
//! depending on `RetriggerPolicy`.
//!
//! The listener is a scoped resource: dropping the `ListenerHandle` stops
//! the thread, cancels all in-flight runs, and joins every worker.

use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::core::{Mapping, StartKey};
use crate::engine::cancel::CancelSource;
use crate::engine::executor::{RunOutcome, SequenceExecutor};
use crate::engine::input::{KeyEvent, KeyEventKind, KeyEventSource, ListenerInstallError};
use crate::engine::{EngineCounters, RetriggerPolicy};
use crate::store::MappingStore;

/// In-flight run for one start key
struct WorkerSlot {
    cancel: Arc<CancelSource>,
    handle: JoinHandle<()>,
}

type WorkerSlots = Arc<Mutex<HashMap<StartKey, WorkerSlot>>>;

/// Everything the listener thread needs to dispatch a trigger
pub struct HotkeyListener {
    store: Arc<MappingStore>,
    executor: Arc<SequenceExecutor>,
    counters: Arc<EngineCounters>,
    retrigger: RetriggerPolicy,
}

impl HotkeyListener {
    pub fn new(
        store: Arc<MappingStore>,
        executor: Arc<SequenceExecutor>,
        counters: Arc<EngineCounters>,
        retrigger: RetriggerPolicy,
    ) -> Self {
        Self {
            store,
            executor,
            counters,
            retrigger,
        }
    }

    /// Subscribes to `source` and starts the listener thread.
    ///
    /// # Errors
    ///
    /// Fails if the subscription is refused or the thread cannot be spawned;
    /// nothing is left running in either case.
    pub fn install(self, source: &dyn KeyEventSource) -> Result<ListenerHandle, ListenerInstallError> {
        let events = source.subscribe()?;
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let workers: WorkerSlots = Arc::new(Mutex::new(HashMap::new()));

        let dispatcher = Dispatcher {
            listener: self,
            workers: Arc::clone(&workers),
            held: HashSet::new(),
        };

        let thread = thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || dispatcher.run(events, shutdown_rx))
            .map_err(ListenerInstallError::Spawn)?;

        info!("hotkey listener installed");
        Ok(ListenerHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
            workers,
        })
    }
}

/// State owned by the listener thread
struct Dispatcher {
    listener: HotkeyListener,
    workers: WorkerSlots,
    held: HashSet<StartKey>,
}

impl Dispatcher {
    fn run(mut self, events: Receiver<KeyEvent>, shutdown: Receiver<()>) {
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => self.handle(event),
                    Err(_) => {
                        warn!("key event source closed, listener exiting");
                        break;
                    }
                },
                recv(shutdown) -> _ => break,
            }
        }
        debug!("hotkey listener thread finished");
    }

    fn handle(&mut self, event: KeyEvent) {
        let Some(start_key) = StartKey::from_token(&event.key) else {
            trace!(key = %event.key, "not a start key, ignored");
            return;
        };

        match event.kind {
            KeyEventKind::Up => {
                self.held.remove(&start_key);
            }
            KeyEventKind::Down => {
                if self.held.contains(&start_key) && self.is_busy(start_key) {
                    self.listener.counters.repeats_suppressed.fetch_add(1, Ordering::Relaxed);
                    trace!(%start_key, "start key held, repeat ignored");
                    return;
                }
                self.held.insert(start_key);
                self.dispatch(start_key);
            }
        }
    }

    fn is_busy(&self, start_key: StartKey) -> bool {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&start_key)
            .map(|slot| !slot.handle.is_finished())
            .unwrap_or(false)
    }

    fn dispatch(&self, start_key: StartKey) {
        let counters = &self.listener.counters;
        counters.triggers.fetch_add(1, Ordering::Relaxed);

        let Some(mapping) = self.listener.store.find_active_by_start_key(start_key) else {
            debug!(%start_key, "no enabled mapping for start key");
            return;
        };

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = match workers.remove(&start_key) {
            Some(slot) if !slot.handle.is_finished() => match self.listener.retrigger {
                RetriggerPolicy::Ignore => {
                    counters.ignored_busy.fetch_add(1, Ordering::Relaxed);
                    debug!(%start_key, mapping = %mapping.name, "run in flight, trigger ignored");
                    workers.insert(start_key, slot);
                    return;
                }
                RetriggerPolicy::Restart => {
                    debug!(%start_key, mapping = %mapping.name, "restarting in-flight run");
                    slot.cancel.cancel();
                    Some(slot.handle)
                }
            },
            Some(slot) => {
                join_worker(slot.handle);
                None
            }
            None => None,
        };

        let cancel = Arc::new(CancelSource::new());
        match self.spawn_worker(start_key, mapping, &cancel, previous) {
            Ok(handle) => {
                workers.insert(start_key, WorkerSlot { cancel, handle });
            }
            Err(e) => warn!(%start_key, error = %e, "failed to spawn sequence worker"),
        }
    }

    fn spawn_worker(
        &self,
        start_key: StartKey,
        mapping: Arc<Mapping>,
        cancel: &CancelSource,
        previous: Option<JoinHandle<()>>,
    ) -> std::io::Result<JoinHandle<()>> {
        let executor = Arc::clone(&self.listener.executor);
        let counters = Arc::clone(&self.listener.counters);
        let token = cancel.token();

        thread::Builder::new()
            .name(format!("macro-{}", start_key))
            .spawn(move || {
                // A restarted run never overlaps the one it replaces
                if let Some(previous) = previous {
                    join_worker(previous);
                }

                counters.runs_started.fetch_add(1, Ordering::Relaxed);
                info!(mapping = %mapping.name, %start_key, "macro triggered");

                let outcome = executor.run(&mapping.name, &mapping.keys, &token);
                let stats = outcome.stats();
                counters
                    .injection_failures
                    .fetch_add(stats.failed as u64, Ordering::Relaxed);

                match outcome {
                    RunOutcome::Completed(_) => {
                        counters.runs_completed.fetch_add(1, Ordering::Relaxed);
                    }
                    RunOutcome::Cancelled(_) => {
                        counters.runs_cancelled.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
    }
}

fn join_worker(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!("sequence worker panicked");
    }
}

/// Owned listener resource; dropping it uninstalls the listener.
pub struct ListenerHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    workers: WorkerSlots,
}

impl ListenerHandle {
    /// False once the listener thread has exited (e.g. source closed).
    pub fn is_alive(&self) -> bool {
        self.thread
            .as_ref()
            .map(|thread| !thread.is_finished())
            .unwrap_or(false)
    }

    /// Start keys with a run currently in flight.
    pub fn busy_start_keys(&self) -> Vec<StartKey> {
        let workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut busy: Vec<StartKey> = workers
            .iter()
            .filter(|(_, slot)| !slot.handle.is_finished())
            .map(|(start_key, _)| *start_key)
            .collect();
        busy.sort();
        busy
    }

    /// Stops the listener, cancels in-flight runs, and waits for them.
    pub fn uninstall(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        // Disconnecting the shutdown channel wakes the select loop
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("hotkey listener thread panicked");
            }
        }

        // The listener thread is gone, so no new slot can appear
        let slots: Vec<WorkerSlot> = self
            .workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, slot)| slot)
            .collect();

        for slot in &slots {
            slot.cancel.cancel();
        }
        for slot in slots {
            join_worker(slot.handle);
        }

        info!("hotkey listener uninstalled");
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown_now();
        }
    }
}
