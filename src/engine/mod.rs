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

//! Macro engine lifecycle
//!
//! `EngineController` owns the hotkey listener as a scoped resource:
//! `start()` installs it, `stop()` uninstalls it and cancels in-flight runs.
//! Both calls are serialised by one mutex, so concurrent start/stop
//! requests can never leave a half-installed listener behind.
//!
//! # Example
//!
//! ```
//! use macro_keymapper::engine::input::{ChannelKeySource, DryRunInjector};
//! use macro_keymapper::engine::{EngineController, RetriggerPolicy};
//! use macro_keymapper::store::MappingStore;
//! use std::sync::Arc;
//!
//! let engine = EngineController::new(
//!     Arc::new(MappingStore::default()),
//!     Arc::new(ChannelKeySource::new()),
//!     Arc::new(DryRunInjector::new()),
//!     RetriggerPolicy::Ignore,
//! );
//!
//! assert!(engine.start()?);
//! assert!(!engine.start()?); // already running
//! assert!(engine.stop());
//! assert!(!engine.is_running());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cancel;
pub mod executor;
pub mod input;
pub mod listener;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use crate::store::MappingStore;

pub use cancel::{CancelSource, CancelToken};
pub use executor::{RunOutcome, RunStats, SequenceExecutor};
pub use input::{InjectionError, KeyEventSource, KeyInjector, ListenerInstallError};
pub use listener::{HotkeyListener, ListenerHandle};

/// What a trigger does while the same start key's run is still in flight
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetriggerPolicy {
    /// Drop the new trigger
    #[default]
    Ignore,
    /// Cancel the stale run and start the sequence again
    Restart,
}

/// Engine activity counters, shared by the listener and its workers
#[derive(Debug, Default)]
pub struct EngineCounters {
    pub triggers: AtomicU64,
    pub runs_started: AtomicU64,
    pub runs_completed: AtomicU64,
    pub runs_cancelled: AtomicU64,
    pub ignored_busy: AtomicU64,
    pub repeats_suppressed: AtomicU64,
    pub injection_failures: AtomicU64,
}

impl EngineCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            triggers: self.triggers.load(Ordering::Relaxed),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_completed: self.runs_completed.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            ignored_busy: self.ignored_busy.load(Ordering::Relaxed),
            repeats_suppressed: self.repeats_suppressed.load(Ordering::Relaxed),
            injection_failures: self.injection_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of `EngineCounters`
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CounterSnapshot {
    /// Start-key presses seen (auto-repeats excluded)
    pub triggers: u64,
    pub runs_started: u64,
    pub runs_completed: u64,
    pub runs_cancelled: u64,
    /// Triggers dropped because their start key was busy
    pub ignored_busy: u64,
    pub repeats_suppressed: u64,
    pub injection_failures: u64,
}

/// Listener lifecycle owner
pub struct EngineController {
    store: Arc<MappingStore>,
    source: Arc<dyn KeyEventSource>,
    executor: Arc<SequenceExecutor>,
    retrigger: RetriggerPolicy,
    counters: Arc<EngineCounters>,
    /// `Some` while Running
    listener: Mutex<Option<ListenerHandle>>,
}

impl EngineController {
    pub fn new(
        store: Arc<MappingStore>,
        source: Arc<dyn KeyEventSource>,
        injector: Arc<dyn KeyInjector>,
        retrigger: RetriggerPolicy,
    ) -> Self {
        Self {
            store,
            source,
            executor: Arc::new(SequenceExecutor::new(injector)),
            retrigger,
            counters: Arc::new(EngineCounters::default()),
            listener: Mutex::new(None),
        }
    }

    /// Installs the listener.
    ///
    /// Returns `Ok(false)` if it was already running. A listener whose
    /// thread has died (its source closed) is cleaned up and replaced.
    ///
    /// # Errors
    ///
    /// `ListenerInstallError` if the event source refuses the subscription;
    /// the engine stays Stopped.
    pub fn start(&self) -> Result<bool, ListenerInstallError> {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(handle) = listener.as_ref() {
            if handle.is_alive() {
                return Ok(false);
            }
        }

        if let Some(dead) = listener.take() {
            info!("replacing exited hotkey listener");
            dead.uninstall();
        }

        let handle = HotkeyListener::new(
            Arc::clone(&self.store),
            Arc::clone(&self.executor),
            Arc::clone(&self.counters),
            self.retrigger,
        )
        .install(self.source.as_ref())?;

        *listener = Some(handle);
        info!(retrigger = ?self.retrigger, "engine started");
        Ok(true)
    }

    /// Uninstalls the listener and cancels in-flight runs, waiting for them
    /// to wind down.
    ///
    /// Returns `false` if the engine was already stopped.
    pub fn stop(&self) -> bool {
        let mut listener = self.listener.lock().unwrap_or_else(PoisonError::into_inner);

        match listener.take() {
            Some(handle) => {
                handle.uninstall();
                info!("engine stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(ListenerHandle::is_alive)
            .unwrap_or(false)
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn retrigger_policy(&self) -> RetriggerPolicy {
        self.retrigger
    }
}

#[cfg(test)]
mod tests;
