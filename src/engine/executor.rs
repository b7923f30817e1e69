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

//! Plays a key sequence against the injector
//!
//! Each step waits its delay FIRST and then presses its key, so a step
//! with `delay_ms == 0` fires immediately after the previous one.
//! Cancellation is checked before every step and interrupts a delay in
//! progress. A failed press is logged and counted; the run goes on.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::core::KeyStep;
use crate::engine::cancel::CancelToken;
use crate::engine::input::KeyInjector;

/// What a single run did
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunStats {
    /// Steps whose key was pressed successfully
    pub injected: usize,

    /// Steps whose press failed
    pub failed: usize,

    #[serde(skip)]
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// Every step was attempted
    Completed(RunStats),

    /// Stopped early by the cancel token
    Cancelled(RunStats),
}

impl RunOutcome {
    pub fn stats(&self) -> RunStats {
        match self {
            RunOutcome::Completed(stats) | RunOutcome::Cancelled(stats) => *stats,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled(_))
    }
}

pub struct SequenceExecutor {
    injector: Arc<dyn KeyInjector>,
}

impl SequenceExecutor {
    pub fn new(injector: Arc<dyn KeyInjector>) -> Self {
        Self { injector }
    }

    /// Runs `steps` in order on the calling thread.
    pub fn run(&self, name: &str, steps: &[KeyStep], cancel: &CancelToken) -> RunOutcome {
        let started = Instant::now();
        let mut stats = RunStats::default();

        debug!(mapping = name, steps = steps.len(), "sequence started");

        for (index, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() || cancel.wait(step.delay()) {
                stats.elapsed = started.elapsed();
                debug!(mapping = name, at_step = index + 1, "sequence cancelled");
                return RunOutcome::Cancelled(stats);
            }

            match self.injector.press(&step.key) {
                Ok(()) => {
                    stats.injected += 1;
                    trace!(mapping = name, step = index + 1, key = %step.key, "key injected");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(mapping = name, step = index + 1, key = %step.key, error = %e,
                        "key injection failed, continuing");
                }
            }
        }

        stats.elapsed = started.elapsed();
        debug!(mapping = name, injected = stats.injected, failed = stats.failed,
            elapsed_ms = stats.elapsed.as_millis() as u64, "sequence completed");
        RunOutcome::Completed(stats)
    }
}
