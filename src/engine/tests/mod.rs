//! Engine test doubles and helpers shared by the engine test modules


use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::core::{parse_sequence, Mapping, Modifier};
use crate::engine::input::{InjectionError, KeyInjector};
use crate::store::MappingStore;

/// Injector that records every press with its timestamp
#[derive(Default)]
pub(super) struct RecordingInjector {
    presses: Mutex<Vec<(Instant, String)>>,
    failing: HashSet<String>,
}

impl RecordingInjector {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Presses of these tokens fail (and are not recorded)
    pub(super) fn failing(keys: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            presses: Mutex::new(Vec::new()),
            failing: keys.iter().map(|k| k.to_string()).collect(),
        })
    }

    pub(super) fn keys(&self) -> Vec<String> {
        self.presses.lock().unwrap().iter().map(|(_, k)| k.clone()).collect()
    }

    pub(super) fn timed(&self) -> Vec<(Instant, String)> {
        self.presses.lock().unwrap().clone()
    }

    fn record(&self, token: String) -> Result<(), InjectionError> {
        if self.failing.contains(&token) {
            return Err(InjectionError::Failed {
                key: token,
                reason: "simulated failure".to_string(),
            });
        }
        self.presses.lock().unwrap().push((Instant::now(), token));
        Ok(())
    }
}

impl KeyInjector for RecordingInjector {
    fn press_key(&self, key: &str) -> Result<(), InjectionError> {
        self.record(key.to_string())
    }

    fn press_combo(&self, modifiers: &[Modifier], key: &str) -> Result<(), InjectionError> {
        let mut token: Vec<&str> = modifiers.iter().map(|m| m.as_str()).collect();
        token.push(key);
        self.record(token.join("+"))
    }
}

/// Polls `condition` until it holds or `timeout` passes.
pub(super) fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Creates an enabled mapping from a sequence string
pub(super) fn enabled_mapping(
    store: &MappingStore,
    name: &str,
    start_key: &str,
    sequence: &str,
) -> Mapping {
    let keys = parse_sequence(sequence, 0).unwrap();
    store.create(name, start_key, keys, true).unwrap()
}
