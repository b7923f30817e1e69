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

//! OS input capabilities
//!
//! The engine never talks to the operating system directly. It consumes two
//! capabilities:
//! - **`KeyInjector`**: emits synthetic key presses
//! - **`KeyEventSource`**: delivers physical key-down/key-up events
//!
//! This module also ships in-process implementations: `ChannelKeySource`
//! (events pushed by the caller, e.g. from stdin or a test) and
//! `DryRunInjector` (logs instead of pressing, like a dry-run client).
//!
//! # Example
//! ```
//! use macro_keymapper::engine::input::{ChannelKeySource, KeyEvent, KeyEventSource};
//!
//! let source = ChannelKeySource::new();
//! let events = source.subscribe()?;
//!
//! source.key_down("Delete");
//! assert_eq!(events.recv()?, KeyEvent::down("Delete"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::info;

use crate::core::{KeyToken, Modifier};

/// Failure to emit one synthetic key press
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum InjectionError {
    /// The OS refused or failed the press
    #[error("Failed to inject '{key}': {reason}")]
    Failed { key: String, reason: String },

    /// No injection backend is available
    #[error("Key injector unavailable: {0}")]
    Unavailable(String),
}

/// Failure to attach the listener to the event source
#[derive(Debug, Error)]
pub enum ListenerInstallError {
    /// The source is closed or refused the subscription
    #[error("Key event source unavailable: {0}")]
    SourceUnavailable(String),

    /// The listener thread could not be started
    #[error("Failed to spawn listener thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Direction of a physical key event
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyEventKind {
    Down,
    Up,
}

/// One physical key event as reported by the OS hook
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,

    /// Raw key name; not yet normalised
    pub key: String,
}

impl KeyEvent {
    pub fn down(key: &str) -> Self {
        Self {
            kind: KeyEventKind::Down,
            key: key.to_string(),
        }
    }

    pub fn up(key: &str) -> Self {
        Self {
            kind: KeyEventKind::Up,
            key: key.to_string(),
        }
    }
}

/// Synthetic key press capability.
///
/// A combination is pressed as one atomic step: modifiers down, main key
/// tapped, everything released. How that happens is the implementor's
/// concern.
pub trait KeyInjector: Send + Sync {
    fn press_key(&self, key: &str) -> Result<(), InjectionError>;

    fn press_combo(&self, modifiers: &[Modifier], key: &str) -> Result<(), InjectionError>;

    /// Presses a parsed token, routing combinations to `press_combo`.
    fn press(&self, token: &KeyToken) -> Result<(), InjectionError> {
        match token {
            KeyToken::Single(key) => self.press_key(key),
            KeyToken::Combo { key, .. } => self.press_combo(&token.modifiers(), key),
        }
    }
}

/// Physical key event stream capability.
///
/// Each subscription is an independent receiver. Dropping the receiver
/// unsubscribes; the source closing disconnects it.
pub trait KeyEventSource: Send + Sync {
    fn subscribe(&self) -> Result<Receiver<KeyEvent>, ListenerInstallError>;
}

/// In-process event source fed by `emit`
#[derive(Debug, Default)]
pub struct ChannelKeySource {
    subscribers: Mutex<Vec<Sender<KeyEvent>>>,
    closed: AtomicBool,
}

impl ChannelKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broadcasts `event` to every live subscriber, returning how many got it.
    ///
    /// Subscribers whose receiver was dropped are pruned.
    pub fn emit(&self, event: KeyEvent) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn key_down(&self, key: &str) -> usize {
        self.emit(KeyEvent::down(key))
    }

    pub fn key_up(&self, key: &str) -> usize {
        self.emit(KeyEvent::up(key))
    }

    /// Down immediately followed by up.
    pub fn tap(&self, key: &str) -> usize {
        self.key_down(key);
        self.key_up(key)
    }

    /// Number of subscriptions; dropped receivers are only noticed by `emit`.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Disconnects every subscriber and refuses new ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl KeyEventSource for ChannelKeySource {
    fn subscribe(&self) -> Result<Receiver<KeyEvent>, ListenerInstallError> {
        if self.is_closed() {
            return Err(ListenerInstallError::SourceUnavailable(
                "event source closed".to_string(),
            ));
        }

        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Ok(rx)
    }
}

/// Injector that only logs what it would press
#[derive(Debug, Default)]
pub struct DryRunInjector {
    presses: AtomicUsize,
}

impl DryRunInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total presses logged so far
    pub fn presses(&self) -> usize {
        self.presses.load(Ordering::SeqCst)
    }
}

impl KeyInjector for DryRunInjector {
    fn press_key(&self, key: &str) -> Result<(), InjectionError> {
        self.presses.fetch_add(1, Ordering::SeqCst);
        info!(key, "[DRY RUN] key press");
        Ok(())
    }

    fn press_combo(&self, modifiers: &[Modifier], key: &str) -> Result<(), InjectionError> {
        self.presses.fetch_add(1, Ordering::SeqCst);
        let held: Vec<&str> = modifiers.iter().map(|m| m.as_str()).collect();
        info!(modifiers = ?held, key, "[DRY RUN] combo press");
        Ok(())
    }
}
