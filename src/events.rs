//! Activation queue with peek/commit semantics.
//!
//! Core 0 pushes an activation after every reported reaction; core 1 peeks
//! the oldest one, publishes it, and only then commits it. An activation is
//! therefore never lost to a dropped MQTT connection, only to overflow.

use core::cell::RefCell;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Deque;

pub const MAX_ACTIVATIONS: usize = 16;

/// A reaction to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    pub token_id: u64,
    pub name: &'static str,
    /// Uptime when the reaction finished.
    pub at_ms: u64,
}

pub struct ActivationQueue {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Deque<Activation, MAX_ACTIVATIONS>>>,
}

impl ActivationQueue {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Queue an activation. If the queue is full, the oldest one is discarded.
    pub fn push(&self, activation: Activation) {
        self.inner.lock(|cell| {
            let mut queue = cell.borrow_mut();
            if queue.is_full() {
                log::warn!("events: queue full, dropping oldest activation");
                queue.pop_front();
            }
            let _ = queue.push_back(activation);
        });
    }

    /// Oldest pending activation, left in the queue.
    pub fn peek(&self) -> Option<Activation> {
        self.inner.lock(|cell| cell.borrow().front().copied())
    }

    /// Remove `sent` after it was delivered. A no-op if overflow already
    /// pushed it out.
    pub fn commit(&self, sent: &Activation) {
        self.inner.lock(|cell| {
            let mut queue = cell.borrow_mut();
            if queue.front() == Some(sent) {
                queue.pop_front();
            } else {
                log::debug!("events: committed activation already dropped");
            }
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock(|cell| cell.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ActivationQueue {
    fn default() -> Self {
        Self::new()
    }
}
