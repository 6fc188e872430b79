// SPDX-License-Identifier: Apache-2.0
//! listeners
//!
//! Layer: Application
//! Purpose:
//! - ordered registry of message listeners and fan-out to them
//!
//! Notes:
//! - Dispatch walks a snapshot. Removing a listener (even itself) from inside
//!   a callback takes effect for later frames and never skips another listener.

use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use tracing::warn;

use crate::domain::message::Message;

pub type Listener = Arc<dyn Fn(&Message) + Send + Sync>;

/// Handle returned on registration; used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener; returns its handle and the new count.
    pub fn insert(&self, listener: Listener) -> (ListenerId, usize) {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.push((id, listener));
        (id, entries.len())
    }

    /// Remove by handle; returns the remaining count, or `None` if the handle
    /// was already gone.
    pub fn remove(&self, id: ListenerId) -> Option<usize> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let pos = entries.iter().position(|(entry, _)| *entry == id)?;
        entries.remove(pos);
        Some(entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: ListenerId) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|(entry, _)| *entry == id)
    }

    /// Deliver `msg` to every listener in registration order.
    pub fn dispatch(&self, msg: &Message) {
        let snapshot: Vec<(ListenerId, Listener)> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in snapshot {
            // removed by an earlier listener in this same pass
            if !self.contains(id) {
                continue;
            }
            if catch_unwind(AssertUnwindSafe(|| listener(msg))).is_err() {
                warn!(listener=?id, msg_id=msg.id(), "message listener panicked");
            }
        }
    }
}
