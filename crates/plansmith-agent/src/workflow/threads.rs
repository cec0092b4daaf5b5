use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use plansmith_core::types::ThreadId;

use super::state::Exchange;

struct ThreadEntry {
    history: Vec<Exchange>,
    last_used: u64,
}

#[derive(Default)]
struct Inner {
    threads: HashMap<String, ThreadEntry>,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Per-thread conversation history, kept in memory.
///
/// Bounded both per thread and in the number of threads; past `max_threads`
/// the least recently used thread is evicted.
#[derive(Default)]
pub struct ThreadStore {
    inner: Mutex<Inner>,
    max_per_thread: Option<usize>,
    max_threads: Option<usize>,
}

impl ThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max` exchanges per thread, dropping the oldest.
    pub fn with_capacity_per_thread(mut self, max: usize) -> Self {
        self.max_per_thread = Some(max);
        self
    }

    /// Keep at most `max` threads, evicting the least recently used.
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = Some(max.max(1));
        self
    }

    pub fn append(&self, thread: &ThreadId, exchange: Exchange) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = inner.tick();

        if !inner.threads.contains_key(&thread.0) {
            if let Some(max) = self.max_threads {
                while inner.threads.len() >= max {
                    let oldest = inner
                        .threads
                        .iter()
                        .min_by_key(|(_, entry)| entry.last_used)
                        .map(|(id, _)| id.clone());
                    match oldest {
                        Some(id) => {
                            debug!(thread = %id, "Evicting least recently used thread");
                            inner.threads.remove(&id);
                        }
                        None => break,
                    }
                }
            }
        }

        let entry = inner
            .threads
            .entry(thread.0.clone())
            .or_insert_with(|| ThreadEntry {
                history: Vec::new(),
                last_used: now,
            });
        entry.last_used = now;
        entry.history.push(exchange);
        if let Some(max) = self.max_per_thread {
            if entry.history.len() > max {
                let excess = entry.history.len() - max;
                entry.history.drain(..excess);
            }
        }
    }

    /// The most recent `limit` exchanges, oldest first. Marks the thread used.
    pub fn recent(&self, thread: &ThreadId, limit: usize) -> Vec<Exchange> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = inner.tick();
        match inner.threads.get_mut(&thread.0) {
            Some(entry) => {
                entry.last_used = now;
                let h = &entry.history;
                h[h.len().saturating_sub(limit)..].to_vec()
            }
            None => Vec::new(),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .threads
            .len()
    }
}
