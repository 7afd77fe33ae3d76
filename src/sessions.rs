//! Bounded in-memory session store.
//!
//! Threads are keyed by caller-chosen session id. The store holds at most
//! `capacity` sessions; inserting past that evicts the oldest-created
//! session. Eviction is by insertion order, not access order: a long-lived
//! busy session still ages out once enough newer sessions have been created.
//! That keeps eviction predictable under scripted load.
//!
//! Each thread is handed out as `Arc<tokio::sync::Mutex<Thread>>`, so a
//! request already running against a session keeps its thread alive even if
//! the store evicts the entry mid-flight.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::llm::Message;

pub const DEFAULT_SESSION_CAP: usize = 100;

/// One conversation: the persisted message history.
#[derive(Debug, Default)]
pub struct Thread {
    pub messages: Vec<Message>,
}

pub type SharedThread = Arc<tokio::sync::Mutex<Thread>>;

pub struct SessionStore {
    capacity: usize,
    inner: Mutex<Inner>,
}

struct Inner {
    map: HashMap<String, SharedThread>,
    /// Insertion order, oldest first. Always the same key set as `map`.
    order: VecDeque<String>,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "session capacity must be positive");
        Self {
            capacity,
            inner: Mutex::new(Inner { map: HashMap::new(), order: VecDeque::new() }),
        }
    }

    /// Fetch the thread for `session_id`, creating it if absent.
    ///
    /// Creation that would exceed capacity evicts the oldest-created session
    /// first; the lookup, eviction, and insert happen under one lock so two
    /// concurrent calls can never push the store past capacity.
    pub fn get_or_create(&self, session_id: &str) -> SharedThread {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(thread) = inner.map.get(session_id) {
            return Arc::clone(thread);
        }

        while inner.map.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
                info!(session = %oldest, "evicted oldest session at capacity");
            } else {
                break;
            }
        }

        debug!(session = %session_id, "created session");
        let thread: SharedThread = Arc::new(tokio::sync::Mutex::new(Thread::default()));
        inner.order.push_back(session_id.to_string());
        inner.map.insert(session_id.to_string(), Arc::clone(&thread));
        thread
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map
            .contains_key(session_id)
    }
}
