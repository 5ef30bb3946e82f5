//! Per-conversation message windows.

use std::collections::VecDeque;
use std::sync::Arc;

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use tokio::sync::Mutex;
use tracing::debug;

use milesdesk_llm::ChatMessage;
use milesdesk_shared::MemoryId;

// ---------------------------------------------------------------------------
// MessageWindow
// ---------------------------------------------------------------------------

/// Bounded transcript: once full, each push evicts the oldest message.
#[derive(Debug, Clone)]
pub struct MessageWindow {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
}

impl MessageWindow {
    /// A window holding at most `capacity` messages (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a message, returning the evicted one if the window was full.
    pub fn push(&mut self, message: ChatMessage) -> Option<ChatMessage> {
        let evicted = if self.messages.len() == self.capacity {
            self.messages.pop_front()
        } else {
            None
        };
        self.messages.push_back(message);
        evicted
    }

    /// Messages in insertion order, oldest first.
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

// ---------------------------------------------------------------------------
// ChatMemoryStore
// ---------------------------------------------------------------------------

/// Process-local transcripts keyed by [`MemoryId`].
///
/// At most `max_conversations` transcripts are kept; beyond that the least
/// recently used one is dropped.
#[derive(Debug)]
pub struct ChatMemoryStore {
    max_messages: usize,
    windows: Cache<MemoryId, Arc<Mutex<MessageWindow>>>,
}

impl ChatMemoryStore {
    pub fn new(max_messages: usize, max_conversations: u64) -> Self {
        let windows = Cache::builder()
            .max_capacity(max_conversations.max(1))
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(|id: Arc<MemoryId>, _window, cause| {
                if matches!(cause, RemovalCause::Size) {
                    debug!(memory_id = %id, "evicted least recently used conversation");
                }
            })
            .build();
        Self { max_messages, windows }
    }

    /// Copy of the conversation's messages, oldest first.
    pub async fn history(&self, id: &MemoryId) -> Vec<ChatMessage> {
        let Some(window) = self.windows.get(id) else {
            return Vec::new();
        };
        let window = window.lock().await;
        window.messages().cloned().collect()
    }

    pub async fn append(&self, id: &MemoryId, messages: impl IntoIterator<Item = ChatMessage>) {
        let window = self
            .windows
            .get_with_by_ref(id, || Arc::new(Mutex::new(MessageWindow::new(self.max_messages))));
        let mut window = window.lock().await;

        let evicted = messages
            .into_iter()
            .filter_map(|m| window.push(m))
            .count();
        if evicted > 0 {
            debug!(memory_id = %id, evicted, "evicted oldest messages");
        }
    }

    pub async fn clear(&self, id: &MemoryId) {
        self.windows.invalidate(id);
    }

    /// Number of conversations held, after pending evictions are applied.
    pub async fn conversation_count(&self) -> usize {
        self.windows.run_pending_tasks();
        self.windows.entry_count() as usize
    }
}
