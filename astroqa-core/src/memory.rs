//! Bounded conversation memory.
//!
//! A session-scoped sliding window of conversation turns. Capacity is
//! `2 * max_history_turns` (one slot each for the user and assistant message
//! of an exchange); eviction removes oldest turns first so the retained
//! window always holds the most recent exchanges in chronological order.

use crate::types::Message;
use std::collections::VecDeque;

/// Default number of retained user+assistant exchange pairs.
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 5;

/// Fixed-capacity conversation window.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    turns: VecDeque<Message>,
    capacity: usize,
}

impl ConversationMemory {
    /// Create a memory retaining at most `max_history_turns` exchange pairs.
    pub fn new(max_history_turns: usize) -> Self {
        let capacity = max_history_turns * 2;
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one turn at the tail, evicting from the head past capacity.
    pub fn append(&mut self, turn: Message) {
        self.turns.push_back(turn);
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }

    /// The retained turns in chronological order.
    pub fn window(&self) -> impl Iterator<Item = &Message> {
        self.turns.iter()
    }

    /// Clear all turns. Batch evaluation resets before every question so
    /// metric scoring sees no cross-question leakage.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_TURNS)
    }
}
