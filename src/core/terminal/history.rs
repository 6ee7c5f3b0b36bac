use std::collections::VecDeque;

/// Most-recent-first ring of distinct commands for recall
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl CommandHistory {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a command at the front. A repeated command moves to the
    /// front instead of being stored twice.
    pub fn push(&mut self, command: &str) {
        if let Some(pos) = self.entries.iter().position(|c| c == command) {
            self.entries.remove(pos);
        }
        self.entries.push_front(command.to_string());
        self.entries.truncate(self.capacity);
    }

    /// Command `index` steps back in time, 0 being the latest
    pub fn recall(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
