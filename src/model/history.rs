/// Default number of snapshots kept.
pub const HISTORY_LIMIT: usize = 20;

/// Bounded linear undo/redo history of whole-project snapshots.
///
/// `entries[index]` is the current state. Pushing drops every entry after
/// the current one, then trims the oldest entries beyond `limit`.
#[derive(Debug, Clone)]
pub struct UndoHistory<T> {
    entries: Vec<T>,
    index: usize,
    limit: usize,
}

impl<T> Default for UndoHistory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> UndoHistory<T> {
    pub fn new() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: 0,
            limit: limit.max(1),
        }
    }

    /// A history holding `initial` as its only (current) state.
    pub fn with_initial(initial: T, limit: usize) -> Self {
        let mut history = Self::with_limit(limit);
        history.push(initial);
        history
    }

    /// Record a new current state, discarding any redo branch.
    pub fn push(&mut self, state: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(state);
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
        self.index = self.entries.len() - 1;
    }

    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.index)
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Step back one state and return it.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.index -= 1;
        self.current()
    }

    /// Step forward one state and return it.
    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.index += 1;
        self.current()
    }

    /// Drop every state except the current one.
    pub fn clear(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        let current = self.entries.swap_remove(self.index);
        self.entries.clear();
        self.entries.push(current);
        self.index = 0;
    }

    /// Replace all history with `state`.
    pub fn reset(&mut self, state: T) {
        self.entries.clear();
        self.entries.push(state);
        self.index = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn fresh_history_has_nothing_to_undo() {
        let mut history: UndoHistory<u32> = UndoHistory::new();
        assert!(history.current().is_none());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.redo().is_none());
    }

    #[test]
    fn keeps_only_the_newest_twenty() {
        let mut history = UndoHistory::new();
        for i in 1..=25 {
            history.push(i);
        }
        assert_eq!(history.len(), 20);
        assert_eq!(history.entries().first(), Some(&6));
        assert_eq!(history.current(), Some(&25));
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn push_after_undo_truncates_the_redo_branch() {
        let mut history = UndoHistory::new();
        for s in ["s0", "s1", "s2", "s3"] {
            history.push(s);
        }
        assert_eq!(history.index(), 3);
        history.undo();
        assert_eq!(history.undo(), Some(&"s1"));
        history.push("s4");
        assert_eq!(history.entries(), &["s0", "s1", "s4"]);
        assert_eq!(history.index(), 2);
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_then_redo_walks_back_and_forth() {
        let mut history = UndoHistory::with_initial("a", 5);
        history.push("b");
        assert_eq!(history.undo(), Some(&"a"));
        assert!(history.can_redo());
        assert_eq!(history.redo(), Some(&"b"));
        assert!(history.redo().is_none());
    }

    #[test]
    fn clear_keeps_current_state() {
        let mut history = UndoHistory::new();
        history.push(1);
        history.push(2);
        history.push(3);
        history.undo();
        history.clear();
        assert_eq!(history.entries(), &[2]);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    proptest! {
        #[test]
        fn prop_length_never_exceeds_limit(pushes in 0usize..100, limit in 1usize..30) {
            let mut history = UndoHistory::with_limit(limit);
            for i in 0..pushes {
                history.push(i);
            }
            prop_assert_eq!(history.len(), pushes.min(limit));
            if pushes > 0 {
                prop_assert_eq!(history.current(), Some(&(pushes - 1)));
            }
        }
    }
}
