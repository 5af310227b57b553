use crate::mutator::Operation;

/// Default number of undoable commands kept per project.
pub const HISTORY_LIMIT: usize = 200;

/// A confirmed mutation, stored as data so it can be replayed either way.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub label: String,
    pub undo: Operation,
    pub redo: Operation,
}

impl Command {
    pub fn new(label: impl Into<String>, redo: Operation, undo: Operation) -> Self {
        Self {
            label: label.into(),
            undo,
            redo,
        }
    }
}

/// Past/future command stacks. Commands are taken off a stack while they
/// run and handed back with [`CommandHistory::finish_undo`] (moved to the
/// other stack) or [`CommandHistory::restore_undo`] (put back in place).
#[derive(Debug)]
pub struct CommandHistory {
    past: Vec<Command>,
    future: Vec<Command>,
    limit: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(HISTORY_LIMIT)
    }
}

impl CommandHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Records a freshly executed command and invalidates the redo stack.
    pub fn record(&mut self, command: Command) {
        self.push_past(command);
        self.future.clear();
    }

    fn push_past(&mut self, command: Command) {
        self.past.push(command);
        if self.past.len() > self.limit {
            let overflow = self.past.len() - self.limit;
            self.past.drain(0..overflow);
        }
    }

    pub fn take_undo(&mut self) -> Option<Command> {
        self.past.pop()
    }

    pub fn finish_undo(&mut self, command: Command) {
        self.future.push(command);
    }

    pub fn restore_undo(&mut self, command: Command) {
        self.past.push(command);
    }

    pub fn take_redo(&mut self) -> Option<Command> {
        self.future.pop()
    }

    pub fn finish_redo(&mut self, command: Command) {
        self.push_past(command);
    }

    pub fn restore_redo(&mut self, command: Command) {
        self.future.push(command);
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.past.last().map(|c| c.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.future.last().map(|c| c.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.past.len()
    }

    pub fn is_empty(&self) -> bool {
        self.past.is_empty() && self.future.is_empty()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;
    use crate::mutator::EntityRef;

    fn command(label: &str) -> Command {
        let id = EntityId::temporary();
        Command::new(
            label,
            Operation::Remove(EntityRef::Prompt(id)),
            Operation::Remove(EntityRef::Prompt(id)),
        )
    }

    #[test]
    fn recording_clears_the_redo_stack() {
        let mut history = CommandHistory::default();
        history.record(command("a"));
        let a = history.take_undo().unwrap();
        history.finish_undo(a);
        assert!(history.can_redo());
        history.record(command("b"));
        assert!(!history.can_redo());
        assert_eq!(history.undo_label(), Some("b"));
    }

    #[test]
    fn oldest_commands_fall_off_past_the_limit() {
        let mut history = CommandHistory::new(3);
        for label in ["a", "b", "c", "d"] {
            history.record(command(label));
        }
        assert_eq!(history.len(), 3);
        let mut labels = Vec::new();
        while let Some(c) = history.take_undo() {
            labels.push(c.label);
        }
        assert_eq!(labels, ["d", "c", "b"]);
    }

    #[test]
    fn restored_commands_keep_their_place() {
        let mut history = CommandHistory::default();
        history.record(command("a"));
        history.record(command("b"));
        let b = history.take_undo().unwrap();
        history.restore_undo(b);
        assert_eq!(history.undo_label(), Some("b"));
        assert!(!history.can_redo());

        let b = history.take_undo().unwrap();
        history.finish_undo(b);
        let b = history.take_redo().unwrap();
        history.restore_redo(b);
        assert_eq!(history.redo_label(), Some("b"));
        assert_eq!(history.undo_label(), Some("a"));
    }

    #[test]
    fn clear_empties_both_stacks() {
        let mut history = CommandHistory::default();
        history.record(command("a"));
        history.record(command("b"));
        let b = history.take_undo().unwrap();
        history.finish_undo(b);
        history.clear();
        assert!(history.is_empty());
        assert!(!history.can_undo() && !history.can_redo());
    }
}
