//! Traversal state owned by a single pass over a sheet.

use std::collections::HashMap;

use crate::binding::MessageBinding;

/// Column position of one traversal. Only ever moves right.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    position: usize,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn advance(&mut self, columns: usize) {
        self.position += columns;
    }
}

/// Field-number counters, one per open message scope.
///
/// The bottom frame belongs to the top-level record; entering a struct pushes
/// a fresh counter starting at 1 and leaving it pops back to the parent. Each
/// frame also remembers the nested message types declared in it, with the
/// shape they were first declared with.
#[derive(Debug, Clone)]
pub struct FieldIndexStack {
    frames: Vec<Frame>,
}

#[derive(Debug, Clone)]
struct Frame {
    next: u32,
    declared: HashMap<String, MessageBinding>,
}

impl Frame {
    fn new() -> Self {
        Self {
            next: FieldIndexStack::BASE,
            declared: HashMap::new(),
        }
    }
}

impl Default for FieldIndexStack {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldIndexStack {
    pub const BASE: u32 = 1;

    pub fn new() -> Self {
        Self {
            frames: vec![Frame::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "top-level scope must not be popped");
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn top(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("field index stack always holds the top-level frame")
    }

    /// Number for the next field in the innermost scope.
    pub fn next_index(&mut self) -> u32 {
        let top = self.top();
        let index = top.next;
        top.next += 1;
        index
    }

    /// Shape of the nested message `name` if the innermost scope already
    /// declares it.
    pub fn declared(&self, name: &str) -> Option<&MessageBinding> {
        self.frames.last().and_then(|frame| frame.declared.get(name))
    }

    /// Records a nested message declaration in the innermost scope. Returns
    /// false, keeping the first shape, if its name was already declared there.
    pub fn declare(&mut self, message: MessageBinding) -> bool {
        let declared = &mut self.top().declared;
        if declared.contains_key(&message.name) {
            return false;
        }
        declared.insert(message.name.clone(), message);
        true
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_advances_monotonically() {
        let mut cursor = Cursor::new();
        cursor.advance(1);
        cursor.advance(3);
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn numbering_restarts_per_scope() {
        let mut stack = FieldIndexStack::new();
        assert_eq!(stack.next_index(), 1);
        assert_eq!(stack.next_index(), 2);
        stack.push();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.next_index(), 1);
        assert_eq!(stack.next_index(), 2);
        stack.pop();
        assert_eq!(stack.next_index(), 3);
        stack.push();
        assert_eq!(stack.next_index(), 1);
    }

    #[test]
    fn declarations_are_scoped() {
        let reward = || MessageBinding::new("Reward");
        let mut stack = FieldIndexStack::new();
        assert!(stack.declared("Reward").is_none());
        assert!(stack.declare(reward()));
        assert!(!stack.declare(reward()));
        stack.push();
        assert!(stack.declared("Reward").is_none());
        assert!(stack.declare(reward()));
        stack.pop();
        assert_eq!(stack.declared("Reward"), Some(&reward()));
    }
}
