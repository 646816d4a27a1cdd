//! Label stack for structured control flow
//!
//! Each active `block`, `loop` or `if` pushes a label recording how many
//! values a branch to it carries and how tall the operand stack was on entry.
//! A branch keeps the top `arity` values, discards everything down to the
//! label's height and pushes the kept values back.

/// How a run of instructions finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEnd {
    /// Fell off the end
    Normal,
    /// A `return` is unwinding the current function
    Return,
    /// A branch to the label `n` levels up is unwinding
    Branch(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelType {
    Block,
    /// Branches target the start of the loop, so they carry its parameters
    Loop,
    If,
}

#[derive(Debug, Clone, Copy)]
pub struct Label {
    pub label_type: LabelType,
    /// Values a branch to this label carries
    pub arity: usize,
    /// Height of the operand stack below this label's parameters
    pub stack_height: usize,
}

#[derive(Debug, Default)]
pub struct LabelStack {
    labels: Vec<Label>,
}

impl LabelStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn pop(&mut self) -> Option<Label> {
        self.labels.pop()
    }

    /// The `depth`-th label from the top, counting from zero
    pub fn get(&self, depth: u32) -> Option<&Label> {
        let idx = self.labels.len().checked_sub(depth as usize + 1)?;
        self.labels.get(idx)
    }

    pub fn depth(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
