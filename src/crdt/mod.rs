// model = "claude-opus-4-5"
// created = "2026-02-02"
// modified = "2026-02-03"
// driver = "Isaac Clayton"

//! Convergent data types for the buffer's document state.
//!
//! Every stream of buffer state (the character string, token types,
//! diagnostics, cursors, and so on) follows one contract: state is an
//! immutable value, and integrating a command produces a new value that
//! shares structure with the old one. Collaborators batch commands into
//! a `CommandBuf` per stream; the buffer folds each batch into the
//! authoritative state.

pub mod attr;
pub mod avl;
pub mod woot;

/// A stream of CRDT state. Integration must be deterministic, and for
/// commands minted on different sites it must commute, so that every
/// replica converges regardless of delivery order.
pub trait Integrate: Sized {
    /// The reified operation for this stream.
    type Command;

    /// Fold one command into the state, returning the new state.
    fn integrate(&self, command: &Self::Command) -> Self;
}

/// An ordered batch of commands for a single stream.
#[derive(Clone, Debug)]
pub struct CommandBuf<C> {
    commands: Vec<C>,
}

impl<C> CommandBuf<C> {
    /// Create an empty batch.
    pub fn new() -> CommandBuf<C> {
        return CommandBuf { commands: Vec::new() };
    }

    /// Append a command to the batch.
    pub fn push(&mut self, command: C) {
        self.commands.push(command);
    }

    /// True if the batch holds no commands.
    pub fn is_empty(&self) -> bool {
        return self.commands.is_empty();
    }

    /// Number of commands in the batch.
    pub fn len(&self) -> usize {
        return self.commands.len();
    }

    /// Iterate commands in batch order.
    pub fn iter(&self) -> std::slice::Iter<'_, C> {
        return self.commands.iter();
    }
}

impl<C> Default for CommandBuf<C> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<C> FromIterator<C> for CommandBuf<C> {
    fn from_iter<I: IntoIterator<Item = C>>(iter: I) -> Self {
        return CommandBuf {
            commands: iter.into_iter().collect(),
        };
    }
}

/// Fold a whole batch into a stream's state, in batch order.
pub fn integrate_all<S: Integrate>(state: &mut S, commands: &CommandBuf<S::Command>) {
    for command in commands.iter() {
        *state = state.integrate(command);
    }
}
