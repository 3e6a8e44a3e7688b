//! Nested checkpoints over a cloneable state
//!
//! Creating a checkpoint saves a copy of the current state under a fresh id.
//! Committing drops the copy and keeps the current state, reverting restores
//! the copy. Ids are handed out in increasing order and never reused; id 0
//! is the base, which can never be popped.

use crate::StateError;

/// Stack of saved states, one per open checkpoint.
#[derive(Clone, Debug)]
pub struct CheckpointStack<T> {
    current: T,
    /// (checkpoint id, state when the checkpoint was created)
    saved: Vec<(u32, T)>,
    next_id: u32,
}

impl<T: Clone> CheckpointStack<T> {
    /// Start at the base checkpoint with `base` as the current state.
    pub const fn new(base: T) -> Self {
        Self { current: base, saved: Vec::new(), next_id: 1 }
    }

    /// Current state.
    pub const fn current(&self) -> &T {
        &self.current
    }

    /// Mutable current state.
    pub const fn current_mut(&mut self) -> &mut T {
        &mut self.current
    }

    /// Id of the innermost open checkpoint, 0 at the base.
    pub fn checkpoint_id(&self) -> u32 {
        self.saved.last().map_or(0, |(id, _)| *id)
    }

    /// Number of open checkpoints above the base.
    pub const fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Open a checkpoint, returning its id.
    pub fn create(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.saved.push((id, self.current.clone()));
        id
    }

    /// Close the innermost checkpoint keeping every change made inside it.
    /// Returns the id that becomes current.
    pub fn commit(&mut self) -> Result<u32, StateError> {
        self.saved.pop().ok_or(StateError::StackDiscipline { operation: "commit_checkpoint" })?;
        Ok(self.checkpoint_id())
    }

    /// Close the innermost checkpoint discarding every change made inside it.
    /// Returns the id that becomes current.
    pub fn revert(&mut self) -> Result<u32, StateError> {
        let (_, state) = self
            .saved
            .pop()
            .ok_or(StateError::StackDiscipline { operation: "revert_checkpoint" })?;
        self.current = state;
        Ok(self.checkpoint_id())
    }

    /// Fail unless a checkpoint above the base is open.
    pub fn ensure_open(&self, operation: &'static str) -> Result<(), StateError> {
        if self.saved.is_empty() {
            return Err(StateError::StackDiscipline { operation });
        }
        Ok(())
    }

    /// Consume the stack, returning the current state.
    pub fn into_current(self) -> T {
        self.current
    }
}

impl<T: Clone + Default> Default for CheckpointStack<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
