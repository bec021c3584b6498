//! Reusable token arena.
//!
//! Tokens are handed out as `(index, generation)` handles into a slab of
//! pre-allocated [`Token`] slots. [`TokenPool::reuse`] bumps the generation, which
//! invalidates every handle issued before it in one step and makes the slots
//! available again without freeing their string buffers. Reading through a stale
//! handle is rejected with [`LingoError::PoolContractViolation`].
//!
//! The pool keeps a "hard" reserve of slots that is never released, plus soft
//! growth in fixed increments. Once the working set stabilizes, acquiring tokens
//! does not allocate. The pool is not synchronized; each tokenizer owns its own.

use serde::{Deserialize, Serialize};

use crate::error::{LingoError, LingoResult};
use crate::tokenizer::{Token, TokenKind};

/// Handle to a pooled token. Valid until the next [`TokenPool::reuse`].
///
/// The default handle is never valid: pool generations start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TokenHandle {
    index: u32,
    generation: u32,
}

impl TokenHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Sizing of a [`TokenPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Slots allocated up front and kept across `trim`.
    pub hard_size: usize,
    /// Slots added whenever the pool runs dry.
    pub soft_increment: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            hard_size: 500,
            soft_increment: 1000,
        }
    }
}

/// Generation-checked arena of reusable tokens.
pub struct TokenPool {
    slots: Vec<Token>,
    issued: usize,
    generation: u32,
    config: PoolConfig,
    growths: usize,
}

impl TokenPool {
    pub fn new(config: PoolConfig) -> Self {
        let mut slots = Vec::with_capacity(config.hard_size);
        slots.resize_with(config.hard_size, Token::default);
        Self {
            slots,
            issued: 0,
            generation: 1,
            config,
            growths: 0,
        }
    }

    /// Takes a free slot, growing the slab by the soft increment if none is left.
    /// The slot keeps whatever content it had; callers assign it before use.
    pub fn acquire(&mut self) -> TokenHandle {
        if self.issued == self.slots.len() {
            let increment = self.config.soft_increment.max(1);
            self.slots
                .resize_with(self.slots.len() + increment, Token::default);
            self.growths += 1;
        }
        let handle = TokenHandle {
            index: self.issued as u32,
            generation: self.generation,
        };
        self.issued += 1;
        handle
    }

    /// Acquires a slot and overwrites it in place, reusing the slot's string buffer.
    pub fn acquire_assigned(
        &mut self,
        text: &str,
        kind: TokenKind,
        sentence_delimiter: bool,
    ) -> TokenHandle {
        let handle = self.acquire();
        self.slots[handle.index as usize].assign(text, kind, sentence_delimiter);
        handle
    }

    pub fn get(&self, handle: TokenHandle) -> LingoResult<&Token> {
        self.check(handle)?;
        Ok(&self.slots[handle.index as usize])
    }

    pub fn get_mut(&mut self, handle: TokenHandle) -> LingoResult<&mut Token> {
        self.check(handle)?;
        Ok(&mut self.slots[handle.index as usize])
    }

    /// Invalidates every handle issued so far and recycles all slots.
    pub fn reuse(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.generation = 1;
        }
        self.issued = 0;
    }

    /// Releases soft slots that are not currently issued, keeping the hard reserve.
    pub fn trim(&mut self) {
        let keep = self.issued.max(self.config.hard_size);
        self.slots.truncate(keep);
        self.slots.shrink_to(keep);
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of times the slab had to grow since construction.
    pub fn growths(&self) -> usize {
        self.growths
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    fn check(&self, handle: TokenHandle) -> LingoResult<()> {
        if handle.generation != self.generation || handle.index as usize >= self.issued {
            return Err(LingoError::PoolContractViolation {
                index: handle.index,
                generation: handle.generation,
                current: self.generation,
            });
        }
        Ok(())
    }
}

impl Default for TokenPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}
