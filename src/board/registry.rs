// src/board/registry.rs
//! Live-instance bookkeeping for models that allow a single session

use crate::error::{BoardError, BoardResult};
use crate::hal::types::BoardKind;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Counts prepared sessions per model. Clones share the same counts.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    live: Arc<Mutex<HashMap<BoardKind, usize>>>,
}

/// Held by a prepared session; dropping it frees the slot
#[derive(Debug)]
pub struct RegistryToken {
    kind: BoardKind,
    live: Arc<Mutex<HashMap<BoardKind, usize>>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a slot for `kind`. Exclusive models fail with
    /// [`BoardError::ResourceExhausted`] while another session holds one.
    pub fn acquire(&self, kind: BoardKind) -> BoardResult<RegistryToken> {
        let mut live = self.live.lock();
        let count = live.entry(kind).or_insert(0);
        if kind.is_exclusive() && *count > 0 {
            return Err(BoardError::ResourceExhausted(format!(
                "only one {} session may be prepared at a time",
                kind
            )));
        }
        *count += 1;
        debug!(board = %kind, live = *count, "registry slot acquired");
        Ok(RegistryToken {
            kind,
            live: self.live.clone(),
        })
    }

    pub fn live_count(&self, kind: BoardKind) -> usize {
        self.live.lock().get(&kind).copied().unwrap_or(0)
    }
}

impl RegistryToken {
    pub fn kind(&self) -> BoardKind {
        self.kind
    }
}

impl Drop for RegistryToken {
    fn drop(&mut self) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&self.kind) {
            *count = count.saturating_sub(1);
        }
    }
}
