//! Tracks which command kinds have a request outstanding.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use super::CommandKind;
use crate::{DashboardError, Result};

/// At most one request per command kind. Slots are released by dropping
/// the guard, so every exit path frees them.
#[derive(Clone, Default)]
pub struct InFlight {
    kinds: Arc<Mutex<HashSet<CommandKind>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for `kind`, or fail with `Busy`.
    pub fn try_begin(&self, kind: CommandKind) -> Result<InFlightGuard> {
        if !self.lock().insert(kind) {
            return Err(DashboardError::Busy(kind));
        }
        Ok(InFlightGuard {
            kinds: self.kinds.clone(),
            kind,
        })
    }

    pub fn is_in_flight(&self, kind: CommandKind) -> bool {
        self.lock().contains(&kind)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<CommandKind>> {
        self.kinds.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct InFlightGuard {
    kinds: Arc<Mutex<HashSet<CommandKind>>>,
    kind: CommandKind,
}

impl InFlightGuard {
    pub fn kind(&self) -> CommandKind {
        self.kind
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut kinds = self.kinds.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        kinds.remove(&self.kind);
    }
}
