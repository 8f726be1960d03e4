//! Drag coordinator: turns gesture events into at most one confirmed column move.
//!
//! ```text
//! Idle --GestureStart(x)--> Lifted(x)
//! Lifted(x) --Drop(None) | Cancel | Drop(same column)--> Idle
//! Lifted(x) --Drop(Some(t))--> Reconciling(x, t)   [issues the remote move]
//! Reconciling(x, t) --MoveResolved(ok)--> Idle     [store.apply_move(x, t)]
//! Reconciling(x, t) --MoveResolved(err)--> Idle    [store untouched]
//! any --SessionExpired--> Idle                      [store cleared]
//! ```

use shared::domain::{ContainerId, ItemId};
use tracing::{debug, warn};

use crate::board::BoardStore;

/// Every move lands in the head slot of its target column.
pub const MOVE_TARGET_POSITION: u32 = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Lifted(ItemId),
    Reconciling {
        item: ItemId,
        target: ContainerId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Confirmed,
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    GestureStart(ItemId),
    Drop(Option<ContainerId>),
    Cancel,
    MoveResolved {
        item: ItemId,
        target: ContainerId,
        outcome: MoveOutcome,
    },
    SessionExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    NoTarget,
    Cancelled,
    SameContainer,
    UnknownTarget,
    ItemGone,
}

/// Result of feeding one event to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Event did not apply in the current state.
    Unchanged,
    Lifted(ItemId),
    Suppressed(ItemId),
    Released { item: ItemId, reason: ReleaseReason },
    /// Caller must perform the remote move and report back with `MoveResolved`.
    IssueMove {
        item: ItemId,
        target: ContainerId,
        position: u32,
    },
    Moved { item: ItemId, target: ContainerId },
    MoveFailed {
        item: ItemId,
        target: ContainerId,
        reason: String,
    },
    Reset,
}

#[derive(Debug, Default)]
pub struct DragCoordinator {
    state: DragState,
}

impl DragCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_reconciling(&self) -> bool {
        matches!(self.state, DragState::Reconciling { .. })
    }

    pub fn handle(&mut self, event: DragEvent, store: &mut BoardStore) -> Transition {
        match event {
            DragEvent::GestureStart(item) => self.on_gesture_start(item, store),
            DragEvent::Drop(target) => self.on_drop(target, store),
            DragEvent::Cancel => match self.state {
                DragState::Lifted(item) => {
                    self.state = DragState::Idle;
                    Transition::Released {
                        item,
                        reason: ReleaseReason::Cancelled,
                    }
                }
                _ => Transition::Unchanged,
            },
            DragEvent::MoveResolved {
                item,
                target,
                outcome,
            } => self.on_move_resolved(item, target, outcome, store),
            DragEvent::SessionExpired => {
                self.state = DragState::Idle;
                store.clear();
                Transition::Reset
            }
        }
    }

    fn on_gesture_start(&mut self, item: ItemId, store: &BoardStore) -> Transition {
        match self.state {
            DragState::Idle => {
                if store.item(item).is_none() {
                    debug!(%item, "ignoring gesture on unknown item");
                    return Transition::Unchanged;
                }
                self.state = DragState::Lifted(item);
                Transition::Lifted(item)
            }
            DragState::Lifted(_) | DragState::Reconciling { .. } => {
                debug!(%item, state = ?self.state, "gesture suppressed while a drag is outstanding");
                Transition::Suppressed(item)
            }
        }
    }

    fn on_drop(&mut self, target: Option<ContainerId>, store: &BoardStore) -> Transition {
        let DragState::Lifted(item) = self.state else {
            return Transition::Unchanged;
        };
        self.state = DragState::Idle;

        let Some(target) = target else {
            return Transition::Released {
                item,
                reason: ReleaseReason::NoTarget,
            };
        };
        let Some(lifted) = store.item(item) else {
            return Transition::Released {
                item,
                reason: ReleaseReason::ItemGone,
            };
        };
        if store.container(&target).is_none() {
            return Transition::Released {
                item,
                reason: ReleaseReason::UnknownTarget,
            };
        }
        if store.effective_container(lifted) == Some(&target) {
            return Transition::Released {
                item,
                reason: ReleaseReason::SameContainer,
            };
        }

        self.state = DragState::Reconciling {
            item,
            target: target.clone(),
        };
        Transition::IssueMove {
            item,
            target,
            position: MOVE_TARGET_POSITION,
        }
    }

    fn on_move_resolved(
        &mut self,
        item: ItemId,
        target: ContainerId,
        outcome: MoveOutcome,
        store: &mut BoardStore,
    ) -> Transition {
        let pending = match &self.state {
            DragState::Reconciling {
                item: pending_item,
                target: pending_target,
            } => *pending_item == item && *pending_target == target,
            _ => false,
        };
        if !pending {
            debug!(%item, %target, "ignoring stale move result");
            return Transition::Unchanged;
        }
        self.state = DragState::Idle;

        match outcome {
            MoveOutcome::Confirmed => match store.apply_move(item, &target) {
                Ok(()) => Transition::Moved { item, target },
                Err(err) => {
                    warn!(%item, %target, error = %err, "confirmed move no longer applies locally");
                    Transition::MoveFailed {
                        item,
                        target,
                        reason: err.to_string(),
                    }
                }
            },
            MoveOutcome::Rejected(reason) => Transition::MoveFailed {
                item,
                target,
                reason,
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/drag_tests.rs"]
mod tests;
