//! Channel-driven board session: the only place the board snapshot is mutated.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{ContainerId, ItemId},
    protocol::{Container, Item},
};
use thiserror::Error;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tracing::{debug, info, warn};

use crate::{
    api::BoardApi,
    board::{BoardStore, LoadReport},
    drag::{DragCoordinator, DragEvent, DragState, MoveOutcome, ReleaseReason, Transition},
    ClientEvent,
};

pub const DEFAULT_MOVE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on a remote move; expiry counts as a failed move.
    pub move_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            move_timeout: DEFAULT_MOVE_TIMEOUT,
            queue_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnView {
    pub container: Container,
    pub items: Vec<Item>,
}

/// Render-ready projection of the board published after every event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardView {
    pub loaded: bool,
    pub fallback: bool,
    pub columns: Vec<ColumnView>,
    pub unplaced: Vec<Item>,
    pub drag: DragState,
}

impl BoardView {
    fn project(store: &BoardStore, drag: &DragState) -> Self {
        Self {
            loaded: true,
            fallback: store.is_fallback(),
            columns: store
                .containers()
                .iter()
                .map(|container| ColumnView {
                    container: container.clone(),
                    items: store.items_in(&container.id).into_iter().cloned().collect(),
                })
                .collect(),
            unplaced: store.unplaced().into_iter().cloned().collect(),
            drag: drag.clone(),
        }
    }

    pub fn column(&self, id: &ContainerId) -> Option<&ColumnView> {
        self.columns.iter().find(|column| &column.container.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Loaded(LoadReport),
    Lifted(ItemId),
    Released {
        item: ItemId,
        reason: ReleaseReason,
    },
    GestureSuppressed(ItemId),
    Moved {
        item: ItemId,
        target: ContainerId,
    },
    MoveFailed {
        item: ItemId,
        target: ContainerId,
        reason: String,
    },
    SessionExpired,
}

#[derive(Debug, Error)]
#[error("board session has stopped")]
pub struct BoardClosed;

/// Cloneable gesture source for a running [`BoardSession`].
#[derive(Debug, Clone)]
pub struct BoardHandle {
    tx: mpsc::Sender<DragEvent>,
}

impl BoardHandle {
    pub async fn gesture_start(&self, item: ItemId) -> Result<(), BoardClosed> {
        self.send(DragEvent::GestureStart(item)).await
    }

    pub async fn drop_on(&self, target: Option<ContainerId>) -> Result<(), BoardClosed> {
        self.send(DragEvent::Drop(target)).await
    }

    pub async fn cancel(&self) -> Result<(), BoardClosed> {
        self.send(DragEvent::Cancel).await
    }

    async fn send(&self, event: DragEvent) -> Result<(), BoardClosed> {
        self.tx.send(event).await.map_err(|_| BoardClosed)
    }
}

pub struct BoardSession {
    api: Arc<dyn BoardApi>,
    config: SessionConfig,
    store: BoardStore,
    coordinator: DragCoordinator,
    rx: mpsc::Receiver<DragEvent>,
    feedback: mpsc::WeakSender<DragEvent>,
    view: watch::Sender<BoardView>,
    events: broadcast::Sender<BoardEvent>,
    client_events: Option<broadcast::Receiver<ClientEvent>>,
    /// Set once the session expired; later expiry signals are duplicates.
    expired: bool,
}

impl BoardSession {
    pub fn new(api: Arc<dyn BoardApi>, config: SessionConfig) -> (Self, BoardHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (view, _) = watch::channel(BoardView::default());
        let (events, _) = broadcast::channel(64);
        let session = Self {
            api,
            config,
            store: BoardStore::default(),
            coordinator: DragCoordinator::new(),
            rx,
            feedback: tx.downgrade(),
            view,
            events,
            client_events: None,
            expired: false,
        };
        (session, BoardHandle { tx })
    }

    /// Treat client-level session expiry as terminal for this board.
    pub fn with_client_events(mut self, events: broadcast::Receiver<ClientEvent>) -> Self {
        self.client_events = Some(events);
        self
    }

    pub fn subscribe_view(&self) -> watch::Receiver<BoardView> {
        self.view.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Loads the board, then processes events until every handle is dropped and
    /// no move is in flight. Returns the final snapshot.
    pub async fn run(mut self) -> BoardStore {
        let (store, report) = BoardStore::load(self.api.as_ref()).await;
        self.store = store;
        let expired = report.session_expired;
        self.publish();
        let _ = self.events.send(BoardEvent::Loaded(report));
        if expired {
            self.dispatch(DragEvent::SessionExpired);
        }

        loop {
            let event = tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                () = session_expired(&mut self.client_events) => DragEvent::SessionExpired,
            };
            self.dispatch(event);
        }
        debug!("board session stopped");
        self.store
    }

    fn dispatch(&mut self, event: DragEvent) {
        if event == DragEvent::SessionExpired && self.expired {
            debug!("session already expired; ignoring repeat signal");
            return;
        }
        let transition = self.coordinator.handle(event, &mut self.store);
        let notice = match transition {
            Transition::Unchanged => return,
            Transition::Lifted(item) => BoardEvent::Lifted(item),
            Transition::Suppressed(item) => BoardEvent::GestureSuppressed(item),
            Transition::Released { item, reason } => {
                debug!(%item, ?reason, "drag released without a move");
                BoardEvent::Released { item, reason }
            }
            Transition::IssueMove {
                item,
                target,
                position,
            } => {
                self.spawn_move(item, target, position);
                self.publish();
                return;
            }
            Transition::Moved { item, target } => {
                info!(%item, %target, "item moved");
                BoardEvent::Moved { item, target }
            }
            Transition::MoveFailed {
                item,
                target,
                reason,
            } => {
                warn!(%item, %target, %reason, "move failed; keeping last confirmed column");
                BoardEvent::MoveFailed {
                    item,
                    target,
                    reason,
                }
            }
            Transition::Reset => {
                self.expired = true;
                info!("session expired; board state discarded");
                BoardEvent::SessionExpired
            }
        };
        self.publish();
        let _ = self.events.send(notice);
    }

    fn spawn_move(&self, item: ItemId, target: ContainerId, position: u32) {
        let Some(feedback) = self.feedback.upgrade() else {
            warn!(%item, "board session closing; move not issued");
            return;
        };
        let api = Arc::clone(&self.api);
        let timeout = self.config.move_timeout;
        tokio::spawn(async move {
            let result = tokio::time::timeout(timeout, api.move_item(item, &target, position)).await;
            let event = match result {
                Ok(Ok(())) => DragEvent::MoveResolved {
                    item,
                    target,
                    outcome: MoveOutcome::Confirmed,
                },
                Ok(Err(err)) if err.is_session_expired() => DragEvent::SessionExpired,
                Ok(Err(err)) => DragEvent::MoveResolved {
                    item,
                    target,
                    outcome: MoveOutcome::Rejected(err.to_string()),
                },
                Err(_) => DragEvent::MoveResolved {
                    item,
                    target,
                    outcome: MoveOutcome::Rejected(format!(
                        "move timed out after {}ms",
                        timeout.as_millis()
                    )),
                },
            };
            let _ = feedback.send(event).await;
        });
    }

    fn publish(&self) {
        self.view
            .send_replace(BoardView::project(&self.store, self.coordinator.state()));
    }
}

async fn session_expired(events: &mut Option<broadcast::Receiver<ClientEvent>>) {
    loop {
        let Some(receiver) = events.as_mut() else {
            return std::future::pending().await;
        };
        match receiver.recv().await {
            Ok(ClientEvent::SessionExpired) => return,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => *events = None,
        }
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
