//! In-memory board snapshot for one view session.

use shared::{
    domain::{ContainerId, ItemId},
    protocol::{Container, Item},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::BoardApi;

/// Columns shown when the remote column collection is empty. Never written back.
pub const FALLBACK_CONTAINERS: [(&str, &str); 4] = [
    ("todo", "To Do"),
    ("in_progress", "In Progress"),
    ("review", "Review"),
    ("done", "Done"),
];

pub fn fallback_containers() -> Vec<Container> {
    FALLBACK_CONTAINERS
        .iter()
        .zip(0u32..)
        .map(|((key, name), position)| Container {
            id: ContainerId::key(*key),
            name: (*name).to_string(),
            position,
            is_default: position == 0,
            task_count: None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("item {0} is not on this board")]
    UnknownItem(ItemId),
    #[error("container {0} is not on this board")]
    UnknownContainer(ContainerId),
}

/// What happened during [`BoardStore::load`]. A failed half leaves that half empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub item_count: usize,
    pub container_count: usize,
    pub items_error: Option<String>,
    pub containers_error: Option<String>,
    pub fallback: bool,
    pub session_expired: bool,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.items_error.is_none() && self.containers_error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardStore {
    items: Vec<Item>,
    containers: Vec<Container>,
    fallback: bool,
}

impl BoardStore {
    /// Builds a snapshot, ordering containers by position and substituting the
    /// fallback set when `containers` is empty.
    pub fn new(items: Vec<Item>, mut containers: Vec<Container>) -> Self {
        let fallback = containers.is_empty();
        if fallback {
            containers = fallback_containers();
        }
        containers.sort_by_key(|container| container.position);
        Self {
            items,
            containers,
            fallback,
        }
    }

    /// Reads items and containers concurrently. Neither failure is fatal.
    pub async fn load(api: &dyn BoardApi) -> (Self, LoadReport) {
        let (items, containers) = tokio::join!(api.list_items(), api.list_containers());
        let mut report = LoadReport::default();

        let items = items.unwrap_or_else(|err| {
            warn!(error = %err, "failed to load board items; showing none");
            report.session_expired |= err.is_session_expired();
            report.items_error = Some(err.to_string());
            Vec::new()
        });
        let containers = containers.unwrap_or_else(|err| {
            warn!(error = %err, "failed to load board columns; showing defaults");
            report.session_expired |= err.is_session_expired();
            report.containers_error = Some(err.to_string());
            Vec::new()
        });

        let store = Self::new(items, containers);
        report.item_count = store.items.len();
        report.container_count = store.containers.len();
        report.fallback = store.fallback;
        info!(
            items = report.item_count,
            columns = report.container_count,
            fallback = report.fallback,
            "board loaded"
        );
        (store, report)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Displayed containers, ordered by position.
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn container(&self, id: &ContainerId) -> Option<&Container> {
        self.containers.iter().find(|container| &container.id == id)
    }

    /// Explicit column reference first, then the legacy status matched against
    /// displayed container ids.
    pub fn effective_container<'a>(&'a self, item: &'a Item) -> Option<&'a ContainerId> {
        if let Some(column) = &item.column {
            return Some(&column.id);
        }
        self.containers
            .iter()
            .find(|container| container.id.matches_status(item.status))
            .map(|container| &container.id)
    }

    pub fn items_in(&self, container: &ContainerId) -> Vec<&Item> {
        let mut placed: Vec<&Item> = self
            .items
            .iter()
            .filter(|item| self.effective_container(item) == Some(container))
            .collect();
        placed.sort_by_key(|item| item.position);
        placed
    }

    pub fn column_counts(&self) -> Vec<(&Container, usize)> {
        self.containers
            .iter()
            .map(|container| (container, self.items_in(&container.id).len()))
            .collect()
    }

    /// Items whose effective container is not displayed on this board.
    pub fn unplaced(&self) -> Vec<&Item> {
        self.items
            .iter()
            .filter(|item| match self.effective_container(item) {
                Some(id) => self.container(id).is_none(),
                None => true,
            })
            .collect()
    }

    /// Records a move the remote store already confirmed: the item takes the
    /// target as its explicit column and the head slot. Siblings keep their order.
    pub fn apply_move(&mut self, item: ItemId, target: &ContainerId) -> Result<(), BoardError> {
        let column = self
            .container(target)
            .cloned()
            .ok_or_else(|| BoardError::UnknownContainer(target.clone()))?;
        let index = self
            .items
            .iter()
            .position(|candidate| candidate.id == item)
            .ok_or(BoardError::UnknownItem(item))?;

        let mut moved = self.items.remove(index);
        moved.column = Some(column);
        moved.position = 0;
        self.items.insert(0, moved);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.containers.clear();
        self.fallback = false;
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
