use async_trait::async_trait;
use shared::{
    domain::{ContainerId, ItemId},
    protocol::{Container, Item},
};

use crate::error::ClientError;

/// Remote operations the board depends on.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn list_items(&self) -> Result<Vec<Item>, ClientError>;
    async fn list_containers(&self) -> Result<Vec<Container>, ClientError>;
    /// Reassigns `item` to `container` at `position`. Atomic from the caller's view.
    async fn move_item(
        &self,
        item: ItemId,
        container: &ContainerId,
        position: u32,
    ) -> Result<(), ClientError>;
}
