use super::*;
use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::TaskStatus;

use crate::{error::ClientError, test_fixtures::*};

struct StaticApi {
    items: Result<Vec<Item>, ClientError>,
    containers: Result<Vec<Container>, ClientError>,
}

fn status_err(endpoint: &str, status: reqwest::StatusCode) -> ClientError {
    ClientError::Status {
        endpoint: endpoint.to_string(),
        status,
        body: String::new(),
    }
}

fn clone_result<T: Clone>(result: &Result<T, ClientError>) -> Result<T, ClientError> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(ClientError::SessionExpired) => Err(ClientError::SessionExpired),
        Err(err) => Err(status_err(
            &err.to_string(),
            err.status().unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
        )),
    }
}

#[async_trait]
impl BoardApi for StaticApi {
    async fn list_items(&self) -> Result<Vec<Item>, ClientError> {
        clone_result(&self.items)
    }

    async fn list_containers(&self) -> Result<Vec<Container>, ClientError> {
        clone_result(&self.containers)
    }

    async fn move_item(&self, _: ItemId, _: &ContainerId, _: u32) -> Result<(), ClientError> {
        Ok(())
    }
}

fn two_column_board() -> (BoardStore, Container, Container) {
    let todo = column(1, "Backlog", 0);
    let doing = column(2, "Doing", 1);
    let store = BoardStore::new(
        vec![
            item_in(10, &todo, 1),
            item_in(11, &doing, 0),
            item_in(12, &todo, 0),
        ],
        vec![doing.clone(), todo.clone()],
    );
    (store, todo, doing)
}

#[test]
fn explicit_column_places_item_exactly_once() {
    let (store, todo, doing) = two_column_board();

    assert_eq!(ids(&store.items_in(&todo.id)), vec![12, 10]);
    assert_eq!(ids(&store.items_in(&doing.id)), vec![11]);
    let total: usize = store.column_counts().iter().map(|(_, count)| count).sum();
    assert_eq!(total, store.items().len());
}

#[test]
fn containers_are_ordered_by_position() {
    let (store, todo, doing) = two_column_board();
    let order: Vec<&ContainerId> = store.containers().iter().map(|c| &c.id).collect();
    assert_eq!(order, vec![&todo.id, &doing.id]);
    assert!(!store.is_fallback());
}

#[test]
fn empty_column_collection_uses_fallback_set() {
    let store = BoardStore::new(
        vec![item(1, TaskStatus::Review), item(2, TaskStatus::Todo)],
        Vec::new(),
    );

    let keys: Vec<String> = store.containers().iter().map(|c| c.id.to_string()).collect();
    assert_eq!(keys, vec!["todo", "in_progress", "review", "done"]);
    assert!(store.is_fallback());
    assert_eq!(ids(&store.items_in(&ContainerId::key("review"))), vec![1]);
    assert_eq!(ids(&store.items_in(&ContainerId::key("todo"))), vec![2]);
    assert!(store.items_in(&ContainerId::key("done")).is_empty());
}

#[test]
fn status_fallback_never_matches_numeric_columns() {
    let store = BoardStore::new(vec![item(1, TaskStatus::Done)], vec![column(4, "Done", 0)]);

    assert!(store.items_in(&ContainerId::Remote(4)).is_empty());
    assert_eq!(ids(&store.unplaced()), vec![1]);
}

#[test]
fn explicit_column_wins_over_status() {
    let review = ContainerId::key("review");
    let mut moved = item(1, TaskStatus::Done);
    moved.column = fallback_containers()
        .into_iter()
        .find(|container| container.id == review);
    let store = BoardStore::new(vec![moved], Vec::new());

    assert_eq!(ids(&store.items_in(&review)), vec![1]);
    assert!(store.items_in(&ContainerId::key("done")).is_empty());
}

#[test]
fn apply_move_reassigns_and_takes_head_slot() {
    let (mut store, todo, doing) = two_column_board();

    store.apply_move(ItemId(10), &doing.id).expect("move");

    assert_eq!(ids(&store.items_in(&doing.id)), vec![10, 11]);
    assert_eq!(ids(&store.items_in(&todo.id)), vec![12]);
    let moved = store.item(ItemId(10)).expect("item");
    assert_eq!(moved.position, 0);
    assert_eq!(moved.column.as_ref().map(|c| &c.id), Some(&doing.id));
}

#[test]
fn apply_move_rejects_unknown_ids_without_mutating() {
    let (mut store, _, doing) = two_column_board();
    let before = store.clone();

    assert_eq!(
        store.apply_move(ItemId(99), &doing.id),
        Err(BoardError::UnknownItem(ItemId(99)))
    );
    assert_eq!(
        store.apply_move(ItemId(10), &ContainerId::Remote(42)),
        Err(BoardError::UnknownContainer(ContainerId::Remote(42)))
    );
    assert_eq!(store, before);
}

#[tokio::test]
async fn load_fetches_both_halves() {
    let todo = column(1, "Backlog", 0);
    let api = StaticApi {
        items: Ok(vec![item_in(1, &todo, 0)]),
        containers: Ok(vec![todo.clone()]),
    };

    let (store, report) = BoardStore::load(&api).await;

    assert!(report.is_complete());
    assert_eq!((report.item_count, report.container_count), (1, 1));
    assert_eq!(ids(&store.items_in(&todo.id)), vec![1]);
}

#[tokio::test]
async fn failed_column_read_degrades_to_fallback() {
    let api = Arc::new(StaticApi {
        items: Ok(vec![item(1, TaskStatus::InProgress)]),
        containers: Err(status_err("/api/tasks/columns/", reqwest::StatusCode::BAD_GATEWAY)),
    });

    let (store, report) = BoardStore::load(api.as_ref()).await;

    assert!(report.containers_error.is_some());
    assert!(report.items_error.is_none());
    assert!(report.fallback);
    assert!(!report.session_expired);
    assert_eq!(ids(&store.items_in(&ContainerId::key("in_progress"))), vec![1]);
}

#[tokio::test]
async fn failed_item_read_leaves_columns() {
    let api = StaticApi {
        items: Err(ClientError::SessionExpired),
        containers: Ok(vec![column(1, "Backlog", 0)]),
    };

    let (store, report) = BoardStore::load(&api).await;

    assert!(store.items().is_empty());
    assert_eq!(store.containers().len(), 1);
    assert!(report.session_expired);
    assert!(!report.is_complete());
}
