use super::*;
use shared::domain::TaskStatus;

use crate::{board::fallback_containers, test_fixtures::*};

fn board() -> BoardStore {
    let todo = column(1, "Backlog", 0);
    let doing = column(2, "Doing", 1);
    BoardStore::new(
        vec![item_in(1, &todo, 0), item_in(2, &doing, 0)],
        vec![todo, doing],
    )
}

fn lift(coordinator: &mut DragCoordinator, store: &mut BoardStore, id: i64) {
    assert_eq!(
        coordinator.handle(DragEvent::GestureStart(ItemId(id)), store),
        Transition::Lifted(ItemId(id))
    );
}

#[test]
fn drop_on_other_column_issues_head_slot_move() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 1);

    let transition = coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(2))), &mut store);

    assert_eq!(
        transition,
        Transition::IssueMove {
            item: ItemId(1),
            target: ContainerId::Remote(2),
            position: 0,
        }
    );
    assert!(coordinator.is_reconciling());
    // Nothing changes locally until the remote call resolves.
    assert_eq!(store, board());
}

#[test]
fn drop_on_own_column_is_a_noop() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 2);

    let transition = coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(2))), &mut store);

    assert_eq!(
        transition,
        Transition::Released {
            item: ItemId(2),
            reason: ReleaseReason::SameContainer,
        }
    );
    assert_eq!(coordinator.state(), &DragState::Idle);
    assert_eq!(store, board());
}

#[test]
fn drop_without_target_or_on_unknown_column_releases() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();

    lift(&mut coordinator, &mut store, 1);
    assert_eq!(
        coordinator.handle(DragEvent::Drop(None), &mut store),
        Transition::Released {
            item: ItemId(1),
            reason: ReleaseReason::NoTarget,
        }
    );

    lift(&mut coordinator, &mut store, 1);
    assert_eq!(
        coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(77))), &mut store),
        Transition::Released {
            item: ItemId(1),
            reason: ReleaseReason::UnknownTarget,
        }
    );
    assert_eq!(coordinator.state(), &DragState::Idle);
}

#[test]
fn cancel_returns_to_idle_without_effects() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 1);

    assert_eq!(
        coordinator.handle(DragEvent::Cancel, &mut store),
        Transition::Released {
            item: ItemId(1),
            reason: ReleaseReason::Cancelled,
        }
    );
    assert_eq!(coordinator.handle(DragEvent::Cancel, &mut store), Transition::Unchanged);
}

#[test]
fn unknown_item_cannot_be_lifted() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();

    assert_eq!(
        coordinator.handle(DragEvent::GestureStart(ItemId(404)), &mut store),
        Transition::Unchanged
    );
    assert_eq!(coordinator.state(), &DragState::Idle);
}

#[test]
fn new_gestures_are_suppressed_while_reconciling() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 1);
    coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(2))), &mut store);

    assert_eq!(
        coordinator.handle(DragEvent::GestureStart(ItemId(2)), &mut store),
        Transition::Suppressed(ItemId(2))
    );
    assert_eq!(coordinator.handle(DragEvent::Cancel, &mut store), Transition::Unchanged);
    assert!(coordinator.is_reconciling());
}

#[test]
fn confirmed_move_updates_store() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 1);
    coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(2))), &mut store);

    let transition = coordinator.handle(
        DragEvent::MoveResolved {
            item: ItemId(1),
            target: ContainerId::Remote(2),
            outcome: MoveOutcome::Confirmed,
        },
        &mut store,
    );

    assert_eq!(
        transition,
        Transition::Moved {
            item: ItemId(1),
            target: ContainerId::Remote(2),
        }
    );
    assert_eq!(ids(&store.items_in(&ContainerId::Remote(2))), vec![1, 2]);
    assert!(store.items_in(&ContainerId::Remote(1)).is_empty());
    assert_eq!(coordinator.state(), &DragState::Idle);
}

#[test]
fn rejected_move_leaves_store_untouched() {
    let mut store = board();
    let before_todo = ids(&store.items_in(&ContainerId::Remote(1)));
    let before_doing = ids(&store.items_in(&ContainerId::Remote(2)));
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 1);
    coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(2))), &mut store);

    let transition = coordinator.handle(
        DragEvent::MoveResolved {
            item: ItemId(1),
            target: ContainerId::Remote(2),
            outcome: MoveOutcome::Rejected("500".into()),
        },
        &mut store,
    );

    assert!(matches!(transition, Transition::MoveFailed { .. }));
    assert_eq!(ids(&store.items_in(&ContainerId::Remote(1))), before_todo);
    assert_eq!(ids(&store.items_in(&ContainerId::Remote(2))), before_doing);
    assert_eq!(store, board());
    // A fresh gesture may start once the move resolved.
    lift(&mut coordinator, &mut store, 1);
}

#[test]
fn stale_results_are_ignored() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 1);
    coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(2))), &mut store);

    let transition = coordinator.handle(
        DragEvent::MoveResolved {
            item: ItemId(2),
            target: ContainerId::Remote(1),
            outcome: MoveOutcome::Confirmed,
        },
        &mut store,
    );

    assert_eq!(transition, Transition::Unchanged);
    assert!(coordinator.is_reconciling());
    assert_eq!(store, board());
}

#[test]
fn session_expiry_discards_everything() {
    let mut store = board();
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 1);
    coordinator.handle(DragEvent::Drop(Some(ContainerId::Remote(2))), &mut store);

    assert_eq!(
        coordinator.handle(DragEvent::SessionExpired, &mut store),
        Transition::Reset
    );
    assert_eq!(coordinator.state(), &DragState::Idle);
    assert!(store.items().is_empty());
    assert!(store.containers().is_empty());
}

#[test]
fn status_placed_item_moves_to_fallback_review() {
    let mut store = BoardStore::new(vec![item(7, TaskStatus::Done)], Vec::new());
    let review = ContainerId::key("review");
    let done = ContainerId::key("done");
    assert_eq!(ids(&store.items_in(&done)), vec![7]);
    let mut coordinator = DragCoordinator::new();
    lift(&mut coordinator, &mut store, 7);

    assert_eq!(
        coordinator.handle(DragEvent::Drop(Some(review.clone())), &mut store),
        Transition::IssueMove {
            item: ItemId(7),
            target: review.clone(),
            position: 0,
        }
    );
    coordinator.handle(
        DragEvent::MoveResolved {
            item: ItemId(7),
            target: review.clone(),
            outcome: MoveOutcome::Confirmed,
        },
        &mut store,
    );

    assert_eq!(ids(&store.items_in(&review)), vec![7]);
    for container in fallback_containers().iter().filter(|c| c.id != review) {
        assert!(store.items_in(&container.id).is_empty());
    }
}
