use std::fmt::Write;

use client_core::{BoardEvent, BoardView, ReleaseReason};
use shared::protocol::Item;

/// Plain-text board: one block per column, then tasks no column claims.
pub fn render_board(view: &BoardView) -> String {
    let mut out = String::new();
    if view.fallback {
        out.push_str("(columns unavailable, showing status columns)\n");
    }
    for column in &view.columns {
        let _ = writeln!(
            out,
            "[{}] {} ({})",
            column.container.id,
            column.container.name,
            column.items.len()
        );
        for item in &column.items {
            let _ = writeln!(out, "  {}", render_item(item));
        }
    }
    if !view.unplaced.is_empty() {
        let _ = writeln!(out, "[-] unplaced ({})", view.unplaced.len());
        for item in &view.unplaced {
            let _ = writeln!(out, "  {}", render_item(item));
        }
    }
    out
}

pub fn render_item(item: &Item) -> String {
    let mut line = format!(
        "#{} {} ({}, {})",
        item.id,
        item.title,
        item.priority.as_str(),
        item.status
    );
    if let Some(assignee) = &item.assignee {
        let name = if assignee.full_name.is_empty() {
            &assignee.username
        } else {
            &assignee.full_name
        };
        let _ = write!(line, " @{name}");
    }
    if let Some(due) = item.due_date {
        let _ = write!(line, " due {}", due.format("%Y-%m-%d"));
    }
    line
}

/// One-line outcome of a drop, or `None` for events that do not end a move.
pub fn describe_outcome(event: &BoardEvent) -> Option<String> {
    match event {
        BoardEvent::Moved { item, target } => Some(format!("moved #{item} to {target}")),
        BoardEvent::MoveFailed {
            item,
            target,
            reason,
        } => Some(format!("move of #{item} to {target} failed: {reason}")),
        BoardEvent::Released { item, reason } => Some(match reason {
            ReleaseReason::SameContainer => format!("#{item} is already there"),
            ReleaseReason::UnknownTarget => format!("no such column for #{item}"),
            ReleaseReason::ItemGone => format!("#{item} is no longer on the board"),
            ReleaseReason::NoTarget | ReleaseReason::Cancelled => {
                format!("#{item} was put back")
            }
        }),
        BoardEvent::GestureSuppressed(item) => {
            Some(format!("#{item} cannot be moved while another move is pending"))
        }
        BoardEvent::SessionExpired => Some("session expired, log in again".to_string()),
        BoardEvent::Loaded(_) | BoardEvent::Lifted(_) => None,
    }
}

/// True when the event leaves the task in the requested column, including a drop
/// onto the column it already occupies.
pub fn reached_target(event: &BoardEvent) -> bool {
    matches!(
        event,
        BoardEvent::Moved { .. }
            | BoardEvent::Released {
                reason: ReleaseReason::SameContainer,
                ..
            }
    )
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
