//! Client core for the task board: authenticated API access, the board snapshot,
//! and the drag-and-drop move protocol.

pub mod api;
pub mod board;
pub mod drag;
pub mod error;
pub mod http;
pub mod runtime;
pub mod session;

pub use api::BoardApi;
pub use board::{BoardError, BoardStore, LoadReport};
pub use drag::{DragCoordinator, DragEvent, DragState, MoveOutcome, ReleaseReason, Transition};
pub use error::ClientError;
pub use http::ApiClient;
pub use runtime::{BoardEvent, BoardHandle, BoardSession, BoardView, ColumnView, SessionConfig};
pub use session::{Credentials, SessionContext};

/// Session-level notifications broadcast by [`ApiClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    TokenRefreshed,
    /// Refresh failed or the replay was rejected; credentials are gone.
    SessionExpired,
}

#[cfg(test)]
#[path = "tests/fixtures.rs"]
mod test_fixtures;
