//! Wire and domain types shared by the board client and the development server.

pub mod domain;
pub mod error;
pub mod protocol;
