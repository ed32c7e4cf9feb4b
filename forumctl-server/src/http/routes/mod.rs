//! Route handlers organized by resource

pub mod categories;
pub mod health;
pub mod posts;
pub mod search;
pub mod threads;

use serde::Serialize;

/// Payload of a successful deletion
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: u64,
}
