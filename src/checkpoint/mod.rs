// SPDX-License-Identifier: Apache-2.0

//! Checkpoint storage for file source positions.
//!
//! Uses JSON file storage with atomic writes for reliable position tracking.

mod json_file;
mod schema;
mod store;

pub use json_file::{JsonFileDatabase, JsonFilePersister};
pub use schema::{OFFSETS_SCOPE, PERSISTED_OFFSET_VERSION, PersistedOffsetV1};
#[cfg(test)]
pub use store::MockPositionStore;
pub use store::PositionStore;
