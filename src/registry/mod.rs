//! Building and hot-reloading a [`MappingRegistry`] from disk (§4.8).

pub mod loader;

pub use loader::{load_from_disk, LoadOutcome};
