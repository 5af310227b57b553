//! Client-side engine of a storyboard editor: optimistic mutations against a
//! remote record store, command-based undo/redo, and the canvas spatial
//! model (pan/zoom, drag with snapping, narrative-marker ranges).

pub mod clipboard;
pub mod error;
pub mod graph;
pub mod history;
pub mod model;
pub mod mutator;
pub mod patch;
pub mod persistence;
pub mod settings;
pub mod spatial;
pub mod store;
pub mod viewport;
pub mod wire;

pub use error::{PersistError, StoreError, StoreResult};
pub use store::{ProjectStore, StoreConfig, StoreEvent};
