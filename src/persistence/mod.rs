//! The remote record store the engine confirms every edit against.

use crate::error::PersistError;
use crate::model::EntityId;
use async_trait::async_trait;

mod memory;

pub use memory::{Call, MemoryPersistence};

/// One flat, snake_case row.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Projects,
    Sequences,
    Scenes,
    Connections,
    Prompts,
    MoodBoardItems,
    ChecklistSteps,
    Tags,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::Sequences => "sequences",
            Table::Scenes => "scenes",
            Table::Connections => "connections",
            Table::Prompts => "prompts",
            Table::MoodBoardItems => "moodboard_items",
            Table::ChecklistSteps => "checklist_steps",
            Table::Tags => "tags",
        }
    }

    /// Foreign key column pointing at the owning row, if any.
    pub fn parent_key(self) -> Option<(&'static str, Table)> {
        match self {
            Table::Projects => None,
            Table::Sequences
            | Table::Connections
            | Table::Prompts
            | Table::MoodBoardItems
            | Table::Tags => Some(("project_id", Table::Projects)),
            Table::Scenes => Some(("sequence_id", Table::Sequences)),
            Table::ChecklistSteps => Some(("scene_id", Table::Scenes)),
        }
    }
}

/// Row filter for [`Persistence::select`].
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    All,
    Eq(&'static str, EntityId),
}

/// Record-oriented persistence collaborator.
///
/// `insert` honours an `id` already present in the record (re-inserting a
/// deleted entity keeps its identity) and otherwise assigns one.
#[async_trait]
pub trait Persistence: Send + Sync {
    async fn insert(&self, table: Table, record: Record) -> Result<EntityId, PersistError>;

    async fn update(&self, table: Table, id: EntityId, record: Record) -> Result<(), PersistError>;

    async fn delete(&self, table: Table, id: EntityId) -> Result<(), PersistError>;

    async fn select(&self, table: Table, filter: Filter) -> Result<Vec<Record>, PersistError>;
}
