use super::{Filter, Persistence, Record, Table};
use crate::error::PersistError;
use crate::model::EntityId;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A call observed by [`MemoryPersistence`], in arrival order.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Insert(Table, EntityId),
    Update(Table, EntityId, Vec<String>),
    Delete(Table, EntityId),
    Select(Table),
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<Record>>,
    fail_next: usize,
    offline: bool,
    calls: Vec<Call>,
}

/// In-process record store with cascading deletes and failure injection.
#[derive(Default)]
pub struct MemoryPersistence {
    state: Mutex<State>,
    latency: Option<Duration>,
}

const ALL_TABLES: [Table; 8] = [
    Table::Projects,
    Table::Sequences,
    Table::Scenes,
    Table::Connections,
    Table::Prompts,
    Table::MoodBoardItems,
    Table::ChecklistSteps,
    Table::Tags,
];

fn row_id(record: &Record) -> Option<EntityId> {
    record.get("id").and_then(Value::as_str).and_then(EntityId::parse)
}

fn references(record: &Record, key: &str, id: EntityId) -> bool {
    record
        .get(key)
        .and_then(Value::as_str)
        .and_then(EntityId::parse)
        == Some(id)
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before touching the tables.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the next `n` write calls fail as if the service were down.
    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn rows(&self, table: Table) -> Vec<Record> {
        self.lock().tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn row(&self, table: Table, id: EntityId) -> Option<Record> {
        self.lock()
            .tables
            .get(&table)?
            .iter()
            .find(|r| row_id(r) == Some(id))
            .cloned()
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl State {
    fn check_write(&mut self) -> Result<(), PersistError> {
        if self.offline {
            return Err(PersistError::Unavailable("store is offline".into()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(PersistError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn remove_cascading(&mut self, table: Table, id: EntityId) -> bool {
        let rows = self.tables.entry(table).or_default();
        let before = rows.len();
        rows.retain(|r| row_id(r) != Some(id));
        let removed = rows.len() != before;
        if removed {
            for child in ALL_TABLES {
                let Some((key, parent)) = child.parent_key() else {
                    continue;
                };
                if parent != table {
                    continue;
                }
                let orphans: Vec<EntityId> = self
                    .tables
                    .get(&child)
                    .map(|rows| {
                        rows.iter()
                            .filter(|r| references(r, key, id))
                            .filter_map(row_id)
                            .collect()
                    })
                    .unwrap_or_default();
                for orphan in orphans {
                    self.remove_cascading(child, orphan);
                }
            }
        }
        removed
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn insert(&self, table: Table, mut record: Record) -> Result<EntityId, PersistError> {
        self.delay().await;
        let mut state = self.lock();
        state.check_write()?;
        let id = row_id(&record).unwrap_or_else(EntityId::temporary);
        let rows = state.tables.entry(table).or_default();
        if rows.iter().any(|r| row_id(r) == Some(id)) {
            return Err(PersistError::Rejected(format!(
                "duplicate id {id} in {}",
                table.name()
            )));
        }
        record.insert("id".into(), Value::String(id.to_string()));
        rows.push(record);
        state.calls.push(Call::Insert(table, id));
        Ok(id)
    }

    async fn update(&self, table: Table, id: EntityId, record: Record) -> Result<(), PersistError> {
        self.delay().await;
        let mut state = self.lock();
        state.check_write()?;
        let row = state
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| row_id(r) == Some(id)))
            .ok_or(PersistError::NotFound {
                table: table.name(),
                id,
            })?;
        let keys: Vec<String> = record.keys().cloned().collect();
        for (k, v) in record {
            if k != "id" {
                row.insert(k, v);
            }
        }
        state.calls.push(Call::Update(table, id, keys));
        Ok(())
    }

    async fn delete(&self, table: Table, id: EntityId) -> Result<(), PersistError> {
        self.delay().await;
        let mut state = self.lock();
        state.check_write()?;
        // Already gone (e.g. removed by a parent's cascade) is not an error.
        state.remove_cascading(table, id);
        state.calls.push(Call::Delete(table, id));
        Ok(())
    }

    async fn select(&self, table: Table, filter: Filter) -> Result<Vec<Record>, PersistError> {
        self.delay().await;
        let mut state = self.lock();
        if state.offline {
            return Err(PersistError::Unavailable("store is offline".into()));
        }
        state.calls.push(Call::Select(table));
        let rows = state.tables.get(&table).cloned().unwrap_or_default();
        Ok(match filter {
            Filter::All => rows,
            Filter::Eq(key, id) => rows.into_iter().filter(|r| references(r, key, id)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn insert_assigns_or_keeps_ids() {
        let store = MemoryPersistence::new();
        let assigned = store
            .insert(Table::Projects, record(&[("name", json!("p"))]))
            .await
            .unwrap();
        let fixed = EntityId::temporary();
        let kept = store
            .insert(Table::Projects, record(&[("id", json!(fixed.to_string()))]))
            .await
            .unwrap();
        assert_eq!(kept, fixed);
        assert!(store.row(Table::Projects, assigned).is_some());
        let dup = store
            .insert(Table::Projects, record(&[("id", json!(fixed.to_string()))]))
            .await;
        assert!(matches!(dup, Err(PersistError::Rejected(_))));
    }

    #[tokio::test]
    async fn deleting_a_parent_cascades_to_children() {
        let store = MemoryPersistence::new();
        let project = store.insert(Table::Projects, Record::new()).await.unwrap();
        let seq = store
            .insert(
                Table::Sequences,
                record(&[("project_id", json!(project.to_string()))]),
            )
            .await
            .unwrap();
        store
            .insert(Table::Scenes, record(&[("sequence_id", json!(seq.to_string()))]))
            .await
            .unwrap();
        store.delete(Table::Projects, project).await.unwrap();
        assert!(store.rows(Table::Sequences).is_empty());
        assert!(store.rows(Table::Scenes).is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryPersistence::new();
        store.fail_next(1);
        assert!(store.insert(Table::Tags, Record::new()).await.is_err());
        assert!(store.insert(Table::Tags, Record::new()).await.is_ok());
        store.set_offline(true);
        assert!(store.select(Table::Tags, Filter::All).await.is_err());
    }

    #[tokio::test]
    async fn update_merges_fields_and_reports_missing_rows() {
        let store = MemoryPersistence::new();
        let id = store
            .insert(Table::Scenes, record(&[("title", json!("a")), ("notes", json!("n"))]))
            .await
            .unwrap();
        store
            .update(Table::Scenes, id, record(&[("title", json!("b"))]))
            .await
            .unwrap();
        let row = store.row(Table::Scenes, id).unwrap();
        assert_eq!(row["title"], "b");
        assert_eq!(row["notes"], "n");
        let missing = store
            .update(Table::Scenes, EntityId::temporary(), Record::new())
            .await;
        assert!(matches!(missing, Err(PersistError::NotFound { .. })));
    }
}
