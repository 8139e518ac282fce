//! In-memory reference implementation of [`WorkflowStore`].
//!
//! Deterministic apart from the `loggedat` clock and test-friendly.
//! Production deployments should use the PostgreSQL store.

use crate::model::{
    check_new_instance, check_start_rows, RuleSetRow, RuleSetRowKey, SchemaRow, SchemaRowKey,
};
use crate::traits::WorkflowStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crux_types::{InstanceKey, NewWfInstance, RuleSetKind, WfInstance};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// In-memory Crux storage adapter.
#[derive(Default)]
pub struct InMemoryCruxStorage {
    rule_sets: RwLock<HashMap<RuleSetRowKey, RuleSetRow>>,
    schemas: RwLock<BTreeMap<SchemaRowKey, SchemaRow>>,
    /// Append-only; a row's id is its position plus one
    instances: RwLock<Vec<WfInstance>>,
}

impl InMemoryCruxStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn workflow_row(
        &self,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<RuleSetRow> {
        let key = RuleSetRowKey {
            slice,
            app: app.to_string(),
            class: class.to_string(),
            kind: RuleSetKind::Workflow,
            set_name: set_name.to_string(),
        };
        let guard = self.rule_sets.read().map_err(|_| poisoned("rule set"))?;
        guard.get(&key).cloned().ok_or_else(|| {
            StorageError::NotFound(format!(
                "workflow {set_name} for {slice}/{app}/{class} not found"
            ))
        })
    }
}

#[async_trait]
impl WorkflowStore for InMemoryCruxStorage {
    async fn get_app(&self, slice: i32, app: &str, class: &str) -> StorageResult<Option<String>> {
        let guard = self.rule_sets.read().map_err(|_| poisoned("rule set"))?;
        let found = guard.values().any(|row| {
            row.slice == slice
                && row.app == app
                && row.class == class
                && row.kind.is_workflow()
                && row.is_active
        });
        Ok(found.then(|| app.to_string()))
    }

    async fn get_class(
        &self,
        slice: i32,
        app: &str,
        class: &str,
    ) -> StorageResult<Option<String>> {
        let guard = self.rule_sets.read().map_err(|_| poisoned("rule set"))?;
        let found = guard
            .values()
            .any(|row| row.slice == slice && row.app == app && row.class == class);
        Ok(found.then(|| class.to_string()))
    }

    async fn get_wf_active_status(
        &self,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<bool> {
        Ok(self.workflow_row(slice, app, class, set_name)?.is_active)
    }

    async fn get_wf_internal_status(
        &self,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<bool> {
        Ok(self.workflow_row(slice, app, class, set_name)?.is_internal)
    }

    async fn get_wf_instance(&self, key: &InstanceKey) -> StorageResult<Vec<WfInstance>> {
        let guard = self.instances.read().map_err(|_| poisoned("instance"))?;
        let mut rows = guard
            .iter()
            .filter(|row| row.key() == *key)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| a.logged_at.cmp(&b.logged_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn add_wf_new_instance(&self, row: NewWfInstance) -> StorageResult<i64> {
        check_new_instance(&row)?;
        let mut guard = self.instances.write().map_err(|_| poisoned("instance"))?;
        check_parent(&guard, &row)?;
        push_row(&mut guard, row)
    }

    async fn add_wf_start_rows(&self, rows: Vec<NewWfInstance>) -> StorageResult<Vec<i64>> {
        let key = check_start_rows(&rows)?;
        let mut guard = self.instances.write().map_err(|_| poisoned("instance"))?;

        // Everything that can fail is checked before the first push
        if guard.iter().any(|row| row.key() == key) {
            return Err(StorageError::Conflict(format!("instance {key} already exists")));
        }
        check_parent(&guard, &rows[0])?;

        let mut ids = Vec::with_capacity(rows.len());
        for mut row in rows {
            if let Some(&previous) = ids.last() {
                row.parent = Some(previous);
            }
            ids.push(push_row(&mut guard, row)?);
        }
        Ok(ids)
    }

    async fn get_logged_at(&self, id: i64) -> StorageResult<DateTime<Utc>> {
        let guard = self.instances.read().map_err(|_| poisoned("instance"))?;
        row_index(id)
            .and_then(|idx| guard.get(idx))
            .map(|row| row.logged_at)
            .ok_or_else(|| StorageError::NotFound(format!("instance row {id} not found")))
    }

    async fn upsert_rule_set_row(&self, row: RuleSetRow) -> StorageResult<()> {
        let mut guard = self.rule_sets.write().map_err(|_| poisoned("rule set"))?;
        guard.insert(row.key(), row);
        Ok(())
    }

    async fn insert_rule_set_row(&self, row: RuleSetRow) -> StorageResult<bool> {
        let mut guard = self.rule_sets.write().map_err(|_| poisoned("rule set"))?;
        match guard.entry(row.key()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(row);
                Ok(true)
            }
        }
    }

    async fn get_schema(
        &self,
        slice: i32,
        app: &str,
        class: &str,
    ) -> StorageResult<Option<SchemaRow>> {
        let guard = self.schemas.read().map_err(|_| poisoned("schema"))?;
        Ok(guard.get(&SchemaRowKey::new(slice, app, class)).cloned())
    }

    async fn list_schemas(
        &self,
        slice: Option<i32>,
        app: Option<&str>,
    ) -> StorageResult<Vec<SchemaRow>> {
        let guard = self.schemas.read().map_err(|_| poisoned("schema"))?;
        Ok(guard
            .values()
            .filter(|row| slice.map_or(true, |s| row.slice == s))
            .filter(|row| app.map_or(true, |a| row.app == a))
            .cloned()
            .collect())
    }

    async fn insert_schema(&self, row: SchemaRow) -> StorageResult<()> {
        let mut guard = self.schemas.write().map_err(|_| poisoned("schema"))?;
        let key = row.key();
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "schema for {}/{}/{} already exists",
                key.slice, key.app, key.class
            )));
        }
        guard.insert(key, row);
        Ok(())
    }

    async fn update_schema(&self, row: SchemaRow) -> StorageResult<()> {
        let mut guard = self.schemas.write().map_err(|_| poisoned("schema"))?;
        match guard.get_mut(&row.key()) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(StorageError::NotFound(format!(
                "schema for {}/{}/{} not found",
                row.slice,
                row.app,
                row.class()
            ))),
        }
    }

    async fn delete_schema(&self, slice: i32, app: &str, class: &str) -> StorageResult<()> {
        let rule_sets = self.rule_sets.read().map_err(|_| poisoned("rule set"))?;
        let mut schemas = self.schemas.write().map_err(|_| poisoned("schema"))?;

        let key = SchemaRowKey::new(slice, app, class);
        if !schemas.contains_key(&key) {
            return Err(StorageError::NotFound(format!(
                "schema for {slice}/{app}/{class} not found"
            )));
        }
        if rule_sets
            .values()
            .any(|row| row.slice == slice && row.app == app && row.class == class)
        {
            return Err(StorageError::Conflict(format!(
                "rule sets still use schema {slice}/{app}/{class}"
            )));
        }
        schemas.remove(&key);
        Ok(())
    }
}

fn poisoned(what: &str) -> StorageError {
    StorageError::Backend(format!("{what} lock poisoned"))
}

fn check_parent(rows: &[WfInstance], row: &NewWfInstance) -> StorageResult<()> {
    if let Some(parent) = row.parent {
        if row_index(parent).and_then(|idx| rows.get(idx)).is_none() {
            return Err(StorageError::InvariantViolation(format!(
                "parent {parent} of instance {} does not exist",
                row.key()
            )));
        }
    }
    Ok(())
}

/// Push one row, assigning the next id and a `loggedat` no earlier than the last
fn push_row(rows: &mut Vec<WfInstance>, row: NewWfInstance) -> StorageResult<i64> {
    let id = i64::try_from(rows.len() + 1)
        .map_err(|_| StorageError::Backend("instance id overflow".to_string()))?;
    let now = Utc::now();
    let logged_at = rows.last().map_or(now, |last| last.logged_at.max(now));

    let stored = row.into_row(id, logged_at);
    tracing::debug!(id, key = %stored.key(), step = %stored.step, "Instance row appended");
    rows.push(stored);
    Ok(id)
}

fn row_index(id: i64) -> Option<usize> {
    id.checked_sub(1).and_then(|idx| usize::try_from(idx).ok())
}
