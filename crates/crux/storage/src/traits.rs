use crate::model::{RuleSetRow, SchemaRow};
use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crux_types::{InstanceKey, NewWfInstance, WfInstance};

/// Persistence boundary for rule-set rows and workflow instances.
///
/// Instance rows are append-only: [`WorkflowStore::add_wf_new_instance`] and
/// [`WorkflowStore::add_wf_start_rows`] are the only writes, and the store
/// assigns both `id` and `loggedat`.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// The app name, if an active workflow rule set exists for the triple.
    async fn get_app(&self, slice: i32, app: &str, class: &str) -> StorageResult<Option<String>>;

    /// The class name, if any rule set is bound to it under (slice, app).
    async fn get_class(&self, slice: i32, app: &str, class: &str)
        -> StorageResult<Option<String>>;

    /// Whether the workflow rule set is active. Fails if it is unknown.
    async fn get_wf_active_status(
        &self,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<bool>;

    /// Whether the workflow rule set is internal. Fails if it is unknown.
    async fn get_wf_internal_status(
        &self,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<bool>;

    /// The instance history for `key`, ordered by `loggedat` then `id`.
    async fn get_wf_instance(&self, key: &InstanceKey) -> StorageResult<Vec<WfInstance>>;

    /// Append one transition row and return its id.
    async fn add_wf_new_instance(&self, row: NewWfInstance) -> StorageResult<i64>;

    /// Append the opening rows of a new instance as one unit and return their
    /// ids in order.
    ///
    /// Either every row lands or none does. The first row keeps its own
    /// `parent`; each later row is parented to the row before it. Fails with
    /// `Conflict` if the instance already has history.
    async fn add_wf_start_rows(&self, rows: Vec<NewWfInstance>) -> StorageResult<Vec<i64>>;

    /// Server time at which row `id` was appended.
    async fn get_logged_at(&self, id: i64) -> StorageResult<DateTime<Utc>>;

    /// Insert or replace a rule-set row.
    async fn upsert_rule_set_row(&self, row: RuleSetRow) -> StorageResult<()>;

    /// Insert a rule-set row unless one exists under its key. An existing
    /// row, flags included, is left alone. Returns whether a row was added.
    async fn insert_rule_set_row(&self, row: RuleSetRow) -> StorageResult<bool>;

    async fn get_schema(&self, slice: i32, app: &str, class: &str)
        -> StorageResult<Option<SchemaRow>>;

    /// Schemas ordered by (slice, app, class), optionally narrowed.
    async fn list_schemas(&self, slice: Option<i32>, app: Option<&str>)
        -> StorageResult<Vec<SchemaRow>>;

    /// Add a schema. `Conflict` if (slice, app, class) is taken.
    async fn insert_schema(&self, row: SchemaRow) -> StorageResult<()>;

    /// Replace a schema. `NotFound` if there is none to replace.
    async fn update_schema(&self, row: SchemaRow) -> StorageResult<()>;

    /// Remove a schema. `Conflict` while rule-set rows still use the class.
    async fn delete_schema(&self, slice: i32, app: &str, class: &str) -> StorageResult<()>;
}
