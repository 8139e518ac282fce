//! PostgreSQL adapter for Crux storage.
//!
//! Appends run in a transaction holding an advisory lock on the instance
//! key, so concurrent appends for one entity serialise across processes.

use crate::model::{check_new_instance, check_start_rows, RuleSetRow, SchemaRow};
use crate::traits::WorkflowStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crux_types::{InstanceKey, NewWfInstance, RuleSchema, RuleSetKind, WfInstance};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresCruxStorage {
    pool: PgPool,
}

impl PostgresCruxStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS ruleset (
                slice INTEGER NOT NULL,
                app TEXT NOT NULL,
                class TEXT NOT NULL,
                brwf CHAR(1) NOT NULL,
                setname TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                is_internal BOOLEAN NOT NULL DEFAULT FALSE,
                PRIMARY KEY (slice, app, class, brwf, setname)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS wfinstance (
                id BIGSERIAL PRIMARY KEY,
                entityid TEXT NOT NULL,
                slice INTEGER NOT NULL,
                app TEXT NOT NULL,
                class TEXT NOT NULL,
                workflow TEXT NOT NULL,
                step TEXT NOT NULL,
                loggedat TIMESTAMPTZ NOT NULL DEFAULT now(),
                nextstep TEXT NOT NULL,
                parent BIGINT REFERENCES wfinstance (id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ruleschema (
                slice INTEGER NOT NULL,
                app TEXT NOT NULL,
                class TEXT NOT NULL,
                brwf CHAR(1) NOT NULL,
                patternschema JSONB NOT NULL,
                actionschema JSONB NOT NULL,
                editedat TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (slice, app, class)
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS wfinstance_key_idx
                ON wfinstance (slice, app, workflow, entityid, loggedat, id)
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn workflow_flag(
        &self,
        column: &str,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<bool> {
        let sql = format!(
            "SELECT {column} FROM ruleset \
             WHERE slice = $1 AND app = $2 AND class = $3 AND brwf = $4 AND setname = $5"
        );
        let row = sqlx::query(&sql)
            .bind(slice)
            .bind(app)
            .bind(class)
            .bind(RuleSetKind::Workflow.as_flag())
            .bind(set_name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get::<bool, _>(column)
                .map_err(|e| StorageError::Backend(e.to_string())),
            None => Err(StorageError::NotFound(format!(
                "workflow {set_name} for {slice}/{app}/{class} not found"
            ))),
        }
    }
}

#[async_trait]
impl WorkflowStore for PostgresCruxStorage {
    async fn get_app(&self, slice: i32, app: &str, class: &str) -> StorageResult<Option<String>> {
        let row = sqlx::query(
            "SELECT app FROM ruleset \
             WHERE slice = $1 AND app = $2 AND class = $3 AND brwf = $4 AND is_active \
             LIMIT 1",
        )
        .bind(slice)
        .bind(app)
        .bind(class)
        .bind(RuleSetKind::Workflow.as_flag())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|r| r.try_get::<String, _>("app"))
            .transpose()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn get_class(
        &self,
        slice: i32,
        app: &str,
        class: &str,
    ) -> StorageResult<Option<String>> {
        let row = sqlx::query(
            "SELECT class FROM ruleset WHERE slice = $1 AND app = $2 AND class = $3 LIMIT 1",
        )
        .bind(slice)
        .bind(app)
        .bind(class)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|r| r.try_get::<String, _>("class"))
            .transpose()
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn get_wf_active_status(
        &self,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<bool> {
        self.workflow_flag("is_active", slice, app, class, set_name)
            .await
    }

    async fn get_wf_internal_status(
        &self,
        slice: i32,
        app: &str,
        class: &str,
        set_name: &str,
    ) -> StorageResult<bool> {
        self.workflow_flag("is_internal", slice, app, class, set_name)
            .await
    }

    async fn get_wf_instance(&self, key: &InstanceKey) -> StorageResult<Vec<WfInstance>> {
        let rows = sqlx::query(
            r#"
            SELECT id, entityid, slice, app, class, workflow, step, loggedat, nextstep, parent
            FROM wfinstance
            WHERE slice = $1 AND app = $2 AND workflow = $3 AND entityid = $4
            ORDER BY loggedat ASC, id ASC
            "#,
        )
        .bind(key.slice)
        .bind(&key.app)
        .bind(&key.workflow)
        .bind(&key.entity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.iter().map(row_to_instance).collect()
    }

    async fn add_wf_new_instance(&self, row: NewWfInstance) -> StorageResult<i64> {
        check_new_instance(&row)?;
        let key = row.key();

        let mut tx = self.pool.begin().await.map_err(backend)?;
        lock_instance(&mut tx, &key).await?;
        check_parent(&mut tx, &row).await?;
        let id = insert_instance_row(&mut tx, &row).await?;
        tx.commit().await.map_err(backend)?;

        tracing::debug!(id, key = %key, step = %row.step, "Instance row appended");
        Ok(id)
    }

    async fn add_wf_start_rows(&self, rows: Vec<NewWfInstance>) -> StorageResult<Vec<i64>> {
        let key = check_start_rows(&rows)?;

        // Dropping the transaction on any early return rolls every row back
        let mut tx = self.pool.begin().await.map_err(backend)?;
        lock_instance(&mut tx, &key).await?;

        let existing = sqlx::query(
            "SELECT 1 FROM wfinstance \
             WHERE slice = $1 AND app = $2 AND workflow = $3 AND entityid = $4 LIMIT 1",
        )
        .bind(key.slice)
        .bind(&key.app)
        .bind(&key.workflow)
        .bind(&key.entity_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;
        if existing.is_some() {
            return Err(StorageError::Conflict(format!("instance {key} already exists")));
        }

        let mut ids: Vec<i64> = Vec::with_capacity(rows.len());
        for mut row in rows {
            match ids.last() {
                Some(&previous) => row.parent = Some(previous),
                None => check_parent(&mut tx, &row).await?,
            }
            ids.push(insert_instance_row(&mut tx, &row).await?);
        }
        tx.commit().await.map_err(backend)?;

        tracing::debug!(key = %key, rows = ids.len(), "Instance start rows appended");
        Ok(ids)
    }

    async fn get_logged_at(&self, id: i64) -> StorageResult<DateTime<Utc>> {
        let row = sqlx::query("SELECT loggedat FROM wfinstance WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .ok_or_else(|| StorageError::NotFound(format!("instance row {id} not found")))?;

        row.try_get("loggedat")
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn upsert_rule_set_row(&self, row: RuleSetRow) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ruleset (slice, app, class, brwf, setname, is_active, is_internal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slice, app, class, brwf, setname)
            DO UPDATE SET is_active = EXCLUDED.is_active, is_internal = EXCLUDED.is_internal
            "#,
        )
        .bind(row.slice)
        .bind(&row.app)
        .bind(&row.class)
        .bind(row.kind.as_flag())
        .bind(&row.set_name)
        .bind(row.is_active)
        .bind(row.is_internal)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn insert_rule_set_row(&self, row: RuleSetRow) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO ruleset (slice, app, class, brwf, setname, is_active, is_internal)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slice, app, class, brwf, setname) DO NOTHING
            "#,
        )
        .bind(row.slice)
        .bind(&row.app)
        .bind(&row.class)
        .bind(row.kind.as_flag())
        .bind(&row.set_name)
        .bind(row.is_active)
        .bind(row.is_internal)
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_schema(
        &self,
        slice: i32,
        app: &str,
        class: &str,
    ) -> StorageResult<Option<SchemaRow>> {
        let row = sqlx::query(
            r#"
            SELECT slice, app, class, brwf, patternschema::text AS patternschema,
                   actionschema::text AS actionschema
            FROM ruleschema
            WHERE slice = $1 AND app = $2 AND class = $3
            "#,
        )
        .bind(slice)
        .bind(app)
        .bind(class)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(row_to_schema).transpose()
    }

    async fn list_schemas(
        &self,
        slice: Option<i32>,
        app: Option<&str>,
    ) -> StorageResult<Vec<SchemaRow>> {
        let rows = sqlx::query(
            r#"
            SELECT slice, app, class, brwf, patternschema::text AS patternschema,
                   actionschema::text AS actionschema
            FROM ruleschema
            WHERE ($1::INTEGER IS NULL OR slice = $1) AND ($2::TEXT IS NULL OR app = $2)
            ORDER BY slice, app, class
            "#,
        )
        .bind(slice)
        .bind(app)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(row_to_schema).collect()
    }

    async fn insert_schema(&self, row: SchemaRow) -> StorageResult<()> {
        let (pattern, actions) = schema_columns(&row.schema)?;
        let result = sqlx::query(
            r#"
            INSERT INTO ruleschema (slice, app, class, brwf, patternschema, actionschema)
            VALUES ($1, $2, $3, $4, $5::jsonb, $6::jsonb)
            ON CONFLICT (slice, app, class) DO NOTHING
            "#,
        )
        .bind(row.slice)
        .bind(&row.app)
        .bind(row.class())
        .bind(row.kind.as_flag())
        .bind(pattern)
        .bind(actions)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(format!(
                "schema for {}/{}/{} already exists",
                row.slice,
                row.app,
                row.class()
            )));
        }
        Ok(())
    }

    async fn update_schema(&self, row: SchemaRow) -> StorageResult<()> {
        let (pattern, actions) = schema_columns(&row.schema)?;
        let result = sqlx::query(
            r#"
            UPDATE ruleschema
            SET brwf = $4, patternschema = $5::jsonb, actionschema = $6::jsonb, editedat = now()
            WHERE slice = $1 AND app = $2 AND class = $3
            "#,
        )
        .bind(row.slice)
        .bind(&row.app)
        .bind(row.class())
        .bind(row.kind.as_flag())
        .bind(pattern)
        .bind(actions)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "schema for {}/{}/{} not found",
                row.slice,
                row.app,
                row.class()
            )));
        }
        Ok(())
    }

    async fn delete_schema(&self, slice: i32, app: &str, class: &str) -> StorageResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let in_use = sqlx::query(
            "SELECT 1 FROM ruleset WHERE slice = $1 AND app = $2 AND class = $3 LIMIT 1",
        )
        .bind(slice)
        .bind(app)
        .bind(class)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let result =
            sqlx::query("DELETE FROM ruleschema WHERE slice = $1 AND app = $2 AND class = $3")
                .bind(slice)
                .bind(app)
                .bind(class)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!(
                "schema for {slice}/{app}/{class} not found"
            )));
        }
        if in_use.is_some() {
            return Err(StorageError::Conflict(format!(
                "rule sets still use schema {slice}/{app}/{class}"
            )));
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }
}

fn backend(e: sqlx::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

/// Serialise appends for one instance key across connections
async fn lock_instance(conn: &mut PgConnection, key: &InstanceKey) -> StorageResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(key.to_string())
        .execute(&mut *conn)
        .await
        .map_err(backend)?;
    Ok(())
}

async fn check_parent(conn: &mut PgConnection, row: &NewWfInstance) -> StorageResult<()> {
    let Some(parent) = row.parent else {
        return Ok(());
    };
    let found = sqlx::query("SELECT 1 FROM wfinstance WHERE id = $1")
        .bind(parent)
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?;
    match found {
        Some(_) => Ok(()),
        None => Err(StorageError::InvariantViolation(format!(
            "parent {parent} of instance {} does not exist",
            row.key()
        ))),
    }
}

async fn insert_instance_row(conn: &mut PgConnection, row: &NewWfInstance) -> StorageResult<i64> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO wfinstance
            (entityid, slice, app, class, workflow, step, nextstep, parent)
        VALUES
            ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(&row.entity_id)
    .bind(row.slice)
    .bind(&row.app)
    .bind(&row.class)
    .bind(&row.workflow)
    .bind(&row.step)
    .bind(&row.next_step)
    .bind(row.parent)
    .fetch_one(&mut *conn)
    .await
    .map_err(backend)?;
    inserted.try_get("id").map_err(backend)
}

fn schema_columns(schema: &RuleSchema) -> StorageResult<(String, String)> {
    let encode = |e: serde_json::Error| StorageError::InvalidInput(format!("schema encoding: {e}"));
    Ok((
        serde_json::to_string(&schema.pattern_schema).map_err(encode)?,
        serde_json::to_string(&schema.action_schema).map_err(encode)?,
    ))
}

fn row_to_schema(row: &PgRow) -> StorageResult<SchemaRow> {
    let decode = |e: serde_json::Error| StorageError::Backend(format!("schema decoding: {e}"));
    let flag: String = row.try_get("brwf").map_err(backend)?;
    let kind = RuleSetKind::from_flag(&flag)
        .ok_or_else(|| StorageError::Backend(format!("unknown brwf flag {flag}")))?;
    let pattern: String = row.try_get("patternschema").map_err(backend)?;
    let actions: String = row.try_get("actionschema").map_err(backend)?;

    Ok(SchemaRow {
        slice: row.try_get("slice").map_err(backend)?,
        app: row.try_get("app").map_err(backend)?,
        kind,
        schema: RuleSchema {
            class: row.try_get("class").map_err(backend)?,
            pattern_schema: serde_json::from_str(&pattern).map_err(decode)?,
            action_schema: serde_json::from_str(&actions).map_err(decode)?,
        },
    })
}

fn row_to_instance(row: &PgRow) -> StorageResult<WfInstance> {
    Ok(WfInstance {
        id: row.try_get("id").map_err(backend)?,
        entity_id: row.try_get("entityid").map_err(backend)?,
        slice: row.try_get("slice").map_err(backend)?,
        app: row.try_get("app").map_err(backend)?,
        class: row.try_get("class").map_err(backend)?,
        workflow: row.try_get("workflow").map_err(backend)?,
        step: row.try_get("step").map_err(backend)?,
        logged_at: row.try_get("loggedat").map_err(backend)?,
        next_step: row.try_get("nextstep").map_err(backend)?,
        parent: row.try_get("parent").map_err(backend)?,
    })
}
