//! Workflow instance service
//!
//! Starting an instance resolves the workflow rule set, checks the store's
//! rule-set rows, validates the entity at step `START`, runs the matcher and
//! appends one history row per task it produced. The rows are written as a
//! single unit and chained through `parent`.

use crate::locks::InstanceLocks;
use crate::matcher::match_rule_set;
use crate::{ServiceError, ServiceResult};
use chrono::{DateTime, Utc};
use crux_storage::{StorageError, WorkflowStore};
use crux_types::{Entity, InstanceKey, NewWfInstance, WfInstance, START, STEP, STEP_FAILED};
use crux_verifier::{verify_entity, Registry, SharedRegistry, VerifyError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input to [`WorkflowInstanceService::start_instance`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInstanceRequest {
    pub slice: i32,
    pub app: String,
    #[serde(rename = "entityid")]
    pub entity_id: String,
    pub entity: Entity,
    pub workflow: String,
    #[serde(default)]
    pub parent: Option<i64>,
}

impl StartInstanceRequest {
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(
            self.slice,
            self.app.clone(),
            self.workflow.clone(),
            self.entity_id.clone(),
        )
    }
}

/// A history row written by a start
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartedRow {
    pub id: i64,
    pub step: String,
    #[serde(rename = "loggedat")]
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StartOutcome {
    /// The workflow finished at `START`; nothing was appended
    Done,
    Started {
        tasks: Vec<String>,
        #[serde(rename = "nextstep")]
        next_step: String,
        rows: Vec<StartedRow>,
    },
}

/// Starts workflow instances and reads their history
pub struct WorkflowInstanceService {
    store: Arc<dyn WorkflowStore>,
    registry: Arc<SharedRegistry>,
    locks: InstanceLocks,
}

impl WorkflowInstanceService {
    pub fn new(store: Arc<dyn WorkflowStore>, registry: Arc<SharedRegistry>) -> Self {
        Self {
            store,
            registry,
            locks: InstanceLocks::new(),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn store(&self) -> &dyn WorkflowStore {
        self.store.as_ref()
    }

    pub async fn start_instance(&self, request: StartInstanceRequest) -> ServiceResult<StartOutcome> {
        let registry = self.registry.load();
        let rule_set = registry
            .rule_set(&request.workflow)
            .ok_or_else(|| VerifyError::RuleSetNotFound(request.workflow.clone()))?;
        if !rule_set.is_workflow() {
            return Err(ServiceError::NotAWorkflow(request.workflow.clone()));
        }
        let class = request.entity.class.clone();
        if rule_set.class != class {
            return Err(ServiceError::ClassMismatch {
                workflow: request.workflow.clone(),
                expected: rule_set.class.clone(),
                actual: class,
            });
        }

        self.check_workflow_row(&request, &class).await?;

        let key = request.key();
        let guard = self.locks.lock(&key).await;
        let outcome = self.start_locked(&key, request, &registry).await;
        drop(guard);
        self.locks.prune();
        outcome
    }

    async fn start_locked(
        &self,
        key: &InstanceKey,
        request: StartInstanceRequest,
        registry: &Registry,
    ) -> ServiceResult<StartOutcome> {
        if !self.store.get_wf_instance(key).await?.is_empty() {
            return Err(ServiceError::InstanceExists(key.to_string()));
        }

        let mut entity = request.entity;
        entity.attrs.insert(STEP.to_string(), START.into());
        entity.set_default(STEP_FAILED, false);
        verify_entity(&entity, registry)?;

        let actions = match_rule_set(registry, &entity, &request.workflow)?;
        if actions.is_done() {
            tracing::info!(instance = %key, "Workflow done at START, nothing appended");
            return Ok(StartOutcome::Done);
        }

        let next_step = actions.next_step().unwrap_or_default().to_string();
        let new_rows = actions
            .tasks
            .iter()
            .enumerate()
            .map(|(i, task)| NewWfInstance {
                entity_id: request.entity_id.clone(),
                slice: request.slice,
                app: request.app.clone(),
                class: entity.class.clone(),
                workflow: request.workflow.clone(),
                step: task.clone(),
                next_step: next_step.clone(),
                // later rows are linked to their predecessor by the store
                parent: if i == 0 { request.parent } else { None },
            })
            .collect();

        let ids = match self.store.add_wf_start_rows(new_rows).await {
            Ok(ids) => ids,
            Err(StorageError::Conflict(_)) => {
                return Err(ServiceError::InstanceExists(key.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let mut rows = Vec::with_capacity(ids.len());
        for (id, task) in ids.into_iter().zip(&actions.tasks) {
            rows.push(StartedRow {
                id,
                step: task.clone(),
                logged_at: self.store.get_logged_at(id).await?,
            });
        }

        tracing::info!(
            instance = %key,
            tasks = actions.tasks.len(),
            next_step = %next_step,
            "Workflow instance started"
        );
        Ok(StartOutcome::Started {
            tasks: actions.tasks,
            next_step,
            rows,
        })
    }

    /// Ordered history of an instance
    pub async fn history(&self, key: &InstanceKey) -> ServiceResult<Vec<WfInstance>> {
        Ok(self.store.get_wf_instance(key).await?)
    }

    /// Step of the latest history row
    pub async fn current_step(&self, key: &InstanceKey) -> ServiceResult<String> {
        self.history(key)
            .await?
            .pop()
            .map(|row| row.step)
            .ok_or_else(|| ServiceError::InstanceNotFound(key.to_string()))
    }

    async fn check_workflow_row(&self, request: &StartInstanceRequest, class: &str) -> ServiceResult<()> {
        let (slice, app, workflow) = (request.slice, request.app.as_str(), request.workflow.as_str());

        if self.store.get_app(slice, app, class).await?.is_none() {
            return Err(ServiceError::AppNotFound {
                slice,
                app: app.to_string(),
                class: class.to_string(),
            });
        }
        if self.store.get_class(slice, app, class).await?.is_none() {
            return Err(ServiceError::ClassNotFound {
                slice,
                app: app.to_string(),
                class: class.to_string(),
            });
        }
        if !self
            .store
            .get_wf_active_status(slice, app, class, workflow)
            .await?
        {
            return Err(ServiceError::WorkflowInactive(workflow.to_string()));
        }
        if self
            .store
            .get_wf_internal_status(slice, app, class, workflow)
            .await?
        {
            return Err(ServiceError::WorkflowInternal(workflow.to_string()));
        }
        Ok(())
    }
}
