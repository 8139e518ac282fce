//! Workflow instances: the append-only step history of one entity
//!
//! Every transition of a workflow instance is a separate [`WfInstance`]
//! row. Rows are never updated or deleted; the most recent row for an
//! [`InstanceKey`] carries the current step. Each row points at the row
//! it followed through `parent`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one entity's history within one workflow
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey {
    pub slice: i32,
    pub app: String,
    pub workflow: String,
    #[serde(rename = "entityid")]
    pub entity_id: String,
}

impl InstanceKey {
    pub fn new(
        slice: i32,
        app: impl Into<String>,
        workflow: impl Into<String>,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            slice,
            app: app.into(),
            workflow: workflow.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.slice, self.app, self.workflow, self.entity_id
        )
    }
}

/// A stored workflow instance row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WfInstance {
    pub id: i64,
    #[serde(rename = "entityid")]
    pub entity_id: String,
    pub slice: i32,
    pub app: String,
    pub class: String,
    pub workflow: String,
    /// Step this transition reached
    pub step: String,
    /// Assigned by the store at append time
    #[serde(rename = "loggedat")]
    pub logged_at: DateTime<Utc>,
    #[serde(rename = "nextstep")]
    pub next_step: String,
    /// Row this transition followed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<i64>,
}

impl WfInstance {
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(
            self.slice,
            self.app.clone(),
            self.workflow.clone(),
            self.entity_id.clone(),
        )
    }
}

/// A row to append; `id` and `loggedat` are assigned by the store
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewWfInstance {
    #[serde(rename = "entityid")]
    pub entity_id: String,
    pub slice: i32,
    pub app: String,
    pub class: String,
    pub workflow: String,
    pub step: String,
    #[serde(rename = "nextstep")]
    pub next_step: String,
    #[serde(default)]
    pub parent: Option<i64>,
}

impl NewWfInstance {
    pub fn key(&self) -> InstanceKey {
        InstanceKey::new(
            self.slice,
            self.app.clone(),
            self.workflow.clone(),
            self.entity_id.clone(),
        )
    }

    /// The stored row for this append
    pub fn into_row(self, id: i64, logged_at: DateTime<Utc>) -> WfInstance {
        WfInstance {
            id,
            entity_id: self.entity_id,
            slice: self.slice,
            app: self.app,
            class: self.class,
            workflow: self.workflow,
            step: self.step,
            logged_at,
            next_step: self.next_step,
            parent: self.parent,
        }
    }
}
