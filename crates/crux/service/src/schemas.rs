//! Stored class schemas
//!
//! Every write goes through [`verify_rule_schema`] before it reaches the
//! store, so the schema table only ever holds schemas that would pass
//! admission on their own. [`SchemaService::load_registry`] builds a
//! [`Registry`] from the stored schemas of one (slice, app) plus a set of
//! rule sets.

use crate::ServiceResult;
use crux_storage::{SchemaRow, StorageError, WorkflowStore};
use crux_types::{RuleSchema, RuleSet, RuleSetKind};
use crux_verifier::{verify_rule_schema, Bundle, Registry, SchemaEntry};
use std::sync::Arc;

pub struct SchemaService {
    store: Arc<dyn WorkflowStore>,
}

impl SchemaService {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Verify and add a new schema
    pub async fn create(
        &self,
        slice: i32,
        app: &str,
        kind: RuleSetKind,
        schema: RuleSchema,
    ) -> ServiceResult<()> {
        verify_rule_schema(&schema, kind.is_workflow())?;
        let class = schema.class.clone();
        self.store
            .insert_schema(SchemaRow::new(slice, app, kind, schema))
            .await?;
        tracing::info!(slice, app, class = %class, kind = %kind, "Schema created");
        Ok(())
    }

    /// Verify and replace an existing schema
    pub async fn update(
        &self,
        slice: i32,
        app: &str,
        kind: RuleSetKind,
        schema: RuleSchema,
    ) -> ServiceResult<()> {
        verify_rule_schema(&schema, kind.is_workflow())?;
        let class = schema.class.clone();
        self.store
            .update_schema(SchemaRow::new(slice, app, kind, schema))
            .await?;
        tracing::info!(slice, app, class = %class, kind = %kind, "Schema updated");
        Ok(())
    }

    pub async fn get(&self, slice: i32, app: &str, class: &str) -> ServiceResult<SchemaRow> {
        self.store
            .get_schema(slice, app, class)
            .await?
            .ok_or_else(|| {
                StorageError::NotFound(format!("schema for {slice}/{app}/{class} not found"))
                    .into()
            })
    }

    pub async fn list(&self, slice: Option<i32>, app: Option<&str>) -> ServiceResult<Vec<SchemaRow>> {
        Ok(self.store.list_schemas(slice, app).await?)
    }

    pub async fn delete(&self, slice: i32, app: &str, class: &str) -> ServiceResult<()> {
        self.store.delete_schema(slice, app, class).await?;
        tracing::info!(slice, app, class, "Schema deleted");
        Ok(())
    }

    /// The stored schemas of (slice, app) as a bundle with no rule sets
    pub async fn bundle(&self, slice: i32, app: &str) -> ServiceResult<Bundle> {
        let rows = self.store.list_schemas(Some(slice), Some(app)).await?;
        Ok(rows.into_iter().fold(Bundle::new(), |bundle, row| {
            bundle.with_schema(SchemaEntry {
                kind: row.kind,
                schema: row.schema,
            })
        }))
    }

    /// Admit `rule_sets` against the stored schemas of (slice, app)
    pub async fn load_registry(
        &self,
        slice: i32,
        app: &str,
        rule_sets: impl IntoIterator<Item = RuleSet>,
    ) -> ServiceResult<Registry> {
        let bundle = rule_sets
            .into_iter()
            .fold(self.bundle(slice, app).await?, Bundle::with_rule_set);
        Ok(Registry::admit(bundle)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceError;
    use crux_storage::{InMemoryCruxStorage, RuleSetRow};
    use crux_types::{AttrSchema, Rule, Term, ValueType, DONE, NEXT_STEP, START, STEP, STEP_FAILED};
    use crux_verifier::VerifyError;

    fn order_schema() -> RuleSchema {
        RuleSchema::new("order")
            .with_attr(AttrSchema::enumeration(STEP, [START, "approve"]))
            .with_attr(AttrSchema::new(STEP_FAILED, ValueType::Bool))
            .with_attr(AttrSchema::new("amount", ValueType::Float))
            .with_tasks(["approve"])
            .with_properties([NEXT_STEP, DONE])
    }

    fn order_wf() -> RuleSet {
        RuleSet::workflow("order_wf", "order").with_scope(1, "shop").with_rule(
            Rule::new()
                .when(Term::equals(STEP, START))
                .task("approve")
                .property(NEXT_STEP, "approve"),
        )
    }

    fn service() -> (Arc<InMemoryCruxStorage>, SchemaService) {
        let store = Arc::new(InMemoryCruxStorage::new());
        let service = SchemaService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn create_get_list_delete() {
        let (_, schemas) = service();
        schemas
            .create(1, "shop", RuleSetKind::Workflow, order_schema())
            .await
            .unwrap();

        let row = schemas.get(1, "shop", "order").await.unwrap();
        assert_eq!(row.kind, RuleSetKind::Workflow);
        assert_eq!(row.schema, order_schema());
        assert_eq!(schemas.list(Some(1), Some("shop")).await.unwrap().len(), 1);

        assert!(matches!(
            schemas
                .create(1, "shop", RuleSetKind::Workflow, order_schema())
                .await,
            Err(ServiceError::Storage(StorageError::Conflict(_)))
        ));

        schemas.delete(1, "shop", "order").await.unwrap();
        assert!(matches!(
            schemas.get(1, "shop", "order").await,
            Err(ServiceError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn writes_are_verified_first() {
        let (store, schemas) = service();
        let mut no_start = order_schema();
        no_start.pattern_schema[0] = AttrSchema::enumeration(STEP, ["approve"]);

        assert!(matches!(
            schemas.create(1, "shop", RuleSetKind::Workflow, no_start.clone()).await,
            Err(ServiceError::Verify(VerifyError::StepWithoutStart(_)))
        ));
        assert!(store.get_schema(1, "shop", "order").await.unwrap().is_none());

        schemas
            .create(1, "shop", RuleSetKind::Workflow, order_schema())
            .await
            .unwrap();
        assert!(matches!(
            schemas.update(1, "shop", RuleSetKind::Workflow, no_start).await,
            Err(ServiceError::Verify(VerifyError::StepWithoutStart(_)))
        ));
        assert_eq!(
            schemas.get(1, "shop", "order").await.unwrap().schema,
            order_schema()
        );
    }

    #[tokio::test]
    async fn update_replaces_and_needs_an_existing_row() {
        let (_, schemas) = service();
        let widened = order_schema().with_attr(AttrSchema::new("region", ValueType::Str));
        assert!(matches!(
            schemas
                .update(1, "shop", RuleSetKind::Workflow, widened.clone())
                .await,
            Err(ServiceError::Storage(StorageError::NotFound(_)))
        ));

        schemas
            .create(1, "shop", RuleSetKind::Workflow, order_schema())
            .await
            .unwrap();
        schemas
            .update(1, "shop", RuleSetKind::Workflow, widened.clone())
            .await
            .unwrap();
        assert_eq!(schemas.get(1, "shop", "order").await.unwrap().schema, widened);
    }

    #[tokio::test]
    async fn schema_used_by_a_rule_set_stays() {
        let (store, schemas) = service();
        schemas
            .create(1, "shop", RuleSetKind::Workflow, order_schema())
            .await
            .unwrap();
        store
            .upsert_rule_set_row(RuleSetRow::from(&order_wf()))
            .await
            .unwrap();

        assert!(matches!(
            schemas.delete(1, "shop", "order").await,
            Err(ServiceError::Storage(StorageError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn registry_from_stored_schemas() {
        let (_, schemas) = service();
        schemas
            .create(1, "shop", RuleSetKind::Workflow, order_schema())
            .await
            .unwrap();

        let registry = schemas.load_registry(1, "shop", [order_wf()]).await.unwrap();
        assert!(registry.is_workflow_class("order"));
        assert!(registry.rule_set("order_wf").is_some());

        // another app sees none of shop's schemas
        assert!(matches!(
            schemas.load_registry(1, "bank", [order_wf()]).await,
            Err(ServiceError::Verify(VerifyError::SchemaNotFound(_)))
        ));
    }
}
