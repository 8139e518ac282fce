//! Atomically replaceable registry handle

use crate::{Bundle, Registry, VerifyResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// The registry currently in force, shared between readers
///
/// Readers take a snapshot with [`SharedRegistry::load`] and keep using it
/// for the whole evaluation even if a reload happens meanwhile. A reload
/// that fails verification leaves the current registry in place.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    current: RwLock<Arc<Registry>>,
}

impl SharedRegistry {
    pub fn new(registry: Registry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// Snapshot of the current registry
    pub fn load(&self) -> Arc<Registry> {
        Arc::clone(&self.current.read())
    }

    /// Replace the registry, returning the previous one
    pub fn store(&self, registry: Registry) -> Arc<Registry> {
        self.swap(Arc::new(registry))
    }

    fn swap(&self, registry: Arc<Registry>) -> Arc<Registry> {
        tracing::info!(
            schemas = registry.schema_count(),
            rule_sets = registry.rule_set_count(),
            "Rule registry swapped"
        );
        std::mem::replace(&mut *self.current.write(), registry)
    }

    /// Admit `bundle` and swap it in if it verifies
    pub fn reload(&self, bundle: Bundle) -> VerifyResult<Arc<Registry>> {
        let registry = match Registry::admit(bundle) {
            Ok(registry) => registry,
            Err(err) => {
                tracing::warn!(error = %err, "Reload rejected, keeping current registry");
                return Err(err);
            }
        };
        let registry = Arc::new(registry);
        self.swap(Arc::clone(&registry));
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SchemaEntry, VerifyError};
    use crux_types::{AttrSchema, Rule, RuleSchema, RuleSet, ValueType};

    fn bundle(extra_sets: usize) -> Bundle {
        let schema = RuleSchema::new("cart")
            .with_attr(AttrSchema::new("total", ValueType::Float))
            .with_tasks(["discount"])
            .with_properties(["pct"]);
        (0..extra_sets).fold(
            Bundle::new().with_schema(SchemaEntry::business(schema)),
            |b, i| b.with_rule_set(RuleSet::new(format!("set{i}"), "cart").with_rule(Rule::new())),
        )
    }

    #[test]
    fn test_reload_swaps() {
        let shared = SharedRegistry::default();
        assert!(shared.load().is_empty());

        let loaded = shared.reload(bundle(2)).unwrap();
        assert_eq!(loaded.rule_set_count(), 2);
        assert_eq!(shared.load().rule_set_count(), 2);
    }

    #[test]
    fn test_failed_reload_keeps_current() {
        let shared = SharedRegistry::new(Registry::admit(bundle(1)).unwrap());

        let mut broken = bundle(1);
        broken.rule_sets[0] = RuleSet::new("set0", "cart").with_rule(Rule::new().then_call("gone"));
        assert_eq!(
            shared.reload(broken).unwrap_err(),
            VerifyError::RuleSetNotFound("gone".into())
        );
        assert_eq!(shared.load().rule_set_count(), 1);
    }

    #[test]
    fn test_snapshot_survives_swap() {
        let shared = SharedRegistry::new(Registry::admit(bundle(1)).unwrap());
        let snapshot = shared.load();
        let previous = shared.store(Registry::admit(bundle(3)).unwrap());

        assert!(Arc::ptr_eq(&snapshot, &previous));
        assert_eq!(snapshot.rule_set_count(), 1);
        assert_eq!(shared.load().rule_set_count(), 3);
    }

    #[test]
    fn test_readers_never_see_partial_registry() {
        let shared = SharedRegistry::new(Registry::admit(bundle(1)).unwrap());
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        let registry = shared.load();
                        assert_eq!(registry.schema_count(), 1);
                        assert!(matches!(registry.rule_set_count(), 1 | 4));
                    }
                });
            }
            scope.spawn(|| {
                for i in 0..50 {
                    let sets = if i % 2 == 0 { 4 } else { 1 };
                    shared.reload(bundle(sets)).unwrap();
                }
            });
        });
    }

    #[test]
    fn test_reload_returns_its_own_registry() {
        let shared = SharedRegistry::default();
        std::thread::scope(|scope| {
            for sets in [2, 5] {
                let shared = &shared;
                scope.spawn(move || {
                    for _ in 0..100 {
                        let admitted = shared.reload(bundle(sets)).unwrap();
                        assert_eq!(admitted.rule_set_count(), sets);
                    }
                });
            }
        });
    }
}
