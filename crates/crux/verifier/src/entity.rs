//! Entity validator

use crate::{SchemaLookup, VerifyError, VerifyResult};
use crux_types::{Entity, Value};
use std::collections::BTreeMap;

/// Verify that an entity fits its class schema exactly
///
/// Every attribute must be declared in the pattern-schema and convert to
/// the declared type, and the entity must carry every declared attribute.
pub fn verify_entity<L>(entity: &Entity, schemas: &L) -> VerifyResult<()>
where
    L: SchemaLookup + ?Sized,
{
    typed_attrs(entity, schemas).map(|_| ())
}

/// Verify an entity and return its attributes converted to their
/// declared types
pub fn typed_attrs<L>(entity: &Entity, schemas: &L) -> VerifyResult<BTreeMap<String, Value>>
where
    L: SchemaLookup + ?Sized,
{
    let schema = schemas.require_schema(&entity.class)?;

    let mut typed = BTreeMap::new();
    for (name, value) in &entity.attrs {
        let val_type = schema
            .attr_type(name)
            .ok_or_else(|| VerifyError::EntityUnknownAttribute(name.clone()))?;
        let converted = value
            .convert_to(&val_type)
            .ok_or_else(|| VerifyError::EntityTypeMismatch(name.clone()))?;
        typed.insert(name.clone(), converted);
    }

    if entity.attrs.len() != schema.pattern_schema.len() {
        return Err(VerifyError::EntityAttributeCount {
            class: entity.class.clone(),
            expected: schema.pattern_schema.len(),
            found: entity.attrs.len(),
        });
    }
    Ok(typed)
}
