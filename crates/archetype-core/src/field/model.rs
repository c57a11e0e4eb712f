use crate::{
    DISCRIMINATOR_KEY,
    error::{ConversionError, Error, PathError},
    resolve::ModelRef,
    role::Role,
    value::{Key, Value},
};
use std::any::Any;

//
// ============================================================================
// Nested model
// ============================================================================
//

pub(crate) fn convert_model(target: &ModelRef, raw: &Value) -> Result<Value, Error> {
    match raw {
        Value::Model(instance) if instance.schema().is_a(target.type_id()) => Ok(raw.clone()),
        Value::Map(_) => {
            let schema = target.schema()?;
            schema.construct(raw).map(Value::from)
        }
        other => Err(ConversionError::here(format!(
            "Supplied type {}, needs a mapping or {}",
            other.kind_name(),
            target.name()
        ))
        .into()),
    }
}

//
// ============================================================================
// Discriminated union
// ============================================================================
//

pub(crate) fn convert_union(candidates: &[ModelRef], raw: &Value) -> Result<Value, Error> {
    match raw {
        Value::Model(instance) => {
            let schema = instance.schema();
            if candidates.iter().any(|c| schema.is_a(c.type_id())) {
                Ok(raw.clone())
            } else {
                Err(ConversionError::here(format!(
                    "Expected {}, got {}",
                    union_repr(candidates),
                    schema.name()
                ))
                .into())
            }
        }
        Value::Map(entries) => {
            let Some(tag) = entries.get(&Key::from(DISCRIMINATOR_KEY)) else {
                return Err(ConversionError::here(format!(
                    "Expected a mapping with a `{DISCRIMINATOR_KEY}` field, got no `{DISCRIMINATOR_KEY}` field"
                ))
                .into());
            };

            let selected = tag
                .as_str()
                .and_then(|tag| candidates.iter().find(|c| c.discriminator() == Some(tag)));
            let Some(selected) = selected else {
                return Err(ConversionError::here(format!(
                    "Got a mapping with unsupported `{DISCRIMINATOR_KEY}` {}",
                    tag.repr()
                ))
                .into());
            };

            selected.schema()?.construct(raw).map(Value::from)
        }
        other => Err(ConversionError::here(format!(
            "Expected a mapping with a `{DISCRIMINATOR_KEY}` field, got type {}",
            other.kind_name()
        ))
        .into()),
    }
}

/// `Union[A, B]` rendering of the candidate list.
pub(crate) fn union_repr(candidates: &[ModelRef]) -> String {
    let names: Vec<&str> = candidates.iter().map(ModelRef::name).collect();

    format!("Union[{}]", names.join(", "))
}

//
// ============================================================================
// Shared
// ============================================================================
//

pub(crate) fn validate_nested(value: &Value, ctx: &dyn Any, out: &mut Vec<PathError>) {
    if let Value::Model(instance) = value {
        out.extend(instance.validation_errors(ctx));
    }
}

pub(crate) fn model_to_primitive(value: &Value, role: &Role, ctx: &dyn Any) -> Value {
    match value {
        Value::Model(instance) => instance.serialize_with(role, ctx),
        other => other.clone(),
    }
}

pub(crate) fn union_to_primitive(value: &Value, role: &Role, ctx: &dyn Any) -> Value {
    let Value::Model(instance) = value else {
        return value.clone();
    };

    let mut output = instance.serialize_with(role, ctx);
    if let (Value::Map(entries), Some(tag)) = (&mut output, instance.schema().discriminator()) {
        entries.insert(Key::from(DISCRIMINATOR_KEY), Value::from(tag));
    }

    output
}

///
/// TESTS
///
