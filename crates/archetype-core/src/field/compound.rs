use super::Field;
use crate::{
    error::{ConversionError, Error, PathError},
    role::Role,
    value::{Key, Value},
};
use std::{any::Any, collections::BTreeMap};

///
/// SizeRule
/// Item-count bounds for list and dict descriptors.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SizeRule {
    pub min: usize,
    pub max: Option<usize>,
}

impl SizeRule {
    fn check(self, len: usize) -> Option<String> {
        let plural = |n: usize| if n > 1 { "s" } else { "" };

        match (self.min, self.max) {
            (0, Some(max)) => {
                (len > max).then(|| format!("Provide at most {max} item{}", plural(max)))
            }
            (0, None) => None,
            (min, Some(max)) if !(min..=max).contains(&len) => {
                if min == max {
                    Some(format!("Provide exactly {min} item{}", plural(min)))
                } else {
                    Some(format!("Provide {min} to {max} items"))
                }
            }
            (_, Some(_)) => None,
            (min, None) => {
                (len < min).then(|| format!("Provide at least {min} item{}", plural(min)))
            }
        }
    }
}

//
// ============================================================================
// List
// ============================================================================
//

pub(crate) fn convert_list(item: &Field, raw: &Value) -> Result<Value, Error> {
    let Value::List(items) = raw else {
        return Err(
            ConversionError::here(format!("Expected a list, got a {}", raw.kind_name())).into(),
        );
    };

    items
        .iter()
        .enumerate()
        .map(|(index, raw)| convert_item(item, raw).map_err(|err| err.prefixed(&index.to_string())))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

pub(crate) fn validate_list(
    item: &Field,
    size: SizeRule,
    value: &Value,
    ctx: &dyn Any,
    out: &mut Vec<PathError>,
) {
    let Value::List(items) = value else {
        return;
    };

    if let Some(message) = size.check(items.len()) {
        out.push(PathError::here(message));
    }

    for (index, value) in items.iter().enumerate() {
        let segment = index.to_string();
        let mut item_errors = Vec::new();
        item.validate_item(value, ctx, &mut item_errors);
        out.extend(item_errors.into_iter().map(|err| err.prefixed(&segment)));
    }
}

pub(crate) fn list_to_primitive(item: &Field, value: &Value, role: &Role, ctx: &dyn Any) -> Value {
    match value {
        Value::List(items) if !item.is_plain() => Value::List(
            items
                .iter()
                .map(|value| item.to_primitive(value, role, ctx))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub(crate) fn copy_list(item: &Field, value: &Value) -> Value {
    match value {
        Value::List(items) if !item.is_atomic() => {
            Value::List(items.iter().map(|value| item.copy_value(value)).collect())
        }
        other => other.clone(),
    }
}

//
// ============================================================================
// Dict
// ============================================================================
//

pub(crate) fn convert_dict(key: &Field, item: &Field, raw: &Value) -> Result<Value, Error> {
    let Value::Map(entries) = raw else {
        return Err(
            ConversionError::here(format!("Expected a dict, got a {}", raw.kind_name())).into(),
        );
    };

    let mut converted = BTreeMap::new();
    for (raw_key, raw_value) in entries {
        let segment = raw_key.to_string();
        let new_key = convert_key(key, raw_key).map_err(|err| err.prefixed(&segment))?;
        let new_value = convert_item(item, raw_value).map_err(|err| err.prefixed(&segment))?;
        converted.insert(new_key, new_value);
    }

    Ok(Value::Map(converted))
}

pub(crate) fn validate_dict(
    key: &Field,
    item: &Field,
    size: SizeRule,
    value: &Value,
    ctx: &dyn Any,
    out: &mut Vec<PathError>,
) {
    let Value::Map(entries) = value else {
        return;
    };

    if let Some(message) = size.check(entries.len()) {
        out.push(PathError::here(message));
    }

    for (entry_key, entry_value) in entries {
        let segment = entry_key.to_string();
        let mut entry_errors = Vec::new();
        key.validate_item(&entry_key.clone().into_value(), ctx, &mut entry_errors);
        item.validate_item(entry_value, ctx, &mut entry_errors);
        out.extend(entry_errors.into_iter().map(|err| err.prefixed(&segment)));
    }
}

pub(crate) fn dict_to_primitive(item: &Field, value: &Value, role: &Role, ctx: &dyn Any) -> Value {
    match value {
        Value::Map(entries) if !item.is_plain() => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), item.to_primitive(v, role, ctx)))
                .collect(),
        ),
        other => other.clone(),
    }
}

pub(crate) fn copy_dict(item: &Field, value: &Value) -> Value {
    match value {
        Value::Map(entries) if !item.is_atomic() => Value::Map(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), item.copy_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

//
// ============================================================================
// Helpers
// ============================================================================
//

// convert_item
// items carry no defaults, so null is the only non-value input
fn convert_item(item: &Field, raw: &Value) -> Result<Value, Error> {
    if raw.is_null() {
        Ok(Value::Null)
    } else {
        item.convert_present(raw)
    }
}

fn convert_key(key: &Field, raw: &Key) -> Result<Key, Error> {
    let converted = key.convert_present(&raw.clone().into_value())?;

    Key::from_value(&converted).ok_or_else(|| {
        ConversionError::here(format!(
            "Dict keys must be booleans, integers or strings, got a {}",
            converted.kind_name()
        ))
        .into()
    })
}

///
/// TESTS
///
