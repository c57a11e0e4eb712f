//! Field descriptors: the compiled unit of conversion, validation,
//! serialization and copy logic for one model attribute.

pub mod atomic;
pub mod compound;
pub mod computed;
pub mod model;

pub use atomic::{Bound, NumberRule, StrRule};
pub use compound::SizeRule;
pub use computed::ComputeFn;

use crate::{
    REQUIRED_MESSAGE,
    error::{Error, PathError},
    model::Instance,
    resolve::ModelRef,
    role::Role,
    value::Value,
};
use std::{any::Any, fmt, sync::Arc};

///
/// Callback types
///
/// Every callback is shared and thread-safe so compiled schemas can be
/// read from any thread.
///

/// Field-level validator; `Err` carries the message.
pub type Validator = Arc<dyn Fn(&Value, &dyn Any) -> Result<(), String> + Send + Sync>;

/// Model-level validator attached to one field; sees the whole instance.
pub type ModelValidator =
    Arc<dyn Fn(&Instance, &Value, &dyn Any) -> Result<(), String> + Send + Sync>;

/// Zero-argument default factory.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Custom output hook receiving the value, role and serialization context.
pub type SerializeHook = Arc<dyn Fn(&Value, &Role, &dyn Any) -> Value + Send + Sync>;

///
/// FieldDefault
///
/// Exactly one of required, literal default, or default factory.
///

#[derive(Clone, Default)]
pub enum FieldDefault {
    #[default]
    Required,
    Value(Value),
    Factory(DefaultFactory),
}

impl FieldDefault {
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }

    // fill
    // value used when the input key is absent; None means Missing
    fn fill(&self) -> Option<Value> {
        match self {
            Self::Required => None,
            Self::Value(value) => Some(value.clone()),
            Self::Factory(factory) => Some(factory()),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("required"),
            Self::Value(value) => write!(f, "default=<{}>", value.repr()),
            Self::Factory(_) => f.write_str("default=<factory>"),
        }
    }
}

///
/// FieldKind
///
/// Descriptor variant plus its native validation rule and nested
/// descriptors.
///

#[derive(Clone)]
pub enum FieldKind {
    Bool,
    Int(NumberRule),
    Float(NumberRule),
    Str(StrRule),
    List {
        item: Box<Field>,
        size: SizeRule,
    },
    Dict {
        key: Box<Field>,
        value: Box<Field>,
        size: SizeRule,
    },
    Model(ModelRef),
    Union(Vec<ModelRef>),
    Any,
    Computed(ComputeFn),
}

impl FieldKind {
    /// Descriptor class name, used in configuration messages.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Bool => "BoolField",
            Self::Int(_) => "IntField",
            Self::Float(_) => "FloatField",
            Self::Str(_) => "StrField",
            Self::List { .. } => "ListField",
            Self::Dict { .. } => "DictField",
            Self::Model(_) => "ModelField",
            Self::Union(_) => "UnionField",
            Self::Any => "AnyField",
            Self::Computed(_) => "ComputedField",
        }
    }

    /// Type rendering such as `List[int]` or `Union[A, B]`.
    #[must_use]
    pub fn type_repr(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Str(_) => "str".to_string(),
            Self::List { item, .. } => format!("List[{}]", item.type_repr()),
            Self::Dict { key, value, .. } => {
                format!("Dict[{}, {}]", key.type_repr(), value.type_repr())
            }
            Self::Model(target) => target.name().to_string(),
            Self::Union(candidates) => model::union_repr(candidates),
            Self::Any => "Any".to_string(),
            Self::Computed(_) => "computed".to_string(),
        }
    }

    /// Atomic kinds are stored and serialized as-is and never copied.
    #[must_use]
    pub const fn is_atomic(&self) -> bool {
        matches!(self, Self::Bool | Self::Int(_) | Self::Float(_) | Self::Str(_))
    }

    /// True when the kind defines a per-type empty sentinel.
    #[must_use]
    pub const fn supports_hide_empty(&self) -> bool {
        matches!(
            self,
            Self::Bool
                | Self::Int(_)
                | Self::Float(_)
                | Self::Str(_)
                | Self::List { .. }
                | Self::Dict { .. }
                | Self::Model(_)
        )
    }

    const fn has_native_rule(&self) -> bool {
        match self {
            Self::Int(rule) | Self::Float(rule) => !rule.is_unbounded(),
            Self::Str(rule) => !matches!(rule, StrRule::None),
            Self::List { .. } | Self::Dict { .. } | Self::Model(_) | Self::Union(_) => true,
            Self::Bool | Self::Any | Self::Computed(_) => false,
        }
    }
}

///
/// Field
///
/// One compiled descriptor. Container kinds hold nested descriptors for
/// their items; those carry an empty name and no keys.
///

#[derive(Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
    pub default: FieldDefault,

    /// Key read from input; `None` means never populated from input.
    pub input_key: Option<String>,

    /// Key written to output; `None` means never serialized.
    pub output_key: Option<String>,

    pub hide_null: bool,
    pub hide_empty: bool,
    pub validators: Vec<Validator>,
    pub model_validator: Option<ModelValidator>,
    pub serialize_hook: Option<SerializeHook>,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();

        Self {
            input_key: Some(name.clone()),
            output_key: Some(name.clone()),
            name,
            kind,
            nullable: false,
            default: FieldDefault::Required,
            hide_null: false,
            hide_empty: false,
            validators: Vec::new(),
            model_validator: None,
            serialize_hook: None,
        }
    }

    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_required()
    }

    #[must_use]
    pub const fn is_computed(&self) -> bool {
        matches!(self.kind, FieldKind::Computed(_))
    }

    #[must_use]
    pub const fn is_atomic(&self) -> bool {
        self.kind.is_atomic()
    }

    /// Items of this descriptor may be emitted without a per-item pass.
    #[must_use]
    pub const fn is_plain(&self) -> bool {
        self.serialize_hook.is_none()
            && (self.kind.is_atomic() || matches!(self.kind, FieldKind::Any))
    }

    #[must_use]
    pub fn type_repr(&self) -> String {
        self.kind.type_repr()
    }

    /// Whether the field needs an entry in the validation table.
    #[must_use]
    pub fn needs_validation(&self) -> bool {
        self.is_required()
            || !self.nullable
            || !self.validators.is_empty()
            || self.model_validator.is_some()
            || self.kind.has_native_rule()
    }

    /// Key used to locate this field's validation errors.
    #[must_use]
    pub fn error_key(&self) -> &str {
        self.input_key
            .as_deref()
            .or(self.output_key.as_deref())
            .unwrap_or(&self.name)
    }

    //
    // Conversion
    //

    /// Convert a raw input value.
    /// `None` in and out stands for Missing.
    pub fn convert(&self, raw: Option<&Value>) -> Result<Option<Value>, Error> {
        match raw {
            None => Ok(self.default.fill()),
            Some(Value::Null) => Ok(Some(Value::Null)),
            Some(raw) => self.convert_present(raw).map(Some),
        }
    }

    // convert_present
    // raw is neither Missing nor null
    pub(crate) fn convert_present(&self, raw: &Value) -> Result<Value, Error> {
        match &self.kind {
            FieldKind::Bool => atomic::convert_bool(raw),
            FieldKind::Int(_) => atomic::convert_int(raw),
            FieldKind::Float(_) => atomic::convert_float(raw),
            FieldKind::Str(_) => atomic::convert_str(raw),
            FieldKind::List { item, .. } => compound::convert_list(item, raw),
            FieldKind::Dict { key, value, .. } => compound::convert_dict(key, value, raw),
            FieldKind::Model(target) => model::convert_model(target, raw),
            FieldKind::Union(candidates) => model::convert_union(candidates, raw),
            FieldKind::Any | FieldKind::Computed(_) => Ok(raw.clone()),
        }
    }

    //
    // Validation
    //

    /// Native rule for a value that already passed the required check.
    /// Nulls carry no native errors.
    pub fn validate_native(&self, value: &Value, ctx: &dyn Any, out: &mut Vec<PathError>) {
        if value.is_null() {
            return;
        }

        match &self.kind {
            FieldKind::Int(rule) | FieldKind::Float(rule) => rule.validate(value, out),
            FieldKind::Str(rule) => rule.validate(value, out),
            FieldKind::List { item, size } => compound::validate_list(item, *size, value, ctx, out),
            FieldKind::Dict { key, value: item, size } => {
                compound::validate_dict(key, item, *size, value, ctx, out);
            }
            FieldKind::Model(_) | FieldKind::Union(_) => model::validate_nested(value, ctx, out),
            FieldKind::Bool | FieldKind::Any | FieldKind::Computed(_) => {}
        }
    }

    /// Declared validator callables, in declaration order.
    pub fn run_validators(&self, value: &Value, ctx: &dyn Any, out: &mut Vec<PathError>) {
        for validator in &self.validators {
            if let Err(message) = validator(value, ctx) {
                out.push(PathError::here(message));
            }
        }
    }

    // validate_item
    // full check for a container item: required, native rule, validators
    pub(crate) fn validate_item(&self, value: &Value, ctx: &dyn Any, out: &mut Vec<PathError>) {
        if value.is_null() && !self.nullable {
            out.push(PathError::here(REQUIRED_MESSAGE));
            return;
        }

        self.validate_native(value, ctx, out);
        self.run_validators(value, ctx, out);
    }

    //
    // Output
    //

    /// Convert a stored value to its untyped output form.
    #[must_use]
    pub fn to_primitive(&self, value: &Value, role: &Role, ctx: &dyn Any) -> Value {
        if let Some(hook) = &self.serialize_hook {
            return hook(value, role, ctx);
        }
        if value.is_null() {
            return Value::Null;
        }

        match &self.kind {
            FieldKind::List { item, .. } => compound::list_to_primitive(item, value, role, ctx),
            FieldKind::Dict { value: item, .. } => {
                compound::dict_to_primitive(item, value, role, ctx)
            }
            FieldKind::Model(_) => model::model_to_primitive(value, role, ctx),
            FieldKind::Union(_) => model::union_to_primitive(value, role, ctx),
            _ => value.clone(),
        }
    }

    //
    // Copy
    //

    /// Independent copy of a stored value; atomics are returned as-is.
    #[must_use]
    pub fn copy_value(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }

        match &self.kind {
            FieldKind::List { item, .. } => compound::copy_list(item, value),
            FieldKind::Dict { value: item, .. } => compound::copy_dict(item, value),
            FieldKind::Model(_) | FieldKind::Union(_) => match value {
                Value::Model(instance) => Value::Model(Box::new(instance.copy(true))),
                other => other.deep_clone(),
            },
            FieldKind::Any => value.deep_clone(),
            _ => value.clone(),
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let type_repr = if self.nullable {
            format!("Optional[{}]", self.type_repr())
        } else {
            self.type_repr()
        };

        write!(f, "<Field {} of type {type_repr}, {:?}", self.name, self.default)?;
        if self.input_key.as_deref() != Some(self.name.as_str()) {
            write!(f, ", input key {:?}", self.input_key)?;
        }
        if self.output_key != self.input_key {
            write!(f, ", output key {:?}", self.output_key)?;
        }

        f.write_str(">")
    }
}

///
/// TESTS
///
