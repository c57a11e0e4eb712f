//! Type resolution: maps a declared type expression, optionally refined
//! by an explicit [`FieldOptions`] template, to a compiled [`Field`].

use crate::{
    error::ConfigurationError,
    field::{Bound, Field, FieldKind, NumberRule, SerializeHook, SizeRule, StrRule, Validator},
    model::Model,
    schema::ModelSchema,
    value::Value,
};
use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

///
/// ModelRef
///
/// Lazily resolvable handle to a model type. Holding one never compiles
/// the target, so self- and mutually-referential models are declared
/// directly.
///

#[derive(Clone, Copy)]
pub struct ModelRef {
    name: &'static str,
    type_id: TypeId,
    is_abstract: bool,
    discriminator: Option<&'static str>,
    schema: fn() -> Result<&'static ModelSchema, ConfigurationError>,
}

impl ModelRef {
    #[must_use]
    pub fn of<M: Model>() -> Self {
        Self {
            name: M::NAME,
            type_id: TypeId::of::<M>(),
            is_abstract: M::ABSTRACT,
            discriminator: M::DISCRIMINATOR,
            schema: M::schema,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    #[must_use]
    pub const fn discriminator(&self) -> Option<&'static str> {
        self.discriminator
    }

    /// Compile (or fetch) the target schema.
    pub fn schema(&self) -> Result<&'static ModelSchema, ConfigurationError> {
        (self.schema)()
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

///
/// TypeExpr
///
/// Declared type of a model attribute.
///

#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    Bool,
    Int,
    Float,
    Str,
    Any,
    List(Box<Self>),
    Dict(Box<Self>, Box<Self>),
    Model(ModelRef),
    Union(Vec<ModelRef>),
    Optional(Box<Self>),
}

impl TypeExpr {
    #[must_use]
    pub fn list(item: Self) -> Self {
        Self::List(Box::new(item))
    }

    #[must_use]
    pub fn dict(key: Self, value: Self) -> Self {
        Self::Dict(Box::new(key), Box::new(value))
    }

    #[must_use]
    pub fn model<M: Model>() -> Self {
        Self::Model(ModelRef::of::<M>())
    }

    #[must_use]
    pub fn union(candidates: impl IntoIterator<Item = ModelRef>) -> Self {
        Self::Union(candidates.into_iter().collect())
    }

    #[must_use]
    pub fn optional(inner: Self) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// Wrap `self` in `Optional`.
    #[must_use]
    pub fn nullable(self) -> Self {
        Self::optional(self)
    }

    // auto_label
    // descriptor the bare shape resolves to without options
    const fn auto_label(&self) -> Option<&'static str> {
        match self {
            Self::Bool => Some("BoolField"),
            Self::Int => Some("IntField"),
            Self::Float => Some("FloatField"),
            Self::Str => Some("StrField"),
            Self::Any => Some("AnyField"),
            Self::List(_) => Some("ListField"),
            Self::Dict(..) => Some("DictField"),
            Self::Model(_) => Some("ModelField"),
            Self::Union(_) => Some("UnionField"),
            Self::Optional(_) => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("str"),
            Self::Any => f.write_str("Any"),
            Self::List(item) => write!(f, "List[{item}]"),
            Self::Dict(key, value) => write!(f, "Dict[{key}, {value}]"),
            Self::Model(target) => f.write_str(target.name()),
            Self::Union(candidates) => {
                let names: Vec<&str> = candidates.iter().map(ModelRef::name).collect();
                write!(f, "Union[{}]", names.join(", "))
            }
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
        }
    }
}

///
/// OptionKind
///

#[derive(Clone, Debug, Default)]
enum OptionKind {
    #[default]
    Bool,
    Int,
    Float,
    Str,
    List(Option<Box<FieldOptions>>),
    Dict(Option<Box<FieldOptions>>, Option<Box<FieldOptions>>),
    Model,
    Union,
    Any,
}

impl OptionKind {
    const fn label(&self) -> &'static str {
        match self {
            Self::Bool => "BoolField",
            Self::Int => "IntField",
            Self::Float => "FloatField",
            Self::Str => "StrField",
            Self::List(_) => "ListField",
            Self::Dict(..) => "DictField",
            Self::Model => "ModelField",
            Self::Union => "UnionField",
            Self::Any => "AnyField",
        }
    }
}

///
/// FieldOptions
///
/// Explicit descriptor template refining what a type resolves to: value
/// bounds, string rules, container sizes, item templates, validators and
/// an output hook. The template kind must match the declared type.
///

#[derive(Clone, Default)]
pub struct FieldOptions {
    kind: OptionKind,
    min_value: Option<Bound>,
    max_value: Option<Bound>,
    min_length: usize,
    max_length: Option<usize>,
    choices: Option<Vec<String>>,
    pattern: Option<(String, bool)>,
    min_items: usize,
    max_items: Option<usize>,
    validators: Vec<Validator>,
    serialize_hook: Option<SerializeHook>,
    misuse: Vec<String>,
}

impl FieldOptions {
    fn of(kind: OptionKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn bool() -> Self {
        Self::of(OptionKind::Bool)
    }

    #[must_use]
    pub fn int() -> Self {
        Self::of(OptionKind::Int)
    }

    #[must_use]
    pub fn float() -> Self {
        Self::of(OptionKind::Float)
    }

    #[must_use]
    pub fn str() -> Self {
        Self::of(OptionKind::Str)
    }

    /// List template; item options come from the declared type.
    #[must_use]
    pub fn list() -> Self {
        Self::of(OptionKind::List(None))
    }

    /// List template with an explicit item template.
    #[must_use]
    pub fn list_of(item: Self) -> Self {
        Self::of(OptionKind::List(Some(Box::new(item))))
    }

    #[must_use]
    pub fn dict() -> Self {
        Self::of(OptionKind::Dict(None, None))
    }

    /// Dict template with explicit key and/or value templates.
    #[must_use]
    pub fn dict_of(key: Option<Self>, value: Option<Self>) -> Self {
        Self::of(OptionKind::Dict(key.map(Box::new), value.map(Box::new)))
    }

    #[must_use]
    pub fn model() -> Self {
        Self::of(OptionKind::Model)
    }

    #[must_use]
    pub fn union() -> Self {
        Self::of(OptionKind::Union)
    }

    #[must_use]
    pub fn any() -> Self {
        Self::of(OptionKind::Any)
    }

    //
    // numeric
    //

    /// Inclusive lower bound. Integer bounds compare exactly against
    /// integer values.
    #[must_use]
    pub fn min_value(mut self, min: impl Into<Bound>) -> Self {
        self.require_number("min_value");
        self.min_value = Some(min.into());
        self
    }

    #[must_use]
    pub fn max_value(mut self, max: impl Into<Bound>) -> Self {
        self.require_number("max_value");
        self.max_value = Some(max.into());
        self
    }

    //
    // string
    //

    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.require_str("min_length");
        self.min_length = min;
        self
    }

    #[must_use]
    pub fn max_length(mut self, max: usize) -> Self {
        self.require_str("max_length");
        self.max_length = Some(max);
        self
    }

    #[must_use]
    pub fn choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require_str("choices");
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.require_str("pattern");
        self.pattern = Some((pattern.into(), false));
        self
    }

    #[must_use]
    pub fn pattern_ci(mut self, pattern: impl Into<String>) -> Self {
        self.require_str("pattern");
        self.pattern = Some((pattern.into(), true));
        self
    }

    //
    // containers
    //

    #[must_use]
    pub fn min_items(mut self, min: usize) -> Self {
        self.require_container("min_items");
        self.min_items = min;
        self
    }

    #[must_use]
    pub fn max_items(mut self, max: usize) -> Self {
        self.require_container("max_items");
        self.max_items = Some(max);
        self
    }

    //
    // any kind
    //

    /// Append a validator callable; validators run in declaration order.
    #[must_use]
    pub fn validate_with<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value, &dyn Any) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Replace the default output conversion.
    #[must_use]
    pub fn serialize_with<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Value, &crate::role::Role, &dyn Any) -> Value + Send + Sync + 'static,
    {
        self.serialize_hook = Some(Arc::new(hook));
        self
    }

    fn require_number(&mut self, option: &str) {
        if !matches!(self.kind, OptionKind::Int | OptionKind::Float) {
            self.misuse(option);
        }
    }

    fn require_str(&mut self, option: &str) {
        if !matches!(self.kind, OptionKind::Str) {
            self.misuse(option);
        }
    }

    fn require_container(&mut self, option: &str) {
        if !matches!(self.kind, OptionKind::List(_) | OptionKind::Dict(..)) {
            self.misuse(option);
        }
    }

    fn misuse(&mut self, option: &str) {
        self.misuse
            .push(format!("{} does not support `{option}`", self.kind.label()));
    }
}

impl fmt::Debug for FieldOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldOptions")
            .field("kind", &self.kind)
            .field("validators", &self.validators.len())
            .field("serialize_hook", &self.serialize_hook.is_some())
            .finish_non_exhaustive()
    }
}

//
// ============================================================================
// Resolution
// ============================================================================
//

/// Resolve a declared type, optionally refined by an explicit template,
/// into a named descriptor. Keys and defaults are left for the compiler.
pub fn resolve(
    name: &str,
    ty: &TypeExpr,
    explicit: Option<&FieldOptions>,
) -> Result<Field, ConfigurationError> {
    let (shape, nullable) = match ty {
        TypeExpr::Optional(inner) if matches!(**inner, TypeExpr::Optional(_)) => {
            return Err(ConfigurationError::new(format!(
                "Unrecognized field type {ty}, Optional may only wrap a type once"
            )));
        }
        TypeExpr::Optional(inner) => (&**inner, true),
        other => (other, false),
    };

    if let Some(options) = explicit {
        if let Some(misuse) = options.misuse.first() {
            return Err(ConfigurationError::new(misuse.clone()));
        }
        check_kind(shape, options)?;
    }

    let kind = resolve_kind(shape, explicit)?;
    let mut field = Field::new(name, kind);
    field.nullable = nullable;
    if let Some(options) = explicit {
        field.validators.clone_from(&options.validators);
        field.serialize_hook.clone_from(&options.serialize_hook);
    }

    Ok(field)
}

fn check_kind(shape: &TypeExpr, options: &FieldOptions) -> Result<(), ConfigurationError> {
    let compatible = matches!(
        (shape, &options.kind),
        (TypeExpr::Bool, OptionKind::Bool)
            | (TypeExpr::Int, OptionKind::Int)
            | (TypeExpr::Float, OptionKind::Float)
            | (TypeExpr::Str, OptionKind::Str)
            | (TypeExpr::Any, OptionKind::Any)
            | (TypeExpr::List(_), OptionKind::List(_))
            | (TypeExpr::Dict(..), OptionKind::Dict(..))
            | (TypeExpr::Model(_), OptionKind::Model)
            | (TypeExpr::Union(_), OptionKind::Union)
    );
    if compatible {
        return Ok(());
    }

    let hint = shape
        .auto_label()
        .map(|label| format!(", should use {label}"))
        .unwrap_or_default();

    Err(ConfigurationError::new(format!(
        "{} cannot be used for type {shape}{hint}",
        options.kind.label()
    )))
}

fn resolve_kind(
    shape: &TypeExpr,
    explicit: Option<&FieldOptions>,
) -> Result<FieldKind, ConfigurationError> {
    let number_rule = || NumberRule {
        min: explicit.and_then(|o| o.min_value),
        max: explicit.and_then(|o| o.max_value),
    };
    let size_rule = || SizeRule {
        min: explicit.map_or(0, |o| o.min_items),
        max: explicit.and_then(|o| o.max_items),
    };

    let kind = match shape {
        TypeExpr::Bool => FieldKind::Bool,
        TypeExpr::Int => FieldKind::Int(number_rule()),
        TypeExpr::Float => FieldKind::Float(number_rule()),
        TypeExpr::Str => FieldKind::Str(match explicit {
            Some(o) => StrRule::build(o.min_length, o.max_length, o.choices.clone(), o.pattern.clone())?,
            None => StrRule::None,
        }),
        TypeExpr::Any => FieldKind::Any,
        TypeExpr::List(item) => {
            let item_options = explicit.and_then(|o| match &o.kind {
                OptionKind::List(item) => item.as_deref(),
                _ => None,
            });
            let item = resolve("", item, item_options).map_err(|e| e.context("List item"))?;

            FieldKind::List {
                item: Box::new(item),
                size: size_rule(),
            }
        }
        TypeExpr::Dict(key, value) => {
            let (key_options, value_options) = explicit
                .and_then(|o| match &o.kind {
                    OptionKind::Dict(k, v) => Some((k.as_deref(), v.as_deref())),
                    _ => None,
                })
                .unwrap_or((None, None));

            let key = match &**key {
                TypeExpr::Bool | TypeExpr::Int | TypeExpr::Str => {
                    resolve("", key, key_options).map_err(|e| e.context("Dict key"))?
                }
                other => {
                    return Err(ConfigurationError::new(format!(
                        "Dict keys may only be booleans, integers or strings, got {other}"
                    )));
                }
            };
            let value = resolve("", value, value_options).map_err(|e| e.context("Dict value"))?;

            FieldKind::Dict {
                key: Box::new(key),
                value: Box::new(value),
                size: size_rule(),
            }
        }
        TypeExpr::Model(target) => FieldKind::Model(*target),
        TypeExpr::Union(candidates) => {
            check_union(candidates, shape)?;
            FieldKind::Union(candidates.clone())
        }
        TypeExpr::Optional(_) => {
            return Err(ConfigurationError::new(format!(
                "Unrecognized field type {shape} (may need explicit FieldOptions)"
            )));
        }
    };

    Ok(kind)
}

fn check_union(candidates: &[ModelRef], shape: &TypeExpr) -> Result<(), ConfigurationError> {
    if candidates.is_empty() {
        return Err(ConfigurationError::new("Union fields need at least one model"));
    }

    let mut seen: Vec<(&str, &str)> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(tag) = candidate.discriminator() else {
            return Err(ConfigurationError::new(format!(
                "Model {} used in a union field {shape} but does not define a discriminator",
                candidate.name()
            )));
        };
        if let Some((_, other)) = seen.iter().find(|(seen_tag, _)| *seen_tag == tag) {
            return Err(ConfigurationError::new(format!(
                "Conflicting union field types in {shape}: {other} vs {}",
                candidate.name()
            )));
        }
        seen.push((tag, candidate.name()));
    }

    Ok(())
}

///
/// TESTS
///
