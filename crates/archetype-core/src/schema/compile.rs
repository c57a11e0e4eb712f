use super::{
    InputEntry, ModelSchema, OutputEntry, ValidationEntry,
    decl::{ComputedDecl, FieldDecl, KeySetting, ModelDecl},
    roles::resolve_roles,
};
use crate::{
    error::ConfigurationError,
    field::{Field, FieldDefault, FieldKind},
    model::Model,
    resolve::resolve,
    value::{Key, Value},
};
use std::{any::TypeId, collections::BTreeSet};

///
/// ModelMeta
/// Static identity of the model being compiled.
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct ModelMeta {
    pub name: &'static str,
    pub type_id: TypeId,
    pub is_abstract: bool,
    pub discriminator: Option<&'static str>,
}

impl ModelMeta {
    pub(crate) fn of<M: Model>() -> Self {
        Self {
            name: M::NAME,
            type_id: TypeId::of::<M>(),
            is_abstract: M::ABSTRACT,
            discriminator: M::DISCRIMINATOR,
        }
    }
}

///
/// compile
///
/// Turn one declaration into a schema:
/// bases → own fields → validators → input / validation tables → roles
/// → per-role output tables.
///

pub(crate) fn compile(meta: ModelMeta, decl: ModelDecl) -> Result<ModelSchema, ConfigurationError> {
    let model = meta.name;
    let bases = compile_bases(model, &decl)?;
    let own = own_names(model, &decl)?;

    // inherited fields first; the first-listed base wins a name clash
    let mut merged: Vec<Field> = Vec::new();
    for base in bases.iter().rev() {
        for field in base.fields() {
            upsert(&mut merged, field.clone());
        }
    }

    for field_decl in &decl.fields {
        let field = compile_field(field_decl)
            .map_err(|err| err.context(format!("{model}: Field {}", field_decl.name)))?;
        upsert(&mut merged, field);
    }
    for computed in &decl.computed {
        upsert(&mut merged, compile_computed(computed));
    }

    attach_validators(model, &decl, &mut merged)?;

    // input fields take the leading slots
    let (mut fields, computed): (Vec<Field>, Vec<Field>) =
        merged.into_iter().partition(|field| !field.is_computed());
    let input_count = fields.len();
    fields.extend(computed);

    let inputs = fields[..input_count]
        .iter()
        .enumerate()
        .map(|(slot, field)| InputEntry {
            slot,
            key: field.input_key.clone().map(Key::Text),
        })
        .collect();
    let validations = fields[..input_count]
        .iter()
        .enumerate()
        .filter(|(_, field)| field.needs_validation())
        .map(|(slot, field)| ValidationEntry {
            slot,
            error_key: field.error_key().to_string(),
        })
        .collect();

    // roles
    let all: BTreeSet<String> = fields.iter().map(|f| f.name.clone()).collect();
    let roles = resolve_roles(model, &bases, &decl.roles, &all, &own)?;

    let max_code = roles.iter().map(|r| r.role.code()).max().unwrap_or(0);
    let mut outputs: Vec<Option<Vec<OutputEntry>>> = vec![None; max_code + 1];
    outputs[0] = Some(output_table(&fields, None));
    for finalized in &roles {
        outputs[finalized.role.code()] = Some(output_table(&fields, Some(&finalized.fields)));
    }

    let mut ancestors = vec![meta.type_id];
    for base in &bases {
        ancestors.extend(base.ancestors.iter().copied());
    }

    Ok(ModelSchema {
        name: model,
        type_id: meta.type_id,
        is_abstract: meta.is_abstract,
        discriminator: meta.discriminator,
        ancestors,
        fields,
        input_count,
        inputs,
        validations,
        outputs,
        roles,
    })
}

//
// ============================================================================
// Steps
// ============================================================================
//

fn compile_bases(
    model: &str,
    decl: &ModelDecl,
) -> Result<Vec<&'static ModelSchema>, ConfigurationError> {
    let concrete: Vec<&str> = decl
        .bases
        .iter()
        .filter(|base| !base.is_abstract())
        .map(|base| base.name())
        .collect();
    if concrete.len() > 1 {
        return Err(ConfigurationError::new(format!(
            "{model}: inherits from multiple concrete models ({}); all but one must be abstract",
            concrete.join(", ")
        )));
    }

    decl.bases
        .iter()
        .map(|base| base.schema().map_err(|err| err.context(model)))
        .collect()
}

// own_names
// names declared by this model itself, rejecting duplicates and private names
fn own_names(model: &str, decl: &ModelDecl) -> Result<BTreeSet<String>, ConfigurationError> {
    let names = decl
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(decl.computed.iter().map(|c| c.name.as_str()));

    let mut own = BTreeSet::new();
    for name in names {
        if name.is_empty() || name.starts_with('_') {
            return Err(ConfigurationError::new(format!(
                "{model}: Field name `{name}` is not allowed; names must be non-empty and not start with `_`"
            )));
        }
        if !own.insert(name.to_string()) {
            return Err(ConfigurationError::new(format!(
                "{model}: Field `{name}` declared more than once"
            )));
        }
    }

    Ok(own)
}

fn compile_field(decl: &FieldDecl) -> Result<Field, ConfigurationError> {
    let mut field = resolve(&decl.name, &decl.ty, decl.options.as_ref())?;

    field.input_key = match &decl.input_key {
        KeySetting::Unset => Some(decl.name.clone()),
        KeySetting::Named(key) => Some(key.clone()),
        KeySetting::Disabled => None,
    };
    // an unset output key follows the input key, including when disabled
    field.output_key = match &decl.output_key {
        KeySetting::Named(key) => Some(key.clone()),
        KeySetting::Disabled => None,
        KeySetting::Unset => field.input_key.clone(),
    };
    field.default = decl.default.clone();
    field.hide_null = decl.hide_null;
    field.hide_empty = decl.hide_empty;
    field.validators.extend(decl.validators.iter().cloned());

    if field.hide_empty && !field.kind.supports_hide_empty() {
        return Err(ConfigurationError::new(format!(
            "{} does not support hide_empty",
            field.kind.label()
        )));
    }
    check_default(&field)?;

    Ok(field)
}

fn compile_computed(decl: &ComputedDecl) -> Field {
    let mut field = Field::computed(decl.name.clone(), decl.compute.clone());
    field.output_key = match &decl.output_key {
        KeySetting::Unset => Some(decl.name.clone()),
        KeySetting::Named(key) => Some(key.clone()),
        KeySetting::Disabled => None,
    };
    field.hide_null = decl.hide_null;

    field
}

fn check_default(field: &Field) -> Result<(), ConfigurationError> {
    let FieldDefault::Value(value) = &field.default else {
        return Ok(());
    };

    let matches_kind = match (&field.kind, value) {
        (_, Value::Null) => {
            return if field.nullable {
                Ok(())
            } else {
                Err(ConfigurationError::new(format!(
                    "Field `{}` is not optional and cannot default to null",
                    field.name
                )))
            };
        }
        (FieldKind::Model(_) | FieldKind::Union(_), _) => {
            return Err(ConfigurationError::new(format!(
                "Field `{}` of type {} may only default to null or use a default factory",
                field.name,
                field.type_repr()
            )));
        }
        (FieldKind::Bool, Value::Bool(_))
        | (FieldKind::Int(_), Value::Int(_))
        | (FieldKind::Float(_), Value::Float(_))
        | (FieldKind::Str(_), Value::Text(_))
        | (FieldKind::List { .. }, Value::List(_))
        | (FieldKind::Dict { .. }, Value::Map(_))
        | (FieldKind::Any, _) => true,
        _ => false,
    };

    if matches_kind {
        Ok(())
    } else {
        let shown = match value {
            Value::Text(text) => text.clone(),
            other => other.repr(),
        };

        Err(ConfigurationError::new(format!(
            "Value `{shown}` used as field default must be of type {}",
            field.type_repr()
        )))
    }
}

// attach_validators
// model-level validators may target own or inherited input fields
fn attach_validators(
    model: &str,
    decl: &ModelDecl,
    merged: &mut [Field],
) -> Result<(), ConfigurationError> {
    let mut seen = BTreeSet::new();

    for (name, validator) in &decl.validators {
        if !seen.insert(name.as_str()) {
            return Err(ConfigurationError::new(format!(
                "{model}: Validator for field `{name}` declared more than once"
            )));
        }

        let Some(field) = merged
            .iter_mut()
            .find(|field| field.name == *name && !field.is_computed())
        else {
            return Err(ConfigurationError::new(format!(
                "{model}: Validator declared for unknown field `{name}`"
            )));
        };
        field.model_validator = Some(validator.clone());
    }

    Ok(())
}

fn output_table(fields: &[Field], allowed: Option<&BTreeSet<String>>) -> Vec<OutputEntry> {
    fields
        .iter()
        .enumerate()
        .filter(|(_, field)| allowed.is_none_or(|names| names.contains(&field.name)))
        .filter_map(|(index, field)| {
            field.output_key.as_ref().map(|key| OutputEntry {
                field: index,
                key: Key::Text(key.clone()),
            })
        })
        .collect()
}

// upsert
// an override replaces the inherited descriptor but keeps its position
// and, unless it brings its own, its model-level validator
fn upsert(fields: &mut Vec<Field>, mut field: Field) {
    match fields.iter_mut().find(|existing| existing.name == field.name) {
        Some(existing) => {
            if field.model_validator.is_none() && !field.is_computed() {
                field.model_validator = existing.model_validator.take();
            }
            *existing = field;
        }
        None => fields.push(field),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        resolve::{FieldOptions, TypeExpr},
        role::Role,
        test_fixtures::{Account, Cat, Dog, Leaf, Staff, Timestamped},
    };

    struct Probe;

    fn meta() -> ModelMeta {
        ModelMeta {
            name: "Probe",
            type_id: TypeId::of::<Probe>(),
            is_abstract: false,
            discriminator: None,
        }
    }

    fn compile_with(declare: impl FnOnce(&mut ModelDecl)) -> Result<ModelSchema, ConfigurationError> {
        let mut decl = ModelDecl::new();
        declare(&mut decl);

        compile(meta(), decl)
    }

    fn message(declare: impl FnOnce(&mut ModelDecl)) -> String {
        compile_with(declare).unwrap_err().message
    }

    #[test]
    fn inherited_fields_come_first_and_keep_position() {
        let schema = compile_with(|decl| {
            decl.base::<Account>();
            decl.field("extra", TypeExpr::Bool).default(false);
            decl.field("login", TypeExpr::Str).default("guest");
        })
        .unwrap();

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["created", "login", "password", "extra"]);
        assert!(schema.field("login").unwrap().model_validator.is_some());
        assert!(!schema.field("login").unwrap().is_required());
    }

    #[test]
    fn computed_fields_follow_input_fields() {
        let schema = compile_with(|decl| {
            decl.computed("double", |_| Value::Null);
            decl.field("n", TypeExpr::Int);
        })
        .unwrap();

        assert_eq!(schema.input_fields().len(), 1);
        assert_eq!(schema.computed_fields()[0].name, "double");
        assert_eq!(schema.inputs.len(), 1);
    }

    #[test]
    fn keys_follow_settings() {
        let schema = compile_with(|decl| {
            decl.field("a", TypeExpr::Int).input_key("A");
            decl.field("b", TypeExpr::Int).no_input().default(1);
            decl.field("c", TypeExpr::Int).no_input().output_key("C").default(1);
            decl.field("d", TypeExpr::Int).no_output();
        })
        .unwrap();

        assert_eq!(schema.field_names_for_role(&crate::role::DEFAULT_ROLE), ["A", "C"]);
        assert_eq!(schema.inputs[1].key, None);
        assert_eq!(schema.field("c").unwrap().error_key(), "C");
    }

    #[test]
    fn validation_table_skips_unconstrained_optionals() {
        let schema = compile_with(|decl| {
            decl.field("free", TypeExpr::Int.nullable()).default(Value::Null);
            decl.field("bounded", TypeExpr::Int.nullable())
                .default(Value::Null)
                .options(FieldOptions::int().min_value(1));
            decl.field("needed", TypeExpr::Str);
        })
        .unwrap();

        let keys: Vec<&str> = schema.validations.iter().map(|v| v.error_key.as_str()).collect();
        assert_eq!(keys, ["bounded", "needed"]);
    }

    #[test]
    fn ancestors_include_every_base() {
        let schema = Staff::schema().unwrap();

        assert!(schema.is_a(TypeId::of::<Staff>()));
        assert!(schema.is_a(TypeId::of::<Account>()));
        assert!(schema.is_a(TypeId::of::<Timestamped>()));
        assert!(!schema.is_a(TypeId::of::<Leaf>()));
    }

    #[test]
    fn multiple_concrete_bases_are_rejected() {
        let msg = message(|decl| {
            decl.base::<Cat>().base::<Dog>();
        });

        assert_eq!(
            msg,
            "Probe: inherits from multiple concrete models (Cat, Dog); all but one must be abstract"
        );
    }

    #[test]
    fn abstract_mixins_combine_with_one_concrete_base() {
        let schema = compile_with(|decl| {
            decl.base::<Timestamped>().base::<Leaf>();
        })
        .unwrap();

        assert_eq!(schema.fields().len(), 3);
    }

    #[test]
    fn bad_names_are_rejected() {
        assert!(message(|decl| {
            decl.field("_hidden", TypeExpr::Int);
        })
        .contains("`_hidden` is not allowed"));

        assert_eq!(
            message(|decl| {
                decl.field("x", TypeExpr::Int);
                decl.computed("x", |_| Value::Null);
            }),
            "Probe: Field `x` declared more than once"
        );
    }

    #[test]
    fn defaults_are_checked_against_the_type() {
        assert_eq!(
            message(|decl| {
                decl.field("n", TypeExpr::Int).default(Value::Null);
            }),
            "Probe: Field n: Field `n` is not optional and cannot default to null"
        );
        assert_eq!(
            message(|decl| {
                decl.field("n", TypeExpr::Int).default("three");
            }),
            "Probe: Field n: Value `three` used as field default must be of type int"
        );
        assert_eq!(
            message(|decl| {
                decl.field("leaf", TypeExpr::model::<Leaf>())
                    .default(Value::empty_map());
            }),
            "Probe: Field leaf: Field `leaf` of type Leaf may only default to null or use a default factory"
        );
    }

    #[test]
    fn hide_empty_needs_an_empty_sentinel() {
        let msg = message(|decl| {
            decl.field(
                "pet",
                TypeExpr::union([Cat::model_ref(), Dog::model_ref()]),
            )
            .hide_empty();
        });

        assert_eq!(msg, "Probe: Field pet: UnionField does not support hide_empty");
    }

    #[test]
    fn validators_must_target_known_fields_once() {
        assert_eq!(
            message(|decl| {
                decl.validator("ghost", |_, _, _| Ok(()));
            }),
            "Probe: Validator declared for unknown field `ghost`"
        );
        assert_eq!(
            message(|decl| {
                decl.field("n", TypeExpr::Int);
                decl.validator("n", |_, _, _| Ok(())).validator("n", |_, _, _| Ok(()));
            }),
            "Probe: Validator for field `n` declared more than once"
        );
    }

    #[test]
    fn role_errors_name_the_model() {
        let role = Role::new("compile-test", false);

        assert_eq!(
            message(|decl| {
                decl.field("n", TypeExpr::Int);
                decl.role(role.whitelist(["n"])).role(role.blacklist(["n"]));
            }),
            "Role compile-test configured for Probe multiple times"
        );
        assert_eq!(
            message(|decl| {
                decl.field("n", TypeExpr::Int);
                decl.role(role.blacklist(["m"]));
            }),
            "Role compile-test whitelist/blacklist names `m`, which is not a field of Probe"
        );
    }

    #[test]
    fn override_parents_resets_inherited_role() {
        let role = Role::new("compile-override", false);
        let inherited = compile_with(|decl| {
            decl.base::<Account>();
            decl.field("extra", TypeExpr::Int);
            decl.role(role.whitelist(["extra"]));
        })
        .unwrap();
        let reset = compile_with(|decl| {
            decl.base::<Account>();
            decl.field("extra", TypeExpr::Int);
            decl.role(role.whitelist(["extra"]).override_parents());
        })
        .unwrap();

        assert_eq!(inherited.field_names_for_role(&role).len(), 4);
        assert_eq!(reset.field_names_for_role(&role), ["extra"]);
    }
}
