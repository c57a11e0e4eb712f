use crate::{
    field::{ComputeFn, DefaultFactory, FieldDefault, ModelValidator, Validator},
    model::{Instance, Model},
    resolve::{FieldOptions, ModelRef, TypeExpr},
    role::RoleRequest,
    value::Value,
};
use std::{any::Any, sync::Arc};

///
/// KeySetting
///
/// Input or output key choice for one field.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum KeySetting {
    /// Falls back to the field name (or, for output, the input key).
    #[default]
    Unset,
    Named(String),
    Disabled,
}

///
/// ModelDecl
///
/// Static declaration of one model type, filled in by `Model::declare`
/// and consumed once by the schema compiler.
///

#[derive(Default)]
pub struct ModelDecl {
    pub(crate) bases: Vec<ModelRef>,
    pub(crate) fields: Vec<FieldDecl>,
    pub(crate) computed: Vec<ComputedDecl>,
    pub(crate) validators: Vec<(String, ModelValidator)>,
    pub(crate) roles: Vec<RoleRequest>,
}

impl ModelDecl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inherit from `M`. Bases are ordered; at most one may be concrete.
    pub fn base<M: Model>(&mut self) -> &mut Self {
        self.bases.push(ModelRef::of::<M>());
        self
    }

    /// Declare an input field.
    pub fn field(&mut self, name: impl Into<String>, ty: TypeExpr) -> &mut FieldDecl {
        self.fields.push(FieldDecl::new(name.into(), ty));
        let last = self.fields.len() - 1;

        &mut self.fields[last]
    }

    /// Declare an output-only field derived from the instance.
    pub fn computed<F>(&mut self, name: impl Into<String>, compute: F) -> &mut ComputedDecl
    where
        F: Fn(&Instance) -> Value + Send + Sync + 'static,
    {
        self.computed.push(ComputedDecl {
            name: name.into(),
            compute: Arc::new(compute),
            output_key: KeySetting::Unset,
            hide_null: false,
        });
        let last = self.computed.len() - 1;

        &mut self.computed[last]
    }

    /// Attach a model-level validator to a field (own or inherited).
    /// It runs after the field's native rule and before its declared
    /// validator callables.
    pub fn validator<F>(&mut self, field: impl Into<String>, validator: F) -> &mut Self
    where
        F: Fn(&Instance, &Value, &dyn Any) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push((field.into(), Arc::new(validator)));
        self
    }

    /// Declare this model's delta for a role.
    pub fn role(&mut self, request: RoleRequest) -> &mut Self {
        self.roles.push(request);
        self
    }
}

///
/// FieldDecl
///

pub struct FieldDecl {
    pub(crate) name: String,
    pub(crate) ty: TypeExpr,
    pub(crate) options: Option<FieldOptions>,
    pub(crate) default: FieldDefault,
    pub(crate) input_key: KeySetting,
    pub(crate) output_key: KeySetting,
    pub(crate) hide_null: bool,
    pub(crate) hide_empty: bool,
    pub(crate) validators: Vec<Validator>,
}

impl FieldDecl {
    fn new(name: String, ty: TypeExpr) -> Self {
        Self {
            name,
            ty,
            options: None,
            default: FieldDefault::Required,
            input_key: KeySetting::Unset,
            output_key: KeySetting::Unset,
            hide_null: false,
            hide_empty: false,
            validators: Vec::new(),
        }
    }

    /// Literal default used when the input key is absent.
    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    /// Factory called for every construction that lacks the input key.
    pub fn default_with<F>(&mut self, factory: F) -> &mut Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        let factory: DefaultFactory = Arc::new(factory);
        self.default = FieldDefault::Factory(factory);
        self
    }

    /// Read from (and, unless overridden, write to) `key`.
    pub fn input_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.input_key = KeySetting::Named(key.into());
        self
    }

    pub fn output_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.output_key = KeySetting::Named(key.into());
        self
    }

    /// Never populate from input. Also disables output unless an output
    /// key is set.
    pub fn no_input(&mut self) -> &mut Self {
        self.input_key = KeySetting::Disabled;
        self
    }

    pub fn no_output(&mut self) -> &mut Self {
        self.output_key = KeySetting::Disabled;
        self
    }

    pub const fn hide_null(&mut self) -> &mut Self {
        self.hide_null = true;
        self
    }

    pub const fn hide_empty(&mut self) -> &mut Self {
        self.hide_empty = true;
        self
    }

    /// Append a validator callable.
    pub fn validate_with<F>(&mut self, validator: F) -> &mut Self
    where
        F: Fn(&Value, &dyn Any) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Explicit descriptor template.
    pub fn options(&mut self, options: FieldOptions) -> &mut Self {
        self.options = Some(options);
        self
    }
}

///
/// ComputedDecl
///

pub struct ComputedDecl {
    pub(crate) name: String,
    pub(crate) compute: ComputeFn,
    pub(crate) output_key: KeySetting,
    pub(crate) hide_null: bool,
}

impl ComputedDecl {
    pub fn output_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.output_key = KeySetting::Named(key.into());
        self
    }

    pub fn no_output(&mut self) -> &mut Self {
        self.output_key = KeySetting::Disabled;
        self
    }

    pub const fn hide_null(&mut self) -> &mut Self {
        self.hide_null = true;
        self
    }
}
