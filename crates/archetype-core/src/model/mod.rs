mod instance;

pub use instance::Instance;

use crate::{
    error::{ConfigurationError, Error},
    field::Field,
    resolve::ModelRef,
    role::Role,
    schema::{ModelDecl, ModelSchema, schema_of},
    value::Value,
};

///
/// Model
///
/// A record type whose schema is declared once through `declare` and
/// compiled lazily on first use. Usually implemented with
/// `#[derive(Model)]`.
///

pub trait Model: Sized + 'static {
    /// Model name used in messages and nested output.
    const NAME: &'static str;

    /// Abstract models contribute fields as mixins; a model may inherit
    /// from any number of abstract bases but at most one concrete one.
    const ABSTRACT: bool = false;

    /// Value of the `type` key selecting this model inside a union field.
    const DISCRIMINATOR: Option<&'static str> = None;

    /// Declare bases, fields, computed fields, validators and roles.
    fn declare(decl: &mut ModelDecl);

    /// Compiled schema; compiles on first call.
    fn schema() -> Result<&'static ModelSchema, ConfigurationError> {
        schema_of::<Self>()
    }

    /// Convert untyped input into an instance of this model.
    fn construct(raw: &Value) -> Result<Instance, Error> {
        Self::schema()?.construct(raw)
    }

    #[cfg(feature = "json")]
    fn construct_json(raw: serde_json::Value) -> Result<Instance, Error> {
        Self::construct(&Value::from(raw))
    }

    /// Descriptors serialized for `role`.
    fn fields_for_role(role: &Role) -> Result<Vec<&'static Field>, ConfigurationError> {
        Ok(Self::schema()?.fields_for_role(role))
    }

    /// Output keys serialized for `role`.
    fn field_names_for_role(role: &Role) -> Result<Vec<String>, ConfigurationError> {
        Ok(Self::schema()?.field_names_for_role(role))
    }

    #[must_use]
    fn model_ref() -> ModelRef {
        ModelRef::of::<Self>()
    }
}
