//! Schema compilation: a model declaration is compiled once into an
//! immutable [`ModelSchema`] holding the input, validation and per-role
//! output tables the runtime dispatches on.

mod compile;
mod decl;
mod registry;
mod roles;

pub use decl::{ComputedDecl, FieldDecl, KeySetting, ModelDecl};

pub(crate) use registry::schema_of;

use crate::{
    error::{ConversionError, Error},
    field::Field,
    model::Instance,
    role::{Role, RoleFields},
    value::{Key, Value},
};
use std::{any::TypeId, fmt, sync::Arc};

///
/// InputEntry
/// One input-table row: where to read a slot's raw value from.
///

#[derive(Clone, Debug)]
pub(crate) struct InputEntry {
    pub slot: usize,
    pub key: Option<Key>,
}

///
/// ValidationEntry
///

#[derive(Clone, Debug)]
pub(crate) struct ValidationEntry {
    pub slot: usize,
    pub error_key: String,
}

///
/// OutputEntry
/// One output-table row; `field` indexes `ModelSchema::fields`.
///

#[derive(Clone, Debug)]
pub(crate) struct OutputEntry {
    pub field: usize,
    pub key: Key,
}

///
/// ModelSchema
///
/// Compiled, immutable description of one model type.
///
/// fields      → input fields first (their index is the instance slot),
///               computed fields after
/// outputs     → indexed by role code; `None` means the role was never
///               addressed by this model or its bases
///

pub struct ModelSchema {
    pub(crate) name: &'static str,
    pub(crate) type_id: TypeId,
    pub(crate) is_abstract: bool,
    pub(crate) discriminator: Option<&'static str>,
    pub(crate) ancestors: Vec<TypeId>,
    pub(crate) fields: Vec<Field>,
    pub(crate) input_count: usize,
    pub(crate) inputs: Vec<InputEntry>,
    pub(crate) validations: Vec<ValidationEntry>,
    pub(crate) outputs: Vec<Option<Vec<OutputEntry>>>,
    pub(crate) roles: Vec<RoleFields>,
}

impl ModelSchema {
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

    /// True when this model is `type_id` or inherits from it.
    #[must_use]
    pub fn is_a(&self, type_id: TypeId) -> bool {
        self.ancestors.contains(&type_id)
    }

    /// Every descriptor: input fields in declaration order, then computed.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn input_fields(&self) -> &[Field] {
        &self.fields[..self.input_count]
    }

    #[must_use]
    pub fn computed_fields(&self) -> &[Field] {
        &self.fields[self.input_count..]
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn slot_of(&self, name: &str) -> Option<usize> {
        self.input_fields().iter().position(|f| f.name == name)
    }

    /// Resolved role sets, ordered by role code.
    #[must_use]
    pub fn roles(&self) -> &[RoleFields] {
        &self.roles
    }

    //
    // Role lookup
    //

    pub(crate) fn output_table(&self, role: &Role) -> &[OutputEntry] {
        match self.outputs.get(role.code()) {
            Some(Some(table)) => table.as_slice(),
            _ if role.is_empty_by_default() => &[],
            _ => self.outputs.first().and_then(Option::as_deref).unwrap_or(&[]),
        }
    }

    /// Descriptors serialized for `role`, in output order.
    #[must_use]
    pub fn fields_for_role(&self, role: &Role) -> Vec<&Field> {
        self.output_table(role)
            .iter()
            .map(|entry| &self.fields[entry.field])
            .collect()
    }

    /// Output keys serialized for `role`, in output order.
    #[must_use]
    pub fn field_names_for_role(&self, role: &Role) -> Vec<String> {
        self.output_table(role)
            .iter()
            .map(|entry| entry.key.to_string())
            .collect()
    }

    //
    // Construction
    //

    /// Convert untyped input into an instance. A null input counts as an
    /// empty mapping. The first failing field aborts the conversion.
    pub fn construct(&'static self, raw: &Value) -> Result<Instance, Error> {
        let entries = match raw {
            Value::Map(entries) => Some(entries),
            Value::Null => None,
            other => {
                return Err(ConversionError::here(format!(
                    "Supplied type {}, needs a mapping",
                    other.kind_name()
                ))
                .into());
            }
        };

        let mut slots = Vec::with_capacity(self.inputs.len());
        for entry in &self.inputs {
            let field = &self.fields[entry.slot];
            let raw = match (&entry.key, entries) {
                (Some(key), Some(entries)) => entries.get(key),
                _ => None,
            };

            let converted = field.convert(raw).map_err(|err| match &entry.key {
                Some(key) => err.prefixed(&key.to_string()),
                None => err.prefixed(&field.name),
            })?;
            slots.push(converted.map(Arc::new));
        }

        Ok(Instance::new(self, slots))
    }
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}
