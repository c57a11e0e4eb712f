//! Core runtime for Archetype: untyped values, the field descriptor
//! hierarchy, the schema compiler, roles, and the instance runtime.
//!
//! A model type is declared once through [`model::Model::declare`]; the
//! first use compiles it into an immutable [`schema::ModelSchema`] that
//! drives every construct / validate / serialize / copy call afterwards.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod error;
pub mod field;
pub mod model;
pub mod resolve;
pub mod role;
pub mod schema;
pub mod value;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use error::Error;

///
/// CONSTANTS
///

/// Input/output key that selects the concrete model of a union field.
pub const DISCRIMINATOR_KEY: &str = "type";

/// Error-tree key used when a path-less error shares a level with keyed errors.
pub const GLOBAL_ERROR_KEY: &str = "_global";

/// Message reported for missing values and disallowed nulls.
pub const REQUIRED_MESSAGE: &str = "This field is required";

///
/// Prelude
///
/// Prelude contains only domain vocabulary needed to declare and use models.
///

pub mod prelude {
    pub use crate::{
        error::{ConversionError, DataError, Error, ValidationError},
        model::{Instance, Model},
        resolve::{FieldOptions, ModelRef, TypeExpr},
        role::{DEFAULT_ROLE, Role, RoleRequest},
        schema::ModelDecl,
        value::{Key, Value},
    };
}
