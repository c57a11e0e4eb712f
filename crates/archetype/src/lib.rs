//! ## Crate layout
//! - `core`: values, field descriptors, schema compiler, roles and the
//!   instance runtime.
//! - `derive`: the `Model` derive macro.
//!
//! Declare a model by deriving `Model` on a marker type and writing its
//! declaration function:
//!
//! ```ignore
//! use archetype::prelude::*;
//!
//! #[derive(Model)]
//! struct Book;
//!
//! impl Book {
//!     fn declare_model(decl: &mut ModelDecl) {
//!         decl.field("title", TypeExpr::Str);
//!         decl.field("pages", TypeExpr::Int).default(0);
//!     }
//! }
//!
//! let book = Book::construct(&Value::map([("title", "Dune")]))?;
//! book.validate()?;
//! ```

pub use archetype_core as core;
pub use archetype_derive as derive;

// generated impls name `::archetype`, including inside this crate's tests
extern crate self as archetype;

/// Re-exports used by callers that only depend on the facade.
pub mod __reexports {
    #[cfg(feature = "json")]
    pub use serde_json;
}

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::{
    DISCRIMINATOR_KEY, Error, GLOBAL_ERROR_KEY, REQUIRED_MESSAGE,
    error::{ConfigurationError, ConversionError, DataError, ErrorTree, ValidationError},
};

///
/// Prelude
///

pub mod prelude {
    pub use crate::{core::prelude::*, derive::Model};
}
