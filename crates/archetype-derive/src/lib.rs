//! Derive macro for `archetype::Model`.

use proc_macro::TokenStream;

mod model;

/// Implement `Model` for a marker type.
///
/// ```ignore
/// #[derive(Model)]
/// #[model(discriminator = "cat", declare = declare_cat)]
/// struct Cat;
/// ```
///
/// Keys inside `#[model(..)]`:
/// - `name = ".."` model name, defaults to the type name
/// - `abstract` mark the model as an abstract mixin
/// - `discriminator = ".."` union tag value
/// - `declare = path` declaration function, defaults to `Self::declare_model`
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input.into()).into()
}
