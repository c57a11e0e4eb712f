use darling::FromDeriveInput;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Error, Ident, Path};

///
/// ModelArgs
///

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(model), supports(struct_any, enum_any))]
struct ModelArgs {
    ident: Ident,
    generics: syn::Generics,

    #[darling(default)]
    name: Option<String>,

    #[darling(default, rename = "abstract")]
    is_abstract: bool,

    #[darling(default)]
    discriminator: Option<String>,

    #[darling(default)]
    declare: Option<Path>,
}

// derive_model
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input: DeriveInput = match syn::parse2(input) {
        Ok(input) => input,
        Err(err) => return err.to_compile_error(),
    };

    let args = match ModelArgs::from_derive_input(&input) {
        Ok(args) => args,
        Err(err) => return err.write_errors(),
    };

    if !args.generics.params.is_empty() {
        return Error::new_spanned(&args.generics, "Model cannot be derived for generic types")
            .to_compile_error();
    }

    if args.is_abstract && args.discriminator.is_some() {
        return Error::new_spanned(
            &args.ident,
            "abstract models cannot carry a union discriminator",
        )
        .to_compile_error();
    }

    expand(&args)
}

fn expand(args: &ModelArgs) -> TokenStream {
    let ident = &args.ident;
    let name = args.name.clone().unwrap_or_else(|| ident.to_string());
    let is_abstract = args.is_abstract;
    let discriminator = args
        .discriminator
        .as_ref()
        .map_or_else(
            || quote!(::core::option::Option::None),
            |tag| quote!(::core::option::Option::Some(#tag)),
        );
    let declare = args
        .declare
        .as_ref()
        .map_or_else(|| quote!(Self::declare_model), |path| quote!(#path));

    quote! {
        impl ::archetype::core::model::Model for #ident {
            const NAME: &'static str = #name;
            const ABSTRACT: bool = #is_abstract;
            const DISCRIMINATOR: ::core::option::Option<&'static str> = #discriminator;

            fn declare(decl: &mut ::archetype::core::schema::ModelDecl) {
                #declare(decl);
            }
        }
    }
}

///
/// TESTS
///
