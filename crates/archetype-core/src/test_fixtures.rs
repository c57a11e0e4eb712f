//! Hand-written models shared by unit tests.

use crate::{
    model::Model,
    resolve::{FieldOptions, ModelRef, TypeExpr},
    role::Role,
    schema::ModelDecl,
    value::Value,
};
use std::sync::LazyLock;

pub(crate) static PUBLIC: LazyLock<Role> = LazyLock::new(|| Role::new("public", false));
pub(crate) static AUDIT: LazyLock<Role> = LazyLock::new(|| Role::new("audit", true));

///
/// Leaf
///

pub(crate) struct Leaf;

impl Model for Leaf {
    const NAME: &'static str = "Leaf";

    fn declare(decl: &mut ModelDecl) {
        decl.field("name", TypeExpr::Str);
        decl.field("weight", TypeExpr::Float.nullable())
            .default(Value::Null)
            .hide_null();
    }
}

///
/// Cat
///

pub(crate) struct Cat;

impl Model for Cat {
    const NAME: &'static str = "Cat";
    const DISCRIMINATOR: Option<&'static str> = Some("cat");

    fn declare(decl: &mut ModelDecl) {
        decl.field("name", TypeExpr::Str);
        decl.field("lives", TypeExpr::Int)
            .default(9)
            .options(FieldOptions::int().min_value(0).max_value(9));
    }
}

///
/// Dog
///

pub(crate) struct Dog;

impl Model for Dog {
    const NAME: &'static str = "Dog";
    const DISCRIMINATOR: Option<&'static str> = Some("dog");

    fn declare(decl: &mut ModelDecl) {
        decl.field("name", TypeExpr::Str);
        decl.field("good", TypeExpr::Bool).default(true);
    }
}

///
/// Twin
/// Reuses the `cat` discriminator.
///

pub(crate) struct Twin;

impl Model for Twin {
    const NAME: &'static str = "Twin";
    const DISCRIMINATOR: Option<&'static str> = Some("cat");

    fn declare(decl: &mut ModelDecl) {
        decl.field("name", TypeExpr::Str);
    }
}

///
/// Ouroboros
///

pub(crate) struct Ouroboros;

impl Model for Ouroboros {
    const NAME: &'static str = "Ouroboros";

    fn declare(decl: &mut ModelDecl) {
        decl.base::<Self>();
        decl.field("tail", TypeExpr::Int);
    }
}

///
/// Yin / Yang
/// Inherit from each other.
///

pub(crate) struct Yin;

impl Model for Yin {
    const NAME: &'static str = "Yin";

    fn declare(decl: &mut ModelDecl) {
        decl.base::<Yang>();
        decl.field("dark", TypeExpr::Bool);
    }
}

pub(crate) struct Yang;

impl Model for Yang {
    const NAME: &'static str = "Yang";

    fn declare(decl: &mut ModelDecl) {
        decl.base::<Yin>();
        decl.field("light", TypeExpr::Bool);
    }
}

///
/// Owner
/// Container-heavy model: nested model, union list, dict and a computed field.
///

pub(crate) struct Owner;

impl Model for Owner {
    const NAME: &'static str = "Owner";

    fn declare(decl: &mut ModelDecl) {
        decl.field("name", TypeExpr::Str)
            .options(FieldOptions::str().min_length(1));
        decl.field(
            "pets",
            TypeExpr::list(TypeExpr::union([ModelRef::of::<Cat>(), ModelRef::of::<Dog>()])),
        )
        .default_with(|| Value::List(Vec::new()))
        .hide_empty();
        decl.field("favorite", TypeExpr::model::<Leaf>().nullable())
            .default(Value::Null);
        decl.field("scores", TypeExpr::dict(TypeExpr::Str, TypeExpr::Int))
            .default_with(Value::empty_map);
        decl.computed("pet_count", |instance| {
            let count = instance
                .value("pets")
                .and_then(Value::as_list)
                .map_or(0, <[Value]>::len);

            Value::from(i64::try_from(count).unwrap_or(i64::MAX))
        });
    }
}

///
/// Timestamped
///

pub(crate) struct Timestamped;

impl Model for Timestamped {
    const NAME: &'static str = "Timestamped";
    const ABSTRACT: bool = true;

    fn declare(decl: &mut ModelDecl) {
        decl.field("created", TypeExpr::Int).default(0);
        decl.role(AUDIT.whitelist(["created"]));
    }
}

///
/// Account
///

pub(crate) struct Account;

impl Model for Account {
    const NAME: &'static str = "Account";

    fn declare(decl: &mut ModelDecl) {
        decl.base::<Timestamped>();
        decl.field("login", TypeExpr::Str);
        decl.field("password", TypeExpr::Str).output_key("secret");
        decl.role(PUBLIC.blacklist(["password"]));
        decl.validator("login", |instance, value, _| {
            if instance.value("password") == Some(value) {
                Err("Login and password must differ".to_string())
            } else {
                Ok(())
            }
        });
    }
}

///
/// Staff
/// Inherits Account; leaves `public` unaddressed.
///

pub(crate) struct Staff;

impl Model for Staff {
    const NAME: &'static str = "Staff";

    fn declare(decl: &mut ModelDecl) {
        decl.base::<Account>();
        decl.field("level", TypeExpr::Int).default(1);
    }
}
