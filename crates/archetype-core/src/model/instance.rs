use crate::{
    REQUIRED_MESSAGE,
    error::{LookupError, PathError, ValidationError},
    field::FieldKind,
    model::Model,
    role::{DEFAULT_ROLE, Role},
    schema::ModelSchema,
    value::Value,
};
use serde::{Serialize, Serializer};
use std::{
    any::{Any, TypeId},
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    sync::Arc,
};

///
/// Instance
///
/// One constructed model value: a slot per input field holding a value,
/// null, or Missing (`None`). Slots are shared, so a shallow copy is
/// cheap; writes replace or clone-on-write the touched slot only.
///
/// Instances are not internally synchronized: one writer at a time.
///

#[derive(Clone)]
pub struct Instance {
    schema: &'static ModelSchema,
    slots: Vec<Option<Arc<Value>>>,
}

impl Instance {
    pub(crate) const fn new(schema: &'static ModelSchema, slots: Vec<Option<Arc<Value>>>) -> Self {
        Self { schema, slots }
    }

    #[must_use]
    pub const fn schema(&self) -> &'static ModelSchema {
        self.schema
    }

    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.schema.name()
    }

    /// True when this instance was built by `M` or a model inheriting it.
    #[must_use]
    pub fn is<M: Model>(&self) -> bool {
        self.schema.is_a(TypeId::of::<M>())
    }

    //
    // Attribute access
    //

    /// Value of a declared field or computed field.
    /// `Ok(None)` means the field is Missing.
    pub fn get(&self, name: &str) -> Result<Option<Cow<'_, Value>>, LookupError> {
        if let Some(slot) = self.schema.slot_of(name) {
            return Ok(self.slots[slot].as_deref().map(Cow::Borrowed));
        }

        match self.schema.field(name) {
            Some(field) => Ok(field.compute(self).map(Cow::Owned)),
            None => Err(self.unknown(name)),
        }
    }

    /// Value of a field, or `default` when the name is undeclared or the
    /// value is Missing.
    #[must_use]
    pub fn get_or(&self, name: &str, default: Value) -> Value {
        match self.get(name) {
            Ok(Some(value)) => value.into_owned(),
            _ => default,
        }
    }

    /// Stored value of an input field; `None` for Missing or unknown names.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        let slot = self.schema.slot_of(name)?;

        self.slots[slot].as_deref()
    }

    /// True when the input field exists and holds no value.
    #[must_use]
    pub fn is_missing(&self, name: &str) -> bool {
        self.schema
            .slot_of(name)
            .is_some_and(|slot| self.slots[slot].is_none())
    }

    /// Replace a field's value. No conversion is applied.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), LookupError> {
        let slot = self.slot(name)?;
        self.slots[slot] = Some(Arc::new(value.into()));

        Ok(())
    }

    /// Reset a field to Missing.
    pub fn unset(&mut self, name: &str) -> Result<(), LookupError> {
        let slot = self.slot(name)?;
        self.slots[slot] = None;

        Ok(())
    }

    /// Mutable access to a stored value. The slot is un-shared first, so
    /// copies made earlier never observe the change.
    pub fn value_mut(&mut self, name: &str) -> Result<Option<&mut Value>, LookupError> {
        let slot = self.slot(name)?;

        Ok(self.slots[slot].as_mut().map(Arc::make_mut))
    }

    /// True when both instances hold the very same storage for `name`.
    #[must_use]
    pub fn shares_storage(&self, other: &Self, name: &str) -> bool {
        if !std::ptr::eq(self.schema, other.schema) {
            return false;
        }

        match self.schema.slot_of(name) {
            Some(slot) => match (&self.slots[slot], &other.slots[slot]) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            },
            None => false,
        }
    }

    /// Field name and value pairs for input fields; Missing is skipped.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.schema
            .input_fields()
            .iter()
            .zip(&self.slots)
            .filter_map(|(field, slot)| slot.as_deref().map(|value| (field.name.as_str(), value)))
    }

    fn slot(&self, name: &str) -> Result<usize, LookupError> {
        self.schema.slot_of(name).ok_or_else(|| self.unknown(name))
    }

    fn unknown(&self, name: &str) -> LookupError {
        LookupError::UnknownField {
            model: self.schema.name(),
            name: name.to_string(),
        }
    }

    //
    // Serialization
    //

    /// Serialize with the default role.
    #[must_use]
    pub fn serialize(&self) -> Value {
        self.serialize_with(&DEFAULT_ROLE, &())
    }

    #[must_use]
    pub fn serialize_for(&self, role: &Role) -> Value {
        self.serialize_with(role, &())
    }

    /// Serialize for `role`, passing `ctx` through to output hooks.
    #[must_use]
    pub fn serialize_with(&self, role: &Role, ctx: &dyn Any) -> Value {
        let schema = self.schema;
        let mut output = BTreeMap::new();

        for entry in schema.output_table(role) {
            let field = &schema.fields[entry.field];

            if let FieldKind::Computed(compute) = &field.kind {
                let value = compute(self);
                if !(value.is_null() && field.hide_null) {
                    output.insert(entry.key.clone(), value);
                }
                continue;
            }

            let Some(value) = self.slots[entry.field].as_deref() else {
                continue;
            };
            let converted = if field.is_atomic() && field.serialize_hook.is_none() {
                value.clone()
            } else {
                field.to_primitive(value, role, ctx)
            };

            if (converted.is_null() && field.hide_null)
                || (field.hide_empty && converted.is_empty_sentinel())
            {
                continue;
            }
            output.insert(entry.key.clone(), converted);
        }

        Value::Map(output)
    }

    //
    // Validation
    //

    /// Validate every field, reporting all violations at once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_with(&())
    }

    /// Validate with a context passed to validator callables.
    pub fn validate_with(&self, ctx: &dyn Any) -> Result<(), ValidationError> {
        let errors = self.validation_errors(ctx);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::from_errors(errors))
        }
    }

    /// Every validation error, without raising.
    ///
    /// Per field: Missing or a disallowed null yields exactly one required
    /// error; otherwise the native rule, then the model-level validator,
    /// then the declared validators contribute, in that order.
    #[must_use]
    pub fn validation_errors(&self, ctx: &dyn Any) -> Vec<PathError> {
        let schema = self.schema;
        let mut errors = Vec::new();

        for entry in &schema.validations {
            let field = &schema.fields[entry.slot];
            let mut field_errors = Vec::new();

            match self.slots[entry.slot].as_deref() {
                None => field_errors.push(PathError::here(REQUIRED_MESSAGE)),
                Some(Value::Null) if !field.nullable => {
                    field_errors.push(PathError::here(REQUIRED_MESSAGE));
                }
                Some(value) => {
                    field.validate_native(value, ctx, &mut field_errors);
                    if let Some(validator) = &field.model_validator
                        && let Err(message) = validator(self, value, ctx)
                    {
                        field_errors.push(PathError::here(message));
                    }
                    field.run_validators(value, ctx, &mut field_errors);
                }
            }

            errors.extend(
                field_errors
                    .into_iter()
                    .map(|err| err.prefixed(&entry.error_key)),
            );
        }

        errors
    }

    //
    // Copy
    //

    /// Shallow copies alias every slot; deep copies rebuild non-atomic
    /// values through their descriptors.
    ///
    /// Aliasing is copy-on-write: `set`, `unset` and `value_mut` on either
    /// side never show up in the other instance. Use `shares_storage` to
    /// see whether a slot is still shared.
    #[must_use]
    pub fn copy(&self, deep: bool) -> Self {
        if !deep {
            return self.clone();
        }

        let slots = self
            .schema
            .input_fields()
            .iter()
            .zip(&self.slots)
            .map(|(field, slot)| match slot {
                Some(value) if !field.is_atomic() => Some(Arc::new(field.copy_value(value))),
                other => other.clone(),
            })
            .collect();

        Self::new(self.schema, slots)
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.slots == other.slots
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Self::serialize(self).serialize(serializer)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .schema
            .input_fields()
            .iter()
            .zip(&self.slots)
            .map(|(field, slot)| format!("{}={}", field.name, debug_value(slot.as_deref())))
            .collect();

        write!(f, "<{} {{{}}}>", self.schema.name(), parts.join(", "))
    }
}

fn debug_value(value: Option<&Value>) -> String {
    match value {
        None => "Missing".to_string(),
        Some(Value::List(items)) if items.is_empty() => "[]".to_string(),
        Some(Value::Map(entries)) if entries.is_empty() => "{}".to_string(),
        Some(value) => value.repr(),
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorNode,
        test_fixtures::{AUDIT, Account, Leaf, Owner, PUBLIC, Staff},
    };

    fn owner() -> Instance {
        Owner::construct(&Value::map([
            ("name", Value::from("Ann")),
            (
                "pets",
                Value::from(vec![
                    Value::map([("type", "cat"), ("name", "Tom")]),
                    Value::map([("type", "dog"), ("name", "Rex")]),
                ]),
            ),
            ("scores", Value::map([("math", 3_i64)])),
        ]))
        .unwrap()
    }

    fn account(login: &str, password: &str) -> Instance {
        Account::construct(&Value::map([("login", login), ("password", password)])).unwrap()
    }

    #[test]
    fn serialize_nests_and_tags_unions() {
        let output = owner().serialize();

        let pets = output.get("pets").and_then(Value::as_list).unwrap();
        assert_eq!(
            pets[0],
            Value::map([
                ("type", Value::from("cat")),
                ("name", Value::from("Tom")),
                ("lives", Value::Int(9)),
            ])
        );
        assert_eq!(pets[1].get("good"), Some(&Value::Bool(true)));
        assert_eq!(output.get("favorite"), Some(&Value::Null));
        assert_eq!(output.get("pet_count"), Some(&Value::Int(2)));
    }

    #[test]
    fn hide_empty_drops_empty_lists() {
        let owner = Owner::construct(&Value::map([("name", "Ann")])).unwrap();

        assert_eq!(owner.serialize().get("pets"), None);
        assert_eq!(owner.serialize().get("pet_count"), Some(&Value::Int(0)));
    }

    #[test]
    fn hide_null_skips_null_values() {
        let leaf = Leaf::construct(&Value::map([("name", "oak")])).unwrap();

        assert_eq!(leaf.serialize(), Value::map([("name", "oak")]));
    }

    #[test]
    fn missing_values_are_not_serialized() {
        let leaf = Leaf::construct(&Value::empty_map()).unwrap();

        assert!(leaf.is_missing("name"));
        assert_eq!(leaf.serialize(), Value::empty_map());
    }

    #[test]
    fn roles_select_output_fields() {
        let account = account("ann", "hunter2");

        assert_eq!(
            account.serialize().as_map().map(BTreeMap::len),
            Some(3),
            "default role serializes every field"
        );
        assert_eq!(
            account.serialize_for(&PUBLIC),
            Value::map([("created", Value::Int(0)), ("login", Value::from("ann"))])
        );
        assert_eq!(account.serialize_for(&AUDIT), Value::map([("created", 0_i64)]));
    }

    #[test]
    fn unaddressed_role_gains_child_fields() {
        let staff = Staff::construct(&Value::map([("login", "bo"), ("password", "pw")])).unwrap();

        assert_eq!(
            Staff::field_names_for_role(&PUBLIC).unwrap(),
            vec!["created", "login", "level"]
        );
        assert_eq!(staff.serialize_for(&PUBLIC).get("secret"), None);
    }

    #[test]
    fn unknown_roles_fall_back_by_emptiness() {
        let open = Role::new("instance-open", false);
        let closed = Role::new("instance-closed", true);
        let account = account("ann", "pw");

        assert_eq!(account.serialize_for(&open), account.serialize());
        assert_eq!(account.serialize_for(&closed), Value::empty_map());
    }

    #[test]
    fn validation_collects_every_error() {
        let owner = Owner::construct(&Value::map([
            ("name", Value::from("")),
            (
                "pets",
                Value::from(vec![Value::map([
                    ("type", Value::from("cat")),
                    ("name", Value::from("Tom")),
                    ("lives", Value::Int(12)),
                ])]),
            ),
        ]))
        .unwrap();

        let err = owner.validate().unwrap_err();
        let tree = err.errors();

        assert_eq!(err.error_list().len(), 2);
        assert_eq!(
            tree.get("name"),
            Some(&ErrorNode::Messages(vec![
                "This value cannot be empty".to_string()
            ]))
        );
        assert!(matches!(tree.get("pets"), Some(ErrorNode::Nested(_))));
    }

    #[test]
    fn missing_required_reports_once() {
        let leaf = Leaf::construct(&Value::Null).unwrap();
        let err = leaf.validate().unwrap_err();

        assert_eq!(err.error_list(), &[PathError::at("name", REQUIRED_MESSAGE)]);
    }

    #[test]
    fn model_validator_sees_the_instance() {
        let err = account("same", "same").validate().unwrap_err();

        assert_eq!(err.to_string(), "login: Login and password must differ");
        assert!(account("ann", "pw").validate().is_ok());
    }

    #[test]
    fn inherited_model_validator_runs_on_child() {
        let staff = Staff::construct(&Value::map([("login", "x"), ("password", "x")])).unwrap();

        assert!(staff.validate().is_err());
        assert!(staff.is::<Account>());
        assert!(!account("a", "b").is::<Staff>());
    }

    #[test]
    fn shallow_copy_shares_until_written() {
        let original = owner();
        let mut copy = original.copy(false);
        assert!(copy.shares_storage(&original, "pets"));

        if let Some(Value::List(pets)) = copy.value_mut("pets").unwrap() {
            pets.clear();
        }

        assert!(!copy.shares_storage(&original, "pets"));
        assert_eq!(original.value("pets").and_then(Value::as_list).map(<[Value]>::len), Some(2));
        assert_eq!(copy.value("pets").and_then(Value::as_list).map(<[Value]>::len), Some(0));
    }

    #[test]
    fn writes_to_source_do_not_reach_shallow_copy() {
        let mut original = owner();
        let copy = original.copy(false);

        if let Some(Value::Map(scores)) = original.value_mut("scores").unwrap() {
            scores.clear();
        }
        original.set("name", "Other").unwrap();

        assert_eq!(copy, owner());
        assert!(!copy.shares_storage(&original, "scores"));
    }

    #[test]
    fn deep_copy_is_equal_but_independent() {
        let original = owner();
        let copy = original.copy(true);

        assert_eq!(copy, original);
        assert!(!copy.shares_storage(&original, "pets"));
        assert!(copy.shares_storage(&original, "name"));
    }

    #[test]
    fn get_and_set_by_name() {
        let mut leaf = Leaf::construct(&Value::map([("name", "oak")])).unwrap();

        leaf.set("name", "elm").unwrap();
        assert_eq!(leaf.get("name").unwrap().as_deref(), Some(&Value::from("elm")));
        assert_eq!(leaf.get_or("weight", Value::Float(1.0)), Value::Null);
        assert!(leaf.get("bark").is_err());
        assert!(leaf.set("bark", 1).is_err());

        leaf.unset("name").unwrap();
        assert!(leaf.is_missing("name"));
    }

    #[test]
    fn computed_fields_are_readable() {
        let owner = owner();

        assert_eq!(owner.get("pet_count").unwrap().as_deref(), Some(&Value::Int(2)));
        assert_eq!(owner.items().count(), 4);
    }

    #[test]
    fn debug_lists_slots() {
        let leaf = Leaf::construct(&Value::map([("name", "oak")])).unwrap();

        assert_eq!(format!("{leaf:?}"), "<Leaf {name='oak', weight=null}>");
        assert_eq!(
            format!("{:?}", Leaf::construct(&Value::Null).unwrap()),
            "<Leaf {name=Missing, weight=null}>"
        );
    }
}
