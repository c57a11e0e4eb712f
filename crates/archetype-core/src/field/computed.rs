use super::{Field, FieldKind};
use crate::{model::Instance, value::Value};
use std::sync::Arc;

/// Pure function of the owning instance, evaluated at serialization time.
pub type ComputeFn = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;

impl Field {
    /// Output-only descriptor; never read from input and never validated.
    #[must_use]
    pub fn computed(name: impl Into<String>, compute: ComputeFn) -> Self {
        let mut field = Self::new(name, FieldKind::Computed(compute));
        field.input_key = None;
        field.nullable = true;

        field
    }

    /// Evaluate a computed descriptor; other kinds yield `None`.
    #[must_use]
    pub fn compute(&self, instance: &Instance) -> Option<Value> {
        match &self.kind {
            FieldKind::Computed(compute) => Some(compute(instance)),
            _ => None,
        }
    }
}
