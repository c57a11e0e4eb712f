use super::{
    ModelSchema,
    compile::{ModelMeta, compile},
    decl::ModelDecl,
};
use crate::{error::ConfigurationError, model::Model};
use std::{
    any::TypeId,
    cell::RefCell,
    collections::HashMap,
    sync::{Condvar, LazyLock, Mutex, OnceLock, PoisonError},
};
use tracing::{debug, warn};

type SchemaResult = Result<&'static ModelSchema, ConfigurationError>;

///
/// SCHEMAS
///
/// One write-once cell per model type. The map lock only guards cell
/// lookup; compilation runs inside the cell so concurrent first users
/// wait for a fully built schema. Failures are memoized as well.
///

static SCHEMAS: LazyLock<Mutex<HashMap<TypeId, &'static OnceLock<SchemaResult>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

///
/// COMPILER
///
/// Compilation runs on one thread at a time. The owning thread may
/// re-enter for bases and nested models; its compile stack then sees
/// every model in flight, so an inheritance cycle is reported even when
/// other threads race to first use of the same models.
///

static COMPILER: Mutex<bool> = Mutex::new(false);
static COMPILER_FREE: Condvar = Condvar::new();

thread_local! {
    // models currently compiling on this thread, outermost first
    static COMPILING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Compiled schema for `M`, compiling it on first use.
///
/// Compiled or failed schemas are served without locking.
pub(crate) fn schema_of<M: Model>() -> SchemaResult {
    let type_id = TypeId::of::<M>();
    let cell = cell_for(type_id);
    if let Some(result) = cell.get() {
        return result.clone();
    }

    if COMPILING.with_borrow(|stack| stack.contains(&type_id)) {
        return Err(ConfigurationError::new(format!(
            "{}: model inherits from itself",
            M::NAME
        )));
    }

    let _guard = CompilingGuard::enter(type_id);
    cell.get_or_init(build::<M>).clone()
}

fn cell_for(type_id: TypeId) -> &'static OnceLock<SchemaResult> {
    let mut schemas = SCHEMAS.lock().unwrap_or_else(PoisonError::into_inner);

    *schemas
        .entry(type_id)
        .or_insert_with(|| Box::leak(Box::new(OnceLock::new())))
}

fn build<M: Model>() -> SchemaResult {
    let mut decl = ModelDecl::new();
    M::declare(&mut decl);

    match compile(ModelMeta::of::<M>(), decl) {
        Ok(schema) => {
            debug!(
                model = M::NAME,
                fields = schema.fields().len(),
                roles = schema.roles().len(),
                "model schema compiled"
            );

            Ok(Box::leak(Box::new(schema)))
        }
        Err(err) => {
            warn!(model = M::NAME, error = %err, "model schema rejected");

            Err(err)
        }
    }
}

///
/// CompilingGuard
/// Keeps the per-thread compile stack balanced, even on unwind.
///

struct CompilingGuard;

impl CompilingGuard {
    fn enter(type_id: TypeId) -> Self {
        if COMPILING.with_borrow(Vec::is_empty) {
            let mut busy = COMPILER.lock().unwrap_or_else(PoisonError::into_inner);
            while *busy {
                busy = COMPILER_FREE
                    .wait(busy)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            *busy = true;
        }

        COMPILING.with_borrow_mut(|stack| stack.push(type_id));
        Self
    }
}

impl Drop for CompilingGuard {
    fn drop(&mut self) {
        let outermost = COMPILING.with_borrow_mut(|stack| {
            stack.pop();
            stack.is_empty()
        });

        if outermost {
            *COMPILER.lock().unwrap_or_else(PoisonError::into_inner) = false;
            COMPILER_FREE.notify_all();
        }
    }
}

///
/// TESTS
///
