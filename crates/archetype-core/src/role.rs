use std::{
    collections::BTreeSet,
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock, PoisonError, RwLock},
};
use tracing::trace;

///
/// REGISTRY
///
/// Process-wide list of roles, indexed by code. Code 0 is the default role.
///

static REGISTRY: LazyLock<RwLock<Vec<Role>>> = LazyLock::new(|| {
    RwLock::new(vec![Role {
        code: 0,
        name: Arc::from("default"),
        empty_by_default: false,
    }])
});

/// The role used when serializing without an explicit audience.
pub static DEFAULT_ROLE: LazyLock<Role> = LazyLock::new(|| {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .first()
        .cloned()
        .unwrap_or_else(|| Role {
            code: 0,
            name: Arc::from("default"),
            empty_by_default: false,
        })
});

///
/// Role
///
/// Named output view restricting which fields are serialized.
/// Roles are registered once and never destroyed; the code is a dense
/// index into each model's output tables.
///

#[derive(Clone)]
pub struct Role {
    code: usize,
    name: Arc<str>,
    empty_by_default: bool,
}

impl Role {
    /// Register a new role. Every call yields a distinct role, even when
    /// the name repeats.
    #[must_use]
    pub fn new(name: impl AsRef<str>, empty_by_default: bool) -> Self {
        let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
        let role = Self {
            code: registry.len(),
            name: Arc::from(name.as_ref()),
            empty_by_default,
        };
        registry.push(role.clone());

        trace!(
            role = %role.name,
            code = role.code,
            empty_by_default,
            "role registered"
        );

        role
    }

    #[must_use]
    pub const fn code(&self) -> usize {
        self.code
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_empty_by_default(&self) -> bool {
        self.empty_by_default
    }

    /// Number of roles registered so far, the default role included.
    #[must_use]
    pub fn registered() -> usize {
        REGISTRY
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// This role shows only the named fields (plus inherited ones unless
    /// overridden).
    pub fn whitelist<I, S>(&self, fields: I) -> RoleRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RoleRequest::new(self.clone(), fields, RoleMode::Whitelist)
    }

    /// This role hides the named fields.
    pub fn blacklist<I, S>(&self, fields: I) -> RoleRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RoleRequest::new(self.clone(), fields, RoleMode::Blacklist)
    }
}

impl PartialEq for Role {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Role {}

impl Hash for Role {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Role {}, empty_by_default={}, code={}>",
            self.name, self.empty_by_default, self.code
        )
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

///
/// RoleMode
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoleMode {
    Whitelist,
    Blacklist,
}

///
/// RoleRequest
///
/// One model's own declaration for a role: a whitelist or blacklist delta
/// applied on top of what the bases resolved.
///

#[derive(Clone, Debug)]
pub struct RoleRequest {
    pub role: Role,
    pub fields: BTreeSet<String>,
    pub mode: RoleMode,
    pub override_parents: bool,
}

impl RoleRequest {
    fn new<I, S>(role: Role, fields: I, mode: RoleMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            role,
            fields: fields.into_iter().map(Into::into).collect(),
            mode,
            override_parents: false,
        }
    }

    /// Ignore what the bases resolved for this role.
    #[must_use]
    pub const fn override_parents(mut self) -> Self {
        self.override_parents = true;
        self
    }
}

///
/// RoleFields
/// Resolved field-name set for one role on one model.
///

#[derive(Clone, Debug)]
pub struct RoleFields {
    pub role: Role,
    pub fields: BTreeSet<String>,
}

impl RoleFields {
    #[must_use]
    pub const fn new(role: Role) -> Self {
        Self {
            role,
            fields: BTreeSet::new(),
        }
    }

    /// Apply a model's own delta.
    /// `all` is every field name of the model, `own` the names it declares
    /// itself.
    pub fn apply(&mut self, request: &RoleRequest, all: &BTreeSet<String>, own: &BTreeSet<String>) {
        let initial = if request.override_parents {
            match request.mode {
                RoleMode::Whitelist => BTreeSet::new(),
                RoleMode::Blacklist => all.clone(),
            }
        } else {
            std::mem::take(&mut self.fields)
        };

        self.fields = match request.mode {
            RoleMode::Whitelist => initial.union(&request.fields).cloned().collect(),
            RoleMode::Blacklist => initial
                .union(own)
                .filter(|name| !request.fields.contains(*name))
                .cloned()
                .collect(),
        };
    }
}

///
/// TESTS
///
