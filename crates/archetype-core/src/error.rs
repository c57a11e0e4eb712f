use crate::GLOBAL_ERROR_KEY;
use derive_more::{Deref, DerefMut};
use serde::Serialize;
use std::collections::{BTreeMap, btree_map::Entry};
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level error for operations that may trigger lazy schema compilation
/// (construction, role queries) as well as construction and validation
/// failures themselves.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Path-scoped payload for conversion and validation failures.
    #[must_use]
    pub fn as_data_error(&self) -> Option<&DataError> {
        match self {
            Self::Configuration(_) => None,
            Self::Conversion(err) => Some(err),
            Self::Validation(err) => Some(err),
        }
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    #[must_use]
    pub const fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion(_))
    }

    // prefixed
    // only conversion paths are rewritten; configuration errors pass through
    pub(crate) fn prefixed(self, segment: &str) -> Self {
        match self {
            Self::Conversion(err) => Self::Conversion(ConversionError(err.0.prefixed(segment))),
            other => other,
        }
    }
}

///
/// ConfigurationError
///
/// Schema declaration mistake, detected while compiling a model.
/// Treated as a programming defect rather than a recoverable condition.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct ConfigurationError {
    pub message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Prepend a `"<prefix>: "` context to the message.
    #[must_use]
    pub fn context(self, prefix: impl AsRef<str>) -> Self {
        Self::new(format!("{}: {}", prefix.as_ref(), self.message))
    }
}

///
/// PathError
/// One message located by a path of string segments.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PathError {
    pub path: Vec<String>,
    pub message: String,
}

impl PathError {
    pub fn new(path: Vec<String>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Error located at the current level (empty path).
    pub fn here(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message)
    }

    /// Error located one segment below the current level.
    pub fn at(segment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![segment.into()], message)
    }

    #[must_use]
    pub fn prefixed(mut self, segment: &str) -> Self {
        self.path.insert(0, segment.to_string());
        self
    }
}

///
/// DataError
///
/// Ordered list of path-scoped messages shared by conversion and
/// validation failures.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, ThisError)]
#[error("{}", self.message_summary())]
pub struct DataError {
    pub errors: Vec<PathError>,
}

impl DataError {
    #[must_use]
    pub const fn from_errors(errors: Vec<PathError>) -> Self {
        Self { errors }
    }

    /// Single error located at `path`.
    pub fn new<I, S>(message: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            errors: vec![PathError::new(
                path.into_iter().map(Into::into).collect(),
                message,
            )],
        }
    }

    /// Prepend one path segment to every error.
    #[must_use]
    pub fn prefixed(self, segment: &str) -> Self {
        Self {
            errors: self
                .errors
                .into_iter()
                .map(|err| err.prefixed(segment))
                .collect(),
        }
    }

    #[must_use]
    pub fn error_list(&self) -> &[PathError] {
        &self.errors
    }

    /// `"<dot-joined path>: <first message>"`, or the bare message when
    /// the first error has no path.
    #[must_use]
    pub fn message_summary(&self) -> String {
        let Some(first) = self.errors.first() else {
            return String::new();
        };

        if first.path.is_empty() {
            first.message.clone()
        } else {
            format!("{}: {}", first.path.join("."), first.message)
        }
    }

    /// Errors folded into a nested map keyed by path segment.
    #[must_use]
    pub fn errors(&self) -> ErrorTree {
        let mut tree = ErrorTree::default();
        for err in &self.errors {
            tree.insert(&err.path, &err.message);
        }

        tree
    }
}

///
/// ConversionError
///
/// First-failure type coercion problem raised during construction.
///

#[derive(Clone, Debug, Deref, DerefMut, Eq, PartialEq, ThisError)]
#[error("{}", .0.message_summary())]
pub struct ConversionError(pub DataError);

impl ConversionError {
    pub fn new<I, S>(message: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(DataError::new(message, path))
    }

    /// Conversion failure at the current level.
    pub fn here(message: impl Into<String>) -> Self {
        Self::new(message, std::iter::empty::<String>())
    }

    #[must_use]
    pub fn into_inner(self) -> DataError {
        self.0
    }
}

///
/// ValidationError
///
/// Every constraint violation found in one validation pass.
///

#[derive(Clone, Debug, Deref, DerefMut, Eq, PartialEq, ThisError)]
#[error("{}", .0.message_summary())]
pub struct ValidationError(pub DataError);

impl ValidationError {
    #[must_use]
    pub const fn from_errors(errors: Vec<PathError>) -> Self {
        Self(DataError::from_errors(errors))
    }

    #[must_use]
    pub fn into_inner(self) -> DataError {
        self.0
    }
}

///
/// LookupError
/// Attribute access on a name the model does not declare.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum LookupError {
    #[error("model {model} has no field or computed value named '{name}'")]
    UnknownField { model: &'static str, name: String },
}

//
// ============================================================================
// Error tree
// ============================================================================
//

///
/// ErrorTree
///
/// Structured rendering of a DataError. Serializes to the same JSON shape
/// a client receives: leaves are message lists, branches are nested maps.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorTree(pub BTreeMap<String, ErrorNode>);

///
/// ErrorNode
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorNode {
    Messages(Vec<String>),
    Nested(ErrorTree),
}

impl ErrorTree {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ErrorNode> {
        self.0.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, path: &[String], message: &str) {
        let global = [GLOBAL_ERROR_KEY.to_string()];
        let path = if path.is_empty() { &global[..] } else { path };
        let Some((last, parents)) = path.split_last() else {
            return;
        };

        let mut container = self;
        for segment in parents {
            let node = container
                .0
                .entry(segment.clone())
                .or_insert_with(|| ErrorNode::Nested(Self::default()));

            // a leaf list meeting a deeper path moves under `_global`
            if let ErrorNode::Messages(messages) = node {
                let moved = std::mem::take(messages);
                let mut nested = Self::default();
                nested
                    .0
                    .insert(GLOBAL_ERROR_KEY.to_string(), ErrorNode::Messages(moved));
                *node = ErrorNode::Nested(nested);
            }

            let ErrorNode::Nested(nested) = node else {
                return;
            };
            container = nested;
        }

        match container.0.entry(last.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(ErrorNode::Messages(vec![message.to_string()]));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                ErrorNode::Messages(messages) => messages.push(message.to_string()),
                ErrorNode::Nested(nested) => nested.push_global(message),
            },
        }
    }

    fn push_global(&mut self, message: &str) {
        match self
            .0
            .entry(GLOBAL_ERROR_KEY.to_string())
            .or_insert_with(|| ErrorNode::Messages(Vec::new()))
        {
            ErrorNode::Messages(messages) => messages.push(message.to_string()),
            ErrorNode::Nested(nested) => nested.push_global(message),
        }
    }
}

///
/// TESTS
///
