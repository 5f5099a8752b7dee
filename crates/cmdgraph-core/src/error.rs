//! Error types for graph construction.

use thiserror::Error;

/// Errors raised while turning a declaration document into a [`Graph`](crate::Graph).
///
/// Parsing stops at the first error; nothing is validated or persisted.
#[derive(Error, Debug)]
pub enum DeclarationError {
    /// The document is not valid JSON or a value has the wrong shape.
    #[error("Declaration is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required key is absent.
    #[error("Key not found <{field}> in <{section}>")]
    MissingField {
        /// Location of the entry, e.g. `menu[0].buttons[2]`.
        section: String,
        field: &'static str,
    },

    /// Two entries share an identity key.
    #[error("Duplicate {entity} <{key}>")]
    Duplicate { entity: &'static str, key: String },
}

impl DeclarationError {
    pub fn missing_field(section: impl Into<String>, field: &'static str) -> Self {
        Self::MissingField {
            section: section.into(),
            field,
        }
    }

    pub fn duplicate(entity: &'static str, key: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            key: key.into(),
        }
    }

    /// Name of the offending field, when the error is about one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::MissingField { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type for declaration parsing.
pub type DeclarationResult<T> = Result<T, DeclarationError>;
