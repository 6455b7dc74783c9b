use std::fmt::{Display, Formatter};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MalformedInput,
    UnimplementedOpcode,
    ReferentialIntegrity,
    StructuralViolation,
    NoTopLevel,
    TooManyTopLevel,
    LimitExceeded,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::MalformedInput,
        ErrorKind::UnimplementedOpcode,
        ErrorKind::ReferentialIntegrity,
        ErrorKind::StructuralViolation,
        ErrorKind::NoTopLevel,
        ErrorKind::TooManyTopLevel,
        ErrorKind::LimitExceeded,
    ];

    pub fn describe(self) -> &'static str {
        match self {
            ErrorKind::MalformedInput => "Parsing failed",
            ErrorKind::UnimplementedOpcode => "Unimplemented Scratch feature",
            ErrorKind::ReferentialIntegrity => "Block references a missing block, variable or list",
            ErrorKind::StructuralViolation => "Block structure not supported",
            ErrorKind::NoTopLevel => "No top-level block i.e. hat found",
            ErrorKind::TooManyTopLevel => "More than one top-level block i.e. hat found",
            ErrorKind::LimitExceeded => "Program exceeds a size or nesting limit",
        }
    }
}

/// Which relation of a block a failed lookup came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    Next,
    Parent,
    Input(String),
    Shadow(String),
    Substack(String),
    Variable,
    List,
    Link,
}

impl Display for Relation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::Next => write!(f, "next block"),
            Relation::Parent => write!(f, "parent block"),
            Relation::Input(name) => write!(f, "input '{}'", name),
            Relation::Shadow(name) => write!(f, "shadow of input '{}'", name),
            Relation::Substack(name) => write!(f, "substack '{}'", name),
            Relation::Variable => write!(f, "variable"),
            Relation::List => write!(f, "list"),
            Relation::Link => write!(f, "block"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid project.json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Block '{block}' has unknown value '{value}' in field '{field}'.")]
    InvalidField {
        block: String,
        field: String,
        value: String,
    },

    #[error("Unimplemented opcode '{opcode}' (block '{block}').")]
    UnimplementedOpcode { opcode: String, block: String },

    #[error("Block '{block}' references missing {relation} '{id}'.")]
    ReferentialIntegrity {
        block: String,
        relation: Relation,
        id: String,
    },

    #[error("Structural violation at block '{block}': {reason}")]
    StructuralViolation { block: String, reason: String },

    #[error("No top-level block found in target '{target}'.")]
    NoTopLevel { target: String },

    #[error("Found {count} top-level blocks in '{target}', only one is supported.")]
    TooManyTopLevel { target: String, count: usize },

    #[error("{what} exceeds the limit of {limit}.")]
    LimitExceeded { what: String, limit: usize },
}

impl ConvertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConvertError::MalformedInput(_)
            | ConvertError::Json(_)
            | ConvertError::InvalidField { .. } => ErrorKind::MalformedInput,
            ConvertError::UnimplementedOpcode { .. } => ErrorKind::UnimplementedOpcode,
            ConvertError::ReferentialIntegrity { .. } => ErrorKind::ReferentialIntegrity,
            ConvertError::StructuralViolation { .. } => ErrorKind::StructuralViolation,
            ConvertError::NoTopLevel { .. } => ErrorKind::NoTopLevel,
            ConvertError::TooManyTopLevel { .. } => ErrorKind::TooManyTopLevel,
            ConvertError::LimitExceeded { .. } => ErrorKind::LimitExceeded,
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ConvertError::MalformedInput(message.into())
    }

    pub(crate) fn structural(block: &str, reason: impl Into<String>) -> Self {
        ConvertError::StructuralViolation {
            block: block.to_string(),
            reason: reason.into(),
        }
    }
}
