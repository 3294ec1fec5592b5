//! Error and diagnostic types for assembly extraction.

use std::fmt;

use thiserror::Error;

/// Errors that stop assembly extraction.
#[derive(Error, Debug)]
pub enum StepTreeError {
    /// I/O error reading a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input could not be interpreted as text.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A record has fewer attributes than its decoder requires.
    #[error("Malformed record #{record}: attribute {index} requested, only {len} present")]
    MalformedRecord {
        /// Entity ID of the record.
        record: String,
        /// Requested attribute index (0-indexed).
        index: usize,
        /// Number of attributes actually present.
        len: usize,
    },

    /// A product definition's name chain is broken (strict mode only).
    #[error("Unresolved reference #{missing} from product definition #{product_definition}")]
    UnresolvedReference {
        /// The product definition being resolved.
        product_definition: String,
        /// The reference that could not be followed.
        missing: String,
    },

    /// A relation points at a product definition that does not exist (strict mode only).
    #[error("Relation #{relation} references missing product definition #{missing}")]
    SkippedReference {
        /// The relation that was skipped.
        relation: String,
        /// The contained ID that could not be found.
        missing: String,
    },

    /// No product definitions survived decoding and resolution.
    #[error("No product definitions found in STEP file")]
    NoProductsFound,

    /// The relation graph has no unique top-level assembly.
    #[error("Root assembly could not be identified")]
    RootNotIdentifiable,

    /// A product definition contains itself, directly or transitively.
    #[error("Cycle detected: {}", format_path(path))]
    CycleDetected {
        /// IDs along the ancestor path, ending with the revisited ID.
        path: Vec<String>,
    },

    /// The assembly nests deeper than the configured limit.
    #[error("Assembly nesting exceeds {limit} levels at product definition #{id}")]
    DepthLimitExceeded {
        /// The configured maximum depth.
        limit: usize,
        /// The product definition that would have exceeded it.
        id: String,
    },
}

impl StepTreeError {
    /// Create a malformed record error.
    pub fn malformed(record: impl Into<String>, index: usize, len: usize) -> Self {
        Self::MalformedRecord {
            record: record.into(),
            index,
            len,
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

fn format_path(path: &[String]) -> String {
    path.iter()
        .map(|id| format!("#{id}"))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A recoverable gap found while extracting the assembly.
///
/// Diagnostics never prevent a tree from being built; they are collected
/// and returned next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A product definition was dropped because its name chain breaks.
    UnresolvedReference {
        /// The dropped product definition.
        product_definition: String,
        /// The formation or product ID that could not be found.
        missing: String,
    },
    /// A relation was left out of the tree because its contained ID is unknown.
    SkippedReference {
        /// The skipped relation.
        relation: String,
        /// The contained ID that could not be found.
        missing: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedReference {
                product_definition,
                missing,
            } => write!(
                f,
                "product definition #{product_definition} dropped: reference #{missing} not found"
            ),
            Diagnostic::SkippedReference { relation, missing } => write!(
                f,
                "relation #{relation} skipped: product definition #{missing} not found"
            ),
        }
    }
}

impl From<Diagnostic> for StepTreeError {
    fn from(diagnostic: Diagnostic) -> Self {
        match diagnostic {
            Diagnostic::UnresolvedReference {
                product_definition,
                missing,
            } => StepTreeError::UnresolvedReference {
                product_definition,
                missing,
            },
            Diagnostic::SkippedReference { relation, missing } => {
                StepTreeError::SkippedReference { relation, missing }
            }
        }
    }
}
