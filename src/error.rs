//! Error kinds and the non-fatal diagnostic sink.
//!
//! Hard errors stop the current unit of work (a descriptor, a table, the
//! whole document). Everything recoverable becomes a [`Diagnostic`]: it is
//! logged the moment it is recorded and kept for the end-of-run summary.
use std::fmt;
use thiserror::Error;

// ————————————————————————————————————————————————————————————————————————————
// HARD ERRORS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized descriptor `{token}`")]
pub struct DescriptorSyntaxError {
    pub token: String,
}

/// Failure while building the tree of a single table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorSyntaxError),

    #[error("missing or unbalanced condition brackets in `{line}`")]
    Condition { line: String },

    #[error("unbalanced subscript or argument brackets in `{line}`")]
    Brackets { line: String },

    #[error("descriptor `{line}` found in the code column; cells are out of alignment")]
    MisalignedDescriptor { line: String },

    #[error("unparsable `{keyword}` construct: `{line}`")]
    StructureBoundary { keyword: &'static str, line: String },

    #[error("line at depth {found} inside a container of depth {expected}: `{line}`")]
    Depth { expected: usize, found: usize, line: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("start marker `{marker}` never found in the document tables")]
    StartMarkerNotFound { marker: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("`{key}` must not be empty")]
    EmptyMarker { key: &'static str },

    #[error("output group `{name}` is declared more than once")]
    DuplicateGroup { name: String },
}

// ————————————————————————————————————————————————————————————————————————————
// DIAGNOSTICS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A `shall be` clause that matched none of the known phrasings.
    UnresolvedConstraint { variable: String, clause: String },
    /// The duplicate-cell heuristic skipped a cell.
    GlitchAmbiguity { structure: String, cell: usize, text: String },
    /// A table stopped parsing early; its partial tree is kept.
    StructureFailure { structure: String, error: TableError },
    /// `u(v)` field whose width the document never states.
    UnknownLength { structure: String, variable: String },
    /// Call to a structure that no recorded table defines.
    UnresolvedCall { structure: String, target: String },
    /// Same field name hoisted with incompatible scalar types.
    FieldConflict { structure: String, field: String },
}

impl Diagnostic {
    pub fn is_structure_failure(&self) -> bool {
        matches!(self, Diagnostic::StructureFailure { .. })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnresolvedConstraint { variable, clause } => {
                write!(f, "unresolved constraint for `{variable}`: \"shall be {clause}\"")
            }
            Diagnostic::GlitchAmbiguity { structure, cell, text } => {
                write!(f, "{structure}: skipped duplicated cell {cell} (`{text}`)")
            }
            Diagnostic::StructureFailure { structure, error } => {
                write!(f, "{structure}: {error}")
            }
            Diagnostic::UnknownLength { structure, variable } => {
                write!(f, "{structure}: bit length of `{variable}` is not stated, placeholder emitted")
            }
            Diagnostic::UnresolvedCall { structure, target } => {
                write!(f, "{structure}: call to undefined structure `{target}`")
            }
            Diagnostic::FieldConflict { structure, field } => {
                write!(f, "{structure}: field `{field}` is read with conflicting types")
            }
        }
    }
}

/// Append-only collection of diagnostics. Every push is also a log record.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        if diagnostic.is_structure_failure() {
            log::error!("{diagnostic}");
        } else {
            log::warn!("{diagnostic}");
        }
        self.items.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_error_converts_into_table_error() {
        let err: TableError = DescriptorSyntaxError { token: "b(8)".into() }.into();
        assert_eq!(err.to_string(), "unrecognized descriptor `b(8)`");
    }

    #[test]
    fn diagnostics_keep_insertion_order() {
        let mut d = Diagnostics::new();
        d.push(Diagnostic::UnresolvedCall { structure: "a".into(), target: "b".into() });
        d.push(Diagnostic::StructureFailure {
            structure: "a".into(),
            error: TableError::Condition { line: "if(".into() },
        });
        let kinds: Vec<bool> = d.iter().map(Diagnostic::is_structure_failure).collect();
        assert_eq!(kinds, vec![false, true]);
        assert_eq!(d.len(), 2);
    }
}
