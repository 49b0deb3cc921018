// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for the compilers.
//!
//! [`CompileError`] covers everything that can go wrong while turning a
//! request into a backend artifact. All of it is fatal to the request and is
//! raised before any artifact is produced.
//!
//! [`PatchFailure`] covers the two ways a *compiled* patch script aborts once
//! the store executes it. The compiler never sees these directly; the
//! execution layer gets an explain reason back from the store and classifies
//! it with [`PatchFailure::from_explain`].

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Invalid escape sequence in LIKE pattern '{pattern}' at position {position}")]
    InvalidEscapeSequence { pattern: String, position: usize },

    #[error("Invalid argument type for '{op}': {value}")]
    InvalidArgumentType { op: String, value: String },

    #[error("Invalid query fields: {}. These fields are not defined in the catalog queryables.", fields.join(", "))]
    InvalidField { fields: Vec<String> },

    #[error("Unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{op}' expects {expected} argument(s), got {actual}")]
    InvalidArity {
        op: String,
        expected: String,
        actual: usize,
    },

    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    #[error("Invalid {kind} literal: {value}")]
    InvalidLiteral { kind: &'static str, value: String },

    #[error("Invalid patch path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Operation '{op}' requires '{operand}'")]
    MissingOperand { op: String, operand: &'static str },

    #[error("Invalid sort direction '{0}', expected 'asc' or 'desc'")]
    InvalidDirection(String),
}

impl CompileError {
    /// Build an [`CompileError::InvalidField`] with offenders sorted and deduplicated.
    pub fn invalid_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        fields.sort();
        fields.dedup();
        Self::InvalidField { fields }
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidEscapeSequence { .. } => "invalid_escape_sequence",
            Self::InvalidArgumentType { .. } => "invalid_argument_type",
            Self::InvalidField { .. } => "invalid_field",
            Self::UnknownOperator(_) => "unknown_operator",
            Self::InvalidArity { .. } => "invalid_arity",
            Self::MalformedFilter(_) => "malformed_filter",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::InvalidPath { .. } => "invalid_path",
            Self::MissingOperand { .. } => "missing_operand",
            Self::InvalidDirection(_) => "invalid_direction",
        }
    }
}

/// Prefix of every explain reason emitted by an existence guard.
pub const EXISTENCE_FAILURE_PREFIX: &str = "Path does not exist: ";
/// Prefix of every explain reason emitted by a `test` assertion.
pub const TEST_FAILURE_PREFIX: &str = "Test failed at ";

/// Runtime abort raised by a compiled patch script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchFailure {
    #[error("Patch target does not exist: {path}")]
    PathExistence { path: String },

    #[error("Patch test assertion failed at {path}: {detail}")]
    TestAssertion { path: String, detail: String },
}

impl PatchFailure {
    /// Classify the explain reason the store returns for an aborted script.
    ///
    /// Returns `None` for reasons the compiler did not generate.
    pub fn from_explain(reason: &str) -> Option<Self> {
        let reason = reason.trim();
        if let Some(path) = reason.strip_prefix(EXISTENCE_FAILURE_PREFIX) {
            return Some(Self::PathExistence {
                path: path.to_string(),
            });
        }
        let rest = reason.strip_prefix(TEST_FAILURE_PREFIX)?;
        let (path, detail) = rest.split_once(": ").unwrap_or((rest, ""));
        Some(Self::TestAssertion {
            path: path.to_string(),
            detail: detail.to_string(),
        })
    }
}
