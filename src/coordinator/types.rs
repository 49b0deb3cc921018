// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the compiler coordinator.

/// Compiler lifecycle state.
///
/// Use [`super::CatalogCompiler::state()`] to check current state or
/// [`super::CatalogCompiler::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerState {
    /// Just created, not yet started
    Created,
    /// Warming the queryables cache
    Starting,
    /// Serving compilations
    Ready,
    /// Graceful shutdown in progress
    ShuttingDown,
    /// Cached state dropped
    Stopped,
}

impl CompilerState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Starting => "Starting",
            Self::Ready => "Ready",
            Self::ShuttingDown => "ShuttingDown",
            Self::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for CompilerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which compiler produced an artifact; used as the metrics `kind` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileKind {
    Filter,
    Query,
    Sortby,
    Patch,
    MergePatch,
}

impl CompileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Query => "query",
            Self::Sortby => "sortby",
            Self::Patch => "patch",
            Self::MergePatch => "merge_patch",
        }
    }
}
