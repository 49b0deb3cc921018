// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter API for CatalogCompiler
//!
//! # Architecture
//!
//! ```text
//! compile_filter(json)
//!       │
//!       ├─→ FilterNode::from_json (shape + literal validation)
//!       │
//!       ├─→ Queryables gate (when enabled)
//!       │        │
//!       │        └─→ Unknown fields? InvalidField listing all of them
//!       │
//!       └─→ FilterCompiler (mapping table → query DSL)
//! ```

use serde_json::Value;
use tracing::debug;

use crate::error::CompileError;
use crate::filter::{compile_sortby, lower_query_extension, FilterCompiler, FilterNode, SortField};
use crate::time_compilation;

use super::{CatalogCompiler, CompileKind};

impl CatalogCompiler {
    /// Compile a CQL2-JSON filter into query DSL.
    #[tracing::instrument(skip(self, filter))]
    pub async fn compile_filter(&self, filter: &Value) -> Result<Value, CompileError> {
        let _timer = time_compilation!(CompileKind::Filter.as_str());
        let result = match FilterNode::from_json(filter) {
            Ok(node) => self.gated_compile(&node).await,
            Err(e) => Err(e),
        };
        self.record(CompileKind::Filter, &result);
        result
    }

    /// Compile an already-built filter tree.
    pub async fn compile_filter_node(&self, node: &FilterNode) -> Result<Value, CompileError> {
        let _timer = time_compilation!(CompileKind::Filter.as_str());
        let result = self.gated_compile(node).await;
        self.record(CompileKind::Filter, &result);
        result
    }

    /// Compile a STAC query-extension object. `None` when it has no entries.
    pub async fn compile_query_extension(&self, query: &Value) -> Result<Option<Value>, CompileError> {
        let _timer = time_compilation!(CompileKind::Query.as_str());
        let result = match lower_query_extension(query) {
            Ok(Some(node)) => self.gated_compile(&node).await.map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        self.record(CompileKind::Query, &result);
        result
    }

    /// Compile sortby entries into sort clauses.
    pub async fn compile_sortby(&self, fields: &[SortField]) -> Result<Value, CompileError> {
        let _timer = time_compilation!(CompileKind::Sortby.as_str());
        let result = match self
            .queryables
            .validate(fields.iter().map(|f| f.field.as_str()))
            .await
        {
            Ok(()) => compile_sortby(fields, &self.mapping),
            Err(e) => Err(e),
        };
        self.record(CompileKind::Sortby, &result);
        result
    }

    async fn gated_compile(&self, node: &FilterNode) -> Result<Value, CompileError> {
        let properties = node.properties();
        self.queryables.validate(&properties).await?;
        debug!(properties = properties.len(), "Compiling filter");

        let mut compiler = FilterCompiler::new(&self.mapping);
        if !self.config.like_case_insensitive {
            compiler = compiler.case_sensitive_like();
        }
        compiler.compile(node)
    }
}
