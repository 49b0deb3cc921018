// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter Compilation
//!
//! Turns client filter languages into search-engine query DSL.
//!
//! # Architecture
//!
//! ```text
//! CQL2-JSON ──→ FilterNode::from_json ──┐
//!                                       ├─→ FilterCompiler ──→ bool/range/term/terms/wildcard/geo_shape
//! Query ext ──→ lower_query_extension ──┘        │
//!                                                ├─ FieldMappingTable (logical → physical)
//!                                                └─ queryables gate (optional)
//!
//! sortby ──→ compile_sortby ──→ [{"<physical>": {"order": ..}}]
//! ```
//!
//! # Example
//!
//! ```rust
//! use stac_compiler::filter::{FilterCompiler, FilterNode};
//! use stac_compiler::mapping::FieldMappingTable;
//! use serde_json::json;
//!
//! let mapping = FieldMappingTable::new();
//! let node = FilterNode::from_json(&json!({
//!     "op": "like", "args": [{"property": "id"}, "S2B_%"]
//! })).unwrap();
//!
//! let dsl = FilterCompiler::new(&mapping).compile(&node).unwrap();
//! assert_eq!(dsl, json!({"wildcard": {"id": {"value": "S2B?*", "case_insensitive": true}}}));
//! ```

mod ast;
mod compiler;
mod like;
mod query_ext;
mod sortby;

pub use ast::{
    AdvancedNode, AdvancedOp, ComparisonNode, ComparisonOp, FilterNode, Literal, LogicalNode,
    LogicalOp, SpatialNode, SpatialOp, MAX_FILTER_DEPTH,
};
pub use compiler::FilterCompiler;
pub use like::{cql2_like_to_es, escape_like_literal};
pub use query_ext::lower_query_extension;
pub use sortby::{compile_sortby, SortDirection, SortField};
