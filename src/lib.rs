// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # STAC Compiler
//!
//! Compilers for a STAC catalog search backend: client filters become
//! search-engine query DSL, client patches become guarded update scripts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Request inputs                         │
//! │  • CQL2-JSON filter, query extension, sortby               │
//! │  • JSON Patch / merge patch                                │
//! │  • Document owner and groups                               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Field Mapping Table                      │
//! │  • Static STAC entries (datetime → properties.datetime)    │
//! │  • Dynamic layer fed by the queryables cache               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼────────────────────┐
//!          ▼                   ▼                    ▼
//! ┌────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//! │ FilterCompiler │  │ ScriptCompiler  │  │ AccessBitstring │
//! │ → query DSL    │  │ → update script │  │ → "0101…1"      │
//! └────────────────┘  └─────────────────┘  └─────────────────┘
//!          ▲
//!          │ allowed fields
//! ┌────────────────────────────────────────────────────────────┐
//! │                     Queryables Cache                        │
//! │  • TTL snapshot of live schema fields                      │
//! │  • Single in-flight refresh, stale reads while refreshing  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use stac_compiler::filter::{FilterCompiler, FilterNode};
//! use stac_compiler::mapping::FieldMappingTable;
//! use stac_compiler::patch::{merge_to_operations, ScriptCompiler};
//! use serde_json::json;
//!
//! let mapping = FieldMappingTable::new();
//! let filter = FilterNode::lt("cloud_cover", 10).and(FilterNode::eq("collection", "sentinel-2"));
//! let dsl = FilterCompiler::new(&mapping).compile(&filter).unwrap();
//! assert_eq!(dsl, json!({"bool": {"filter": [
//!     {"range": {"properties.eo:cloud_cover": {"lt": 10}}},
//!     {"term": {"collection": "sentinel-2"}}
//! ]}}));
//!
//! let ops = merge_to_operations(&json!({"properties": {"gsd": 10}})).unwrap();
//! let script = ScriptCompiler::new().compile(&ops).unwrap();
//! assert!(script.source.contains("ctx._source.properties.gsd = params.properties_gsd_0;"));
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: [`CatalogCompiler`] facade with lifecycle and metrics
//! - [`filter`]: CQL2 AST, filter compiler, query extension, sortby
//! - [`patch`]: JSON Patch / merge patch → update script
//! - [`queryables`]: Queryables cache and the schema introspection seam
//! - [`mapping`]: Logical → physical field names
//! - [`access`]: Per-document access bitstring

pub mod access;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod filter;
pub mod mapping;
pub mod metrics;
pub mod patch;
pub mod queryables;

pub use access::{AccessBitstring, BitstringError};
pub use config::CompilerConfig;
pub use coordinator::{CatalogCompiler, CompileKind, CompilerState};
pub use error::{CompileError, PatchFailure};
pub use filter::{FilterCompiler, FilterNode, Literal, SortField};
pub use mapping::FieldMappingTable;
pub use metrics::LatencyTimer;
pub use patch::{PatchOperation, ScriptCompiler, ScriptSource};
pub use queryables::{IntrospectionError, QueryablesCache, SchemaIntrospector};
