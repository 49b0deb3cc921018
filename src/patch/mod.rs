// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Patch Compilation
//!
//! Turns RFC 6902 JSON Patch and RFC 7396 merge patch documents into a
//! single guarded update script.
//!
//! # Architecture
//!
//! ```text
//! merge patch ──→ merge_to_operations ──┐
//!                                       ├─→ ScriptCompiler ──→ ScriptSource { source, lang, params }
//! JSON Patch ─────────────────────────────┘        │
//!                                                ├─ ElasticPath::resolve (pointer → accessor)
//!                                                ├─ existence guards before every mutation
//!                                                └─ guard dedup + accessor normalization
//! ```
//!
//! # Example
//!
//! ```rust
//! use stac_compiler::patch::{PatchOperation, ScriptCompiler};
//! use serde_json::json;
//!
//! let script = ScriptCompiler::new()
//!     .compile(&[PatchOperation::add("/properties/eo:cloud_cover", json!(10))])
//!     .unwrap();
//!
//! assert!(script.source.contains("ctx._source.properties['eo:cloud_cover']"));
//! assert_eq!(script.params["properties_eo_cloud_cover_0"], json!(10));
//! ```

mod operation;
mod path;
mod script;

pub use operation::{escape_pointer_segment, merge_to_operations, PatchOp, PatchOperation};
pub use path::{
    normalize_accessors, render_segment, unescape_pointer_segment, ArrayIndex, ElasticPath,
    Segment, SOURCE_ROOT,
};
pub use script::{ScriptCompiler, ScriptSource, ScriptStats, DEFAULT_SCRIPT_LANG};
