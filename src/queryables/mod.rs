// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Queryables: the set of logical field names a catalog lets clients filter
//! and sort on.
//!
//! # Architecture
//!
//! ```text
//! validate(fields) / get_all()
//!       │
//!       ├─→ Disabled? → empty set / no-op (introspection never called)
//!       │
//!       ├─→ Fresh snapshot? → serve it
//!       │
//!       └─→ Stale?
//!              ├─→ refresh already running → serve prior snapshot
//!              └─→ take refresh lock → SchemaIntrospector → swap snapshot
//!                                                   └─→ FieldMappingTable dynamic layer
//! ```

mod cache;

pub use cache::{QueryablesCache, QueryablesCacheStats};

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Failure of the external schema introspection call.
#[derive(Error, Debug, Clone)]
pub enum IntrospectionError {
    #[error("Schema backend unavailable: {0}")]
    Unavailable(String),
    #[error("Schema introspection timed out")]
    Timeout,
    #[error("Unexpected schema shape: {0}")]
    InvalidSchema(String),
}

/// Live schema introspection against the document store.
///
/// Returns `{logical_field_name: physical_path}` for every field the
/// catalog exposes. Timeouts and retries are the implementor's concern.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    async fn queryables_mapping(&self) -> Result<HashMap<String, String>, IntrospectionError>;
}
