// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Compiler coordinator.
//!
//! The [`CatalogCompiler`] ties the pieces together for a host service:
//! - Field mapping table (static STAC entries plus the live dynamic layer)
//! - Queryables cache fed by schema introspection
//! - Filter, query-extension and sortby compilation
//! - Patch and merge-patch script compilation
//! - Access bitstring encoding
//!
//! # Lifecycle
//!
//! ```text
//! Created → Starting → Ready → ShuttingDown → Stopped
//! ```
//!
//! Compilation works in every state; before `start()` the queryables cache
//! simply loads on first use.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use serde_json::json;
//! use stac_compiler::{CatalogCompiler, CompilerConfig, CompilerState};
//! use stac_compiler::queryables::{IntrospectionError, SchemaIntrospector};
//!
//! struct StaticSchema;
//!
//! #[async_trait]
//! impl SchemaIntrospector for StaticSchema {
//!     async fn queryables_mapping(&self) -> Result<HashMap<String, String>, IntrospectionError> {
//!         Ok(HashMap::from([("gsd".to_string(), "properties.gsd".to_string())]))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let compiler = CatalogCompiler::new(CompilerConfig::default(), Arc::new(StaticSchema));
//! compiler.start().await;
//! assert_eq!(compiler.state(), CompilerState::Ready);
//!
//! let dsl = compiler
//!     .compile_filter(&json!({"op": "=", "args": [{"property": "collection"}, "sentinel-2"]}))
//!     .await
//!     .unwrap();
//! assert_eq!(dsl, json!({"term": {"collection": "sentinel-2"}}));
//! # }
//! ```

mod types;
mod lifecycle;
mod filter_api;
mod patch_api;

pub use types::{CompileKind, CompilerState};

use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::config::CompilerConfig;
use crate::error::CompileError;
use crate::mapping::FieldMappingTable;
use crate::metrics;
use crate::queryables::{QueryablesCache, SchemaIntrospector};

/// Facade over every compiler in the crate.
///
/// # Thread Safety
///
/// `Send + Sync`; share it behind an `Arc`. The compilers themselves are
/// pure, and the queryables cache is the only shared mutable state.
pub struct CatalogCompiler {
    pub(super) config: CompilerConfig,

    /// Logical → physical field names
    pub(super) mapping: Arc<FieldMappingTable>,

    /// Allowed queryables, refreshed from the live schema
    pub(super) queryables: QueryablesCache,

    /// Lifecycle state (broadcast to watchers)
    pub(super) state: watch::Sender<CompilerState>,

    /// Lifecycle state receiver (for internal use)
    pub(super) state_rx: watch::Receiver<CompilerState>,
}

impl CatalogCompiler {
    /// Create a compiler. Nothing is fetched until [`start`](Self::start) or first use.
    pub fn new(config: CompilerConfig, introspector: Arc<dyn SchemaIntrospector>) -> Self {
        let (state_tx, state_rx) = watch::channel(CompilerState::Created);
        let mapping = Arc::new(FieldMappingTable::new());
        let queryables = QueryablesCache::new(
            introspector,
            Arc::clone(&mapping),
            config.queryables_ttl(),
            config.validate_queryables,
        );
        metrics::set_compiler_state(CompilerState::Created.as_str());

        Self {
            config,
            mapping,
            queryables,
            state: state_tx,
            state_rx,
        }
    }

    /// Get current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CompilerState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<CompilerState> {
        self.state_rx.clone()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == CompilerState::Ready
    }

    #[must_use]
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    #[must_use]
    pub fn mapping(&self) -> &FieldMappingTable {
        &self.mapping
    }

    #[must_use]
    pub fn queryables(&self) -> &QueryablesCache {
        &self.queryables
    }

    pub(super) fn set_state(&self, state: CompilerState) {
        let _ = self.state.send(state);
        metrics::set_compiler_state(state.as_str());
    }

    /// Record the outcome of one compilation.
    pub(super) fn record<T>(&self, kind: CompileKind, result: &Result<T, CompileError>) {
        match result {
            Ok(_) => metrics::record_compilation(kind.as_str(), "success"),
            Err(e) => {
                debug!(kind = kind.as_str(), error = %e, "Compilation rejected");
                metrics::record_compile_error(kind.as_str(), e.kind());
            }
        }
    }
}
