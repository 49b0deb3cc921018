// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Compiler lifecycle management: start and shutdown.

use std::time::Instant;
use tracing::{debug, info, warn};

use super::{CatalogCompiler, CompilerState};

impl CatalogCompiler {
    /// Start the compiler.
    ///
    /// Warms the queryables cache when validation is enabled. A failed warm-up
    /// is logged and the cache retries on first use.
    #[tracing::instrument(skip(self), fields(validate_queryables = self.config.validate_queryables))]
    pub async fn start(&self) {
        if matches!(self.state(), CompilerState::Starting | CompilerState::Ready) {
            debug!(state = %self.state(), "Compiler already started");
            return;
        }

        let start = Instant::now();
        info!("Starting catalog compiler...");
        self.set_state(CompilerState::Starting);

        if self.queryables.is_enabled() {
            self.queryables.warm().await;
            let stats = self.queryables.stats();
            if stats.age.is_none() {
                warn!("Queryables warm-up failed; cache will load on first use");
            } else {
                info!(fields = stats.field_count, "Queryables cache warmed");
            }
        }

        self.set_state(CompilerState::Ready);
        info!(elapsed_ms = start.elapsed().as_millis() as u64, "Catalog compiler ready");
    }

    /// Shut down: drop the queryables snapshot and dynamic field mappings.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        info!("Initiating catalog compiler shutdown...");
        self.set_state(CompilerState::ShuttingDown);

        self.queryables.clear();

        self.set_state(CompilerState::Stopped);
        info!("Catalog compiler shutdown complete");
    }
}
