// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Patch and access API for CatalogCompiler

use serde_json::Value;
use tracing::debug;

use crate::access::{AccessBitstring, BitstringError};
use crate::error::CompileError;
use crate::metrics;
use crate::patch::{merge_to_operations, PatchOperation, ScriptCompiler, ScriptSource};
use crate::time_compilation;

use super::{CatalogCompiler, CompileKind};

impl CatalogCompiler {
    /// Compile a JSON Patch into one update script.
    #[tracing::instrument(skip(self, operations), fields(operations = operations.len()))]
    pub fn compile_patch(&self, operations: &[PatchOperation]) -> Result<ScriptSource, CompileError> {
        let _timer = time_compilation!(CompileKind::Patch.as_str());
        let result = self.script_compiler(false).compile(operations);
        self.finish_script(CompileKind::Patch, operations.len(), &result);
        result
    }

    /// Flatten a merge patch and compile it into one update script.
    pub fn compile_merge_patch(&self, patch: &Value) -> Result<ScriptSource, CompileError> {
        let _timer = time_compilation!(CompileKind::MergePatch.as_str());
        let result = merge_to_operations(patch).and_then(|operations| {
            let script = self
                .script_compiler(self.config.create_nest_on_merge)
                .compile(&operations);
            self.finish_script(CompileKind::MergePatch, operations.len(), &script);
            script
        });
        if result.is_err() {
            self.record(CompileKind::MergePatch, &result);
        }
        result
    }

    /// Access bitstring for a new document at the configured width.
    pub fn encode_access<S: AsRef<str>>(
        &self,
        owner: Option<&str>,
        groups: &[S],
        is_public: bool,
    ) -> Result<AccessBitstring, BitstringError> {
        AccessBitstring::encode(self.config.access_bitstring_size, owner, groups, is_public)
    }

    fn script_compiler(&self, create_nest: bool) -> ScriptCompiler {
        ScriptCompiler::new()
            .with_lang(self.config.script_lang.clone())
            .create_nest(create_nest)
    }

    fn finish_script(
        &self,
        kind: CompileKind,
        operations: usize,
        result: &Result<ScriptSource, CompileError>,
    ) {
        if let Ok(script) = result {
            metrics::record_script_instructions(script.stats.emitted, script.stats.kept);
            debug!(
                kind = kind.as_str(),
                operations,
                instructions = script.stats.kept,
                deduplicated = script.stats.emitted - script.stats.kept,
                "Compiled update script"
            );
        }
        self.record(kind, result);
    }
}
