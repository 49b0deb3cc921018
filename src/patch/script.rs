// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Patch Script Compiler
//!
//! Folds patch operations, in input order, into one update script.
//!
//! # Instruction layout per operation
//!
//! ```text
//! 1. guards for `from` (copy/move): every ancestor, then the leaf
//! 2. guards for `path`: every ancestor, then the leaf (remove/replace/test)
//! 3. the mutation or assertion
//! ```
//!
//! Guards abort through `Debug.explain(..)` with a reason the execution
//! layer classifies via [`PatchFailure::from_explain`](crate::PatchFailure::from_explain).
//! Values never appear in the source text; they are bound as
//! `params.<variable_name>_<op index>`.
//!
//! A guard shared by several operations under the same container is emitted
//! once. Mutations are always kept, and any removal forgets the guards seen
//! so far, since indices shift and keys disappear.

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::{Map, Value};

use super::operation::{PatchOp, PatchOperation};
use super::path::{normalize_accessors, quote, render_chain, render_segment, ArrayIndex, ElasticPath, Segment};
use crate::error::{CompileError, EXISTENCE_FAILURE_PREFIX, TEST_FAILURE_PREFIX};

/// Default script language.
pub const DEFAULT_SCRIPT_LANG: &str = "painless";

/// Compiled update script.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptSource {
    pub source: String,
    pub lang: String,
    pub params: Map<String, Value>,
    #[serde(skip)]
    pub stats: ScriptStats,
}

impl ScriptSource {
    /// Instructions in execution order.
    pub fn instructions(&self) -> impl Iterator<Item = &str> {
        self.source.lines()
    }
}

/// Instruction counts before and after deduplication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptStats {
    pub emitted: usize,
    pub kept: usize,
}

#[derive(Default)]
struct InstructionSet {
    items: Vec<String>,
    guards: IndexSet<String>,
    emitted: usize,
}

impl InstructionSet {
    /// Existence check or nest creation; skipped when already in force.
    fn guard(&mut self, instruction: String) {
        self.emitted += 1;
        let instruction = normalize_accessors(&instruction);
        if self.guards.insert(instruction.clone()) {
            self.items.push(instruction);
        }
    }

    fn push(&mut self, instruction: String) {
        self.emitted += 1;
        self.items.push(normalize_accessors(&instruction));
    }

    /// Mutation that may delete a key or shift list positions.
    fn push_removal(&mut self, instruction: String) {
        self.push(instruction);
        self.guards.clear();
    }
}

/// JSON Patch → update script compiler
#[derive(Debug, Clone)]
pub struct ScriptCompiler {
    lang: String,
    create_nest: bool,
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self {
            lang: DEFAULT_SCRIPT_LANG.to_string(),
            create_nest: false,
        }
    }
}

impl ScriptCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    /// Create missing intermediate objects for `add` instead of aborting.
    pub fn create_nest(mut self, enabled: bool) -> Self {
        self.create_nest = enabled;
        self
    }

    /// Compile operations into a single script.
    ///
    /// Fails on the first invalid operation; no partial script is returned.
    pub fn compile(&self, operations: &[PatchOperation]) -> Result<ScriptSource, CompileError> {
        let mut out = InstructionSet::default();
        let mut params = Map::new();

        for (index, operation) in operations.iter().enumerate() {
            self.compile_operation(index, operation, &mut out, &mut params)?;
        }

        let stats = ScriptStats {
            emitted: out.emitted,
            kept: out.items.len(),
        };

        Ok(ScriptSource {
            source: out.items.join("\n"),
            lang: self.lang.clone(),
            params,
            stats,
        })
    }

    fn compile_operation(
        &self,
        index: usize,
        operation: &PatchOperation,
        out: &mut InstructionSet,
        params: &mut Map<String, Value>,
    ) -> Result<(), CompileError> {
        operation.validate()?;
        let target = ElasticPath::resolve(&operation.path)?;

        if target.is_append() && operation.op.requires_existing_target() {
            return Err(CompileError::invalid_path(
                &operation.path,
                format!("'-' is not a valid {} target", operation.op.as_str()),
            ));
        }

        let source = match (operation.op, operation.from.as_deref()) {
            (PatchOp::Copy | PatchOp::Move, Some(from)) => Some(resolve_source(from)?),
            _ => None,
        };

        if let Some(from) = &source {
            if operation.op == PatchOp::Move
                && target.is_within(from)
                && target.segments.len() > from.segments.len()
            {
                return Err(CompileError::invalid_path(
                    &operation.path,
                    "cannot move a value into one of its own children",
                ));
            }
            ancestor_guards(from, false, out);
            out.guard(existence_guard(&from.es_nest, &from.key, &from.pointer));
        }

        ancestor_guards(&target, self.create_nest && operation.op == PatchOp::Add, out);
        if operation.op.requires_existing_target() {
            out.guard(existence_guard(&target.es_nest, &target.key, &target.pointer));
        } else if let Segment::Index(index) = &target.key {
            // add, copy and move insert into a list
            out.guard(bounds_guard(&target.es_nest, *index, &target.pointer));
        }

        match (operation.op, source) {
            (PatchOp::Add | PatchOp::Replace, _) => {
                let param = bind_param(index, &target, operation, params);
                out.push(assignment(&target, operation.op, &param));
            }
            (PatchOp::Remove, _) => out.push_removal(format!("{};", removal(&target))),
            (PatchOp::Test, _) => {
                let param = bind_param(index, &target, operation, params);
                out.push(assertion(&target, &param));
            }
            (PatchOp::Copy, Some(from)) => {
                out.push(assignment(&target, PatchOp::Add, &from.es_path));
            }
            (PatchOp::Move, Some(from)) => {
                let binding = format!("{}_{}", from.variable_name, index);
                out.push_removal(format!("def {} = {};", binding, removal(&from)));
                out.push(assignment(&target, PatchOp::Add, &binding));
            }
            (PatchOp::Copy | PatchOp::Move, None) => {
                return Err(CompileError::MissingOperand {
                    op: operation.op.as_str().to_string(),
                    operand: "from",
                })
            }
        }
        Ok(())
    }
}

fn resolve_source(from: &str) -> Result<ElasticPath, CompileError> {
    let path = ElasticPath::resolve(from)?;
    if path.is_append() {
        return Err(CompileError::invalid_path(from, "'-' is not a valid source"));
    }
    Ok(path)
}

fn bind_param(
    index: usize,
    target: &ElasticPath,
    operation: &PatchOperation,
    params: &mut Map<String, Value>,
) -> String {
    let name = format!("{}_{}", target.variable_name, index);
    params.insert(name.clone(), operation.value.clone().unwrap_or(Value::Null));
    format!("params.{}", name)
}

// ═══════════════════════════════════════════════════════════════════════════
// Guards
// ═══════════════════════════════════════════════════════════════════════════

/// Predicate that holds when `segment` exists inside `container`.
fn contains(container: &str, segment: &Segment) -> String {
    match segment {
        Segment::Key(key) => format!("{}.containsKey({})", container, quote(key)),
        Segment::Index(ArrayIndex::Position(n)) => format!(
            "({c} instanceof List ? {c}.size() > {n} : {c}.containsKey('{n}'))",
            c = container,
            n = n
        ),
        Segment::Index(ArrayIndex::FromEnd(n)) => format!(
            "({c} instanceof List && {c}.size() >= {n})",
            c = container,
            n = n
        ),
        Segment::Index(ArrayIndex::Append) => format!("({} instanceof List)", container),
    }
}

/// Fails when inserting at `index` would fall outside the list.
fn bounds_guard(container: &str, index: ArrayIndex, pointer: &str) -> String {
    let insertable = match index {
        ArrayIndex::Position(n) => format!(
            "(!({c} instanceof List) || {c}.size() >= {n})",
            c = container,
            n = n
        ),
        other => contains(container, &Segment::Index(other)),
    };
    format!(
        "if (!{}) {{ Debug.explain({}); }}",
        insertable,
        quote(&format!("{}{}", EXISTENCE_FAILURE_PREFIX, pointer))
    )
}

fn existence_guard(container: &str, segment: &Segment, pointer: &str) -> String {
    format!(
        "if (!{}) {{ Debug.explain({}); }}",
        contains(container, segment),
        quote(&format!("{}{}", EXISTENCE_FAILURE_PREFIX, pointer))
    )
}

/// One guard (or nest creation) per ancestor container, outermost first.
fn ancestor_guards(path: &ElasticPath, create_nest: bool, out: &mut InstructionSet) {
    let parents = path.parents();
    for depth in 0..parents.len() {
        let container = render_chain(&parents[..depth]);
        let segment = &parents[depth];
        match segment {
            Segment::Key(key) if create_nest => out.guard(format!(
                "if (!{}.containsKey({})) {{ {} = new HashMap(); }}",
                container,
                quote(key),
                render_segment(&container, segment)
            )),
            _ => out.guard(existence_guard(
                &container,
                segment,
                &path.pointer_prefix(depth + 1),
            )),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Mutations
// ═══════════════════════════════════════════════════════════════════════════

fn assignment(target: &ElasticPath, op: PatchOp, value: &str) -> String {
    let method = if op == PatchOp::Replace { "set" } else { "add" };
    let nest = &target.es_nest;
    match &target.key {
        Segment::Key(_) => format!("{} = {};", target.es_path, value),
        Segment::Index(ArrayIndex::Position(n)) => format!(
            "if ({nest} instanceof List) {{ {nest}.{method}({n}, {value}); }} else {{ {nest}['{n}'] = {value}; }}",
            nest = nest,
            method = method,
            n = n,
            value = value
        ),
        Segment::Index(_) => format!("{}.{}({}, {});", nest, method, target.es_key, value),
    }
}

/// Expression removing the target and evaluating to the removed value.
fn removal(target: &ElasticPath) -> String {
    let nest = &target.es_nest;
    match &target.key {
        Segment::Index(ArrayIndex::Position(n)) => format!(
            "({nest} instanceof List ? {nest}.remove({n}) : {nest}.remove('{n}'))",
            nest = nest,
            n = n
        ),
        _ => format!("{}.remove({})", nest, target.es_key),
    }
}

fn assertion(target: &ElasticPath, param: &str) -> String {
    let expected = quote(&format!("{}{}: expected ", TEST_FAILURE_PREFIX, target.pointer));
    format!(
        "if ({path} != {param}) {{ Debug.explain({expected} + {param} + ' but found ' + {path}); }}",
        path = target.es_path,
        param = param,
        expected = expected
    )
}
