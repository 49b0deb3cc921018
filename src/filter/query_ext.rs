// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! STAC Query extension
//!
//! The older `query` request parameter maps properties to operator objects:
//!
//! ```text
//! {"eo:cloud_cover": {"lt": 10}, "platform": {"in": ["sentinel-2a", "sentinel-2b"]}}
//! ```
//!
//! It is lowered into a [`FilterNode`] conjunction and compiled like any
//! other filter, so field mapping and the queryables gate apply unchanged.

use serde_json::Value;
use std::collections::BTreeMap;

use super::ast::{FilterNode, Literal};
use super::like::escape_like_literal;
use crate::error::CompileError;

/// Lower a query-extension object into a filter tree.
///
/// Entries are ordered by property then operator, so equal requests always
/// produce equal trees. Returns `None` for an empty object.
pub fn lower_query_extension(query: &Value) -> Result<Option<FilterNode>, CompileError> {
    let entries = query.as_object().ok_or_else(|| {
        CompileError::MalformedFilter(format!("query must be an object, got {}", query))
    })?;

    let mut clauses = Vec::new();
    for (property, ops) in entries.iter().collect::<BTreeMap<_, _>>() {
        let ops = ops.as_object().ok_or_else(|| CompileError::InvalidArgumentType {
            op: property.clone(),
            value: ops.to_string(),
        })?;
        for (op, value) in ops.iter().collect::<BTreeMap<_, _>>() {
            clauses.push(lower_one(property, op, value)?);
        }
    }

    Ok(match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(FilterNode::all(clauses)),
    })
}

fn lower_one(property: &str, op: &str, value: &Value) -> Result<FilterNode, CompileError> {
    let text = || {
        value.as_str().map(escape_like_literal).ok_or_else(|| CompileError::InvalidArgumentType {
            op: op.to_string(),
            value: value.to_string(),
        })
    };

    Ok(match op {
        "eq" => FilterNode::eq(property, Literal::from_json(op, value)?),
        "neq" => FilterNode::neq(property, Literal::from_json(op, value)?),
        "lt" => FilterNode::lt(property, Literal::from_json(op, value)?),
        "lte" => FilterNode::lte(property, Literal::from_json(op, value)?),
        "gt" => FilterNode::gt(property, Literal::from_json(op, value)?),
        "gte" => FilterNode::gte(property, Literal::from_json(op, value)?),
        "startsWith" => FilterNode::like(property, format!("{}%", text()?)),
        "endsWith" => FilterNode::like(property, format!("%{}", text()?)),
        "contains" => FilterNode::like(property, format!("%{}%", text()?)),
        "in" => {
            let list = value.as_array().ok_or_else(|| CompileError::InvalidArgumentType {
                op: op.to_string(),
                value: value.to_string(),
            })?;
            let values = list
                .iter()
                .map(|v| Literal::from_json(op, v))
                .collect::<Result<Vec<_>, _>>()?;
            FilterNode::in_list(property, values)
        }
        other => return Err(CompileError::UnknownOperator(other.to_string())),
    })
}
