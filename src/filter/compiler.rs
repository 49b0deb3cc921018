// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter Compiler
//!
//! Lowers a [`FilterNode`] tree into search-engine query DSL.
//!
//! # Generated DSL
//!
//! ```text
//! AND(a, b)              {"bool": {"filter": [a, b]}}
//! OR(a, b)               {"bool": {"should": [a, b], "minimum_should_match": 1}}
//! NOT(a)                 {"bool": {"must_not": [a]}}
//! x = v                  {"term": {"x": v}}
//! x <> v                 {"bool": {"must_not": [{"term": {"x": v}}]}}
//! x = TIMESTAMP(t)       {"range": {"x": {"gte": t, "lte": t}}}
//! x < v                  {"range": {"x": {"lt": v}}}
//! x IS NULL              {"bool": {"must_not": {"exists": {"field": "x"}}}}
//! x BETWEEN a AND b      {"range": {"x": {"gte": a, "lte": b}}}
//! x IN (a, b)            {"terms": {"x": [a, b]}}
//! x LIKE 'S2%'           {"wildcard": {"x": {"value": "S2*", "case_insensitive": true}}}
//! S_INTERSECTS(x, g)     {"geo_shape": {"x": {"shape": g, "relation": "intersects"}}}
//! ```
//!
//! Zero-width ranges stand in for equality on temporal literals so that
//! date-typed fields compare the same way on every backend. On a field
//! stored with reduced date precision this matches the whole stored unit
//! rather than the exact instant.

use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::ast::{AdvancedNode, ComparisonNode, ComparisonOp, FilterNode, Literal, LogicalNode, LogicalOp, SpatialNode};
use super::like::cql2_like_to_es;
use crate::error::CompileError;
use crate::mapping::{strip_properties_prefix, FieldMappingTable};

/// Filter to query DSL compiler.
///
/// Pure over the tree and the mapping table; cheap to build per request.
pub struct FilterCompiler<'a> {
    mapping: &'a FieldMappingTable,
    allowed: Option<Arc<HashSet<String>>>,
    case_insensitive: bool,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(mapping: &'a FieldMappingTable) -> Self {
        Self {
            mapping,
            allowed: None,
            case_insensitive: true,
        }
    }

    /// Gate every property reference on this allowed set.
    pub fn with_queryables(mut self, allowed: Arc<HashSet<String>>) -> Self {
        self.allowed = Some(allowed);
        self
    }

    /// Emit case-sensitive wildcards for LIKE.
    pub fn case_sensitive_like(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Compile a filter tree into a query DSL object.
    ///
    /// With a queryables gate set, every unknown property is reported in one
    /// [`CompileError::InvalidField`] before anything is emitted.
    pub fn compile(&self, node: &FilterNode) -> Result<Value, CompileError> {
        if let Some(allowed) = &self.allowed {
            let invalid: Vec<String> = node
                .properties()
                .into_iter()
                .filter(|p| !allowed.contains(strip_properties_prefix(p)))
                .collect();
            if !invalid.is_empty() {
                debug!(invalid = ?invalid, "Filter references non-queryable fields");
                return Err(CompileError::invalid_fields(invalid));
            }
        }

        self.compile_node(node)
    }

    fn compile_node(&self, node: &FilterNode) -> Result<Value, CompileError> {
        match node {
            FilterNode::Logical(logical) => self.compile_logical(logical),
            FilterNode::Comparison(comparison) => self.compile_comparison(comparison),
            FilterNode::Advanced(advanced) => self.compile_advanced(advanced),
            FilterNode::Spatial(spatial) => Ok(self.compile_spatial(spatial)),
        }
    }

    fn compile_logical(&self, node: &LogicalNode) -> Result<Value, CompileError> {
        if node.children.is_empty() {
            return Err(CompileError::InvalidArity {
                op: format!("{:?}", node.op).to_lowercase(),
                expected: "at least 1".into(),
                actual: 0,
            });
        }

        let clauses = node
            .children
            .iter()
            .map(|child| self.compile_node(child))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match node.op {
            LogicalOp::And => json!({"bool": {"filter": clauses}}),
            LogicalOp::Or => json!({"bool": {"should": clauses, "minimum_should_match": 1}}),
            LogicalOp::Not => json!({"bool": {"must_not": clauses}}),
        })
    }

    fn compile_comparison(&self, node: &ComparisonNode) -> Result<Value, CompileError> {
        let field = self.mapping.resolve(&node.property);

        let literal = match (&node.op, &node.literal) {
            (ComparisonOp::IsNull, _) => {
                return Ok(json!({"bool": {"must_not": {"exists": {"field": field}}}}));
            }
            (op, None) => {
                return Err(CompileError::InvalidArity {
                    op: format!("{:?}", op).to_lowercase(),
                    expected: "2".into(),
                    actual: 1,
                });
            }
            (_, Some(literal)) => literal,
        };
        let value = literal.to_value();

        Ok(match node.op {
            ComparisonOp::Eq if literal.is_temporal() => range(&field, json!({"gte": value, "lte": value})),
            ComparisonOp::Eq => term(&field, value),
            ComparisonOp::Neq if literal.is_temporal() => {
                must_not(range(&field, json!({"gte": value, "lte": value})))
            }
            ComparisonOp::Neq => must_not(term(&field, value)),
            ComparisonOp::Lt => range(&field, json!({"lt": value})),
            ComparisonOp::Lte => range(&field, json!({"lte": value})),
            ComparisonOp::Gt => range(&field, json!({"gt": value})),
            ComparisonOp::Gte => range(&field, json!({"gte": value})),
            ComparisonOp::IsNull => json!({"bool": {"must_not": {"exists": {"field": field}}}}),
        })
    }

    fn compile_advanced(&self, node: &AdvancedNode) -> Result<Value, CompileError> {
        let field = self.mapping.resolve(node.property());

        Ok(match node {
            AdvancedNode::Like { pattern, .. } => {
                let wildcard = cql2_like_to_es(pattern)?;
                json!({"wildcard": {field: {"value": wildcard, "case_insensitive": self.case_insensitive}}})
            }
            AdvancedNode::Between { lower, upper, .. } => {
                range(&field, json!({"gte": lower.to_value(), "lte": upper.to_value()}))
            }
            AdvancedNode::In { values, .. } => {
                let values: Vec<Value> = values.iter().map(Literal::to_value).collect();
                json!({"terms": {field: values}})
            }
        })
    }

    fn compile_spatial(&self, node: &SpatialNode) -> Value {
        let field = self.mapping.resolve(&node.property);
        json!({
            "geo_shape": {
                field: {
                    "shape": node.geometry,
                    "relation": node.op.relation(),
                }
            }
        })
    }
}

fn term(field: &str, value: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), value);
    json!({"term": inner})
}

fn range(field: &str, bounds: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), bounds);
    json!({"range": inner})
}

fn must_not(clause: Value) -> Value {
    json!({"bool": {"must_not": [clause]}})
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(node: &FilterNode) -> Result<Value, CompileError> {
        let mapping = FieldMappingTable::new();
        FilterCompiler::new(&mapping).compile(node)
    }

    fn allowed(fields: &[&str]) -> Arc<HashSet<String>> {
        Arc::new(fields.iter().map(|f| f.to_string()).collect())
    }

    #[test]
    fn test_eq_term() {
        let dsl = compile(&FilterNode::eq("collection", "sentinel-2")).unwrap();
        assert_eq!(dsl, json!({"term": {"collection": "sentinel-2"}}));
    }

    #[test]
    fn test_neq_negated_term() {
        let dsl = compile(&FilterNode::neq("id", "a")).unwrap();
        assert_eq!(dsl, json!({"bool": {"must_not": [{"term": {"id": "a"}}]}}));
    }

    #[test]
    fn test_eq_timestamp_zero_width_range() {
        let ts = Literal::Timestamp("2024-06-01T00:00:00Z".into());
        let dsl = compile(&FilterNode::eq("datetime", ts.clone())).unwrap();
        assert_eq!(
            dsl,
            json!({"range": {"properties.datetime": {
                "gte": "2024-06-01T00:00:00Z", "lte": "2024-06-01T00:00:00Z"
            }}})
        );

        let dsl = compile(&FilterNode::neq("datetime", ts)).unwrap();
        assert_eq!(
            dsl,
            json!({"bool": {"must_not": [{"range": {"properties.datetime": {
                "gte": "2024-06-01T00:00:00Z", "lte": "2024-06-01T00:00:00Z"
            }}}]}})
        );
    }

    #[test]
    fn test_plain_string_eq_stays_term() {
        // Untagged strings are never treated as dates
        let dsl = compile(&FilterNode::eq("datetime", "2024-06-01T00:00:00Z")).unwrap();
        assert_eq!(dsl, json!({"term": {"properties.datetime": "2024-06-01T00:00:00Z"}}));
    }

    #[test]
    fn test_range_operators() {
        let cases = [
            (FilterNode::lt("cloud_cover", 10), "lt"),
            (FilterNode::lte("cloud_cover", 10), "lte"),
            (FilterNode::gt("cloud_cover", 10), "gt"),
            (FilterNode::gte("cloud_cover", 10), "gte"),
        ];
        for (node, op) in cases {
            let dsl = compile(&node).unwrap();
            assert_eq!(dsl, json!({"range": {"properties.eo:cloud_cover": {op: 10}}}));
        }
    }

    #[test]
    fn test_is_null_is_absence() {
        let dsl = compile(&FilterNode::is_null("updated")).unwrap();
        assert_eq!(
            dsl,
            json!({"bool": {"must_not": {"exists": {"field": "properties.updated"}}}})
        );
    }

    #[test]
    fn test_between_with_timestamps() {
        let node = FilterNode::between(
            "datetime",
            Literal::Timestamp("2024-01-01T00:00:00Z".into()),
            Literal::Timestamp("2024-12-31T23:59:59Z".into()),
        );
        let dsl = compile(&node).unwrap();
        assert_eq!(
            dsl,
            json!({"range": {"properties.datetime": {
                "gte": "2024-01-01T00:00:00Z", "lte": "2024-12-31T23:59:59Z"
            }}})
        );
    }

    #[test]
    fn test_in_terms() {
        let node = FilterNode::in_list("collection", vec!["a".into(), "b".into()]);
        assert_eq!(compile(&node).unwrap(), json!({"terms": {"collection": ["a", "b"]}}));
    }

    #[test]
    fn test_like_wildcard() {
        let dsl = compile(&FilterNode::like("id", "S2A_%")).unwrap();
        assert_eq!(
            dsl,
            json!({"wildcard": {"id": {"value": "S2A?*", "case_insensitive": true}}})
        );

        let mapping = FieldMappingTable::new();
        let dsl = FilterCompiler::new(&mapping)
            .case_sensitive_like()
            .compile(&FilterNode::like("id", "x%"))
            .unwrap();
        assert_eq!(dsl["wildcard"]["id"]["case_insensitive"], json!(false));
    }

    #[test]
    fn test_like_bad_escape_fails_whole_tree() {
        let node = FilterNode::eq("id", "a").and(FilterNode::like("id", "oops\\q"));
        assert!(matches!(
            compile(&node),
            Err(CompileError::InvalidEscapeSequence { .. })
        ));
    }

    #[test]
    fn test_spatial_passthrough() {
        let geometry = json!({"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]});
        let dsl = compile(&FilterNode::intersects("geometry", geometry.clone())).unwrap();
        assert_eq!(
            dsl,
            json!({"geo_shape": {"geometry": {"shape": geometry, "relation": "intersects"}}})
        );
    }

    #[test]
    fn test_logical_nesting() {
        let node = FilterNode::eq("collection", "c1")
            .or(FilterNode::eq("collection", "c2"))
            .and(FilterNode::lt("cloud_cover", 5).negate());
        let dsl = compile(&node).unwrap();
        assert_eq!(
            dsl,
            json!({"bool": {"filter": [
                {"bool": {"should": [
                    {"term": {"collection": "c1"}},
                    {"term": {"collection": "c2"}}
                ], "minimum_should_match": 1}},
                {"bool": {"must_not": [{"range": {"properties.eo:cloud_cover": {"lt": 5}}}]}}
            ]}})
        );
    }

    #[test]
    fn test_unmapped_passthrough() {
        let dsl = compile(&FilterNode::eq("properties.platform", "sentinel-2a")).unwrap();
        assert_eq!(dsl, json!({"term": {"properties.platform": "sentinel-2a"}}));
    }

    #[test]
    fn test_deterministic() {
        let node = FilterNode::like("id", "S2%").and(FilterNode::between("gsd", 1, 30));
        assert_eq!(compile(&node).unwrap(), compile(&node).unwrap());
    }

    #[test]
    fn test_and_order_is_semantically_equivalent() {
        let a = FilterNode::eq("id", "x");
        let b = FilterNode::gt("gsd", 10);
        let ab = compile(&a.clone().and(b.clone())).unwrap();
        let ba = compile(&b.and(a)).unwrap();

        let clauses = |v: &Value| -> Vec<Value> {
            let mut c = v["bool"]["filter"].as_array().unwrap().clone();
            c.sort_by_key(|x| x.to_string());
            c
        };
        assert_eq!(clauses(&ab), clauses(&ba));
    }

    #[test]
    fn test_queryables_gate_lists_all_offenders() {
        let mapping = FieldMappingTable::new();
        let compiler = FilterCompiler::new(&mapping).with_queryables(allowed(&["id", "datetime"]));

        let node = FilterNode::eq("id", "x")
            .and(FilterNode::eq("properties.platform", "s2"))
            .and(FilterNode::is_null("constellation"));
        let err = compiler.compile(&node).unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidField {
                fields: vec!["constellation".into(), "properties.platform".into()]
            }
        );

        let ok = FilterNode::eq("properties.datetime", Literal::Date("2024-01-01".into()));
        assert!(compiler.compile(&ok).is_ok());
    }

    #[test]
    fn test_empty_logical_rejected() {
        let node = FilterNode::all(vec![]);
        assert!(matches!(compile(&node), Err(CompileError::InvalidArity { .. })));
    }

    #[test]
    fn test_comparison_without_literal_rejected() {
        let node = FilterNode::Comparison(ComparisonNode {
            op: ComparisonOp::Lt,
            property: "cloud_cover".into(),
            literal: None,
        });
        match compile(&node) {
            Err(CompileError::InvalidArity { op, actual, .. }) => {
                assert_eq!(op, "lt");
                assert_eq!(actual, 1);
            }
            other => panic!("expected InvalidArity, got {:?}", other),
        }

        let is_null = FilterNode::Comparison(ComparisonNode {
            op: ComparisonOp::IsNull,
            property: "cloud_cover".into(),
            literal: None,
        });
        assert!(compile(&is_null).is_ok());
    }
}
