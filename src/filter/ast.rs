// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter AST
//!
//! Typed form of a CQL2-JSON filter. Parsing checks operator arity and
//! argument shapes up front, so the compiler only ever sees well-formed trees.
//!
//! # Example
//!
//! ```rust
//! use stac_compiler::filter::{FilterNode, Literal};
//! use serde_json::json;
//!
//! // From CQL2-JSON
//! let node = FilterNode::from_json(&json!({
//!     "op": "and",
//!     "args": [
//!         {"op": "=", "args": [{"property": "collection"}, "sentinel-2"]},
//!         {"op": "<=", "args": [{"property": "cloud_cover"}, 20]}
//!     ]
//! })).unwrap();
//!
//! // Same tree with constructors
//! let built = FilterNode::eq("collection", "sentinel-2")
//!     .and(FilterNode::lte("cloud_cover", 20));
//! assert_eq!(node, built);
//! ```

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use serde_json::{Map, Number, Value};

use crate::error::CompileError;

/// Deepest nesting accepted from clients.
pub const MAX_FILTER_DEPTH: usize = 64;

/// Boolean connective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// Binary comparison (plus the unary null check)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    IsNull,
}

impl ComparisonOp {
    /// Operator with sides swapped (`5 < x` is `x > 5`).
    fn mirrored(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            other => other,
        }
    }
}

/// Operators taking structured arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvancedOp {
    Like,
    Between,
    In,
}

/// Spatial relation between a property geometry and a literal geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialOp {
    Intersects,
    Contains,
    Within,
    Disjoint,
}

impl SpatialOp {
    /// Relation name as understood by the backend's geo_shape query.
    pub fn relation(self) -> &'static str {
        match self {
            Self::Intersects => "intersects",
            Self::Contains => "contains",
            Self::Within => "within",
            Self::Disjoint => "disjoint",
        }
    }
}

/// Literal operand
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Boolean(bool),
    /// RFC 3339 instant, tagged `{"timestamp": ..}`
    Timestamp(String),
    /// Calendar date, tagged `{"date": ..}`
    Date(String),
}

impl Literal {
    /// Whether the literal carries a temporal type tag.
    #[must_use]
    pub fn is_temporal(&self) -> bool {
        matches!(self, Self::Timestamp(_) | Self::Date(_))
    }

    /// Backend JSON value (temporal tags unwrapped to their string).
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::String(s) | Self::Timestamp(s) | Self::Date(s) => Value::String(s.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Boolean(b) => Value::Bool(*b),
        }
    }

    /// Parse a literal operand. Tagged temporal values are validated.
    pub fn from_json(op: &str, value: &Value) -> Result<Self, CompileError> {
        match value {
            Value::String(s) => Ok(Self::String(s.clone())),
            Value::Number(n) => Ok(Self::Number(n.clone())),
            Value::Bool(b) => Ok(Self::Boolean(*b)),
            Value::Object(obj) if obj.len() == 1 => {
                if let Some(ts) = obj.get("timestamp") {
                    let ts = ts.as_str().ok_or_else(|| CompileError::InvalidLiteral {
                        kind: "timestamp",
                        value: ts.to_string(),
                    })?;
                    DateTime::parse_from_rfc3339(ts).map_err(|_| CompileError::InvalidLiteral {
                        kind: "timestamp",
                        value: ts.to_string(),
                    })?;
                    Ok(Self::Timestamp(ts.to_string()))
                } else if let Some(date) = obj.get("date") {
                    let date = date.as_str().ok_or_else(|| CompileError::InvalidLiteral {
                        kind: "date",
                        value: date.to_string(),
                    })?;
                    NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                        CompileError::InvalidLiteral {
                            kind: "date",
                            value: date.to_string(),
                        }
                    })?;
                    Ok(Self::Date(date.to_string()))
                } else {
                    Err(invalid_argument(op, value))
                }
            }
            _ => Err(invalid_argument(op, value)),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n).into())
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalNode {
    pub op: LogicalOp,
    /// Never empty
    pub children: Vec<FilterNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonNode {
    pub op: ComparisonOp,
    pub property: String,
    /// `None` only for [`ComparisonOp::IsNull`]
    pub literal: Option<Literal>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvancedNode {
    Like { property: String, pattern: String },
    Between { property: String, lower: Literal, upper: Literal },
    In { property: String, values: Vec<Literal> },
}

impl AdvancedNode {
    pub fn op(&self) -> AdvancedOp {
        match self {
            Self::Like { .. } => AdvancedOp::Like,
            Self::Between { .. } => AdvancedOp::Between,
            Self::In { .. } => AdvancedOp::In,
        }
    }

    pub fn property(&self) -> &str {
        match self {
            Self::Like { property, .. }
            | Self::Between { property, .. }
            | Self::In { property, .. } => property,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialNode {
    pub op: SpatialOp,
    pub property: String,
    /// GeoJSON geometry, passed through untouched
    pub geometry: Value,
}

/// Filter AST node
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum FilterNode {
    Logical(LogicalNode),
    Comparison(ComparisonNode),
    Advanced(AdvancedNode),
    Spatial(SpatialNode),
}

impl TryFrom<Value> for FilterNode {
    type Error = CompileError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(&value)
    }
}

impl FilterNode {
    // ═══════════════════════════════════════════════════════════════════════
    // Constructors
    // ═══════════════════════════════════════════════════════════════════════

    pub fn comparison(op: ComparisonOp, property: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::Comparison(ComparisonNode {
            op,
            property: property.into(),
            literal: Some(literal.into()),
        })
    }

    pub fn eq(property: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::comparison(ComparisonOp::Eq, property, literal)
    }

    pub fn neq(property: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::comparison(ComparisonOp::Neq, property, literal)
    }

    pub fn lt(property: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::comparison(ComparisonOp::Lt, property, literal)
    }

    pub fn lte(property: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::comparison(ComparisonOp::Lte, property, literal)
    }

    pub fn gt(property: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::comparison(ComparisonOp::Gt, property, literal)
    }

    pub fn gte(property: impl Into<String>, literal: impl Into<Literal>) -> Self {
        Self::comparison(ComparisonOp::Gte, property, literal)
    }

    pub fn is_null(property: impl Into<String>) -> Self {
        Self::Comparison(ComparisonNode {
            op: ComparisonOp::IsNull,
            property: property.into(),
            literal: None,
        })
    }

    pub fn like(property: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Advanced(AdvancedNode::Like {
            property: property.into(),
            pattern: pattern.into(),
        })
    }

    pub fn between(
        property: impl Into<String>,
        lower: impl Into<Literal>,
        upper: impl Into<Literal>,
    ) -> Self {
        Self::Advanced(AdvancedNode::Between {
            property: property.into(),
            lower: lower.into(),
            upper: upper.into(),
        })
    }

    pub fn in_list(property: impl Into<String>, values: Vec<Literal>) -> Self {
        Self::Advanced(AdvancedNode::In {
            property: property.into(),
            values,
        })
    }

    pub fn intersects(property: impl Into<String>, geometry: Value) -> Self {
        Self::Spatial(SpatialNode {
            op: SpatialOp::Intersects,
            property: property.into(),
            geometry,
        })
    }

    /// Conjunction of all nodes.
    pub fn all(children: Vec<FilterNode>) -> Self {
        Self::Logical(LogicalNode {
            op: LogicalOp::And,
            children,
        })
    }

    /// Combine with AND
    pub fn and(self, other: FilterNode) -> Self {
        Self::all(vec![self, other])
    }

    /// Combine with OR
    pub fn or(self, other: FilterNode) -> Self {
        Self::Logical(LogicalNode {
            op: LogicalOp::Or,
            children: vec![self, other],
        })
    }

    /// Negate
    pub fn negate(self) -> Self {
        Self::Logical(LogicalNode {
            op: LogicalOp::Not,
            children: vec![self],
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Inspection
    // ═══════════════════════════════════════════════════════════════════════

    /// Every referenced property name, first-seen order, without duplicates.
    pub fn properties(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        self.collect_properties(&mut out);
        out
    }

    fn collect_properties(&self, out: &mut Vec<String>) {
        let property = match self {
            Self::Logical(node) => {
                for child in &node.children {
                    child.collect_properties(out);
                }
                return;
            }
            Self::Comparison(node) => &node.property,
            Self::Advanced(node) => node.property(),
            Self::Spatial(node) => &node.property,
        };
        if !out.iter().any(|p| p == property) {
            out.push(property.to_string());
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // CQL2-JSON parsing
    // ═══════════════════════════════════════════════════════════════════════

    /// Parse a CQL2-JSON filter object.
    pub fn from_json(value: &Value) -> Result<Self, CompileError> {
        Self::parse(value, 0)
    }

    fn parse(value: &Value, depth: usize) -> Result<Self, CompileError> {
        if depth > MAX_FILTER_DEPTH {
            return Err(CompileError::MalformedFilter(format!(
                "nesting deeper than {}",
                MAX_FILTER_DEPTH
            )));
        }

        let obj = value
            .as_object()
            .ok_or_else(|| CompileError::MalformedFilter(format!("expected filter object, got {}", value)))?;
        let op = obj
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| CompileError::MalformedFilter("missing 'op'".into()))?;
        let args: &[Value] = match obj.get("args") {
            Some(Value::Array(args)) => args,
            Some(other) => {
                return Err(CompileError::MalformedFilter(format!(
                    "'args' of '{}' must be an array, got {}",
                    op, other
                )))
            }
            None => &[],
        };

        match op.to_ascii_lowercase().as_str() {
            "and" => Self::parse_logical(LogicalOp::And, op, args, depth),
            "or" => Self::parse_logical(LogicalOp::Or, op, args, depth),
            "not" => Self::parse_logical(LogicalOp::Not, op, args, depth),
            "=" | "eq" => Self::parse_comparison(ComparisonOp::Eq, op, args),
            "<>" | "!=" | "neq" | "ne" => Self::parse_comparison(ComparisonOp::Neq, op, args),
            "<" | "lt" => Self::parse_comparison(ComparisonOp::Lt, op, args),
            "<=" | "lte" | "le" => Self::parse_comparison(ComparisonOp::Lte, op, args),
            ">" | "gt" => Self::parse_comparison(ComparisonOp::Gt, op, args),
            ">=" | "gte" | "ge" => Self::parse_comparison(ComparisonOp::Gte, op, args),
            "isnull" | "is_null" => {
                expect_arity(op, args, "1", 1)?;
                Ok(Self::is_null(property_ref(op, &args[0])?))
            }
            "like" => {
                expect_arity(op, args, "2", 2)?;
                let pattern = args[1]
                    .as_str()
                    .ok_or_else(|| invalid_argument(op, &args[1]))?;
                Ok(Self::like(property_ref(op, &args[0])?, pattern))
            }
            "between" => Self::parse_between(op, args),
            "in" => {
                expect_arity(op, args, "2", 2)?;
                let property = property_ref(op, &args[0])?;
                let list = args[1]
                    .as_array()
                    .ok_or_else(|| invalid_argument(op, &args[1]))?;
                let values = list
                    .iter()
                    .map(|v| Literal::from_json(op, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self::in_list(property, values))
            }
            "s_intersects" => Self::parse_spatial(SpatialOp::Intersects, op, args),
            "s_contains" => Self::parse_spatial(SpatialOp::Contains, op, args),
            "s_within" => Self::parse_spatial(SpatialOp::Within, op, args),
            "s_disjoint" => Self::parse_spatial(SpatialOp::Disjoint, op, args),
            _ => Err(CompileError::UnknownOperator(op.to_string())),
        }
    }

    fn parse_logical(
        logical: LogicalOp,
        op: &str,
        args: &[Value],
        depth: usize,
    ) -> Result<Self, CompileError> {
        // AND/OR of a single child is tolerated; an empty list never is
        if args.is_empty() {
            return Err(CompileError::InvalidArity {
                op: op.to_string(),
                expected: "at least 1".into(),
                actual: 0,
            });
        }
        let children = args
            .iter()
            .map(|arg| Self::parse(arg, depth + 1))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::Logical(LogicalNode {
            op: logical,
            children,
        }))
    }

    fn parse_comparison(cmp: ComparisonOp, op: &str, args: &[Value]) -> Result<Self, CompileError> {
        expect_arity(op, args, "2", 2)?;
        let (cmp, property, literal) = match (as_property(&args[0]), as_property(&args[1])) {
            (Some(property), _) => (cmp, property, &args[1]),
            (None, Some(property)) => (cmp.mirrored(), property, &args[0]),
            (None, None) => return Err(invalid_argument(op, &args[0])),
        };
        Ok(Self::Comparison(ComparisonNode {
            op: cmp,
            property: property.to_string(),
            literal: Some(Literal::from_json(op, literal)?),
        }))
    }

    fn parse_between(op: &str, args: &[Value]) -> Result<Self, CompileError> {
        let (property, lower, upper) = match args {
            [property, lower, upper] => (property, lower, upper),
            [property, range] => match range.as_array().map(Vec::as_slice) {
                Some([lower, upper]) => (property, lower, upper),
                _ => return Err(invalid_argument(op, range)),
            },
            _ => {
                return Err(CompileError::InvalidArity {
                    op: op.to_string(),
                    expected: "3".into(),
                    actual: args.len(),
                })
            }
        };
        Ok(Self::between(
            property_ref(op, property)?,
            Literal::from_json(op, lower)?,
            Literal::from_json(op, upper)?,
        ))
    }

    fn parse_spatial(spatial: SpatialOp, op: &str, args: &[Value]) -> Result<Self, CompileError> {
        expect_arity(op, args, "2", 2)?;
        let property = property_ref(op, &args[0])?;
        if !args[1].is_object() {
            return Err(invalid_argument(op, &args[1]));
        }
        Ok(Self::Spatial(SpatialNode {
            op: spatial,
            property,
            geometry: args[1].clone(),
        }))
    }
}

fn as_property(value: &Value) -> Option<&str> {
    let obj: &Map<String, Value> = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get("property")?.as_str()
}

fn property_ref(op: &str, value: &Value) -> Result<String, CompileError> {
    as_property(value)
        .map(str::to_string)
        .ok_or_else(|| invalid_argument(op, value))
}

fn expect_arity(op: &str, args: &[Value], expected: &str, n: usize) -> Result<(), CompileError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(CompileError::InvalidArity {
            op: op.to_string(),
            expected: expected.to_string(),
            actual: args.len(),
        })
    }
}

fn invalid_argument(op: &str, value: &Value) -> CompileError {
    CompileError::InvalidArgumentType {
        op: op.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_comparison() {
        let node = FilterNode::from_json(&json!({
            "op": "=", "args": [{"property": "id"}, "item-1"]
        }))
        .unwrap();
        assert_eq!(node, FilterNode::eq("id", "item-1"));
    }

    #[test]
    fn test_parse_mirrors_swapped_operands() {
        let node = FilterNode::from_json(&json!({
            "op": "<", "args": [10, {"property": "gsd"}]
        }))
        .unwrap();
        assert_eq!(node, FilterNode::gt("gsd", 10));
    }

    #[test]
    fn test_parse_operator_aliases() {
        for op in ["AND", "and", "And"] {
            let node = FilterNode::from_json(&json!({
                "op": op,
                "args": [
                    {"op": "isNull", "args": [{"property": "a"}]},
                    {"op": "<>", "args": [{"property": "b"}, true]}
                ]
            }))
            .unwrap();
            assert_eq!(node, FilterNode::is_null("a").and(FilterNode::neq("b", true)));
        }
    }

    #[test]
    fn test_parse_temporal_literals() {
        let node = FilterNode::from_json(&json!({
            "op": ">=", "args": [{"property": "datetime"}, {"timestamp": "2024-01-01T00:00:00Z"}]
        }))
        .unwrap();
        assert_eq!(
            node,
            FilterNode::gte("datetime", Literal::Timestamp("2024-01-01T00:00:00Z".into()))
        );

        let node = FilterNode::from_json(&json!({
            "op": "=", "args": [{"property": "created"}, {"date": "2024-02-29"}]
        }))
        .unwrap();
        assert_eq!(node, FilterNode::eq("created", Literal::Date("2024-02-29".into())));
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        let err = FilterNode::from_json(&json!({
            "op": "=", "args": [{"property": "datetime"}, {"timestamp": "yesterday"}]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidLiteral {
                kind: "timestamp",
                value: "yesterday".into()
            }
        );

        let err = FilterNode::from_json(&json!({
            "op": "=", "args": [{"property": "datetime"}, {"date": "2023-02-30"}]
        }))
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidLiteral { kind: "date", .. }));
    }

    #[test]
    fn test_in_requires_sequence() {
        let err = FilterNode::from_json(&json!({
            "op": "in", "args": [{"property": "collection"}, "sentinel-2"]
        }))
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::InvalidArgumentType {
                op: "in".into(),
                value: "\"sentinel-2\"".into()
            }
        );

        let err = FilterNode::from_json(&json!({
            "op": "in", "args": [{"property": "gsd"}, 42]
        }))
        .unwrap_err();
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_between_shapes() {
        let flat = FilterNode::from_json(&json!({
            "op": "between", "args": [{"property": "cloud_cover"}, 0, 50]
        }))
        .unwrap();
        let nested = FilterNode::from_json(&json!({
            "op": "between", "args": [{"property": "cloud_cover"}, [0, 50]]
        }))
        .unwrap();
        assert_eq!(flat, nested);
        assert_eq!(flat, FilterNode::between("cloud_cover", 0, 50));
    }

    #[test]
    fn test_arity_checked() {
        let err = FilterNode::from_json(&json!({"op": "=", "args": [{"property": "a"}]})).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArity { actual: 1, .. }));

        let err = FilterNode::from_json(&json!({"op": "and", "args": []})).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArity { actual: 0, .. }));

        let err = FilterNode::from_json(&json!({"op": "not"})).unwrap_err();
        assert!(matches!(err, CompileError::InvalidArity { .. }));
    }

    #[test]
    fn test_unknown_operator() {
        let err = FilterNode::from_json(&json!({"op": "t_after", "args": []})).unwrap_err();
        assert_eq!(err, CompileError::UnknownOperator("t_after".into()));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = json!({"op": "isNull", "args": [{"property": "a"}]});
        for _ in 0..(MAX_FILTER_DEPTH + 2) {
            value = json!({"op": "not", "args": [value]});
        }
        let err = FilterNode::from_json(&value).unwrap_err();
        assert!(matches!(err, CompileError::MalformedFilter(_)));
    }

    #[test]
    fn test_properties_first_seen_order() {
        let node = FilterNode::eq("b", 1)
            .and(FilterNode::lt("a", 2))
            .or(FilterNode::is_null("b").negate());
        assert_eq!(node.properties(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_deserialize_via_serde() {
        let node: FilterNode = serde_json::from_value(json!({
            "op": "s_intersects",
            "args": [{"property": "geometry"}, {"type": "Point", "coordinates": [1.0, 2.0]}]
        }))
        .unwrap();
        match node {
            FilterNode::Spatial(SpatialNode { op, property, .. }) => {
                assert_eq!(op, SpatialOp::Intersects);
                assert_eq!(property, "geometry");
            }
            _ => panic!("Expected Spatial node"),
        }
    }
}
