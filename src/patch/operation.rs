// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Patch operations (RFC 6902) and merge-patch flattening (RFC 7396).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::CompileError;

/// JSON Patch operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
    Test,
    Copy,
    Move,
}

impl PatchOp {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
            Self::Test => "test",
            Self::Copy => "copy",
            Self::Move => "move",
        }
    }

    /// Whether the target key must already exist.
    pub fn requires_existing_target(self) -> bool {
        matches!(self, Self::Remove | Self::Replace | Self::Test)
    }
}

/// One JSON Patch operation.
///
/// A present `"value": null` is kept as `Some(Value::Null)`; only an absent
/// `value` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
            from: None,
        }
    }

    pub fn test(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Test,
            path: path.into(),
            value: Some(value),
            from: None,
        }
    }

    pub fn copy_value(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Copy,
            path: path.into(),
            value: None,
            from: Some(from.into()),
        }
    }

    pub fn move_value(from: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Move,
            path: path.into(),
            value: None,
            from: Some(from.into()),
        }
    }

    /// Check the operand invariants: copy/move need `from`, add/replace/test need `value`.
    pub fn validate(&self) -> Result<(), CompileError> {
        let missing = match self.op {
            PatchOp::Add | PatchOp::Replace | PatchOp::Test if self.value.is_none() => Some("value"),
            PatchOp::Copy | PatchOp::Move if self.from.is_none() => Some("from"),
            _ => None,
        };
        match missing {
            Some(operand) => Err(CompileError::MissingOperand {
                op: self.op.as_str().to_string(),
                operand,
            }),
            None => Ok(()),
        }
    }
}

/// Escape one key as a JSON Pointer segment (RFC 6901).
pub fn escape_pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Flatten a merge patch into primitive operations, depth first.
///
/// - `null` leaf → `remove` at that path
/// - object → recurse with the key appended to the path
/// - anything else → `add` (create or overwrite)
///
/// # Example
///
/// ```rust
/// use stac_compiler::patch::{merge_to_operations, PatchOperation};
/// use serde_json::json;
///
/// let ops = merge_to_operations(&json!({"a": {"b": null, "c": 1}})).unwrap();
/// assert_eq!(ops, vec![
///     PatchOperation::remove("/a/b"),
///     PatchOperation::add("/a/c", json!(1)),
/// ]);
/// ```
pub fn merge_to_operations(patch: &Value) -> Result<Vec<PatchOperation>, CompileError> {
    let obj = patch
        .as_object()
        .ok_or_else(|| CompileError::invalid_path("", "merge patch must be a JSON object"))?;
    let mut ops = Vec::new();
    flatten_into("", obj, &mut ops);
    Ok(ops)
}

fn flatten_into(prefix: &str, obj: &Map<String, Value>, ops: &mut Vec<PatchOperation>) {
    for (key, value) in obj {
        let path = format!("{}/{}", prefix, escape_pointer_segment(key));
        match value {
            Value::Null => ops.push(PatchOperation::remove(path)),
            Value::Object(inner) => flatten_into(&path, inner, ops),
            other => ops.push(PatchOperation::add(path, other.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_operations() {
        let ops: Vec<PatchOperation> = serde_json::from_value(json!([
            {"op": "add", "path": "/properties/gsd", "value": 10},
            {"op": "replace", "path": "/properties/note", "value": null},
            {"op": "move", "from": "/properties/a", "path": "/properties/b"},
            {"op": "remove", "path": "/assets/thumbnail"}
        ]))
        .unwrap();

        assert_eq!(ops[0], PatchOperation::add("/properties/gsd", json!(10)));
        assert_eq!(ops[1].value, Some(Value::Null));
        assert_eq!(ops[2], PatchOperation::move_value("/properties/a", "/properties/b"));
        assert_eq!(ops[3], PatchOperation::remove("/assets/thumbnail"));
        assert!(ops.iter().all(|op| op.validate().is_ok()));
    }

    #[test]
    fn test_missing_operands() {
        let op: PatchOperation =
            serde_json::from_value(json!({"op": "add", "path": "/a"})).unwrap();
        assert_eq!(
            op.validate().unwrap_err(),
            CompileError::MissingOperand {
                op: "add".into(),
                operand: "value"
            }
        );

        let op: PatchOperation =
            serde_json::from_value(json!({"op": "copy", "path": "/a"})).unwrap();
        assert!(matches!(
            op.validate(),
            Err(CompileError::MissingOperand { operand: "from", .. })
        ));
    }

    #[test]
    fn test_unknown_op_rejected_by_serde() {
        let result: Result<PatchOperation, _> =
            serde_json::from_value(json!({"op": "append", "path": "/a", "value": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_merge_flatten_exact() {
        let ops = merge_to_operations(&json!({"a": {"b": null, "c": 1}})).unwrap();
        assert_eq!(
            ops,
            vec![PatchOperation::remove("/a/b"), PatchOperation::add("/a/c", json!(1))]
        );
    }

    #[test]
    fn test_merge_arrays_are_leaves() {
        let ops = merge_to_operations(&json!({
            "properties": {"instruments": ["msi"], "eo:cloud_cover": 3},
            "assets": {"old": null}
        }))
        .unwrap();
        assert_eq!(
            ops,
            vec![
                PatchOperation::add("/properties/instruments", json!(["msi"])),
                PatchOperation::add("/properties/eo:cloud_cover", json!(3)),
                PatchOperation::remove("/assets/old"),
            ]
        );
    }

    #[test]
    fn test_merge_escapes_keys() {
        let ops = merge_to_operations(&json!({"a/b": {"c~d": true}})).unwrap();
        assert_eq!(ops, vec![PatchOperation::add("/a~1b/c~0d", json!(true))]);
    }

    #[test]
    fn test_merge_requires_object() {
        assert!(matches!(
            merge_to_operations(&json!([1, 2])),
            Err(CompileError::InvalidPath { .. })
        ));
    }
}
