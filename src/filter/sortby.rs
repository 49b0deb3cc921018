// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sortby lowering
//!
//! ```text
//! [{"field": "datetime", "direction": "desc"}]  →  [{"properties.datetime": {"order": "desc"}}]
//! "-datetime,+id"                              →  [{"properties.datetime": {"order": "desc"}}, {"id": {"order": "asc"}}]
//! ```

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::CompileError;
use crate::mapping::FieldMappingTable;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Result<Self, CompileError> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(CompileError::InvalidDirection(raw.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One sortby entry as sent in a POST search body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SortField {
    pub field: String,
    #[serde(default)]
    pub direction: Option<String>,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction: Some(direction.as_str().to_string()),
        }
    }

    /// Parse the GET form: comma-separated fields with optional `+`/`-` prefix.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.as_bytes()[0] {
                b'-' => Self::new(&s[1..], SortDirection::Desc),
                b'+' => Self::new(&s[1..], SortDirection::Asc),
                _ => Self::new(s, SortDirection::Asc),
            })
            .collect()
    }

    pub fn direction(&self) -> Result<SortDirection, CompileError> {
        self.direction
            .as_deref()
            .map(SortDirection::parse)
            .unwrap_or(Ok(SortDirection::Asc))
    }
}

/// Lower sort entries into backend sort clauses through the mapping table.
pub fn compile_sortby(fields: &[SortField], mapping: &FieldMappingTable) -> Result<Value, CompileError> {
    let clauses = fields
        .iter()
        .map(|sort| {
            let direction = sort.direction()?;
            let mut clause = Map::new();
            clause.insert(
                mapping.resolve(&sort.field),
                json!({"order": direction.as_str()}),
            );
            Ok(Value::Object(clause))
        })
        .collect::<Result<Vec<_>, CompileError>>()?;
    Ok(Value::Array(clauses))
}
