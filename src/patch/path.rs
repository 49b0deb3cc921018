// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! JSON Pointer → script accessor resolution
//!
//! ```text
//! /properties/eo:cloud_cover
//!   segments      = [Key("properties"), Key("eo:cloud_cover")]
//!   es_nest       = ctx._source.properties
//!   es_key        = 'eo:cloud_cover'
//!   es_path       = ctx._source.properties['eo:cloud_cover']
//!   variable_name = properties_eo_cloud_cover
//!
//! /assets/bands/-1
//!   es_nest       = ctx._source.assets.bands
//!   es_key        = ctx._source.assets.bands.size() - 1
//!   es_path       = ctx._source.assets.bands[ctx._source.assets.bands.size() - 1]
//!
//! /assets/0/href
//!   es_nest       = (ctx._source.assets instanceof List
//!                      ? ctx._source.assets[0] : ctx._source.assets['0'])
//!   es_path       = (...).href
//! ```
//!
//! Every accessor in a generated script goes through [`render_segment`]. A
//! key is emitted with dot access only when it is a plain identifier; colons,
//! dots, dashes and anything else get bracket access with a quoted key. A
//! numeric segment reads the list element when the container is a list and
//! the string key otherwise.
//! [`normalize_accessors`] runs the same function as a last pass over the
//! assembled instructions, so a bare `.prefix:name` can never reach the store.
//! Quoted literals are left untouched by that pass.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::error::CompileError;

/// Root accessor of the document being updated.
pub const SOURCE_ROOT: &str = "ctx._source";

/// Array position addressed by a numeric or marker segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayIndex {
    /// `/list/3`
    Position(usize),
    /// `/list/-2`, resolved against the runtime length
    FromEnd(usize),
    /// `/list/-`, one past the last element
    Append,
}

/// One resolved pointer segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(ArrayIndex),
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw == "-" {
            return Self::Index(ArrayIndex::Append);
        }
        if let Some(n) = raw.strip_prefix('-').and_then(parse_index) {
            if n > 0 {
                return Self::Index(ArrayIndex::FromEnd(n));
            }
        }
        match parse_index(raw) {
            Some(n) => Self::Index(ArrayIndex::Position(n)),
            None => Self::Key(raw.to_string()),
        }
    }

    /// Text used for the temporary variable name.
    fn label(&self) -> String {
        match self {
            Self::Key(key) => key.clone(),
            Self::Index(ArrayIndex::Position(n)) => n.to_string(),
            Self::Index(ArrayIndex::FromEnd(n)) => format!("-{}", n),
            Self::Index(ArrayIndex::Append) => "-".to_string(),
        }
    }
}

/// Canonical array index: `0` or a digit string without leading zeros.
fn parse_index(raw: &str) -> Option<usize> {
    let canonical = raw == "0" || (!raw.starts_with('0') && !raw.is_empty());
    if canonical && raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse().ok()
    } else {
        None
    }
}

/// Decode one RFC 6901 segment (`~1` → `/`, then `~0` → `~`).
pub fn unescape_pointer_segment(raw: &str) -> Result<String, CompileError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(CompileError::invalid_path(
                    raw,
                    "'~' must be followed by '0' or '1'",
                ))
            }
        }
    }
    Ok(out)
}

/// Quote a key as a single-quoted script string.
///
/// Only `\\` and `\'` are escape sequences inside script strings.
pub fn quote(key: &str) -> String {
    format!("'{}'", key.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Index expression for `index` inside `container`.
pub fn index_expr(container: &str, index: ArrayIndex) -> String {
    match index {
        ArrayIndex::Position(n) => n.to_string(),
        ArrayIndex::FromEnd(n) => format!("{}.size() - {}", container, n),
        ArrayIndex::Append => format!("{}.size()", container),
    }
}

/// Render `container` followed by the accessor for `segment`.
pub fn render_segment(container: &str, segment: &Segment) -> String {
    match segment {
        Segment::Key(key) if is_identifier(key) => format!("{}.{}", container, key),
        Segment::Key(key) => format!("{}[{}]", container, quote(key)),
        Segment::Index(ArrayIndex::Position(n)) => format!(
            "({c} instanceof List ? {c}[{n}] : {c}['{n}'])",
            c = container,
            n = n
        ),
        Segment::Index(index) => format!("{}[{}]", container, index_expr(container, *index)),
    }
}

/// Render a full accessor chain starting at [`SOURCE_ROOT`].
pub fn render_chain(segments: &[Segment]) -> String {
    segments
        .iter()
        .fold(SOURCE_ROOT.to_string(), |acc, seg| render_segment(&acc, seg))
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"'#(\d+)'").expect("placeholder pattern is valid"))
}

fn dotted_colon_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?P<base>ctx\._source(?:\.[A-Za-z_][A-Za-z0-9_]*|\[[^\[\]]*\])*)\.(?P<key>[A-Za-z_][A-Za-z0-9_]*(?::[A-Za-z0-9_]+)+)",
        )
        .expect("accessor pattern is valid")
    })
}

/// Swap every single-quoted literal for an indexed `'#N'` placeholder.
///
/// An unterminated literal runs to the end of the text.
fn mask_literals(text: &str) -> (String, Vec<String>) {
    let mut masked = String::with_capacity(text.len());
    let mut literals = Vec::new();
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\'' {
            masked.push(c);
            continue;
        }
        let mut literal = String::from('\'');
        while let Some(c) = chars.next() {
            literal.push(c);
            match c {
                '\\' => literal.extend(chars.next()),
                '\'' => break,
                _ => {}
            }
        }
        masked.push_str(&format!("'#{}'", literals.len()));
        literals.push(literal);
    }
    (masked, literals)
}

fn unmask_literals(masked: &str, literals: &[String]) -> String {
    placeholder_pattern()
        .replace_all(masked, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| literals.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Rewrite any dot access to a colon-bearing key as bracket access.
///
/// Text inside quoted literals is kept byte-identical. Idempotent;
/// instructions produced by [`render_segment`] pass through unchanged.
pub fn normalize_accessors(instruction: &str) -> String {
    let pattern = dotted_colon_pattern();
    let mut current = instruction.to_string();
    // Each pass fixes the first colon key of every chain.
    loop {
        let (masked, literals) = mask_literals(&current);
        if !pattern.is_match(&masked) {
            break;
        }
        let rewritten = pattern
            .replace_all(&masked, |caps: &Captures<'_>| {
                render_segment(&caps["base"], &Segment::Key(caps["key"].to_string()))
            })
            .into_owned();
        let next = unmask_literals(&rewritten, &literals);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

/// Sanitize a label into a script identifier.
fn variable_name(segments: &[Segment]) -> String {
    let joined = segments
        .iter()
        .map(Segment::label)
        .collect::<Vec<_>>()
        .join("_");
    let mut name: String = joined
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) || is_reserved(&name) {
        name.insert(0, '_');
    }
    name
}

fn is_reserved(name: &str) -> bool {
    matches!(
        name,
        "if" | "else" | "while" | "do" | "for" | "in" | "continue" | "break" | "return" | "new"
            | "try" | "catch" | "throw" | "this" | "instanceof" | "def" | "null" | "true"
            | "false" | "ctx" | "params"
    )
}

/// A JSON Pointer resolved against the update script's document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticPath {
    /// The pointer as received
    pub pointer: String,
    /// Unescaped segments, final key included
    pub segments: Vec<Segment>,
    /// Final segment
    pub key: Segment,
    /// Dot-joined logical parent path (`properties`, `assets.thumbnail`)
    pub nest: String,
    /// Accessor for the parent container
    pub es_nest: String,
    /// Quoted key or index expression for the final segment
    pub es_key: String,
    /// Accessor for the target itself
    pub es_path: String,
    /// Identifier for temporary bindings
    pub variable_name: String,
}

impl ElasticPath {
    /// Resolve a pointer. The empty pointer (document root) is rejected, as
    /// is `-` anywhere but the final segment.
    pub fn resolve(pointer: &str) -> Result<Self, CompileError> {
        let body = pointer
            .strip_prefix('/')
            .ok_or_else(|| CompileError::invalid_path(pointer, "pointer must start with '/'"))?;

        if body.contains(['\n', '\r']) {
            return Err(CompileError::invalid_path(
                pointer,
                "line breaks are not allowed in pointers",
            ));
        }

        let segments = body
            .split('/')
            .map(|raw| unescape_pointer_segment(raw).map(|s| Segment::parse(&s)))
            .collect::<Result<Vec<_>, _>>()?;

        let (key, parents) = segments
            .split_last()
            .ok_or_else(|| CompileError::invalid_path(pointer, "empty pointer"))?;

        if parents.contains(&Segment::Index(ArrayIndex::Append)) {
            return Err(CompileError::invalid_path(
                pointer,
                "'-' may only appear as the last segment",
            ));
        }

        let es_nest = render_chain(parents);
        let es_key = match key {
            Segment::Key(k) => quote(k),
            Segment::Index(index) => index_expr(&es_nest, *index),
        };
        let es_path = render_segment(&es_nest, key);
        let nest = parents
            .iter()
            .map(Segment::label)
            .collect::<Vec<_>>()
            .join(".");

        Ok(Self {
            pointer: pointer.to_string(),
            variable_name: variable_name(&segments),
            key: key.clone(),
            nest,
            es_nest,
            es_key,
            es_path,
            segments,
        })
    }

    /// Parent segments, outermost first.
    pub fn parents(&self) -> &[Segment] {
        &self.segments[..self.segments.len() - 1]
    }

    pub fn is_append(&self) -> bool {
        self.key == Segment::Index(ArrayIndex::Append)
    }

    /// Whether `self` is `other` or lies inside it.
    pub fn is_within(&self, other: &ElasticPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Escaped pointer prefix covering the first `depth` segments.
    pub fn pointer_prefix(&self, depth: usize) -> String {
        self.pointer
            .split('/')
            .take(depth + 1)
            .collect::<Vec<_>>()
            .join("/")
    }
}
