// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! LIKE pattern translation
//!
//! CQL2 LIKE patterns use `%` and `_` as wildcards with backslash escapes.
//! The backend wildcard query uses `*` and `?`.
//!
//! ```text
//! \\   → \       (escaped backslash)
//! \%   → %       (literal percent)
//! \_   → _       (literal underscore)
//! %    → *       (any run of characters)
//! _    → ?       (exactly one character)
//! \x   → error   (any other escape, including a trailing backslash)
//! ```

use crate::error::CompileError;

/// Translate a CQL2 LIKE pattern into a backend wildcard pattern.
///
/// # Example
///
/// ```rust
/// use stac_compiler::filter::cql2_like_to_es;
///
/// assert_eq!(cql2_like_to_es("S2%_L?A").unwrap(), "S2*?L?A");
/// assert_eq!(cql2_like_to_es("100\\%").unwrap(), "100%");
/// assert!(cql2_like_to_es("bad\\x").is_err());
/// ```
pub fn cql2_like_to_es(pattern: &str) -> Result<String, CompileError> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().enumerate();

    while let Some((position, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, escaped @ ('\\' | '%' | '_'))) => out.push(escaped),
                _ => {
                    return Err(CompileError::InvalidEscapeSequence {
                        pattern: pattern.to_string(),
                        position,
                    })
                }
            },
            '%' => out.push('*'),
            '_' => out.push('?'),
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Escape a plain string so it matches itself inside a LIKE pattern.
pub fn escape_like_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
