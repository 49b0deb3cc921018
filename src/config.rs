// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the catalog compilers.
//!
//! # Example
//!
//! ```
//! use stac_compiler::CompilerConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CompilerConfig::default();
//! assert!(!config.validate_queryables);
//! assert_eq!(config.queryables_cache_ttl_secs, 1800);
//!
//! // Full config
//! let config = CompilerConfig {
//!     validate_queryables: true,
//!     queryables_cache_ttl_secs: 60,
//!     access_bitstring_size: 256,
//!     ..Default::default()
//! };
//! assert_eq!(config.queryables_ttl().as_secs(), 60);
//! ```

use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

/// Configuration for the catalog compilers.
///
/// All fields have defaults. Queryables validation is off unless asked for.
#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    /// Reject filter/sort fields that are not in the live queryables set
    #[serde(default)]
    pub validate_queryables: bool,

    /// How long a queryables snapshot is served before it is refreshed (default: 30 min)
    #[serde(default = "default_queryables_cache_ttl_secs")]
    pub queryables_cache_ttl_secs: u64,

    /// Width of the per-document access bitstring (default: 1024)
    #[serde(default = "default_access_bitstring_size")]
    pub access_bitstring_size: usize,

    /// Language tag attached to compiled update scripts
    #[serde(default = "default_script_lang")]
    pub script_lang: String,

    /// Emit LIKE as case-insensitive wildcard queries
    #[serde(default = "default_like_case_insensitive")]
    pub like_case_insensitive: bool,

    /// Merge patches create missing intermediate objects instead of aborting
    #[serde(default = "default_create_nest_on_merge")]
    pub create_nest_on_merge: bool,
}

fn default_queryables_cache_ttl_secs() -> u64 { 1800 }
fn default_access_bitstring_size() -> usize { 1024 }
fn default_script_lang() -> String { "painless".to_string() }
fn default_like_case_insensitive() -> bool { true }
fn default_create_nest_on_merge() -> bool { true }

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            validate_queryables: false,
            queryables_cache_ttl_secs: default_queryables_cache_ttl_secs(),
            access_bitstring_size: default_access_bitstring_size(),
            script_lang: default_script_lang(),
            like_case_insensitive: default_like_case_insensitive(),
            create_nest_on_merge: default_create_nest_on_merge(),
        }
    }
}

impl CompilerConfig {
    /// Load from process environment on top of defaults.
    ///
    /// Recognized: `VALIDATE_QUERYABLES`, `QUERYABLES_CACHE_TTL`,
    /// `ACCESS_BITSTRING_SIZE`, `PATCH_SCRIPT_LANG`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("VALIDATE_QUERYABLES") {
            config.validate_queryables = raw.trim().eq_ignore_ascii_case("true");
        }
        if let Some(raw) = lookup("QUERYABLES_CACHE_TTL") {
            match raw.trim().parse::<u64>() {
                Ok(ttl) => config.queryables_cache_ttl_secs = ttl,
                Err(_) => warn!(value = %raw, "Invalid QUERYABLES_CACHE_TTL, using default"),
            }
        }
        if let Some(raw) = lookup("ACCESS_BITSTRING_SIZE") {
            match raw.trim().parse::<usize>() {
                Ok(size) if size >= 2 => config.access_bitstring_size = size,
                _ => warn!(value = %raw, "Invalid ACCESS_BITSTRING_SIZE, using default"),
            }
        }
        if let Some(raw) = lookup("PATCH_SCRIPT_LANG") {
            if !raw.trim().is_empty() {
                config.script_lang = raw.trim().to_string();
            }
        }

        config
    }

    /// Queryables snapshot lifetime.
    #[must_use]
    pub fn queryables_ttl(&self) -> Duration {
        Duration::from_secs(self.queryables_cache_ttl_secs)
    }
}
