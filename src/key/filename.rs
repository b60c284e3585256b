//! Numeric filename parsing
//!
//! Recognises the two shapes page images end up with after scanning:
//! a clean number (`12.png`) and a number carrying a disambiguation
//! suffix (`12_1.png`, `scan_3.png`).

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::trace;

/// Pattern: `12` (already clean)
static PATTERN_CLEAN: OnceLock<Regex> = OnceLock::new();

/// Pattern: `{base}_{n}` (suffixed)
static PATTERN_SUFFIXED: OnceLock<Regex> = OnceLock::new();

fn pattern_clean() -> &'static Regex {
    PATTERN_CLEAN.get_or_init(|| Regex::new(r"^(\d+)$").unwrap())
}

fn pattern_suffixed() -> &'static Regex {
    PATTERN_SUFFIXED.get_or_init(|| Regex::new(r"^(.+)_(\d+)$").unwrap())
}

/// A filename stem that carries a page number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumericName {
    /// `{n}.ext`
    Clean(u64),
    /// `{base}_{suffix}.ext`
    Suffixed { base: String, suffix: u64 },
}

impl NumericName {
    /// Number used for ordering
    ///
    /// A suffixed name whose base is itself a number (`12_1`) orders by the
    /// base; any other base (`scan_3`) orders by the suffix.
    pub fn sort_number(&self) -> u64 {
        match self {
            NumericName::Clean(n) => *n,
            NumericName::Suffixed { base, suffix } => match pattern_clean().is_match(base) {
                true => base.parse().unwrap_or(*suffix),
                false => *suffix,
            },
        }
    }
}

/// Parse the stem of `path` into a [`NumericName`]
///
/// Files without an extension never match.
pub fn parse_numeric_name(path: &Path) -> Option<NumericName> {
    path.extension()?;
    let stem = path.file_stem()?.to_str()?;

    if let Some(caps) = pattern_clean().captures(stem) {
        let n = caps.get(1)?.as_str().parse().ok()?;
        trace!(stem, "Matched clean pattern");
        return Some(NumericName::Clean(n));
    }

    if let Some(caps) = pattern_suffixed().captures(stem) {
        let base = caps.get(1)?.as_str().to_string();
        let suffix = caps.get(2)?.as_str().parse().ok()?;
        trace!(stem, "Matched suffixed pattern");
        return Some(NumericName::Suffixed { base, suffix });
    }

    None
}
