//! License label normalization and open-access detection.

use once_cell::sync::Lazy;
use regex::Regex;

struct KnownLicense {
    id: &'static str,
    title: &'static str,
}

const KNOWN_LICENSES: &[KnownLicense] = &[KnownLicense {
    id: "CC-BY-3.0",
    title: "Creative Commons Attribution 3.0",
}];

const OPEN_ACCESS_PATTERNS: &[&str] = &[
    r"^CC[- ]BY",
    r"(?i)^creative commons",
    r"(?i)^open access",
    r"(?i)^public domain",
];

static OPEN_ACCESS: Lazy<Vec<Regex>> = Lazy::new(|| {
    OPEN_ACCESS_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
});

/// Result of resolving the `540` license data of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLicense {
    pub label: Option<String>,
    pub url: Option<String>,
    pub open_access: bool,
}

/// Canonical identifier for `label` when it is a substring of a known
/// identifier or of that license's title.
pub fn canonical_license(label: &str) -> Option<&'static str> {
    KNOWN_LICENSES
        .iter()
        .find(|known| known.id.contains(label) || known.title.contains(label))
        .map(|known| known.id)
}

/// Whether a license label designates an open-access license.
pub fn is_open_access(label: &str) -> bool {
    OPEN_ACCESS.iter().any(|re| re.is_match(label))
}

/// Normalize the label against the known table, then test it for open access.
///
/// An absent label never matches.
pub fn resolve_license(label: Option<&str>, url: Option<&str>) -> ResolvedLicense {
    let label = label.map(|l| canonical_license(l).unwrap_or(l).to_string());
    let open_access = label.as_deref().is_some_and(is_open_access);

    ResolvedLicense {
        label,
        url: url.map(str::to_string),
        open_access,
    }
}
