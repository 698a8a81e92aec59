//! Locale-based name selection
//!
//! GeoIP2 records carry a `names` map keyed by locale code. A reader is
//! configured with an ordered preference list; the first locale present in
//! a record wins.

use std::collections::BTreeMap;

/// Locale list used when none is configured
pub const DEFAULT_LOCALES: &[&str] = &["en"];

/// Pick the name for the first preferred locale present in `names`
///
/// Returns `None` if no preferred locale has a name; there is no fallback
/// to an arbitrary entry.
pub fn select_name<'a, L: AsRef<str>>(
    names: &'a BTreeMap<String, String>,
    locales: &[L],
) -> Option<&'a str> {
    locales
        .iter()
        .find_map(|locale| names.get(locale.as_ref()))
        .map(String::as_str)
}

/// Owned copy of [`DEFAULT_LOCALES`]
pub fn default_locales() -> Vec<String> {
    DEFAULT_LOCALES.iter().map(|l| l.to_string()).collect()
}
