//! Deterministic cache key construction.

use std::fmt::Display;

/// Build a cache key from a base name and named parameters.
///
/// Parameters are sorted by name so equivalent sets produce identical keys
/// regardless of order: `build_key("themes", [("period", "1mo")])` is
/// `"themes:period=1mo"`. With no parameters the base is returned as-is.
pub fn build_key<I, K, V>(base: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    let mut pairs: Vec<(String, String)> = params
        .into_iter()
        .map(|(name, value)| (name.as_ref().to_string(), value.to_string()))
        .collect();

    if pairs.is_empty() {
        return base.to_string();
    }

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let joined = pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{base}:{joined}")
}
