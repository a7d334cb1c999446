// src/slug.rs

//! Slug derivation for company names.
//!
//! A slug is the canonical URL-safe identifier for an IPO record and the
//! unique key within an index snapshot.

/// Derive a slug from a company name.
///
/// Lowercases, strips characters that are neither alphanumeric, whitespace,
/// `-` nor `_`, and collapses whitespace/hyphen runs into single hyphens.
/// Idempotent: `slugify(slugify(s)) == slugify(s)`.
pub fn slugify(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_separator = false;
    for c in cleaned.chars() {
        if c.is_whitespace() || c == '-' {
            pending_separator = !slug.is_empty();
        } else {
            if pending_separator {
                slug.push('-');
                pending_separator = false;
            }
            slug.push(c);
        }
    }
    slug
}
