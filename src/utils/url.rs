// src/utils/url.rs

//! Reference classification and rewriting for annotation markup.

use std::sync::LazyLock;

use regex::Regex;

/// Slug of an article about a numbered comic, e.g. `1234:_Title`.
static CROSS_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+):").expect("valid cross-reference pattern"));

/// Path produced for a cross-reference, e.g. `/1234`.
static INTERNAL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/[0-9]+$").expect("valid internal path pattern"));

/// Whether a reference is a path on the current host (`/x`, but not `//x`).
pub fn is_root_relative(value: &str) -> bool {
    value.starts_with('/') && !value.starts_with("//")
}

/// Whether a path already points at an ingested comic.
pub fn is_internal_path(value: &str) -> bool {
    INTERNAL_PATH.is_match(value)
}

/// Internal path of a comic.
pub fn internal_path(num: u32) -> String {
    format!("/{num}")
}

/// Comic number referenced by an article path, if any.
///
/// The slug after `article_prefix` is percent-decoded; it must start with
/// a run of ASCII digits directly followed by `:`.
pub fn cross_reference(path: &str, article_prefix: &str) -> Option<u32> {
    let slug = path.strip_prefix(article_prefix)?;
    let slug = slug.split(['?', '#']).next().unwrap_or_default();
    let decoded = urlencoding::decode(slug)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| slug.to_string());

    CROSS_REFERENCE
        .captures(&decoded)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse().ok())
}

/// Rewrite a single `href`/`src` value.
///
/// Returns `None` when the value is left unchanged: it is not root-relative
/// or already an internal comic path.
pub fn rewrite_reference(value: &str, origin: &str, article_prefix: &str) -> Option<String> {
    let trimmed = value.trim();
    if !is_root_relative(trimmed) || is_internal_path(trimmed) {
        return None;
    }

    match cross_reference(trimmed, article_prefix) {
        Some(num) => Some(internal_path(num)),
        None => Some(format!("{origin}{trimmed}")),
    }
}

/// Rewrite every candidate URL of a `srcset` value.
pub fn rewrite_srcset(value: &str, origin: &str, article_prefix: &str) -> String {
    value
        .split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .map(|candidate| {
            let (url, descriptor) = match candidate.split_once(char::is_whitespace) {
                Some((url, descriptor)) => (url, Some(descriptor.trim())),
                None => (candidate, None),
            };
            let url = rewrite_reference(url, origin, article_prefix)
                .unwrap_or_else(|| url.to_string());
            match descriptor {
                Some(descriptor) if !descriptor.is_empty() => format!("{url} {descriptor}"),
                _ => url,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
