//! URL and path helpers.
//!
//! Remote locations are assembled by string joining, so these helpers keep
//! joined URLs free of duplicate separators.

/// Collapse runs of `/` that do not directly follow a `:`.
///
/// `http://host//a///b` becomes `http://host/a/b`; the `//` after the
/// scheme is kept.
pub fn sanitize_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut prev: Option<char> = None;
    let mut prev_prev: Option<char> = None;

    for c in url.chars() {
        let duplicate = c == '/' && prev == Some('/') && prev_prev.is_some_and(|p| p != ':');
        if !duplicate {
            out.push(c);
            prev_prev = prev;
            prev = Some(c);
        }
    }

    out
}

/// Join a base location and a relative path with a single `/`
pub fn join_url(base: &str, relative: &str) -> String {
    if relative.is_empty() {
        return sanitize_url(base);
    }
    sanitize_url(&format!("{}/{}", base.trim_end_matches('/'), relative))
}
