//! Input validation helpers

/// Sanitize a post-OAuth return path.
///
/// Only same-origin absolute paths are allowed back into the redirect:
/// the path must start with `/` but not `//` (protocol-relative URLs would
/// redirect off-origin). Anything else collapses to the given fallback.
pub fn sanitize_return_path<'a>(path: &'a str, fallback: &'a str) -> &'a str {
    if path.starts_with('/') && !path.starts_with("//") {
        path
    } else {
        fallback
    }
}
