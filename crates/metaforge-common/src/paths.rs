//! Path utilities for classifying image URLs.
//!
//! Providers follow a loose URL convention: poster-bearing covers live under a
//! `/cover/` or `/covers/` segment while screenshots live under `/samples/` or
//! `/thumb/`. These helpers work on the path part of a URL.

/// Image extensions and the content type served for each.
const IMAGE_CONTENT_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
];

/// Content type used when the extension is missing or unknown.
pub const DEFAULT_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Check whether a URL path names a cover-class image.
///
/// # Examples
///
/// ```
/// use metaforge_common::paths::is_cover_path;
///
/// assert!(is_cover_path("/pics/cover/8xyz_b.jpg"));
/// assert!(is_cover_path("/covers/ab/ABC123.jpg"));
/// assert!(!is_cover_path("/pics/samples/cover/1.jpg"));
/// assert!(!is_cover_path("/pics/thumb/abc.jpg"));
/// ```
pub fn is_cover_path(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    let cover = path.contains("/covers/") || path.contains("/cover/");
    let excluded = path.contains("/samples/") || path.contains("/thumb/");
    cover && !excluded
}

/// Content type for an image path, judged by its extension.
///
/// # Examples
///
/// ```
/// use metaforge_common::paths::content_type_for;
///
/// assert_eq!(content_type_for("/a/b.PNG"), "image/png");
/// assert_eq!(content_type_for("/a/b"), "image/jpeg");
/// ```
pub fn content_type_for(path: &str) -> &'static str {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| {
            IMAGE_CONTENT_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, ct)| *ct)
        })
        .unwrap_or(DEFAULT_IMAGE_CONTENT_TYPE)
}

/// Check whether a string is an absolute http(s) URL.
pub fn is_web_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}
