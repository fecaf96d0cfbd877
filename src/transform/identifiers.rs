use crate::constants::{URI_DELIMITER, URI_ID_SEGMENT};

/// The `index`-th `:`-separated segment of a catalog URI.
pub fn uri_segment(uri: &str, index: usize) -> Option<&str> {
    uri.split(URI_DELIMITER).nth(index).filter(|s| !s.is_empty())
}

/// Bare id of `spotify:<kind>:<id>`; anything without a colon is already an id.
pub fn id_from_uri(uri: &str) -> Option<&str> {
    if uri.contains(URI_DELIMITER) {
        uri_segment(uri, URI_ID_SEGMENT)
    } else if uri.is_empty() {
        None
    } else {
        Some(uri)
    }
}
