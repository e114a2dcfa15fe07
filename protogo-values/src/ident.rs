//! Utility functions for working with identifiers.

/// Converts a `snake_case` protobuf field name to the exported Go identifier `protoc-gen-go`
/// emits for it.
///
/// Empty segments are dropped, so leading, trailing and repeated underscores collapse. Only the
/// first character of each segment is uppercased; the rest is kept verbatim. A character whose
/// uppercase form is more than one character (`ß`) is kept as is, so every segment keeps its
/// character count.
pub fn to_go_field_name(s: &str) -> String {
    s.split('_').filter(|part| !part.is_empty()).map(capitalize).collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut upper = first.to_uppercase();
            let first = match (upper.next(), upper.next()) {
                (Some(single), None) => single,
                _ => first,
            };
            std::iter::once(first).chain(chars).collect()
        }
        None => String::new(),
    }
}
