//! Byte-slice tag scanning: locate a `<Tag>...</Tag>` span without parsing
//! the surrounding document. Ableton project files can be tens of megabytes
//! and we only ever need a handful of tags out of them, so this is a lot
//! cheaper than a full streaming parse of the whole document.

pub fn find_bytes(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Finds the first `<tag>...</tag>` span (inclusive of both tags) in
/// `contents`, scanning from the start.
pub fn find_tag<'a>(contents: &'a [u8], tag: &str) -> Option<&'a [u8]> {
    let start_tag = format!("<{tag}>");
    let end_tag = format!("</{tag}>");

    let start_idx = find_bytes(contents, start_tag.as_bytes(), 0)?;
    let end_idx = find_bytes(contents, end_tag.as_bytes(), start_idx)?;

    Some(&contents[start_idx..end_idx + end_tag.len()])
}
