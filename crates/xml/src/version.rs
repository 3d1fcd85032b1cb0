use crate::element::parse_fragment;
use crate::error::XmlProjectError;
use crate::tagscan::find_bytes;

/// The `<Ableton ...>` root tag's attributes, parsed well enough to branch
/// on schema generation (8 / 9 / 10) and nothing more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbletonSetVersion {
    pub major: Option<String>,
    pub minor: Option<String>,
    pub minor_a: Option<u32>,
    pub minor_b: Option<u32>,
    pub minor_c: Option<u32>,
    pub schema_change_count: Option<String>,
    pub creator: Option<String>,
    pub revision: Option<String>,
}

/// Locates the opening `<Ableton ...>` tag and parses its attributes. The
/// document is never fully well-formed at this point in parsing (we only
/// have the gzip-decompressed bytes, not a validated tree), so we slice out
/// just the opening tag and hand it a synthetic closing tag to make it a
/// parseable fragment on its own.
pub fn parse_version(contents: &[u8]) -> Result<AbletonSetVersion, XmlProjectError> {
    let start_idx =
        find_bytes(contents, b"<Ableton", 0).ok_or(XmlProjectError::VersionTagNotFound)?;
    let end_idx =
        find_bytes(contents, b">", start_idx).ok_or(XmlProjectError::VersionTagNotFound)?;

    let mut chunk = contents[start_idx..=end_idx].to_vec();
    chunk.extend_from_slice(b"</Ableton>");

    let el = parse_fragment(&chunk)?;

    let major = el.get("MajorVersion").map(str::to_string);
    let minor = el.get("MinorVersion").map(str::to_string);

    let (minor_a, minor_b, minor_c) = match &minor {
        None => (None, None, None),
        Some(m) => {
            let (big, little) = m.split_once('.').ok_or(XmlProjectError::VersionFormat)?;
            let (b, c) = little.split_once('_').ok_or(XmlProjectError::VersionFormat)?;
            (Some(big.parse()?), Some(b.parse()?), Some(c.parse()?))
        }
    };

    Ok(AbletonSetVersion {
        major,
        minor,
        minor_a,
        minor_b,
        minor_c,
        schema_change_count: el.get("SchemaChangeCount").map(str::to_string),
        creator: el.get("Creator").map(str::to_string),
        revision: el.get("Revision").map(str::to_string),
    })
}
