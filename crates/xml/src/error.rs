#[derive(Debug, thiserror::Error)]
pub enum XmlProjectError {
    #[error("failed to gunzip project contents")]
    Gzip(#[from] std::io::Error),

    #[error("decompressed project contents are empty")]
    EmptyContents,

    #[error("could not locate an <Ableton ...> version tag")]
    VersionTagNotFound,

    #[error("could not parse MinorVersion attribute")]
    VersionFormat,

    #[error("malformed XML fragment")]
    XmlSyntax(#[from] quick_xml::Error),

    #[error("XML fragment has unbalanced tags")]
    UnbalancedFragment,

    #[error("could not locate a <Tempo> tag")]
    TempoTagNotFound,

    #[error("could not locate a <MasterTrack> tag")]
    MasterTrackTagNotFound,

    #[error("Ableton 8 project had no tempo automation events")]
    Ableton8NoAutomationEvents,

    #[error("<{element}> is missing required attribute \"{attribute}\"")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("locator is missing required field \"{0}\"")]
    LocatorMissingField(&'static str),

    #[error("invalid floating point value: {0}")]
    InvalidFloat(#[from] std::num::ParseFloatError),

    #[error("invalid integer value: {0}")]
    InvalidInt(#[from] std::num::ParseIntError),

    #[error(transparent)]
    Timeline(#[from] tempoline_core::EngineError),
}
