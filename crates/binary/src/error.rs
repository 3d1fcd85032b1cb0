#[derive(Debug, thiserror::Error)]
pub enum BinaryProjectError {
    #[error("bad FLhd magic bytes")]
    BadMagic,

    #[error("unexpected header length {0} (expected 6)")]
    UnexpectedHeaderLen(u32),

    #[error("unexpected project format {0} (expected 0)")]
    UnexpectedFormat(u16),

    #[error("missing FLdt data chunk header")]
    BadDataChunkHeader,

    #[error("truncated event stream: {0}")]
    Truncated(#[from] std::io::Error),

    #[error("invalid event id {0}")]
    InvalidEventId(u8),

    #[error("version string {0:?} is malformed")]
    MalformedVersion(String),

    #[error("project declares version-dependent behavior before a VERSION event was seen")]
    VersionNotYetKnown,

    #[error("automation channel references out-of-range channel index {0}")]
    MalformedAutomationChannelId(u32),

    #[error("automation channel dest_id {0:#x} has an unrecognized mixer-track encoding")]
    MalformedDestId(u16),

    #[error("clip composer could not find a bracketing point pair for overlap beat {0}")]
    ClipInvariantViolated(f64),

    #[error(transparent)]
    Timeline(#[from] tempoline_core::EngineError),
}
