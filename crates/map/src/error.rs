#[derive(Debug, thiserror::Error)]
pub enum TempoMapError {
    #[error("cannot emit a tempo map for an empty automation sequence")]
    EmptySequence,

    #[error("failed to encode Standard MIDI File bytes: {0}")]
    Encode(#[from] std::io::Error),
}
