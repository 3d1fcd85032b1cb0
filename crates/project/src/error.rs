#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("unrecognized project file extension: {0:?}")]
    UnknownExtension(String),

    #[error(transparent)]
    Xml(#[from] tempoline_xml::XmlProjectError),

    #[error(transparent)]
    Binary(#[from] tempoline_binary::BinaryProjectError),

    #[error(transparent)]
    Map(#[from] tempoline_map::TempoMapError),

    #[error(transparent)]
    Engine(#[from] tempoline_core::EngineError),
}
