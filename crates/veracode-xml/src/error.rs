//! Error types for XML response decoding.

/// Errors that can occur while decoding a Veracode XML response.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// An error from the underlying quick-xml library.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// An error from quick-xml attribute handling.
    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    /// The document ended before an element was closed.
    #[error("unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    /// An error decoding names, text or entities.
    #[error("failed to parse value: {0}")]
    ParseError(String),
}
