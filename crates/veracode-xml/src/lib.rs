//! XML response decoding for the Veracode API client.
//!
//! The Veracode XML APIs answer every call with a small XML document. This crate
//! decodes such a document into a [`ParsedResponse`] tree where each element keeps
//! its attributes, its text and its children grouped by tag name.
//!
//! # Key components
//!
//! - [`parse`] for decoding a response body into a [`ParsedResponse`]
//! - [`XmlNode`] with attribute/child/text accessors and [`XmlNode::find`]
//! - [`ParsedResponse::api_error`] for detecting an API-level `<error>` element
//! - [`XmlNode::to_json`] for the compact JSON projection (`_attributes`, `_text`)
//!
//! # Tree conventions
//!
//! - Attributes are folded into `_attributes` in the JSON projection.
//! - Children are keyed by tag name. Sibling elements sharing a tag name are all
//!   kept, in document order; the JSON projection renders them as an array.
//! - Namespace prefixes are kept verbatim as part of the tag name.

pub mod error;
pub mod tree;

pub use error::XmlError;
pub use tree::{ERROR_ELEMENT, ParsedResponse, XmlNode, parse};
