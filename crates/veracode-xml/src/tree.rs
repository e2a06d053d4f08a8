//! Decoding Veracode XML responses into a [`ParsedResponse`] tree.
//!
//! The decoder is a single pass over quick-xml events with an explicit stack of
//! open elements. Each element becomes an [`XmlNode`] holding its attributes,
//! its trimmed text and its children keyed by tag name.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::XmlError;

/// The tag name that marks an API-level failure anywhere in a response.
pub const ERROR_ELEMENT: &str = "error";

/// Key under which attributes appear in the JSON projection.
const ATTRIBUTES_KEY: &str = "_attributes";

/// Key under which text content appears in the JSON projection.
const TEXT_KEY: &str = "_text";

/// One decoded XML element.
///
/// A node does not know its own tag name; its parent stores it under that name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    attributes: BTreeMap<String, String>,
    children: BTreeMap<String, Vec<XmlNode>>,
    text: Option<String>,
}

impl XmlNode {
    /// All attributes of this element.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// A single attribute value.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The first child element with the given tag name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.get(name).and_then(|nodes| nodes.first())
    }

    /// Every child element with the given tag name, in document order.
    #[must_use]
    pub fn children(&self, name: &str) -> &[XmlNode] {
        self.children.get(name).map_or(&[], Vec::as_slice)
    }

    /// The element's own text content, trimmed. `None` if it had no text.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Depth-first search for the first descendant with the given tag name.
    ///
    /// Children of a node are visited before descending into them, so the
    /// shallowest match under each subtree wins.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if let Some(found) = self.child(name) {
            return Some(found);
        }
        self.children
            .values()
            .flatten()
            .find_map(|child| child.find(name))
    }

    /// Compact JSON projection of this node.
    ///
    /// Attributes go under `_attributes`, text under `_text`, and children under
    /// their tag name. A tag repeated among siblings becomes an array.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();

        if !self.attributes.is_empty() {
            let attrs = self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            object.insert(ATTRIBUTES_KEY.to_owned(), Value::Object(attrs));
        }
        if let Some(text) = &self.text {
            object.insert(TEXT_KEY.to_owned(), Value::String(text.clone()));
        }
        for (name, nodes) in &self.children {
            let value = match nodes.as_slice() {
                [single] => single.to_json(),
                many => Value::Array(many.iter().map(XmlNode::to_json).collect()),
            };
            object.insert(name.clone(), value);
        }

        Value::Object(object)
    }

    fn push_child(&mut self, name: String, node: XmlNode) {
        self.children.entry(name).or_default().push(node);
    }
}

/// A decoded response document.
///
/// The document node holds the root element as its only child. A document
/// without a root element is empty, see [`ParsedResponse::is_empty`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResponse {
    document: XmlNode,
    root_name: Option<String>,
}

impl ParsedResponse {
    /// The tag name of the root element.
    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        self.root_name.as_deref()
    }

    /// The root element.
    #[must_use]
    pub fn root(&self) -> Option<&XmlNode> {
        self.root_name
            .as_deref()
            .and_then(|name| self.document.child(name))
    }

    /// Whether the body held no element at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root_name.is_none()
    }

    /// Search the whole document, root included, for an element by tag name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        self.document.find(name)
    }

    /// The message of an API-level `<error>` element anywhere in the document.
    ///
    /// Returns the element's text, or an empty string for an empty `<error/>`.
    #[must_use]
    pub fn api_error(&self) -> Option<String> {
        self.find(ERROR_ELEMENT)
            .map(|node| node.text().unwrap_or_default().to_owned())
    }

    /// Compact JSON projection of the whole document, keyed by root tag name.
    #[must_use]
    pub fn to_json(&self) -> Value {
        self.document.to_json()
    }
}

/// Decode an XML response body.
///
/// A body with no element (empty, whitespace, or only a declaration/comments)
/// decodes to an empty [`ParsedResponse`]. Text outside the root element is a
/// parse error.
///
/// # Errors
///
/// Returns `XmlError` if the body is not well-formed XML.
///
/// # Examples
///
/// ```
/// let parsed = veracode_xml::parse(r#"<applist><app app_id="1"/></applist>"#).unwrap();
/// let app = parsed.root().unwrap().child("app").unwrap();
/// assert_eq!(app.attribute("app_id"), Some("1"));
/// ```
pub fn parse(body: &str) -> Result<ParsedResponse, XmlError> {
    let mut reader = Reader::from_str(body);
    let mut response = ParsedResponse::default();
    // Open elements, innermost last, each with its raw (untrimmed) text.
    let mut stack: Vec<(String, XmlNode, String)> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let (name, node) = open_element(&e)?;
                stack.push((name, node, String::new()));
            }
            Event::Empty(e) => {
                let (name, node) = open_element(&e)?;
                attach(&mut stack, &mut response, name, node)?;
            }
            Event::End(_) => {
                let Some((name, mut node, text)) = stack.pop() else {
                    return Err(XmlError::ParseError("closing tag without open element".to_owned()));
                };
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    node.text = Some(trimmed.to_owned());
                }
                attach(&mut stack, &mut response, name, node)?;
            }
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                push_text(&mut stack, &decoded)?;
            }
            Event::CData(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                push_text(&mut stack, &decoded)?;
            }
            Event::GeneralRef(e) => {
                let resolved = match e
                    .resolve_char_ref()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?
                {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = e
                            .decode()
                            .map_err(|err| XmlError::ParseError(err.to_string()))?;
                        quick_xml::escape::resolve_predefined_entity(&name)
                            .ok_or_else(|| XmlError::ParseError(format!("unknown entity &{name};")))?
                            .to_owned()
                    }
                };
                push_text(&mut stack, &resolved)?;
            }
            Event::Eof => {
                if let Some((name, _, _)) = stack.pop() {
                    return Err(XmlError::UnexpectedEof(name));
                }
                break;
            }
            // Declarations, comments, processing instructions, doctype.
            _ => {}
        }
    }

    if response.root_name.is_none() {
        debug!(len = body.len(), "response body holds no element");
    }
    Ok(response)
}

/// Build a node from a start or empty tag.
fn open_element(e: &BytesStart<'_>) -> Result<(String, XmlNode), XmlError> {
    let name = e.name();
    let name = std::str::from_utf8(name.as_ref())
        .map_err(|err| XmlError::ParseError(err.to_string()))?
        .to_owned();

    let mut node = XmlNode::default();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| XmlError::ParseError(err.to_string()))?
            .to_owned();
        let raw = std::str::from_utf8(&attr.value)
            .map_err(|err| XmlError::ParseError(err.to_string()))?;
        let value = quick_xml::escape::unescape(raw)
            .map_err(|err| XmlError::ParseError(err.to_string()))?;
        node.attributes.insert(key, value.into_owned());
    }

    Ok((name, node))
}

/// Attach a finished element to its parent, or make it the document root.
fn attach(
    stack: &mut [(String, XmlNode, String)],
    response: &mut ParsedResponse,
    name: String,
    node: XmlNode,
) -> Result<(), XmlError> {
    if let Some((_, parent, _)) = stack.last_mut() {
        parent.push_child(name, node);
        return Ok(());
    }
    if let Some(existing) = &response.root_name {
        return Err(XmlError::ParseError(format!(
            "multiple root elements: <{existing}> and <{name}>"
        )));
    }
    response.root_name = Some(name.clone());
    response.document.push_child(name, node);
    Ok(())
}

/// Append text to the innermost open element.
fn push_text(stack: &mut [(String, XmlNode, String)], text: &str) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some((_, _, buf)) => {
            buf.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(XmlError::ParseError(
            "text content outside of the root element".to_owned(),
        )),
    }
}
