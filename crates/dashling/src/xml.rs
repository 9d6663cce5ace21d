//! Generic attributed-node tree over the quick-xml tokenizer.
//!
//! Everything above this module is tokenizer-agnostic: the tree builder only
//! sees [`XmlNode`] values with a local name, attributes, children in document
//! order and accumulated text content.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{DashlingError, DashlingResult};

pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    /// Local element name with any namespace prefix stripped.
    pub name: String,
    /// Attributes in document order. Names are local names, except xlink
    /// attributes which keep their `xlink:` prefix so they cannot collide
    /// with same-named plain attributes.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn xlink_attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.strip_prefix("xlink:") == Some(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn first_child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// Parse a complete document into its root element.
pub fn parse_tree(bytes: &[u8]) -> DashlingResult<XmlNode> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => stack.push(node_from_start(&start)?),
            Event::Empty(start) => {
                let node = node_from_start(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| DashlingError::MpdParsing("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                if let Some(open) = stack.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|e| DashlingError::MpdParsing(format!("bad text content: {e}")))?;
                    open.text.push_str(text.trim());
                }
            }
            Event::CData(data) => {
                if let Some(open) = stack.last_mut() {
                    let text = String::from_utf8_lossy(data.as_ref());
                    open.text.push_str(text.trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DashlingError::MpdParsing(
            "unterminated element".to_string(),
        ));
    }
    root.ok_or_else(|| DashlingError::MpdParsing("empty document".to_string()))
}

/// Parse a document fragment that may lack a single root (an xlink reply can
/// be a bare run of sibling `Period` elements). The bytes are wrapped in a
/// synthetic root first and its children are returned.
pub fn parse_fragment(bytes: &[u8]) -> DashlingResult<Vec<XmlNode>> {
    let mut wrapped = Vec::with_capacity(bytes.len() + 32);
    wrapped.extend_from_slice(b"<wrapper>");
    wrapped.extend_from_slice(bytes);
    wrapped.extend_from_slice(b"</wrapper>");

    Ok(parse_tree(&wrapped)?.children)
}

fn node_from_start(start: &BytesStart) -> DashlingResult<XmlNode> {
    let name = local_name(std::str::from_utf8(start.name().as_ref()).map_err(|_| {
        DashlingError::MpdParsing("element name is not valid UTF-8".to_string())
    })?)
    .to_string();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr =
            attr.map_err(|e| DashlingError::MpdParsing(format!("bad attribute: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(|_| {
            DashlingError::MpdParsing("attribute name is not valid UTF-8".to_string())
        })?;
        let value = attr
            .unescape_value()
            .map_err(|e| DashlingError::MpdParsing(format!("bad attribute value: {e}")))?
            .into_owned();

        let key = match key.split_once(':') {
            // Namespace declarations are not data.
            Some(("xmlns", _)) => continue,
            None if key == "xmlns" => continue,
            Some(("xlink", local)) => format!("xlink:{local}"),
            Some((_, local)) => local.to_string(),
            None => key.to_string(),
        };
        attributes.push((key, value));
    }

    Ok(XmlNode {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    stack: &mut [XmlNode],
    root: &mut Option<XmlNode>,
    node: XmlNode,
) -> DashlingResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => {
            return Err(DashlingError::MpdParsing(
                "multiple root elements".to_string(),
            ))
        }
    }
    Ok(())
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
