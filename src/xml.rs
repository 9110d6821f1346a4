//! Minimal element tree over `quick-xml` events.
//!
//! Management API documents are small, so the codec parses them into an owned
//! tree and queries it by local name. Namespace prefixes are dropped: `i:type`
//! is looked up as `type`, `atom:title` as `title`.

use crate::error::RuleError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Element {
    /// Local name (prefix stripped).
    pub name: String,
    /// Attributes keyed by local name, in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, RuleError> {
        let name = String::from_utf8(start.local_name().as_ref().to_vec())?;
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8(attr.key.local_name().as_ref().to_vec())?;
            let value = attr.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    /// Value of the first attribute with the given local name.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == local_name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct child elements in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First element named `local_name` in document order, including `self`.
    pub fn find(&self, local_name: &str) -> Option<&Element> {
        if self.name == local_name {
            return Some(self);
        }
        self.child_elements().find_map(|child| child.find(local_name))
    }

    /// Every element named `local_name` in document order, including `self`.
    /// Matches are not searched for nested matches.
    pub fn find_all<'a>(&'a self, local_name: &str, out: &mut Vec<&'a Element>) {
        if self.name == local_name {
            out.push(self);
            return;
        }
        for child in self.child_elements() {
            child.find_all(local_name, out);
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        let mut buf = String::new();
        self.collect_text(&mut buf);
        buf
    }

    fn collect_text(&self, buf: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) => buf.push_str(text),
                Node::Element(el) => el.collect_text(buf),
            }
        }
    }
}

/// Parse a document (or a single-rooted fragment) into its root element.
pub(crate) fn parse(xml: &str) -> Result<Element, RuleError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let el = Element::from_start(&start)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or_else(|| RuleError::Syntax("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(Node::Text(text.unescape()?.into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8(cdata.into_inner().into_owned())?;
                    parent.children.push(Node::Text(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(RuleError::Syntax(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| RuleError::Syntax("document has no root element".to_string()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
) -> Result<(), RuleError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None if root.is_none() => *root = Some(el),
        None => {
            return Err(RuleError::Syntax(format!(
                "multiple root elements, second is <{}>",
                el.name
            )))
        }
    }
    Ok(())
}
