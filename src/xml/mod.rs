//! Minimal mutable XML element tree over quick-xml.
//!
//! Part payloads are parsed into an in-memory tree, edited in place, and
//! serialized back. The tree preserves attribute order, child order, and
//! whitespace text nodes, so re-serialization of an edited part disturbs
//! nothing outside the edited nodes. Parsing is event-based via
//! `quick_xml::Reader`; serialization builds the output string directly with
//! entity escaping.

use quick_xml::Reader;
use quick_xml::events::Event;
use std::fmt::Write as FmtWrite;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML parse error: {0}")]
    Parse(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, XmlError>;

/// A node in the tree: a nested element or a text run.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// A mutable XML element with qualified name, ordered attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element with the given qualified name (e.g. "p:cTn").
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Create an element with the given attributes.
    pub fn with_attrs<S: Into<String>>(name: S, attrs: &[(&str, &str)]) -> Self {
        let mut el = Self::new(name);
        for (k, v) in attrs {
            el.set_attr(k, v);
        }
        el
    }

    /// Parse a document from raw bytes and return its root element.
    ///
    /// Comments, processing instructions and the XML declaration are dropped;
    /// whitespace between elements is kept as text nodes.
    pub fn parse(bytes: &[u8]) -> Result<XmlElement> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    stack.push(Self::from_start(e)?);
                },
                Ok(Event::Empty(ref e)) => {
                    let el = Self::from_start(e)?;
                    Self::attach(&mut stack, &mut root, el);
                },
                Ok(Event::End(_)) => {
                    // Reader validates nesting, so the stack cannot be empty here
                    let el = stack.pop().unwrap();
                    Self::attach(&mut stack, &mut root, el);
                },
                Ok(Event::Text(e)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = e.decode().map_err(|e| XmlError::Parse(e.to_string()))?;
                        top.push_text(&text);
                    }
                },
                Ok(Event::GeneralRef(e)) => {
                    // The reader splits text at entity references; resolve
                    // the predefined and numeric ones back into characters
                    if let Some(top) = stack.last_mut() {
                        let name = std::str::from_utf8(e.as_ref())?;
                        let ch = resolve_entity(name)
                            .ok_or_else(|| XmlError::Parse(format!("unknown entity &{};", name)))?;
                        top.push_text(&ch.to_string());
                    }
                },
                Ok(Event::CData(e)) => {
                    if let Some(top) = stack.last_mut() {
                        let text = std::str::from_utf8(e.as_ref())?.to_string();
                        top.push_text(&text);
                    }
                },
                Ok(Event::Eof) => break,
                Ok(_) => {},
                Err(e) => return Err(XmlError::Parse(e.to_string())),
            }
            buf.clear();
        }

        root.ok_or(XmlError::NoRoot)
    }

    fn from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
        let name = std::str::from_utf8(e.name().as_ref())?.to_string();
        let mut el = XmlElement::new(name);
        for attr in e.attributes() {
            let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr
                .unescape_value()
                .map_err(|e| XmlError::Parse(e.to_string()))?
                .into_owned();
            el.attrs.push((key, value));
        }
        Ok(el)
    }

    /// Append text, merging into a trailing text node when present.
    fn push_text(&mut self, text: &str) {
        if let Some(XmlNode::Text(existing)) = self.children.last_mut() {
            existing.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    fn attach(stack: &mut Vec<XmlElement>, root: &mut Option<XmlElement>, el: XmlElement) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(XmlNode::Element(el)),
            None => {
                if root.is_none() {
                    *root = Some(el);
                }
            },
        }
    }

    /// Serialize the element as a standalone document with XML declaration.
    pub fn to_document_bytes(&self) -> Vec<u8> {
        let mut out = String::with_capacity(1024);
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        self.write_into(&mut out);
        out.into_bytes()
    }

    /// Serialize the element without a declaration.
    pub fn to_fragment_string(&self) -> String {
        let mut out = String::with_capacity(256);
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            let _ = write!(out, r#" {}="{}""#, key, escape_attr(value));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                XmlNode::Element(el) => el.write_into(out),
                XmlNode::Text(text) => out.push_str(&escape_text(text)),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Get the qualified name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the local name (qualified name with any prefix stripped).
    #[inline]
    pub fn local_name(&self) -> &str {
        match self.name.find(':') {
            Some(pos) => &self.name[pos + 1..],
            None => &self.name,
        }
    }

    /// Check whether this element answers to the given name, by qualified
    /// name or by local name.
    pub fn is_named(&self, name: &str) -> bool {
        self.name == name || self.local_name() == local_of(name)
    }

    /// Get an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value for the same key.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.attrs.push((key.to_string(), value.to_string()));
        }
    }

    /// Concatenated direct text content of this element.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let XmlNode::Text(text) = child {
                out.push_str(text);
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: &str) {
        self.children.clear();
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Iterator over child elements (text nodes skipped).
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// Mutable iterator over child elements.
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|n| match n {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.is_named(name))
    }

    /// First child element matching a predicate.
    pub fn find_child(&self, pred: impl Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        self.child_elements().find(|el| pred(el))
    }

    /// First child element matching a predicate, mutable.
    pub fn find_child_mut(
        &mut self,
        pred: impl Fn(&XmlElement) -> bool,
    ) -> Option<&mut XmlElement> {
        self.child_elements_mut().find(|el| pred(el))
    }

    /// First child element with the given name, mutable.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlElement> {
        self.child_elements_mut().find(|el| el.is_named(name))
    }

    /// Append a child element.
    pub fn push(&mut self, el: XmlElement) {
        self.children.push(XmlNode::Element(el));
    }

    /// Insert a child element at the given position among all child nodes.
    pub fn insert(&mut self, index: usize, el: XmlElement) {
        let index = index.min(self.children.len());
        self.children.insert(index, XmlNode::Element(el));
    }

    /// Position of the first child element matching a predicate, counted
    /// over all child nodes (for use with [`XmlElement::insert`]).
    pub fn position_of_child(&self, pred: impl Fn(&XmlElement) -> bool) -> Option<usize> {
        self.children.iter().position(|n| match n {
            XmlNode::Element(el) => pred(el),
            XmlNode::Text(_) => false,
        })
    }

    /// Remove child elements matching the predicate; text nodes are kept.
    pub fn retain_children(&mut self, mut keep: impl FnMut(&XmlElement) -> bool) {
        self.children.retain(|n| match n {
            XmlNode::Element(el) => keep(el),
            XmlNode::Text(_) => true,
        });
    }

    /// Find the first child element matching name and all given attributes,
    /// or create it with exactly those attributes. Returns the child.
    ///
    /// This is the find-or-create primitive used to synthesize missing
    /// ancestor wrappers in slide XML without clobbering existing ones.
    pub fn ensure_child(&mut self, name: &str, attrs: &[(&str, &str)]) -> &mut XmlElement {
        let pos = self.children.iter().position(|n| match n {
            XmlNode::Element(el) => {
                el.is_named(name) && attrs.iter().all(|(k, v)| el.attr(k) == Some(v))
            },
            XmlNode::Text(_) => false,
        });

        let idx = match pos {
            Some(idx) => idx,
            None => {
                self.children
                    .push(XmlNode::Element(XmlElement::with_attrs(name, attrs)));
                self.children.len() - 1
            },
        };

        match &mut self.children[idx] {
            XmlNode::Element(el) => el,
            // Position above only matches element nodes
            XmlNode::Text(_) => unreachable!(),
        }
    }

    /// Visit every descendant element, depth-first.
    pub fn walk(&self, visit: &mut dyn FnMut(&XmlElement)) {
        for child in self.child_elements() {
            visit(child);
            child.walk(visit);
        }
    }

    /// Check whether any descendant (or self) matches the predicate.
    pub fn has_descendant(&self, pred: &dyn Fn(&XmlElement) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        self.child_elements().any(|c| c.has_descendant(pred))
    }
}

/// Resolve a predefined or numeric character entity name to its character.
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        },
    }
}

#[inline]
fn local_of(name: &str) -> &str {
    match name.find(':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

/// Escape XML special characters for text content.
#[inline]
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape XML special characters for attribute values.
#[inline]
pub fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
