//! Minimal write-only XML element tree
//!
//! The GEXF output is write-only, so this module only knows how to build
//! and serialize elements. Attribute order is insertion order.

use std::fmt;

/// A single XML element with attributes, children, and optional text.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    /// Creates an empty element with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Sets an attribute, keeping insertion order.
    ///
    /// Setting the same attribute twice overwrites the first value in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = value;
        } else {
            self.attrs.push((name, value));
        }
        self
    }

    /// Sets the text content of the element.
    pub fn set_text(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(text.into());
        self
    }

    /// Appends a child element.
    pub fn append(&mut self, child: Element) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Appends all elements from `children`.
    pub fn extend(&mut self, children: Vec<Element>) -> &mut Self {
        self.children.extend(children);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Looks up an attribute value by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Consumes the element and returns its children, dropping the wrapper.
    pub fn into_children(self) -> Vec<Element> {
        self.children
    }

    /// Serializes the element and its subtree to a string.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            escape_into(text, false, out);
        }
        for child in &self.children {
            child.write_into(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}

/// A complete document: an XML declaration plus a root element.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    root: Element,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn into_root(self) -> Element {
        self.root
    }
}

impl fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>{}",
            self.root.to_xml()
        )
    }
}

fn escape_into(raw: &str, in_attr: bool, out: &mut String) {
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
