//! XML content types for tree nodes.

use std::collections::HashMap;

/// Represents the content of an XML node.
#[derive(Debug, Clone)]
pub enum XmlContent {
    /// An XML element with a qualified name and attributes.
    Element(XmlElement),
    /// XML text content.
    Text(XmlText),
    /// XML comment.
    Comment(XmlComment),
}

impl XmlContent {
    /// Returns true if this is an element node.
    pub fn is_element(&self) -> bool {
        matches!(self, XmlContent::Element(_))
    }

    /// Returns true if this is a text node.
    pub fn is_text(&self) -> bool {
        matches!(self, XmlContent::Text(_))
    }

    /// Returns true if this is a comment node.
    pub fn is_comment(&self) -> bool {
        matches!(self, XmlContent::Comment(_))
    }

    /// Returns a reference to the element, if this is an element node.
    pub fn as_element(&self) -> Option<&XmlElement> {
        match self {
            XmlContent::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns a mutable reference to the element, if this is an element node.
    pub fn as_element_mut(&mut self) -> Option<&mut XmlElement> {
        match self {
            XmlContent::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns a reference to the text, if this is a text node.
    pub fn as_text(&self) -> Option<&XmlText> {
        match self {
            XmlContent::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// An XML element: a qualified name plus attributes.
#[derive(Debug, Clone)]
pub struct XmlElement {
    qname: String,
    attributes: HashMap<String, String>,
}

impl XmlElement {
    /// Creates a new element with the given name and attributes.
    pub fn new(qname: String, attributes: HashMap<String, String>) -> Self {
        XmlElement { qname, attributes }
    }

    /// Returns the qualified name of this element.
    pub fn qname(&self) -> &str {
        &self.qname
    }

    /// Returns the attribute map.
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Returns the value of the named attribute, if present.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Sets (or overwrites) an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }
}

/// XML text content.
#[derive(Debug, Clone)]
pub struct XmlText {
    text: String,
}

impl XmlText {
    /// Creates a new text node content.
    pub fn new(text: impl Into<String>) -> Self {
        XmlText { text: text.into() }
    }

    /// Returns the text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// An XML comment.
#[derive(Debug, Clone)]
pub struct XmlComment {
    text: String,
}

impl XmlComment {
    /// Creates a new comment content.
    pub fn new(text: impl Into<String>) -> Self {
        XmlComment { text: text.into() }
    }

    /// Returns the comment text.
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_attributes() {
        let mut attrs = HashMap::new();
        attrs.insert("id".to_string(), "foo".to_string());
        let mut element = XmlElement::new("bean".to_string(), attrs);

        assert_eq!(element.qname(), "bean");
        assert_eq!(element.attribute("id"), Some("foo"));
        assert_eq!(element.attribute("class"), None);

        element.set_attribute("class", "bar");
        assert_eq!(element.attribute("class"), Some("bar"));
    }

    #[test]
    fn test_content_kinds() {
        let e = XmlContent::Element(XmlElement::new("a".to_string(), HashMap::new()));
        let t = XmlContent::Text(XmlText::new("hi"));
        let c = XmlContent::Comment(XmlComment::new("note"));

        assert!(e.is_element() && !e.is_text());
        assert!(t.is_text() && t.as_text().is_some());
        assert!(c.is_comment());
        assert!(e.as_element().is_some());
        assert!(t.as_element().is_none());
    }
}
