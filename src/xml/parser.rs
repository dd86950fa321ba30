//! XML parser that builds node trees.
//!
//! The parser uses quick-xml's streaming API. Each document is rooted at a
//! synthetic document node whose children are the top-level element and any
//! top-level comments.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{Error, Result};
use crate::node::{
    new_document_node, new_node, NodeInner, NodeRef, XmlComment, XmlContent, XmlElement, XmlText,
};

/// Parses XML from a string into a node tree.
pub fn parse_str(xml: &str) -> Result<NodeRef> {
    let mut reader = Reader::from_str(xml);
    // Whitespace normalization is handled below, not by the reader.
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;
    parse_reader(&mut reader)
}

/// Parses XML from a file into a node tree.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<NodeRef> {
    let file = File::open(path)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;
    parse_reader(&mut reader)
}

fn parse_reader<R: BufRead>(reader: &mut Reader<R>) -> Result<NodeRef> {
    let root = new_document_node();

    let mut node_stack: Vec<NodeRef> = vec![root.clone()];
    let mut current_text: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                flush_text(&mut current_text, &node_stack);
                let element = parse_element(e, reader)?;
                let node = new_node(XmlContent::Element(element));
                if let Some(parent) = node_stack.last() {
                    NodeInner::add_child_to_ref(parent, node.clone());
                }
                node_stack.push(node);
            }
            Ok(Event::End(_)) => {
                flush_text(&mut current_text, &node_stack);
                node_stack.pop();
            }
            Ok(Event::Empty(ref e)) => {
                flush_text(&mut current_text, &node_stack);
                let element = parse_element(e, reader)?;
                let node = new_node(XmlContent::Element(element));
                if let Some(parent) = node_stack.last() {
                    NodeInner::add_child_to_ref(parent, node);
                }
            }
            Ok(Event::Text(e)) => {
                let raw =
                    std::str::from_utf8(e.as_ref()).map_err(|e| Error::Parse(e.to_string()))?;
                let text = unescape(raw).map_err(|e| Error::Parse(e.to_string()))?;
                accumulate_text(&mut current_text, &text);
            }
            Ok(Event::CData(ref e)) => {
                let text = String::from_utf8_lossy(e.as_ref());
                accumulate_text(&mut current_text, &text);
            }
            Ok(Event::Comment(ref e)) => {
                let comment_text = String::from_utf8_lossy(e.as_ref()).to_string();
                let comment_node = new_node(XmlContent::Comment(XmlComment::new(comment_text)));
                if let Some(parent) = node_stack.last() {
                    NodeInner::add_child_to_ref(parent, comment_node);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {
                // Declarations, DOCTYPE, and processing instructions are skipped.
            }
            Err(e) => return Err(Error::Xml(e)),
        }
        buf.clear();
    }

    Ok(root)
}

/// Appends whitespace-normalized text to the pending text run.
fn accumulate_text(current_text: &mut Option<String>, text: &str) {
    if let Some(normalized) = normalize_whitespace(text, current_text.as_deref()) {
        match current_text {
            Some(existing) => existing.push_str(&normalized),
            None => *current_text = Some(normalized),
        }
    }
}

/// Flushes accumulated text as a text node under the current stack top.
fn flush_text(current_text: &mut Option<String>, node_stack: &[NodeRef]) {
    if let Some(text) = current_text.take() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            let text_node = new_node(XmlContent::Text(XmlText::new(trimmed)));
            if let Some(parent) = node_stack.last() {
                NodeInner::add_child_to_ref(parent, text_node);
            }
        }
    }
}

/// Parses an element's name and attributes.
fn parse_element<R: BufRead>(e: &BytesStart, reader: &Reader<R>) -> Result<XmlElement> {
    let name = reader
        .decoder()
        .decode(e.name().as_ref())
        .map_err(|e| Error::Parse(e.to_string()))?
        .to_string();

    let mut attributes = HashMap::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|e| Error::Parse(format!("Attribute error: {}", e)))?;
        let key = reader
            .decoder()
            .decode(attr.key.as_ref())
            .map_err(|e| Error::Parse(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(e.to_string()))?
            .to_string();
        attributes.insert(key, value);
    }

    Ok(XmlElement::new(name, attributes))
}

/// Collapses runs of whitespace to a single space.
///
/// Returns `None` when the chunk contains no non-whitespace content, so
/// whitespace-only text between elements never produces a node.
fn normalize_whitespace(text: &str, previous: Option<&str>) -> Option<String> {
    let mut last_was_ws = previous.is_none_or(|p| p.ends_with(' '));
    let mut has_non_ws = false;
    let mut result = String::new();

    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_ws {
                result.push(' ');
                last_was_ws = true;
            }
        } else {
            result.push(c);
            last_was_ws = false;
            has_non_ws = true;
        }
    }

    if has_non_ws {
        Some(result)
    } else {
        None
    }
}
