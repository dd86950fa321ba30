//! XML printer that outputs node trees.

use std::collections::HashMap;
use std::io::Write;

use crate::node::{NodeRef, XmlContent};

/// Options for XML printing.
#[derive(Debug, Clone, Default)]
pub struct XmlPrinterOptions {
    /// Whether to pretty-print with indentation.
    pub pretty_print: bool,
}

/// XML printer that outputs node trees.
pub struct XmlPrinter<W: Write> {
    writer: W,
    options: XmlPrinterOptions,
}

impl<W: Write> XmlPrinter<W> {
    /// Creates a new XML printer.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, XmlPrinterOptions::default())
    }

    /// Creates a new XML printer with the given options.
    pub fn with_options(writer: W, options: XmlPrinterOptions) -> Self {
        XmlPrinter { writer, options }
    }

    /// Prints a node tree to the output, with an XML declaration.
    pub fn print(&mut self, root: &NodeRef) -> std::io::Result<()> {
        write!(self.writer, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
        if self.options.pretty_print {
            writeln!(self.writer)?;
        }
        self.print_fragment(root)?;
        self.writer.flush()
    }

    /// Prints a node tree without an XML declaration.
    pub fn print_fragment(&mut self, root: &NodeRef) -> std::io::Result<()> {
        self.print_node(root, 0)
    }

    fn print_node(&mut self, node: &NodeRef, indent: usize) -> std::io::Result<()> {
        let borrowed = node.borrow();

        match borrowed.content() {
            None => {
                // Document root: print children only.
                for child in borrowed.children() {
                    self.print_node(child, indent)?;
                }
            }
            Some(XmlContent::Text(text)) => {
                self.write_indent(indent)?;
                write!(self.writer, "{}", to_entities(text.text()))?;
                self.write_newline()?;
            }
            Some(XmlContent::Comment(comment)) => {
                self.write_indent(indent)?;
                write!(self.writer, "<!--{}-->", comment.text())?;
                self.write_newline()?;
            }
            Some(XmlContent::Element(element)) => {
                self.write_indent(indent)?;
                write!(
                    self.writer,
                    "<{}{}",
                    element.qname(),
                    attributes_str(element.attributes())
                )?;

                if borrowed.child_count() == 0 {
                    write!(self.writer, " />")?;
                    self.write_newline()?;
                } else if self.is_text_only(&borrowed) {
                    // Keep text content inline so round-trips stay stable.
                    write!(self.writer, ">")?;
                    for child in borrowed.children() {
                        if let Some(XmlContent::Text(t)) = child.borrow().content() {
                            write!(self.writer, "{}", to_entities(t.text()))?;
                        }
                    }
                    write!(self.writer, "</{}>", element.qname())?;
                    self.write_newline()?;
                } else {
                    write!(self.writer, ">")?;
                    self.write_newline()?;
                    for child in borrowed.children() {
                        self.print_node(child, indent + 1)?;
                    }
                    self.write_indent(indent)?;
                    write!(self.writer, "</{}>", element.qname())?;
                    self.write_newline()?;
                }
            }
        }

        Ok(())
    }

    fn is_text_only(&self, node: &crate::node::NodeInner) -> bool {
        node.children()
            .iter()
            .all(|c| c.borrow().content().is_some_and(XmlContent::is_text))
    }

    fn write_indent(&mut self, indent: usize) -> std::io::Result<()> {
        if self.options.pretty_print {
            write!(self.writer, "{}", "  ".repeat(indent))?;
        }
        Ok(())
    }

    fn write_newline(&mut self) -> std::io::Result<()> {
        if self.options.pretty_print {
            writeln!(self.writer)?;
        }
        Ok(())
    }
}

/// Renders attributes sorted by name for deterministic output.
fn attributes_str(attrs: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = attrs.keys().collect();
    names.sort();

    let mut out = String::new();
    for name in names {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&to_entities(&attrs[name]));
        out.push('"');
    }
    out
}

/// Escapes XML special characters.
fn to_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Prints a node tree to a string without declaration or indentation.
pub fn print_to_string(root: &NodeRef) -> String {
    let mut out = Vec::new();
    let mut printer = XmlPrinter::new(&mut out);
    // Writing into a Vec cannot fail.
    printer.print_fragment(root).expect("write to Vec");
    String::from_utf8(out).expect("printer output is UTF-8")
}

/// Prints a node tree to a pretty-printed string without declaration.
pub fn print_to_string_pretty(root: &NodeRef) -> String {
    let mut out = Vec::new();
    let mut printer = XmlPrinter::with_options(
        &mut out,
        XmlPrinterOptions { pretty_print: true },
    );
    printer.print_fragment(root).expect("write to Vec");
    String::from_utf8(out).expect("printer output is UTF-8")
}
