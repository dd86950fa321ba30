//! xml-weave - hierarchical, strategy-driven XML merging.
//!
//! This library merges a "patch" XML document into a "base" XML document at
//! merge points identified by path expressions. Different subtrees of a
//! document can be merged with different policies (replace nodes, append
//! children, merge attributes, skip), and policies nest: a handler
//! governing a broad region can delegate narrower sub-regions to child
//! handlers, whose claims are excluded from the broader handler's own
//! processing.
//!
//! # Example
//!
//! Append the patch root's children to the base root, except `<a>`, which
//! is exempted by a nested skip handler:
//!
//! ```
//! use xml_weave::{InsertChildren, MergePoint, SkipNodes};
//! use xml_weave::xml::{parse_str, print_to_string};
//!
//! let base = parse_str("<root><a/><b/></root>")?;
//! let patch = parse_str("<root><a/><d/></root>")?;
//!
//! let handler = InsertChildren::with_children(
//!     "/root",
//!     vec![Box::new(SkipNodes::new("/root/a"))],
//! );
//!
//! MergePoint::new(base.clone(), patch).run(&handler, Vec::new())?;
//! assert_eq!(print_to_string(&base), "<root><a /><b /><d /></root>");
//! # Ok::<(), xml_weave::Error>(())
//! ```

pub mod error;
pub mod merge;
pub mod node;
pub mod path;
pub mod xml;

// Re-export commonly used types
pub use error::{Error, Result};
pub use merge::{
    InsertChildren, MergeAttributes, MergeHandler, MergePoint, ReplaceNodes, SkipNodes,
};
pub use node::{
    deep_copy, new_document_node, new_node, same_node, NodeInner, NodeRef, WeakNodeRef,
    XmlComment, XmlContent, XmlElement, XmlText,
};
pub use path::{EvaluationError, PathResolver, XPathResolver};
pub use xml::{parse_file, parse_str, print_to_string, print_to_string_pretty};
