//! Stock merge handler policies.
//!
//! Each policy is a [`MergeHandler`] implementation holding its path
//! expression and its nested handlers. Policies pair base and patch matches,
//! skip patch nodes already present in the consumed set (deduplicating it by
//! node id, since the contract allows duplicates), edit the base document,
//! and claim the patch nodes they used.

use std::collections::HashMap;

use rustc_hash::FxHashSet;

use super::MergeHandler;
use crate::error::Result;
use crate::node::{deep_copy, NodeInner, NodeRef};

fn consumed_ids(consumed: &[NodeRef]) -> FxHashSet<u64> {
    consumed.iter().map(|n| n.borrow().id()).collect()
}

/// Replaces base matches with their patch counterparts.
///
/// Patch nodes are paired with base matches by element name plus an
/// identifying attribute (`id`, then `name`) when one is present, otherwise
/// by element name alone. Each paired base node is swapped out of its parent
/// for a deep copy of the patch node; patch nodes with no counterpart are
/// appended to the parent of the matched region.
pub struct ReplaceNodes {
    xpath: String,
    children: Vec<Box<dyn MergeHandler>>,
}

impl ReplaceNodes {
    /// Creates a replace policy for the given path expression.
    pub fn new(xpath: impl Into<String>) -> Self {
        Self::with_children(xpath, Vec::new())
    }

    /// Creates a replace policy with nested handlers.
    pub fn with_children(xpath: impl Into<String>, children: Vec<Box<dyn MergeHandler>>) -> Self {
        ReplaceNodes {
            xpath: xpath.into(),
            children,
        }
    }
}

impl MergeHandler for ReplaceNodes {
    fn xpath(&self) -> &str {
        &self.xpath
    }

    fn children(&self) -> &[Box<dyn MergeHandler>] {
        &self.children
    }

    fn merge(
        &self,
        base_nodes: &[NodeRef],
        patch_nodes: &[NodeRef],
        consumed: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        let ids = consumed_ids(consumed);
        let mut used = vec![false; base_nodes.len()];
        let mut claimed = Vec::new();

        // Captured before any replacement detaches a base match.
        let region_parent = base_nodes
            .iter()
            .find_map(|b| b.borrow().parent().upgrade());

        for patch_node in patch_nodes {
            if ids.contains(&patch_node.borrow().id()) {
                continue;
            }
            if patch_node.borrow().is_document() {
                continue;
            }

            if let Some(i) = find_replace_target(base_nodes, &used, patch_node) {
                used[i] = true;
                let target = &base_nodes[i];
                let parent = target.borrow().parent().upgrade();
                let index = target.borrow().child_pos();
                if let Some(parent) = parent {
                    if index >= 0 {
                        NodeInner::replace_child_to_ref(
                            &parent,
                            index as usize,
                            deep_copy(patch_node),
                        );
                        claimed.push(patch_node.clone());
                    }
                }
            } else if let Some(parent) = &region_parent {
                // No counterpart; contribute alongside the matched region.
                NodeInner::add_child_to_ref(parent, deep_copy(patch_node));
                claimed.push(patch_node.clone());
            }
        }

        Ok(claimed)
    }
}

fn find_replace_target(
    base_nodes: &[NodeRef],
    used: &[bool],
    patch_node: &NodeRef,
) -> Option<usize> {
    let patch_borrowed = patch_node.borrow();
    let element = patch_borrowed.content()?.as_element()?;
    let qname = element.qname();

    for key in ["id", "name"] {
        let Some(value) = element.attribute(key) else {
            continue;
        };
        let found = base_nodes.iter().enumerate().position(|(i, b)| {
            !used[i]
                && b.borrow().qname() == Some(qname)
                && b.borrow()
                    .content()
                    .and_then(|c| c.as_element())
                    .and_then(|e| e.attribute(key))
                    == Some(value)
        });
        if found.is_some() {
            return found;
        }
    }

    base_nodes
        .iter()
        .enumerate()
        .position(|(i, b)| !used[i] && b.borrow().qname() == Some(qname))
}

/// Appends the patch matches' children to the corresponding base matches.
///
/// Matches are paired by position. Patch children already in the consumed
/// set are skipped, which is how nested handlers exempt individual nodes
/// from the append.
pub struct InsertChildren {
    xpath: String,
    children: Vec<Box<dyn MergeHandler>>,
}

impl InsertChildren {
    /// Creates an insert-children policy for the given path expression.
    pub fn new(xpath: impl Into<String>) -> Self {
        Self::with_children(xpath, Vec::new())
    }

    /// Creates an insert-children policy with nested handlers.
    pub fn with_children(xpath: impl Into<String>, children: Vec<Box<dyn MergeHandler>>) -> Self {
        InsertChildren {
            xpath: xpath.into(),
            children,
        }
    }
}

impl MergeHandler for InsertChildren {
    fn xpath(&self) -> &str {
        &self.xpath
    }

    fn children(&self) -> &[Box<dyn MergeHandler>] {
        &self.children
    }

    fn merge(
        &self,
        base_nodes: &[NodeRef],
        patch_nodes: &[NodeRef],
        consumed: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        let ids = consumed_ids(consumed);
        let mut claimed = Vec::new();

        for (base_node, patch_node) in base_nodes.iter().zip(patch_nodes) {
            let patch_children: Vec<NodeRef> = patch_node.borrow().children().to_vec();
            for patch_child in patch_children {
                if ids.contains(&patch_child.borrow().id()) {
                    continue;
                }
                NodeInner::add_child_to_ref(base_node, deep_copy(&patch_child));
                claimed.push(patch_child);
            }
        }

        Ok(claimed)
    }
}

/// Copies the patch matches' attributes onto the corresponding base matches.
///
/// Matches are paired by position; the patch value wins when both documents
/// define an attribute. Base attributes absent from the patch are kept.
pub struct MergeAttributes {
    xpath: String,
    children: Vec<Box<dyn MergeHandler>>,
}

impl MergeAttributes {
    /// Creates an attribute-merge policy for the given path expression.
    pub fn new(xpath: impl Into<String>) -> Self {
        Self::with_children(xpath, Vec::new())
    }

    /// Creates an attribute-merge policy with nested handlers.
    pub fn with_children(xpath: impl Into<String>, children: Vec<Box<dyn MergeHandler>>) -> Self {
        MergeAttributes {
            xpath: xpath.into(),
            children,
        }
    }
}

impl MergeHandler for MergeAttributes {
    fn xpath(&self) -> &str {
        &self.xpath
    }

    fn children(&self) -> &[Box<dyn MergeHandler>] {
        &self.children
    }

    fn merge(
        &self,
        base_nodes: &[NodeRef],
        patch_nodes: &[NodeRef],
        consumed: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        let ids = consumed_ids(consumed);
        let mut claimed = Vec::new();

        for (base_node, patch_node) in base_nodes.iter().zip(patch_nodes) {
            if ids.contains(&patch_node.borrow().id()) {
                continue;
            }

            let patch_attrs: Option<HashMap<String, String>> = patch_node
                .borrow()
                .content()
                .and_then(|c| c.as_element())
                .map(|e| e.attributes().clone());

            if let Some(patch_attrs) = patch_attrs {
                let merged = {
                    let mut base_borrowed = base_node.borrow_mut();
                    match base_borrowed.content_mut().and_then(|c| c.as_element_mut()) {
                        Some(element) => {
                            for (name, value) in patch_attrs {
                                element.set_attribute(name, value);
                            }
                            true
                        }
                        None => false,
                    }
                };
                if merged {
                    claimed.push(patch_node.clone());
                }
            }
        }

        Ok(claimed)
    }
}

/// Claims its patch matches without editing anything.
///
/// Nested under a broader handler, this shields a region of the patch
/// document from that handler's processing.
pub struct SkipNodes {
    xpath: String,
    children: Vec<Box<dyn MergeHandler>>,
}

impl SkipNodes {
    /// Creates a skip policy for the given path expression.
    pub fn new(xpath: impl Into<String>) -> Self {
        Self::with_children(xpath, Vec::new())
    }

    /// Creates a skip policy with nested handlers.
    pub fn with_children(xpath: impl Into<String>, children: Vec<Box<dyn MergeHandler>>) -> Self {
        SkipNodes {
            xpath: xpath.into(),
            children,
        }
    }
}

impl MergeHandler for SkipNodes {
    fn xpath(&self) -> &str {
        &self.xpath
    }

    fn children(&self) -> &[Box<dyn MergeHandler>] {
        &self.children
    }

    fn merge(
        &self,
        _base_nodes: &[NodeRef],
        patch_nodes: &[NodeRef],
        consumed: &[NodeRef],
    ) -> Result<Vec<NodeRef>> {
        let ids = consumed_ids(consumed);
        Ok(patch_nodes
            .iter()
            .filter(|n| !ids.contains(&n.borrow().id()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::MergePoint;
    use crate::xml::{parse_str, print_to_string};

    #[test]
    fn test_replace_by_identifying_attribute() {
        let base = parse_str(
            r#"<beans><bean id="a" class="Old"/><bean id="b" class="Keep"/></beans>"#,
        )
        .unwrap();
        let patch = parse_str(r#"<beans><bean id="a" class="New"/></beans>"#).unwrap();

        let handler = ReplaceNodes::new("/beans/bean");
        let consumed = MergePoint::new(base.clone(), patch)
            .run(&handler, Vec::new())
            .unwrap();

        assert_eq!(consumed.len(), 1);
        assert_eq!(
            print_to_string(&base),
            r#"<beans><bean class="New" id="a" /><bean class="Keep" id="b" /></beans>"#
        );
    }

    #[test]
    fn test_replace_appends_unmatched_patch_nodes() {
        let base = parse_str(r#"<beans><bean id="a"/></beans>"#).unwrap();
        let patch = parse_str(r#"<beans><bean id="z"/></beans>"#).unwrap();

        // id differs and only one base bean exists, so the name fallback
        // pairs them; a second patch-only bean would be appended.
        let handler = ReplaceNodes::new("/beans/bean");
        MergePoint::new(base.clone(), patch)
            .run(&handler, Vec::new())
            .unwrap();

        assert_eq!(print_to_string(&base), r#"<beans><bean id="z" /></beans>"#);
    }

    #[test]
    fn test_replace_appends_when_no_counterpart_exists() {
        let base = parse_str(r#"<beans><bean id="a"/></beans>"#).unwrap();
        let patch =
            parse_str(r#"<beans><bean class="New" id="a"/><alias id="x"/></beans>"#).unwrap();

        let handler = ReplaceNodes::new("/beans/*");
        let consumed = MergePoint::new(base.clone(), patch)
            .run(&handler, Vec::new())
            .unwrap();

        assert_eq!(consumed.len(), 2);
        assert_eq!(
            print_to_string(&base),
            r#"<beans><bean class="New" id="a" /><alias id="x" /></beans>"#
        );
    }

    #[test]
    fn test_replace_skips_consumed() {
        let base = parse_str("<root><a/></root>").unwrap();
        let patch = parse_str("<root><a/></root>").unwrap();

        let handler = ReplaceNodes::with_children(
            "/root/a",
            vec![Box::new(SkipNodes::new("/root/a"))],
        );
        let consumed = MergePoint::new(base.clone(), patch)
            .run(&handler, Vec::new())
            .unwrap();

        // The nested skip claimed the patch <a/>, so replace touched nothing
        // and the only claim is the skip's.
        assert_eq!(consumed.len(), 1);
        assert_eq!(print_to_string(&base), "<root><a /></root>");
    }

    #[test]
    fn test_insert_children() {
        let base = parse_str("<root><a/></root>").unwrap();
        let patch = parse_str("<root><b/><c/></root>").unwrap();

        let handler = InsertChildren::new("/root");
        let consumed = MergePoint::new(base.clone(), patch)
            .run(&handler, Vec::new())
            .unwrap();

        assert_eq!(consumed.len(), 2);
        assert_eq!(print_to_string(&base), "<root><a /><b /><c /></root>");
    }

    #[test]
    fn test_merge_attributes_patch_wins() {
        let base = parse_str(r#"<root a="1" b="2"/>"#).unwrap();
        let patch = parse_str(r#"<root b="20" c="30"/>"#).unwrap();

        let handler = MergeAttributes::new("/root");
        let consumed = MergePoint::new(base.clone(), patch)
            .run(&handler, Vec::new())
            .unwrap();

        assert_eq!(consumed.len(), 1);
        assert_eq!(
            print_to_string(&base),
            r#"<root a="1" b="20" c="30" />"#
        );
    }

    #[test]
    fn test_skip_claims_without_editing() {
        let base = parse_str("<root><a/></root>").unwrap();
        let patch = parse_str("<root><a/></root>").unwrap();

        let handler = SkipNodes::new("/root/a");
        let consumed = MergePoint::new(base.clone(), patch.clone())
            .run(&handler, Vec::new())
            .unwrap();

        assert_eq!(consumed.len(), 1);
        // The claimed node is the patch document's <a/>, untouched.
        let patch_a = patch.borrow().children()[0].borrow().children()[0].clone();
        assert_eq!(consumed[0].borrow().id(), patch_a.borrow().id());
        assert_eq!(print_to_string(&base), "<root><a /></root>");
    }
}
