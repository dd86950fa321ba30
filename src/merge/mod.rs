//! Hierarchical merging of two documents at path-addressed merge points.
//!
//! A [`MergePoint`] owns a base document, a patch document, and a path
//! resolver. Given a hierarchy of [`MergeHandler`]s it walks the hierarchy
//! depth-first, children before parents: every handler's child handlers run
//! first, and the nodes they claim are recorded in a consumed-node set that
//! later siblings and every ancestor receive. A broad handler can thereby
//! delegate narrow sub-regions to nested handlers and skip whatever those
//! already claimed.
//!
//! For example, a handler replacing all children of a node with the patch
//! document's children can carry a nested handler that exempts one child,
//! letting it contribute additively instead.

mod handlers;

pub use handlers::{InsertChildren, MergeAttributes, ReplaceNodes, SkipNodes};

use tracing::{debug, trace};

use crate::error::Result;
use crate::node::NodeRef;
use crate::path::{PathResolver, XPathResolver};

/// A merge strategy bound to a path expression.
///
/// Handlers form a tree: each governs the region its expression addresses
/// and may declare child handlers governing narrower, nested regions. The
/// hierarchy is read-only during a merge run.
pub trait MergeHandler {
    /// The path expression addressing the region this handler governs.
    fn xpath(&self) -> &str;

    /// Nested handlers, in the order they must run.
    fn children(&self) -> &[Box<dyn MergeHandler>] {
        &[]
    }

    /// Performs the merge for one region.
    ///
    /// `base_nodes` and `patch_nodes` are this handler's matches in the two
    /// documents; `consumed` is every node some handler has already claimed
    /// during this run (it may contain duplicates). Returns the nodes this
    /// handler now claims. Implementations are free to respect or ignore
    /// the consumed set, but well-behaved ones skip nodes found in it.
    fn merge(
        &self,
        base_nodes: &[NodeRef],
        patch_nodes: &[NodeRef],
        consumed: &[NodeRef],
    ) -> Result<Vec<NodeRef>>;
}

/// Coordinates one merge run over a pair of documents.
///
/// Construction is cheap; a `MergePoint` is made per run and discarded.
/// The documents are only mutated by the handlers it drives, never by the
/// coordinator itself.
pub struct MergePoint<R = XPathResolver> {
    base: NodeRef,
    patch: NodeRef,
    resolver: R,
}

impl MergePoint<XPathResolver> {
    /// Creates a merge point over the two documents using the built-in
    /// path resolver.
    pub fn new(base: NodeRef, patch: NodeRef) -> Self {
        Self::with_resolver(base, patch, XPathResolver)
    }
}

impl<R: PathResolver> MergePoint<R> {
    /// Creates a merge point with a custom path resolver.
    pub fn with_resolver(base: NodeRef, patch: NodeRef, resolver: R) -> Self {
        MergePoint {
            base,
            patch,
            resolver,
        }
    }

    /// Runs the merge for a handler hierarchy.
    ///
    /// `initial_consumed` seeds the consumed-node set (usually empty; a
    /// caller chaining several runs over the same documents passes the
    /// previous run's result). Returns the final consumed set: the seed
    /// followed by every claim, appended in depth-first completion order.
    ///
    /// The run is all-or-nothing: the first [`EvaluationError`] anywhere in
    /// the hierarchy aborts it, and handlers that already executed are not
    /// rolled back.
    ///
    /// [`EvaluationError`]: crate::path::EvaluationError
    pub fn run(
        &self,
        handler: &dyn MergeHandler,
        initial_consumed: Vec<NodeRef>,
    ) -> Result<Vec<NodeRef>> {
        let mut consumed = initial_consumed;
        self.merge_point(handler, &mut consumed)?;
        Ok(consumed)
    }

    fn merge_point(&self, handler: &dyn MergeHandler, consumed: &mut Vec<NodeRef>) -> Result<()> {
        // Children first, in declaration order, each seeing the claims of
        // everything that ran before it.
        for child in handler.children() {
            self.merge_point(child.as_ref(), consumed)?;
        }

        let base_nodes = self.resolver.evaluate(handler.xpath(), &self.base)?;
        let patch_nodes = self.resolver.evaluate(handler.xpath(), &self.patch)?;

        match (base_nodes, patch_nodes) {
            (Some(base_nodes), Some(patch_nodes)) => {
                debug!(
                    xpath = handler.xpath(),
                    base = base_nodes.len(),
                    patch = patch_nodes.len(),
                    "merging region"
                );
                let claimed = handler.merge(&base_nodes, &patch_nodes, consumed)?;
                trace!(claimed = claimed.len(), "handler claimed nodes");
                consumed.extend(claimed);
            }
            _ => {
                // The region is absent on at least one side; the handler
                // does not run and this branch claims nothing.
                debug!(xpath = handler.xpath(), "region absent, skipping handler");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{new_node, XmlContent, XmlElement, XmlText};
    use crate::path::EvaluationError;
    use crate::xml::parse_str;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Handler that records its invocation and claims preset nodes.
    struct Probe {
        xpath: String,
        children: Vec<Box<dyn MergeHandler>>,
        label: &'static str,
        log: Rc<RefCell<Vec<(&'static str, Vec<u64>)>>>,
        claims: Vec<NodeRef>,
    }

    impl Probe {
        fn new(
            xpath: &str,
            label: &'static str,
            log: &Rc<RefCell<Vec<(&'static str, Vec<u64>)>>>,
            claims: Vec<NodeRef>,
        ) -> Self {
            Probe {
                xpath: xpath.to_string(),
                children: Vec::new(),
                label,
                log: log.clone(),
                claims,
            }
        }

        fn with_children(mut self, children: Vec<Box<dyn MergeHandler>>) -> Self {
            self.children = children;
            self
        }
    }

    impl MergeHandler for Probe {
        fn xpath(&self) -> &str {
            &self.xpath
        }

        fn children(&self) -> &[Box<dyn MergeHandler>] {
            &self.children
        }

        fn merge(
            &self,
            _base: &[NodeRef],
            _patch: &[NodeRef],
            consumed: &[NodeRef],
        ) -> Result<Vec<NodeRef>> {
            let seen = consumed.iter().map(|n| n.borrow().id()).collect();
            self.log.borrow_mut().push((self.label, seen));
            Ok(self.claims.clone())
        }
    }

    fn marker(name: &str) -> NodeRef {
        new_node(XmlContent::Element(XmlElement::new(
            name.to_string(),
            HashMap::new(),
        )))
    }

    fn docs() -> (NodeRef, NodeRef) {
        (
            parse_str("<root><a/><b/></root>").unwrap(),
            parse_str("<root><a/><c/></root>").unwrap(),
        )
    }

    #[test]
    fn test_children_run_before_parent_and_siblings_in_order() {
        let (base, patch) = docs();
        let log = Rc::new(RefCell::new(Vec::new()));

        let claim1 = marker("m1");
        let claim2 = marker("m2");
        let id1 = claim1.borrow().id();
        let id2 = claim2.borrow().id();

        let child1 = Probe::new("/root/a", "c1", &log, vec![claim1]);
        let child2 = Probe::new("/root/a", "c2", &log, vec![claim2]);
        let parent = Probe::new("/root", "p", &log, vec![])
            .with_children(vec![Box::new(child1), Box::new(child2)]);

        let point = MergePoint::new(base, patch);
        let consumed = point.run(&parent, Vec::new()).unwrap();

        let log = log.borrow();
        assert_eq!(
            log.iter().map(|(l, _)| *l).collect::<Vec<_>>(),
            ["c1", "c2", "p"]
        );
        // c1 starts from an empty set; c2 sees c1's claim; p sees both.
        assert_eq!(log[0].1, Vec::<u64>::new());
        assert_eq!(log[1].1, vec![id1]);
        assert_eq!(log[2].1, vec![id1, id2]);

        let ids: Vec<u64> = consumed.iter().map(|n| n.borrow().id()).collect();
        assert_eq!(ids, vec![id1, id2]);
    }

    #[test]
    fn test_depth_first_three_levels() {
        let (base, patch) = docs();
        let log = Rc::new(RefCell::new(Vec::new()));

        let c = Probe::new("/root/a", "c", &log, vec![]);
        let b = Probe::new("/root", "b", &log, vec![]).with_children(vec![Box::new(c)]);
        let a = Probe::new("/root", "a", &log, vec![]).with_children(vec![Box::new(b)]);

        MergePoint::new(base, patch).run(&a, Vec::new()).unwrap();

        assert_eq!(
            log.borrow().iter().map(|(l, _)| *l).collect::<Vec<_>>(),
            ["c", "b", "a"]
        );
    }

    #[test]
    fn test_absent_region_skips_handler() {
        let (base, patch) = docs();
        let log = Rc::new(RefCell::new(Vec::new()));

        // `/root/b` exists in base but not in patch.
        let handler = Probe::new("/root/b", "absent", &log, vec![marker("m")]);
        let consumed = MergePoint::new(base, patch)
            .run(&handler, Vec::new())
            .unwrap();

        assert!(log.borrow().is_empty());
        assert!(consumed.is_empty());
    }

    /// Resolver scripted per expression, for states the built-in engine
    /// never produces.
    struct Scripted;

    impl PathResolver for Scripted {
        fn evaluate(
            &self,
            expression: &str,
            root: &NodeRef,
        ) -> std::result::Result<Option<Vec<NodeRef>>, EvaluationError> {
            match expression {
                "empty" => Ok(Some(Vec::new())),
                "absent" => Ok(None),
                "boom" => Err(EvaluationError {
                    expression: expression.to_string(),
                    reason: "scripted failure".to_string(),
                }),
                _ => Ok(Some(vec![root.clone()])),
            }
        }
    }

    #[test]
    fn test_present_but_empty_still_invokes_handler() {
        let (base, patch) = docs();
        let log = Rc::new(RefCell::new(Vec::new()));

        let handler = Probe::new("empty", "e", &log, vec![]);
        MergePoint::with_resolver(base, patch, Scripted)
            .run(&handler, Vec::new())
            .unwrap();

        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_evaluation_error_aborts_run() {
        let (base, patch) = docs();
        let log = Rc::new(RefCell::new(Vec::new()));

        let failing = Probe::new("boom", "boom", &log, vec![]);
        let after = Probe::new("anything", "after", &log, vec![]);
        let parent = Probe::new("anything", "p", &log, vec![])
            .with_children(vec![Box::new(failing), Box::new(after)]);

        let result = MergePoint::with_resolver(base, patch, Scripted).run(&parent, Vec::new());

        assert!(matches!(result, Err(crate::Error::Evaluation(_))));
        // Neither the sibling after the failing handler nor the parent ran.
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_initial_consumed_is_preserved_prefix() {
        let (base, patch) = docs();
        let log = Rc::new(RefCell::new(Vec::new()));

        let seed = marker("seed");
        let seed_id = seed.borrow().id();
        let claim = marker("claim");
        let claim_id = claim.borrow().id();

        let handler = Probe::new("/root", "h", &log, vec![claim]);
        let consumed = MergePoint::new(base, patch)
            .run(&handler, vec![seed])
            .unwrap();

        // The handler saw the seed, and the result extends it by append.
        assert_eq!(log.borrow()[0].1, vec![seed_id]);
        let ids: Vec<u64> = consumed.iter().map(|n| n.borrow().id()).collect();
        assert_eq!(ids, vec![seed_id, claim_id]);
    }

    #[test]
    fn test_handler_claims_may_duplicate() {
        let (base, patch) = docs();
        let log = Rc::new(RefCell::new(Vec::new()));

        let shared = new_node(XmlContent::Text(XmlText::new("x")));
        let id = shared.borrow().id();

        let c1 = Probe::new("/root", "c1", &log, vec![shared.clone()]);
        let c2 = Probe::new("/root", "c2", &log, vec![shared]);
        let parent =
            Probe::new("/root", "p", &log, vec![]).with_children(vec![Box::new(c1), Box::new(c2)]);

        let consumed = MergePoint::new(base, patch)
            .run(&parent, Vec::new())
            .unwrap();

        let ids: Vec<u64> = consumed.iter().map(|n| n.borrow().id()).collect();
        assert_eq!(ids, vec![id, id]);
    }
}
