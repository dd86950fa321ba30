//! Node structures for XML tree representation.
//!
//! Documents are trees of reference-counted nodes. A parsed document is
//! rooted at a synthetic document node (content `None`) whose children are
//! the top-level element plus any top-level comments. Nodes carry a unique
//! id, which is the identity used when tracking consumed nodes during a
//! merge run.

mod content;

pub use content::{XmlComment, XmlContent, XmlElement, XmlText};

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique node IDs.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique node ID.
fn next_node_id() -> u64 {
    NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A reference-counted pointer to a node.
pub type NodeRef = Rc<RefCell<NodeInner>>;

/// A weak pointer to a node, used for parent links.
pub type WeakNodeRef = Weak<RefCell<NodeInner>>;

/// The inner data of a node in a document tree.
///
/// Each node has:
/// - 0 or more children
/// - XML content (element, text, or comment; `None` for the document root)
/// - A parent (except for the document root)
/// - A position among siblings
#[derive(Debug)]
pub struct NodeInner {
    /// Unique identifier for this node.
    id: u64,
    /// Child nodes.
    children: Vec<NodeRef>,
    /// XML content of this node.
    content: Option<XmlContent>,
    /// Weak reference to parent node.
    parent: WeakNodeRef,
    /// Zero-based position among siblings (-1 for a detached or root node).
    child_pos: i32,
}

impl NodeInner {
    fn new(content: Option<XmlContent>) -> Self {
        NodeInner {
            id: next_node_id(),
            children: Vec::new(),
            content,
            parent: Weak::new(),
            child_pos: -1,
        }
    }

    /// Returns the unique ID of this node.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true if this is a document root node (no content).
    pub fn is_document(&self) -> bool {
        self.content.is_none()
    }

    /// Returns the content of this node.
    pub fn content(&self) -> Option<&XmlContent> {
        self.content.as_ref()
    }

    /// Returns a mutable reference to the content.
    pub fn content_mut(&mut self) -> Option<&mut XmlContent> {
        self.content.as_mut()
    }

    /// Sets the content of this node.
    pub fn set_content(&mut self, content: Option<XmlContent>) {
        self.content = content;
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Returns a reference to the child at the given index.
    pub fn child(&self, index: usize) -> Option<&NodeRef> {
        self.children.get(index)
    }

    /// Returns the children as a slice.
    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    /// Returns a weak reference to the parent.
    pub fn parent(&self) -> &WeakNodeRef {
        &self.parent
    }

    /// Returns the child position (0-based index among siblings, -1 for
    /// root or detached nodes).
    pub fn child_pos(&self) -> i32 {
        self.child_pos
    }

    /// Returns the element qualified name, if this node is an element.
    pub fn qname(&self) -> Option<&str> {
        match &self.content {
            Some(XmlContent::Element(e)) => Some(e.qname()),
            _ => None,
        }
    }
}

/// Helper functions that work with NodeRef.
impl NodeInner {
    /// Appends a child node.
    pub fn add_child_to_ref(parent_ref: &NodeRef, child_ref: NodeRef) {
        {
            let mut child = child_ref.borrow_mut();
            child.parent = Rc::downgrade(parent_ref);
            child.child_pos = parent_ref.borrow().children.len() as i32;
        }
        parent_ref.borrow_mut().children.push(child_ref);
    }

    /// Inserts a child at the given index.
    pub fn add_child_at_to_ref(parent_ref: &NodeRef, index: usize, child_ref: NodeRef) {
        {
            let mut child = child_ref.borrow_mut();
            child.parent = Rc::downgrade(parent_ref);
            child.child_pos = index as i32;
        }
        {
            let mut parent = parent_ref.borrow_mut();
            parent.children.insert(index, child_ref);
            for i in (index + 1)..parent.children.len() {
                parent.children[i].borrow_mut().child_pos = i as i32;
            }
        }
    }

    /// Replaces the child at the given index, fixing up the links of both
    /// the incoming and the outgoing node.
    pub fn replace_child_to_ref(parent_ref: &NodeRef, index: usize, child_ref: NodeRef) {
        let old = {
            let parent = parent_ref.borrow();
            parent.children.get(index).cloned()
        };
        let Some(old) = old else { return };
        {
            let mut outgoing = old.borrow_mut();
            outgoing.parent = Weak::new();
            outgoing.child_pos = -1;
        }
        {
            let mut incoming = child_ref.borrow_mut();
            incoming.parent = Rc::downgrade(parent_ref);
            incoming.child_pos = index as i32;
        }
        parent_ref.borrow_mut().children[index] = child_ref;
    }

    /// Removes the child at the given index.
    pub fn remove_child_to_ref(parent_ref: &NodeRef, index: usize) {
        let mut parent = parent_ref.borrow_mut();
        if index < parent.children.len() {
            let old = parent.children.remove(index);
            {
                let mut outgoing = old.borrow_mut();
                outgoing.parent = Weak::new();
                outgoing.child_pos = -1;
            }
            for i in index..parent.children.len() {
                parent.children[i].borrow_mut().child_pos = i as i32;
            }
        }
    }

    /// Removes all children.
    pub fn remove_children_to_ref(parent_ref: &NodeRef) {
        let old: Vec<NodeRef> = parent_ref.borrow_mut().children.drain(..).collect();
        for child in old {
            let mut outgoing = child.borrow_mut();
            outgoing.parent = Weak::new();
            outgoing.child_pos = -1;
        }
    }
}

/// Creates a new document root node (no content).
pub fn new_document_node() -> NodeRef {
    Rc::new(RefCell::new(NodeInner::new(None)))
}

/// Creates a new node with the given content.
pub fn new_node(content: XmlContent) -> NodeRef {
    Rc::new(RefCell::new(NodeInner::new(Some(content))))
}

/// Returns true if the two references point at the same node.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Rc::ptr_eq(a, b)
}

/// Deep-copies a subtree, producing fresh nodes with new ids.
///
/// The copy is detached: its root has no parent and child position -1.
pub fn deep_copy(node: &NodeRef) -> NodeRef {
    let borrowed = node.borrow();
    let copy = Rc::new(RefCell::new(NodeInner::new(borrowed.content.clone())));
    for child in &borrowed.children {
        NodeInner::add_child_to_ref(&copy, deep_copy(child));
    }
    copy
}
