//! Path expression evaluation over node trees.
//!
//! The merge coordinator addresses regions of a document with path
//! expressions. [`PathResolver`] is the contract it evaluates them through;
//! [`XPathResolver`] is the built-in engine, implementing the XPath-like
//! subset merge configurations actually use:
//!
//! - absolute location paths: `/beans/bean`
//! - descendant search: `//bean`, also mid-path as in `/beans//property`
//! - wildcard element steps: `/beans/*`
//! - predicates, one per step: positional `[2]` (1-based) or attribute
//!   equality `[@id='value']`
//!
//! A resolution distinguishes *absent* (the expression matched nothing,
//! `Ok(None)`) from *present but empty* (`Ok(Some(vec![]))`). The built-in
//! engine only ever reports the former; the latter is reserved for custom
//! resolvers whose dialect has a native notion of an empty region.

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::trace;

use crate::node::NodeRef;

/// Failure to evaluate a path expression.
///
/// Raised when an expression is syntactically invalid or uses constructs
/// outside the supported dialect. Never raised for expressions that simply
/// match nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot evaluate path expression `{expression}`: {reason}")]
pub struct EvaluationError {
    /// The offending expression.
    pub expression: String,
    /// Why it could not be evaluated.
    pub reason: String,
}

impl EvaluationError {
    fn new(expression: &str, reason: impl Into<String>) -> Self {
        EvaluationError {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// A path-expression engine.
///
/// Implementations must be deterministic and side-effect free: evaluating
/// the same expression twice against an unchanged document returns the same
/// node set.
pub trait PathResolver {
    /// Evaluates `expression` against the tree rooted at `root`.
    ///
    /// Returns the matching nodes in document order, `Ok(None)` when the
    /// addressed region is absent, or an [`EvaluationError`] when the
    /// expression itself is invalid.
    fn evaluate(
        &self,
        expression: &str,
        root: &NodeRef,
    ) -> Result<Option<Vec<NodeRef>>, EvaluationError>;
}

/// The built-in path engine. Stateless; one instance serves a whole merge
/// run.
#[derive(Debug, Clone, Copy, Default)]
pub struct XPathResolver;

impl PathResolver for XPathResolver {
    fn evaluate(
        &self,
        expression: &str,
        root: &NodeRef,
    ) -> Result<Option<Vec<NodeRef>>, EvaluationError> {
        let steps = parse_expression(expression)?;

        let mut current = vec![root.clone()];
        for step in &steps {
            let mut next = Vec::new();
            for context in &current {
                next.extend(step.select(context));
            }
            current = dedup_by_id(next);
            if current.is_empty() {
                break;
            }
        }

        trace!(expression, matches = current.len(), "evaluated path expression");

        if current.is_empty() {
            Ok(None)
        } else {
            Ok(Some(current))
        }
    }
}

/// One location step of a parsed expression.
#[derive(Debug)]
struct Step {
    axis: Axis,
    test: NameTest,
    predicate: Option<Predicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// `/step`: direct children of the context node.
    Child,
    /// `//step`: all descendants of the context node.
    Descendant,
}

#[derive(Debug)]
enum NameTest {
    Name(String),
    Any,
}

#[derive(Debug)]
enum Predicate {
    /// 1-based position among the step's matches under one context node.
    Position(usize),
    /// Attribute equality: `[@name='value']`.
    Attribute { name: String, value: String },
}

impl Step {
    /// Selects this step's matches under a single context node.
    fn select(&self, context: &NodeRef) -> Vec<NodeRef> {
        let candidates = match self.axis {
            Axis::Child => context.borrow().children().to_vec(),
            Axis::Descendant => descendants(context),
        };

        let matched: Vec<NodeRef> = candidates
            .into_iter()
            .filter(|n| self.test.matches(n))
            .collect();

        match &self.predicate {
            None => matched,
            Some(Predicate::Position(n)) => {
                matched.into_iter().nth(n - 1).into_iter().collect()
            }
            Some(Predicate::Attribute { name, value }) => matched
                .into_iter()
                .filter(|node| {
                    let borrowed = node.borrow();
                    borrowed
                        .content()
                        .and_then(|c| c.as_element())
                        .and_then(|e| e.attribute(name))
                        .is_some_and(|v| v == value)
                })
                .collect(),
        }
    }
}

impl NameTest {
    fn matches(&self, node: &NodeRef) -> bool {
        let borrowed = node.borrow();
        match (self, borrowed.qname()) {
            (NameTest::Any, Some(_)) => true,
            (NameTest::Name(name), Some(qname)) => name == qname,
            _ => false,
        }
    }
}

/// All descendants of a node, in document (preorder) order.
fn descendants(node: &NodeRef) -> Vec<NodeRef> {
    fn collect(node: &NodeRef, out: &mut Vec<NodeRef>) {
        for child in node.borrow().children() {
            out.push(child.clone());
            collect(child, out);
        }
    }

    let mut out = Vec::new();
    collect(node, &mut out);
    out
}

/// Removes duplicate nodes, keeping first occurrences.
fn dedup_by_id(nodes: Vec<NodeRef>) -> Vec<NodeRef> {
    let mut seen = FxHashSet::default();
    nodes
        .into_iter()
        .filter(|n| seen.insert(n.borrow().id()))
        .collect()
}

fn parse_expression(expression: &str) -> Result<Vec<Step>, EvaluationError> {
    if expression.is_empty() {
        return Err(EvaluationError::new(expression, "empty expression"));
    }
    if !expression.starts_with('/') {
        return Err(EvaluationError::new(
            expression,
            "relative path expressions are not supported",
        ));
    }
    if expression == "/" {
        // The document root itself; zero steps.
        return Ok(Vec::new());
    }

    let mut steps = Vec::new();
    let mut rest = &expression[1..];
    loop {
        let axis = if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
            Axis::Descendant
        } else {
            Axis::Child
        };

        // Find the next step separator outside any predicate.
        let mut depth = 0usize;
        let mut split = rest.len();
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '/' if depth == 0 => {
                    split = i;
                    break;
                }
                _ => {}
            }
        }

        steps.push(parse_step(expression, &rest[..split], axis)?);

        if split == rest.len() {
            break;
        }
        rest = &rest[split + 1..];
        if rest.is_empty() {
            return Err(EvaluationError::new(expression, "empty location step"));
        }
    }

    Ok(steps)
}

fn parse_step(expression: &str, raw: &str, axis: Axis) -> Result<Step, EvaluationError> {
    if raw.is_empty() {
        return Err(EvaluationError::new(expression, "empty location step"));
    }
    if raw.starts_with('@') {
        return Err(EvaluationError::new(
            expression,
            "attribute selection steps are not supported",
        ));
    }

    let (name, predicate) = match raw.find('[') {
        None => (raw, None),
        Some(i) => {
            if !raw.ends_with(']') {
                return Err(EvaluationError::new(
                    expression,
                    format!("unterminated predicate in step `{raw}`"),
                ));
            }
            let predicate = parse_predicate(expression, &raw[i + 1..raw.len() - 1])?;
            (&raw[..i], Some(predicate))
        }
    };

    if name.is_empty() {
        return Err(EvaluationError::new(
            expression,
            "missing node test before predicate",
        ));
    }
    if name.contains(']') {
        return Err(EvaluationError::new(
            expression,
            format!("malformed step `{raw}`"),
        ));
    }

    let test = if name == "*" {
        NameTest::Any
    } else {
        NameTest::Name(name.to_string())
    };

    Ok(Step {
        axis,
        test,
        predicate,
    })
}

fn parse_predicate(expression: &str, inner: &str) -> Result<Predicate, EvaluationError> {
    let inner = inner.trim();
    if inner.is_empty() {
        return Err(EvaluationError::new(expression, "empty predicate"));
    }

    if let Some(attr) = inner.strip_prefix('@') {
        let Some(eq) = attr.find('=') else {
            return Err(EvaluationError::new(
                expression,
                format!("attribute predicate `[{inner}]` requires `=`"),
            ));
        };
        let name = attr[..eq].trim();
        if name.is_empty() {
            return Err(EvaluationError::new(
                expression,
                "missing attribute name in predicate",
            ));
        }
        let value = attr[eq + 1..].trim();
        let unquoted = value
            .strip_prefix('\'')
            .and_then(|v| v.strip_suffix('\''))
            .or_else(|| value.strip_prefix('"').and_then(|v| v.strip_suffix('"')));
        let Some(unquoted) = unquoted else {
            return Err(EvaluationError::new(
                expression,
                format!("attribute value in `[{inner}]` must be quoted"),
            ));
        };
        return Ok(Predicate::Attribute {
            name: name.to_string(),
            value: unquoted.to_string(),
        });
    }

    let position: usize = inner.parse().map_err(|_| {
        EvaluationError::new(expression, format!("invalid position predicate `[{inner}]`"))
    })?;
    if position == 0 {
        return Err(EvaluationError::new(
            expression,
            "position predicates are 1-based",
        ));
    }
    Ok(Predicate::Position(position))
}
