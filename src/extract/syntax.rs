//! Tree-sitter plumbing for Python sources.
//!
//! The tree-sitter tree is never mutated. Definitions found while walking it
//! are recorded in a [`DefinitionIndex`]: an arena of nodes addressed by
//! [`NodeId`], each holding its byte span and its parent's id.

use tree_sitter::{Node, Parser, Tree};

use crate::error::{DocstringerError, Result};

/// Parse Python source into a tree-sitter tree.
///
/// Tree-sitter recovers from syntax errors instead of failing, so any error
/// or missing node in the result is reported as a parse error.
pub fn parse_python(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .map_err(|e| DocstringerError::Parse(format!("Failed to set language: {}", e)))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| DocstringerError::Parse("Parser returned no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        let (line, column) = first_error_position(&root)
            .map(|n| (n.start_position().row + 1, n.start_position().column + 1))
            .unwrap_or((1, 1));
        return Err(DocstringerError::Parse(format!(
            "invalid syntax at line {}, column {}",
            line, column
        )));
    }

    Ok(tree)
}

fn first_error_position<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    let mut stack = vec![*node];
    while let Some(current) = stack.pop() {
        if current.is_error() || current.is_missing() {
            return Some(current);
        }
        if !current.has_error() {
            continue;
        }
        for i in (0..current.child_count()).rev() {
            if let Some(child) = current.child(i) {
                stack.push(child);
            }
        }
    }
    None
}

/// Extract text content from a node
#[inline]
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// The `:` token that ends a definition header, i.e. the last colon before the body
pub fn header_colon<'a>(def: &Node<'a>, body: &Node<'a>) -> Option<Node<'a>> {
    let mut colon = None;
    for i in 0..def.child_count() {
        if let Some(child) = def.child(i) {
            if child.end_byte() > body.start_byte() {
                break;
            }
            if child.kind() == ":" {
                colon = Some(child);
            }
        }
    }
    colon
}

/// First statement of a block, skipping comments
pub fn first_statement<'a>(block: &Node<'a>) -> Option<Node<'a>> {
    (0..block.named_child_count())
        .filter_map(|i| block.named_child(i))
        .find(|n| n.kind() != "comment")
}

/// Whether a statement is a docstring in Python's sense: an expression
/// statement consisting of a plain (non-bytes, non-f) string literal.
pub fn is_docstring_statement(stmt: &Node, source: &str) -> bool {
    if stmt.kind() != "expression_statement" || stmt.named_child_count() != 1 {
        return false;
    }

    let Some(expr) = stmt.named_child(0) else {
        return false;
    };

    match expr.kind() {
        "string" => is_plain_string_literal(&expr, source),
        "concatenated_string" => expr
            .named_child(0)
            .map(|first| is_plain_string_literal(&first, source))
            .unwrap_or(false),
        _ => false,
    }
}

fn is_plain_string_literal(string: &Node, source: &str) -> bool {
    let text = node_text(string, source);
    let prefix_len = text.find(['"', '\'']).unwrap_or(0);
    let prefix = text[..prefix_len].to_ascii_lowercase();
    !prefix.contains('b') && !prefix.contains('f')
}

/// Leading whitespace of the line a node starts on, if the node is the first
/// thing on that line.
pub fn line_indent<'a>(node: &Node, source: &'a str) -> Option<&'a str> {
    let start = node.start_byte();
    let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let indent = &source[line_start..start];
    indent
        .chars()
        .all(|c| c == ' ' || c == '\t')
        .then_some(indent)
}

/// Index of a node in a [`DefinitionIndex`]
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Function,
    Class,
}

/// A function or class definition recorded in the arena
#[derive(Debug, Clone)]
pub struct DefNode {
    pub name: String,
    pub parent: Option<NodeId>,
}

/// Arena of definitions with parent links
#[derive(Debug, Default)]
pub struct DefinitionIndex {
    nodes: Vec<DefNode>,
}

impl DefinitionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: DefNode) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn get(&self, id: NodeId) -> Option<&DefNode> {
        self.nodes.get(id)
    }

    /// Number of enclosing definitions
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// Dotted name through enclosing definitions, e.g. `Parser.parse.helper`
    pub fn qualified_name(&self, id: NodeId) -> String {
        let mut parts: Vec<&str> = self
            .ancestors(id)
            .map(|ancestor| ancestor.name.as_str())
            .collect();
        parts.reverse();
        if let Some(node) = self.nodes.get(id) {
            parts.push(&node.name);
        }
        parts.join(".")
    }

    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &DefNode> + '_ {
        let mut next = self.nodes.get(id).and_then(|n| n.parent);
        std::iter::from_fn(move || {
            let node = self.nodes.get(next?)?;
            next = node.parent;
            Some(node)
        })
    }
}
