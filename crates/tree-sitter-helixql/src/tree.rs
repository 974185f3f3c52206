//! Concrete syntax trees produced by the [`Parser`](crate::Parser).
//!
//! A [`Tree`] owns a copy of its source text and stores every node in one
//! arena, in pre-order. Nodes are read through the lightweight [`Node`] handle,
//! whose accessors follow the names of tree-sitter's own `Node` API.

use std::fmt;
use std::ops::Range;
use std::rc::Rc;

use crate::language::{FieldId, Language, Symbol, ERROR_SYMBOL};

/// A zero-based row / column position in the source. Columns count bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Point {
    /// Line number, starting at 0.
    pub row: usize,
    /// Byte offset within the line, starting at 0.
    pub column: usize,
}

impl Point {
    /// The position of byte `offset` in `source`.
    #[must_use]
    pub fn locate(source: &str, offset: usize) -> Self {
        let before = &source[..offset.min(source.len())];
        let row = before.matches('\n').count();
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            row,
            column: before.len() - line_start,
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row + 1, self.column + 1)
    }
}

/// A node as produced during parsing, before it is laid out in the arena.
#[derive(Debug)]
pub(crate) struct RawNode {
    pub symbol: Symbol,
    pub start: usize,
    pub end: usize,
    pub extra: bool,
    pub children: Vec<RawChild>,
}

#[derive(Debug, Clone)]
pub(crate) struct RawChild {
    pub field: FieldId,
    pub node: Rc<RawNode>,
}

#[derive(Debug, Clone)]
struct NodeData {
    symbol: Symbol,
    range: Range<usize>,
    start: Point,
    end: Point,
    field: FieldId,
    extra: bool,
    has_error: bool,
    parent: Option<usize>,
    children: Vec<usize>,
    /// Index of the first node after this node's subtree.
    subtree_end: usize,
}

/// A parsed syntax tree.
#[derive(Debug, Clone)]
pub struct Tree<'l> {
    language: &'l Language,
    source: String,
    nodes: Vec<NodeData>,
}

impl<'l> Tree<'l> {
    pub(crate) fn build(language: &'l Language, source: &str, root: &RawNode) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        let mut builder = Builder {
            line_starts,
            nodes: Vec::new(),
        };
        builder.push(root, 0, None);
        Self {
            language,
            source: source.to_owned(),
            nodes: builder.nodes,
        }
    }

    /// The node spanning the whole input.
    #[must_use]
    pub fn root_node(&self) -> Node<'_> {
        Node { tree: self, id: 0 }
    }

    /// The text this tree was parsed from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The language the tree was parsed with.
    #[must_use]
    pub fn language(&self) -> &'l Language {
        self.language
    }

    /// Whether any part of the input failed to parse.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.root_node().has_error()
    }

    /// The tree as a tree-sitter style S-expression.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }
}

struct Builder {
    line_starts: Vec<usize>,
    nodes: Vec<NodeData>,
}

impl Builder {
    fn point(&self, offset: usize) -> Point {
        let row = self.line_starts.partition_point(|&start| start <= offset) - 1;
        Point {
            row,
            column: offset - self.line_starts[row],
        }
    }

    fn push(&mut self, raw: &RawNode, field: FieldId, parent: Option<usize>) -> usize {
        let id = self.nodes.len();
        self.nodes.push(NodeData {
            symbol: raw.symbol,
            range: raw.start..raw.end,
            start: self.point(raw.start),
            end: self.point(raw.end),
            field,
            extra: raw.extra,
            has_error: raw.symbol == ERROR_SYMBOL,
            parent,
            children: Vec::with_capacity(raw.children.len()),
            subtree_end: id + 1,
        });

        let mut children = Vec::with_capacity(raw.children.len());
        let mut has_error = raw.symbol == ERROR_SYMBOL;
        for child in &raw.children {
            let child_id = self.push(&child.node, child.field, Some(id));
            has_error |= self.nodes[child_id].has_error;
            children.push(child_id);
        }

        let subtree_end = self.nodes.len();
        let data = &mut self.nodes[id];
        data.children = children;
        data.has_error = has_error;
        data.subtree_end = subtree_end;
        id
    }
}

/// A handle to one node of a [`Tree`].
#[derive(Clone, Copy)]
pub struct Node<'t> {
    tree: &'t Tree<'t>,
    id: usize,
}

impl<'t> Node<'t> {
    fn data(&self) -> &'t NodeData {
        &self.tree.nodes[self.id]
    }

    fn at(&self, id: usize) -> Node<'t> {
        Node {
            tree: self.tree,
            id,
        }
    }

    /// The node's kind, e.g. `"query_def"`, `"::"` or `"ERROR"`.
    #[must_use]
    pub fn kind(&self) -> &'t str {
        self.tree
            .language
            .symbol_name(self.kind_id())
            .unwrap_or_default()
    }

    /// The symbol of the node's kind.
    #[must_use]
    pub fn kind_id(&self) -> Symbol {
        self.data().symbol
    }

    /// Whether the node comes from a named rule (as opposed to a literal token).
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.tree.language.symbol_is_named(self.kind_id())
    }

    /// Whether the node is an extra, such as a comment.
    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.data().extra
    }

    /// Whether the node covers input that failed to parse.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind_id() == ERROR_SYMBOL
    }

    /// Whether the node or any descendant is an error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.data().has_error
    }

    /// Byte offset where the node starts.
    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.data().range.start
    }

    /// Byte offset where the node ends.
    #[must_use]
    pub fn end_byte(&self) -> usize {
        self.data().range.end
    }

    /// The node's byte range.
    #[must_use]
    pub fn byte_range(&self) -> Range<usize> {
        self.data().range.clone()
    }

    /// Row / column where the node starts.
    #[must_use]
    pub fn start_position(&self) -> Point {
        self.data().start
    }

    /// Row / column where the node ends.
    #[must_use]
    pub fn end_position(&self) -> Point {
        self.data().end
    }

    /// The source text the node covers.
    #[must_use]
    pub fn text(&self) -> &'t str {
        &self.tree.source[self.byte_range()]
    }

    /// The node's parent, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Node<'t>> {
        self.data().parent.map(|id| self.at(id))
    }

    /// Number of children, named or not.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    /// The child at `index`.
    #[must_use]
    pub fn child(&self, index: usize) -> Option<Node<'t>> {
        self.data().children.get(index).map(|&id| self.at(id))
    }

    /// Number of named children.
    #[must_use]
    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    /// The named child at `index`, counting named children only.
    #[must_use]
    pub fn named_child(&self, index: usize) -> Option<Node<'t>> {
        self.named_children().nth(index)
    }

    /// All children in order.
    pub fn children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let node = *self;
        self.data().children.iter().map(move |&id| node.at(id))
    }

    /// Named children in order.
    pub fn named_children(&self) -> impl Iterator<Item = Node<'t>> + 't {
        self.children().filter(Node::is_named)
    }

    /// The field name under which this node sits in its parent.
    #[must_use]
    pub fn field_name(&self) -> Option<&'t str> {
        match self.data().field {
            0 => None,
            field => self.tree.language.field_name(field),
        }
    }

    /// The first child labelled with field `name`.
    #[must_use]
    pub fn child_by_field_name(&self, name: &str) -> Option<Node<'t>> {
        self.children_by_field_name(name).next()
    }

    /// Every child labelled with field `name`.
    pub fn children_by_field_name(&self, name: &str) -> impl Iterator<Item = Node<'t>> + 't {
        let field = self.tree.language.field_id_for_name(name).unwrap_or(0);
        self.children()
            .filter(move |child| field != 0 && child.data().field == field)
    }

    /// The following sibling.
    #[must_use]
    pub fn next_sibling(&self) -> Option<Node<'t>> {
        let parent = self.parent()?;
        let siblings = &parent.data().children;
        let index = siblings.iter().position(|&id| id == self.id)?;
        siblings.get(index + 1).map(|&id| self.at(id))
    }

    /// The preceding sibling.
    #[must_use]
    pub fn prev_sibling(&self) -> Option<Node<'t>> {
        let parent = self.parent()?;
        let siblings = &parent.data().children;
        let index = siblings.iter().position(|&id| id == self.id)?;
        index.checked_sub(1).map(|i| self.at(siblings[i]))
    }

    /// This node and everything beneath it, in pre-order.
    pub fn descendants(&self) -> impl Iterator<Item = Node<'t>> + 't {
        let node = *self;
        (self.id..self.data().subtree_end).map(move |id| node.at(id))
    }

    /// The subtree as an S-expression: named nodes only, with `field:` labels.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        let mut out = String::new();
        self.write_sexp(&mut out);
        out
    }

    fn write_sexp(&self, out: &mut String) {
        out.push('(');
        out.push_str(self.kind());
        for child in self.named_children() {
            out.push(' ');
            if let Some(field) = child.field_name() {
                out.push_str(field);
                out.push_str(": ");
            }
            child.write_sexp(out);
        }
        out.push(')');
    }
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{Node {} {} - {}}}",
            self.kind(),
            self.start_position(),
            self.end_position()
        )
    }
}
