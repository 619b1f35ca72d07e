//! Queued annotation insertions for one source file.

use std::collections::HashSet;

use tree_sitter::Node;

use crate::annotator::AnnotationTarget;

/// Relative order of insertions that land on the same byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    OpenParen,
    Parameter,
    CloseParen,
    Return,
}

#[derive(Debug, Clone)]
struct Insertion {
    offset: usize,
    slot: Slot,
    text: String,
}

/// Collects `: T` insertions against the original text of a file.
///
/// The parse tree is never modified; offsets always refer to the text the
/// tree was built from, and [`Rewriter::apply`] splices everything in one go.
#[derive(Debug, Default)]
pub struct Rewriter {
    insertions: Vec<Insertion>,
    wrapped: HashSet<usize>,
}

impl Rewriter {
    /// Creates an empty rewriter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued insertions, parentheses included.
    pub fn len(&self) -> usize {
        self.insertions.len()
    }

    /// Whether nothing has been queued.
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty()
    }

    /// Queues `: text` as the explicit type of `target`.
    pub fn set_explicit_type(&mut self, target: &AnnotationTarget<'_>, text: &str) {
        let annotation = format!(": {}", text);
        match *target {
            AnnotationTarget::Parameter(node) | AnnotationTarget::ConstructorParameter(node) => {
                if node.kind() == "identifier" {
                    // `x => ...` has no parentheses to hold a type.
                    self.wrap(node);
                    self.insert(node.end_byte(), Slot::Parameter, annotation);
                } else if let Some(offset) = end_of_name(node, "pattern") {
                    self.insert(offset, Slot::Parameter, annotation);
                }
            },
            AnnotationTarget::Variable(node) | AnnotationTarget::Property(node) => {
                if let Some(offset) = end_of_name(node, "name") {
                    self.insert(offset, Slot::Parameter, annotation);
                }
            },
            AnnotationTarget::ReturnType(node) | AnnotationTarget::GetAccessor(node) => {
                if let Some(param) = node.child_by_field_name("parameter") {
                    self.wrap(param);
                    self.insert(param.end_byte(), Slot::Return, annotation);
                } else if let Some(params) = node.child_by_field_name("parameters") {
                    self.insert(params.end_byte(), Slot::Return, annotation);
                }
            },
        }
    }

    fn wrap(&mut self, param: Node<'_>) {
        if self.wrapped.insert(param.id()) {
            self.insert(param.start_byte(), Slot::OpenParen, "(".to_string());
            self.insert(param.end_byte(), Slot::CloseParen, ")".to_string());
        }
    }

    fn insert(&mut self, offset: usize, slot: Slot, text: String) {
        self.insertions.push(Insertion { offset, slot, text });
    }

    /// Returns `source` with every queued insertion applied.
    pub fn apply(&self, source: &str) -> String {
        let mut ordered: Vec<&Insertion> = self.insertions.iter().collect();
        ordered.sort_by_key(|i| (i.offset, i.slot));

        let extra: usize = ordered.iter().map(|i| i.text.len()).sum();
        let mut out = String::with_capacity(source.len() + extra);
        let mut cursor = 0;
        for insertion in ordered {
            out.push_str(&source[cursor..insertion.offset]);
            out.push_str(&insertion.text);
            cursor = insertion.offset;
        }
        out.push_str(&source[cursor..]);
        out
    }
}

/// End of the declared name, including a trailing `?` or `!` marker.
fn end_of_name(node: Node<'_>, field: &str) -> Option<usize> {
    let name = node.child_by_field_name(field)?;
    let end = match name.next_sibling() {
        Some(marker) if !marker.is_named() && matches!(marker.kind(), "?" | "!") => {
            marker.end_byte()
        },
        _ => name.end_byte(),
    };
    Some(end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Dialect, Parser};
    use pretty_assertions::assert_eq;

    fn first_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.named_children(&mut cursor).collect();
        children.into_iter().find_map(|child| first_of_kind(child, kind))
    }

    #[test]
    fn test_bare_arrow_parameter_is_parenthesized() {
        let source = "const f = x => x;";
        let tree = Parser::new().unwrap().parse_string(source, Dialect::TypeScript).unwrap();
        let arrow = first_of_kind(tree.root_node(), "arrow_function").unwrap();
        let param = arrow.child_by_field_name("parameter").unwrap();

        let mut rewriter = Rewriter::new();
        rewriter.set_explicit_type(&AnnotationTarget::Parameter(param), "any");
        rewriter.set_explicit_type(&AnnotationTarget::ReturnType(arrow), "any");

        assert_eq!(rewriter.apply(source), "const f = (x: any): any => x;");
        assert_eq!(rewriter.len(), 4);
    }

    #[test]
    fn test_optional_marker_precedes_annotation() {
        let source = "class A { label? = 'x'; }";
        let tree = Parser::new().unwrap().parse_string(source, Dialect::TypeScript).unwrap();
        let field = first_of_kind(tree.root_node(), "public_field_definition").unwrap();

        let mut rewriter = Rewriter::new();
        rewriter.set_explicit_type(&AnnotationTarget::Property(field), "string");

        assert_eq!(rewriter.apply(source), "class A { label?: string = 'x'; }");
    }

    #[test]
    fn test_empty_rewriter_is_identity() {
        let rewriter = Rewriter::new();
        assert!(rewriter.is_empty());
        assert_eq!(rewriter.apply("let a = 1;"), "let a = 1;");
    }
}
