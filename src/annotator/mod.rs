//! Deciding whether a declaration gets an explicit type, and writing it.

use std::fmt;

use tree_sitter::Node;

use crate::checker::TypeResolver;
use crate::config::RunConfig;
use crate::error::Result;
use crate::project::{Rewriter, SourceFile};
use crate::types::ResolvedType;

/// A declaration position that can carry a type annotation.
#[derive(Debug, Clone, Copy)]
pub enum AnnotationTarget<'tree> {
    /// Parameter of a function-like: `required_parameter`, `optional_parameter`,
    /// or the bare identifier of `x => ...`.
    Parameter(Node<'tree>),
    /// Return position of a function-like.
    ReturnType(Node<'tree>),
    /// `variable_declarator` of a top-level declaration.
    Variable(Node<'tree>),
    /// Parameter of a class constructor.
    ConstructorParameter(Node<'tree>),
    /// Class property declaration.
    Property(Node<'tree>),
    /// `get` accessor; the annotation is its return type.
    GetAccessor(Node<'tree>),
}

impl<'tree> AnnotationTarget<'tree> {
    /// The syntax node this target wraps.
    pub fn node(&self) -> Node<'tree> {
        match *self {
            AnnotationTarget::Parameter(node)
            | AnnotationTarget::ReturnType(node)
            | AnnotationTarget::Variable(node)
            | AnnotationTarget::ConstructorParameter(node)
            | AnnotationTarget::Property(node)
            | AnnotationTarget::GetAccessor(node) => node,
        }
    }

    /// Whether the source already states a type here.
    pub fn has_explicit_type(&self) -> bool {
        let node = self.node();
        match self {
            AnnotationTarget::ReturnType(_) | AnnotationTarget::GetAccessor(_) => {
                node.child_by_field_name("return_type").is_some()
            },
            _ => node.child_by_field_name("type").is_some(),
        }
    }

    /// Whether the checker has something to infer from.
    ///
    /// Variables and properties need an initializer.
    pub fn is_inferable(&self) -> bool {
        match self {
            AnnotationTarget::Variable(node) | AnnotationTarget::Property(node) => {
                node.child_by_field_name("value").is_some()
            },
            _ => true,
        }
    }

    /// Literal types are only suppressed for variable declarations.
    pub fn is_variable_declaration(&self) -> bool {
        matches!(self, AnnotationTarget::Variable(_))
    }
}

impl fmt::Display for AnnotationTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            AnnotationTarget::Parameter(_) => "parameter",
            AnnotationTarget::ReturnType(_) => "return type",
            AnnotationTarget::Variable(_) => "variable",
            AnnotationTarget::ConstructorParameter(_) => "constructor parameter",
            AnnotationTarget::Property(_) => "property",
            AnnotationTarget::GetAccessor(_) => "get accessor",
        };
        let pos = self.node().start_position();
        write!(f, "{} at {}:{}", kind, pos.row + 1, pos.column + 1)
    }
}

/// Decides whether a resolved type may be written.
///
/// `allow_literal` is false only for variable declarations when literal types
/// were not requested; the literal rule never applies to other targets.
pub fn is_eligible(resolved: &ResolvedType, config: &RunConfig, allow_literal: bool) -> bool {
    if !allow_literal && resolved.is_literal() {
        return false;
    }
    if config.ignore_any_type && resolved.is_any() {
        return false;
    }
    true
}

/// Applies the eligibility rules and queues annotations.
pub struct Annotator<'a, R: TypeResolver + ?Sized> {
    resolver: &'a R,
    config: &'a RunConfig,
}

impl<'a, R: TypeResolver + ?Sized> Annotator<'a, R> {
    /// Creates an annotator backed by `resolver`.
    pub fn new(resolver: &'a R, config: &'a RunConfig) -> Self {
        Self { resolver, config }
    }

    /// Annotates `target` when it lacks a type and passes the filters.
    ///
    /// Returns whether an annotation was queued.
    pub fn annotate_if_eligible(
        &self,
        file: &SourceFile,
        target: &AnnotationTarget<'_>,
        rewriter: &mut Rewriter,
    ) -> Result<bool> {
        if target.has_explicit_type() || !target.is_inferable() {
            return Ok(false);
        }

        let resolved = self.resolver.resolve(file, target)?;
        let allow_literal = !target.is_variable_declaration() || self.config.include_literal_types;
        if !is_eligible(&resolved, self.config, allow_literal) {
            log::debug!("{}: skipping {} (`{}`)", file.path().display(), target, resolved.text);
            return Ok(false);
        }

        rewriter.set_explicit_type(target, &resolved.text);
        log::debug!("{}: {} annotated with `{}`", file.path().display(), target, resolved.text);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use rstest::rstest;

    fn literal() -> ResolvedType {
        ResolvedType::new(Type::NumberLiteral("5".into()))
    }

    fn any() -> ResolvedType {
        ResolvedType::new(Type::Any)
    }

    #[rstest]
    #[case(literal(), false, false, false, false)]
    #[case(literal(), true, false, false, true)]
    #[case(literal(), false, false, true, false)]
    #[case(any(), true, false, false, true)]
    #[case(any(), true, false, true, false)]
    #[case(any(), false, true, true, false)]
    #[case(ResolvedType::new(Type::Number), false, false, true, true)]
    fn test_is_eligible(
        #[case] resolved: ResolvedType,
        #[case] allow_literal: bool,
        #[case] include_literal_types: bool,
        #[case] ignore_any_type: bool,
        #[case] expected: bool,
    ) {
        let config = RunConfig { include_literal_types, ignore_any_type };
        assert_eq!(is_eligible(&resolved, &config, allow_literal), expected);
    }
}
