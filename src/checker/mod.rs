//! Type inference for declarations that carry no annotation.
//!
//! [`Checker`] is a small, single-file TypeScript checker. It knows literal
//! types and widening, the common operators, lexical name resolution, return
//! type inference and a handful of built-ins. Anything it cannot see through
//! is `any`, which is also what `tsc` reports for implicitly typed values.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use tree_sitter::Node;

use crate::annotator::AnnotationTarget;
use crate::config::CheckerOptions;
use crate::error::Result;
use crate::project::SourceFile;
use crate::types::{Member, Param, ResolvedType, Signature, Type};
use crate::utils::{has_token, is_function_node, named_children, parameter_nodes};

/// Expressions nested deeper than this are typed `any` instead of followed.
const MAX_DEPTH: usize = 200;

/// Produces the inferred type of an annotation target.
pub trait TypeResolver {
    /// Resolves the type `target` would be annotated with.
    fn resolve(&self, file: &SourceFile, target: &AnnotationTarget<'_>) -> Result<ResolvedType>;
}

/// What a name refers to.
#[derive(Debug, Clone, Copy)]
enum Declaration<'t> {
    Variable(Node<'t>),
    Function(Node<'t>),
    Class(Node<'t>),
    Parameter(Node<'t>),
}

/// The built-in type resolver.
pub struct Checker {
    options: CheckerOptions,
    in_progress: RefCell<HashSet<usize>>,
    depth: Cell<usize>,
}

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl TypeResolver for Checker {
    fn resolve(&self, file: &SourceFile, target: &AnnotationTarget<'_>) -> Result<ResolvedType> {
        let ty = match *target {
            AnnotationTarget::Parameter(node) | AnnotationTarget::ConstructorParameter(node) => {
                self.parameter_type(file, node)?
            },
            AnnotationTarget::ReturnType(node) | AnnotationTarget::GetAccessor(node) => {
                self.return_type(file, node)?
            },
            AnnotationTarget::Variable(node) => self.variable_type(file, node)?,
            AnnotationTarget::Property(node) => self.property_type(file, node)?,
        };
        Ok(ResolvedType::new(ty))
    }
}

impl Checker {
    /// Creates a checker with the given compiler settings.
    pub fn new(options: CheckerOptions) -> Self {
        Self { options, in_progress: RefCell::new(HashSet::new()), depth: Cell::new(0) }
    }

    /// Claims one level of expression nesting, or `None` past [`MAX_DEPTH`].
    fn enter(&self) -> Option<DepthGuard<'_>> {
        let depth = self.depth.get() + 1;
        if depth > MAX_DEPTH {
            return None;
        }
        self.depth.set(depth);
        Some(DepthGuard(&self.depth))
    }

    /// Runs `compute` unless `node` is already being inferred, in which case
    /// the type is circular and becomes `any`.
    fn guarded<F>(&self, node: Node<'_>, compute: F) -> Result<Type>
    where
        F: FnOnce() -> Result<Type>,
    {
        if !self.in_progress.borrow_mut().insert(node.id()) {
            return Ok(Type::Any);
        }
        let result = compute();
        self.in_progress.borrow_mut().remove(&node.id());
        result
    }

    /// Literal widening plus, without strict null checks, `null`/`undefined` widening.
    fn widen(&self, ty: Type) -> Type {
        self.widen_nullish(ty.widened())
    }

    fn widen_nullish(&self, ty: Type) -> Type {
        if self.options.strict_null_checks {
            return ty;
        }
        match ty {
            Type::Null | Type::Undefined => Type::Any,
            other => other.without_nullish(),
        }
    }

    fn annotation(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let type_node = if node.kind() == "type_annotation" { node.named_child(0) } else { Some(node) };
        match type_node {
            Some(type_node) => Ok(Type::from_annotation(file.node_text(type_node)?)),
            None => Ok(Type::Any),
        }
    }

    // Declarations

    fn variable_type(&self, file: &SourceFile, declarator: Node<'_>) -> Result<Type> {
        if let Some(ty) = declarator.child_by_field_name("type") {
            return self.annotation(file, ty);
        }
        let Some(value) = declarator.child_by_field_name("value") else {
            return Ok(Type::Any);
        };
        let is_const = declarator.parent().map_or(false, |d| has_token(d, "const"));

        self.guarded(declarator, || {
            let ty = self.expression_type(file, value, false)?;
            Ok(if is_const { self.widen_nullish(ty) } else { self.widen(ty) })
        })
    }

    fn property_type(&self, file: &SourceFile, property: Node<'_>) -> Result<Type> {
        if let Some(ty) = property.child_by_field_name("type") {
            return self.annotation(file, ty);
        }
        let Some(value) = property.child_by_field_name("value") else {
            return Ok(Type::Any);
        };
        let readonly = has_token(property, "readonly");

        self.guarded(property, || {
            let ty = self.expression_type(file, value, false)?;
            Ok(if readonly { self.widen_nullish(ty) } else { self.widen(ty) })
        })
    }

    fn parameter_type(&self, file: &SourceFile, param: Node<'_>) -> Result<Type> {
        if param.kind() == "identifier" {
            return Ok(self.contextual_parameter_type(file, param)?.unwrap_or(Type::Any));
        }
        if let Some(ty) = param.child_by_field_name("type") {
            return self.annotation(file, ty);
        }

        self.guarded(param, || {
            if let Some(ty) = self.contextual_parameter_type(file, param)? {
                return Ok(ty);
            }
            if let Some(value) = param.child_by_field_name("value") {
                return Ok(self.widen(self.expression_type(file, value, false)?));
            }
            match param.child_by_field_name("pattern") {
                Some(pattern) if pattern.kind() == "rest_pattern" => {
                    Ok(Type::Array(Box::new(Type::Any)))
                },
                Some(pattern) => self.pattern_type(file, pattern),
                None => Ok(Type::Any),
            }
        })
    }

    /// Parameter type taken from a function type annotation on the variable
    /// or property the function is assigned to.
    fn contextual_parameter_type(&self, file: &SourceFile, param: Node<'_>) -> Result<Option<Type>> {
        let func = if param.kind() == "identifier" {
            param.parent()
        } else {
            param.parent().and_then(|list| list.parent())
        };
        let Some(func) = func.filter(|f| is_function_node(*f) && f.kind() != "method_definition")
        else {
            return Ok(None);
        };
        let Some(holder) = func.parent() else {
            return Ok(None);
        };
        if holder.child_by_field_name("value") != Some(func) {
            return Ok(None);
        }
        let function_type = holder
            .child_by_field_name("type")
            .and_then(|annotation| annotation.named_child(0))
            .filter(|ty| ty.kind() == "function_type");
        let Some(function_type) = function_type else {
            return Ok(None);
        };

        let Some(index) = parameter_nodes(func).iter().position(|p| *p == param) else {
            return Ok(None);
        };
        let contextual = function_type
            .child_by_field_name("parameters")
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| matches!(p.kind(), "required_parameter" | "optional_parameter"))
            .nth(index)
            .and_then(|p| p.child_by_field_name("type"));
        match contextual {
            Some(ty) => Ok(Some(self.annotation(file, ty)?)),
            None => Ok(None),
        }
    }

    /// Shape implied by a destructuring parameter.
    fn pattern_type(&self, file: &SourceFile, pattern: Node<'_>) -> Result<Type> {
        match pattern.kind() {
            "object_pattern" => {
                let mut members = Vec::new();
                for child in named_children(pattern) {
                    let (name, ty, optional) = match child.kind() {
                        "shorthand_property_identifier_pattern" => {
                            (file.node_text(child)?, Type::Any, false)
                        },
                        "object_assignment_pattern" => {
                            let (Some(left), Some(right)) =
                                (child.child_by_field_name("left"), child.child_by_field_name("right"))
                            else {
                                continue;
                            };
                            let ty = self.widen(self.expression_type(file, right, false)?);
                            (file.node_text(left)?, ty, true)
                        },
                        "pair_pattern" => {
                            let (Some(key), Some(value)) =
                                (child.child_by_field_name("key"), child.child_by_field_name("value"))
                            else {
                                continue;
                            };
                            let (ty, optional) = self.binding_element_type(file, value)?;
                            (file.node_text(key)?, ty, optional)
                        },
                        _ => continue,
                    };
                    members.push(Member {
                        name: property_name(name),
                        ty,
                        optional,
                        readonly: false,
                        method: false,
                    });
                }
                Ok(Type::Object(members))
            },
            "array_pattern" => {
                let mut elements = Vec::new();
                for child in named_children(pattern) {
                    if child.kind() == "rest_pattern" {
                        continue;
                    }
                    elements.push(self.binding_element_type(file, child)?.0);
                }
                Ok(Type::Tuple { elements, readonly: false })
            },
            _ => Ok(Type::Any),
        }
    }

    fn binding_element_type(&self, file: &SourceFile, element: Node<'_>) -> Result<(Type, bool)> {
        match element.kind() {
            "assignment_pattern" => match element.child_by_field_name("right") {
                Some(right) => Ok((self.widen(self.expression_type(file, right, false)?), true)),
                None => Ok((Type::Any, true)),
            },
            "object_pattern" | "array_pattern" => Ok((self.pattern_type(file, element)?, false)),
            _ => Ok((Type::Any, false)),
        }
    }

    fn declaration_type(&self, file: &SourceFile, declaration: Declaration<'_>) -> Result<Type> {
        match declaration {
            Declaration::Variable(node) => self.variable_type(file, node),
            Declaration::Function(node) => Ok(Type::Function(self.signature(file, node)?)),
            Declaration::Class(node) => Ok(Type::TypeOf(class_name(file, node)?)),
            Declaration::Parameter(node) => self.parameter_type(file, node),
        }
    }

    // Functions

    fn signature(&self, file: &SourceFile, func: Node<'_>) -> Result<Signature> {
        let mut params = Vec::new();
        for (index, node) in parameter_nodes(func).into_iter().enumerate() {
            let ty = self.parameter_type(file, node)?;
            if node.kind() == "identifier" {
                params.push(Param {
                    name: file.node_text(node)?.to_string(),
                    ty,
                    optional: false,
                    rest: false,
                });
                continue;
            }

            let pattern = node.child_by_field_name("pattern");
            let rest = pattern.map_or(false, |p| p.kind() == "rest_pattern");
            let name = match pattern {
                Some(p) if p.kind() == "identifier" => file.node_text(p)?.to_string(),
                Some(p) if rest => match p.named_child(0) {
                    Some(inner) => file.node_text(inner)?.to_string(),
                    None => "args".to_string(),
                },
                _ => format!("__{}", index),
            };
            let optional =
                node.kind() == "optional_parameter" || node.child_by_field_name("value").is_some();
            params.push(Param { name, ty, optional, rest });
        }

        let returns = self.return_type(file, func)?;
        Ok(Signature { params, returns: Box::new(returns) })
    }

    fn return_type(&self, file: &SourceFile, func: Node<'_>) -> Result<Type> {
        if let Some(annotation) = func.child_by_field_name("return_type") {
            return match annotation.kind() {
                "type_predicate_annotation" => Ok(Type::Boolean),
                "asserts_annotation" => Ok(Type::Void),
                _ => self.annotation(file, annotation),
            };
        }
        self.guarded(func, || self.infer_return_type(file, func))
    }

    fn infer_return_type(&self, file: &SourceFile, func: Node<'_>) -> Result<Type> {
        let Some(body) = func.child_by_field_name("body") else {
            return Ok(Type::Any);
        };
        let is_async = has_token(func, "async");
        let is_generator = func.kind().starts_with("generator_") || has_token(func, "*");

        if body.kind() != "statement_block" {
            let ty = self.widen(self.expression_type(file, body, false)?);
            return Ok(if is_async { Type::generic("Promise", vec![ty.awaited()]) } else { ty });
        }

        let (returns, yields) = collect_exits(body);
        let mut types = Vec::new();
        let mut bare_return = false;
        for ret in returns {
            match ret.named_child(0) {
                Some(value) => {
                    let ty = self.expression_type(file, value, false)?;
                    types.push(if is_async { ty.awaited() } else { ty });
                },
                None => bare_return = true,
            }
        }
        let returned = if types.is_empty() {
            Type::Void
        } else {
            if bare_return {
                types.push(Type::Undefined);
            }
            self.widen(Type::union_of(types))
        };

        if is_generator {
            let mut yielded = Vec::new();
            for node in yields {
                yielded.push(match node.named_child(0) {
                    Some(value) => self.expression_type(file, value, false)?,
                    None => Type::Undefined,
                });
            }
            let yielded =
                if yielded.is_empty() { Type::Never } else { self.widen(Type::union_of(yielded)) };
            let name = if is_async { "AsyncGenerator" } else { "Generator" };
            return Ok(Type::generic(name, vec![yielded, returned, Type::Unknown]));
        }

        Ok(if is_async { Type::generic("Promise", vec![returned]) } else { returned })
    }

    // Expressions

    /// Type of an expression before any widening. `as_const` is set inside
    /// `as const`, where arrays become readonly tuples and members readonly.
    fn expression_type(&self, file: &SourceFile, node: Node<'_>, as_const: bool) -> Result<Type> {
        let Some(_guard) = self.enter() else {
            let pos = node.start_position();
            log::warn!(
                "{}:{}:{}: expression nested too deeply, typing it as `any`",
                file.path().display(),
                pos.row + 1,
                pos.column + 1
            );
            return Ok(Type::Any);
        };

        let ty = match node.kind() {
            "number" => number_literal(file.node_text(node)?),
            "string" => Type::StringLiteral(string_literal_value(file.node_text(node)?)),
            "template_string" => {
                let substituted =
                    named_children(node).iter().any(|c| c.kind() == "template_substitution");
                if substituted {
                    Type::String
                } else {
                    Type::StringLiteral(string_literal_value(file.node_text(node)?))
                }
            },
            "true" => Type::BooleanLiteral(true),
            "false" => Type::BooleanLiteral(false),
            "null" => Type::Null,
            "undefined" => Type::Undefined,
            "regex" => Type::Named("RegExp".to_string()),
            "this" => match enclosing_class(node) {
                Some(_) => Type::Named("this".to_string()),
                None => Type::Any,
            },
            "identifier" => self.identifier_type(file, node)?,
            "parenthesized_expression" | "satisfies_expression" => match node.named_child(0) {
                Some(inner) => self.expression_type(file, inner, as_const)?,
                None => Type::Any,
            },
            "sequence_expression" => match named_children(node).pop() {
                Some(last) => self.expression_type(file, last, as_const)?,
                None => Type::Any,
            },
            "object" => self.object_type(file, node, as_const)?,
            "array" => self.array_type(file, node, as_const)?,
            "arrow_function" | "function" | "function_expression" | "generator_function" => {
                Type::Function(self.signature(file, node)?)
            },
            "class" => match node.child_by_field_name("name") {
                Some(name) => Type::TypeOf(file.node_text(name)?.to_string()),
                None => Type::TypeOf("(Anonymous class)".to_string()),
            },
            "binary_expression" => self.binary_type(file, node)?,
            "augmented_assignment_expression" => self.binary_type(file, node)?,
            "unary_expression" => self.unary_type(file, node)?,
            "update_expression" => Type::Number,
            "ternary_expression" => {
                let mut branches = Vec::new();
                for field in ["consequence", "alternative"] {
                    if let Some(branch) = node.child_by_field_name(field) {
                        branches.push(self.expression_type(file, branch, as_const)?);
                    }
                }
                Type::union_of(branches)
            },
            "assignment_expression" => match node.child_by_field_name("right") {
                Some(right) => self.expression_type(file, right, as_const)?,
                None => Type::Any,
            },
            "await_expression" => match node.named_child(0) {
                Some(inner) => self.expression_type(file, inner, false)?.awaited(),
                None => Type::Any,
            },
            "as_expression" => self.as_expression_type(file, node)?,
            "non_null_expression" => match node.named_child(0) {
                Some(inner) => self.expression_type(file, inner, as_const)?.without_nullish(),
                None => Type::Any,
            },
            "call_expression" => self.call_type(file, node)?,
            "new_expression" => self.new_type(file, node)?,
            "member_expression" => self.member_type(file, node)?,
            "subscript_expression" => self.subscript_type(file, node)?,
            "jsx_element" | "jsx_self_closing_element" | "jsx_fragment" => {
                Type::Named("JSX.Element".to_string())
            },
            _ => Type::Any,
        };
        Ok(ty)
    }

    fn identifier_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let name = file.node_text(node)?;
        match name {
            "undefined" => return Ok(Type::Undefined),
            "NaN" | "Infinity" => return Ok(Type::Number),
            _ => {},
        }
        match lookup(file, name, node)? {
            Some(declaration) => self.declaration_type(file, declaration),
            None => Ok(Type::Any),
        }
    }

    fn object_type(&self, file: &SourceFile, node: Node<'_>, as_const: bool) -> Result<Type> {
        let mut members: Vec<Member> = Vec::new();
        for child in named_children(node) {
            match child.kind() {
                "pair" => {
                    let (Some(key), Some(value)) =
                        (child.child_by_field_name("key"), child.child_by_field_name("value"))
                    else {
                        continue;
                    };
                    if key.kind() == "computed_property_name" {
                        continue;
                    }
                    let ty = self.expression_type(file, value, as_const)?;
                    members.push(self.object_member(property_name(file.node_text(key)?), ty, as_const));
                },
                "shorthand_property_identifier" => {
                    let name = file.node_text(child)?;
                    let ty = match lookup(file, name, child)? {
                        Some(declaration) => self.declaration_type(file, declaration)?,
                        None => Type::Any,
                    };
                    members.push(self.object_member(name.to_string(), ty, as_const));
                },
                "method_definition" => {
                    let Some(key) = child.child_by_field_name("name") else {
                        continue;
                    };
                    let name = property_name(file.node_text(key)?);
                    if has_token(child, "set") {
                        continue;
                    }
                    if has_token(child, "get") {
                        let ty = self.return_type(file, child)?;
                        members.push(self.object_member(name, ty, as_const));
                        continue;
                    }
                    members.push(Member {
                        name,
                        ty: Type::Function(self.signature(file, child)?),
                        optional: false,
                        readonly: as_const,
                        method: true,
                    });
                },
                "spread_element" => {
                    let Some(inner) = child.named_child(0) else {
                        continue;
                    };
                    if let Type::Object(spread) = self.expression_type(file, inner, as_const)? {
                        for member in spread {
                            members.retain(|m| m.name != member.name);
                            members.push(member);
                        }
                    }
                },
                _ => {},
            }
        }
        Ok(Type::Object(members))
    }

    fn object_member(&self, name: String, ty: Type, as_const: bool) -> Member {
        let ty = if as_const { ty } else { self.widen(ty) };
        Member { name, ty, optional: false, readonly: as_const, method: false }
    }

    fn array_type(&self, file: &SourceFile, node: Node<'_>, as_const: bool) -> Result<Type> {
        let mut elements = Vec::new();
        for child in named_children(node) {
            if child.kind() != "spread_element" {
                elements.push(self.expression_type(file, child, as_const)?);
                continue;
            }
            let Some(inner) = child.named_child(0) else {
                continue;
            };
            match self.expression_type(file, inner, as_const)? {
                Type::Array(element) => elements.push(*element),
                Type::Tuple { elements: items, .. } => elements.extend(items),
                _ => elements.push(Type::Any),
            }
        }

        if as_const {
            return Ok(Type::Tuple { elements, readonly: true });
        }
        if elements.is_empty() {
            return Ok(Type::Array(Box::new(Type::Any)));
        }
        Ok(Type::Array(Box::new(self.widen(Type::union_of(elements)))))
    }

    /// Folds a left-associative operator chain such as `a + b + c` without
    /// recursing once per operand.
    fn binary_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let mut chain = vec![node];
        let mut innermost = node;
        while let Some(left) =
            innermost.child_by_field_name("left").filter(|l| l.kind() == "binary_expression")
        {
            chain.push(left);
            innermost = left;
        }

        let Some(first) = innermost.child_by_field_name("left") else {
            return Ok(Type::Any);
        };
        let mut folded = self.expression_type(file, first, false)?;
        for link in chain.into_iter().rev() {
            let (Some(operator), Some(right)) =
                (link.child_by_field_name("operator"), link.child_by_field_name("right"))
            else {
                return Ok(Type::Any);
            };
            let right = self.expression_type(file, right, false)?;
            folded = binary_result(operator.kind(), folded, right);
        }
        Ok(folded)
    }

    fn unary_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let operator = node.child_by_field_name("operator").map(|op| op.kind()).unwrap_or("");
        let argument = match node.child_by_field_name("argument") {
            Some(argument) => self.expression_type(file, argument, false)?,
            None => Type::Any,
        };
        Ok(match operator {
            "!" | "delete" => Type::Boolean,
            "typeof" => Type::String,
            "void" => Type::Undefined,
            "-" => match argument {
                Type::NumberLiteral(value) => Type::NumberLiteral(negate(&value)),
                Type::BigIntLiteral(value) => Type::BigIntLiteral(negate(&value)),
                ty if ty.is_bigint_like() => Type::BigInt,
                _ => Type::Number,
            },
            "~" if argument.is_bigint_like() => Type::BigInt,
            "+" | "~" => Type::Number,
            _ => Type::Any,
        })
    }

    fn as_expression_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let (Some(inner), Some(last)) = (node.named_child(0), node.child(node.child_count().saturating_sub(1)))
        else {
            return Ok(Type::Any);
        };
        if file.node_text(last)? == "const" {
            return self.expression_type(file, inner, true);
        }
        if last == inner {
            return Ok(Type::Any);
        }
        Ok(Type::from_annotation(file.node_text(last)?))
    }

    fn call_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let Some(callee) = node.child_by_field_name("function") else {
            return Ok(Type::Any);
        };
        let callee_type = match callee.kind() {
            "identifier" => {
                let name = file.node_text(callee)?;
                match lookup(file, name, callee)? {
                    Some(declaration) => self.declaration_type(file, declaration)?,
                    None => return Ok(builtin_function(name)),
                }
            },
            "member_expression" => return self.method_call_type(file, node, callee),
            _ => self.expression_type(file, callee, false)?,
        };
        Ok(return_of(callee_type))
    }

    fn method_call_type(&self, file: &SourceFile, call: Node<'_>, callee: Node<'_>) -> Result<Type> {
        let (Some(object), Some(property)) =
            (callee.child_by_field_name("object"), callee.child_by_field_name("property"))
        else {
            return Ok(Type::Any);
        };
        let method = file.node_text(property)?;

        if object.kind() == "identifier" {
            let namespace = file.node_text(object)?;
            if lookup(file, namespace, object)?.is_none() {
                if let Some(ty) = builtin_static(namespace, method) {
                    return Ok(ty);
                }
            }
        }

        let object_type = self.expression_type(file, object, false)?.widened();
        if method == "map" && matches!(object_type, Type::Array(_) | Type::Tuple { .. }) {
            let callback = call
                .child_by_field_name("arguments")
                .and_then(|args| named_children(args).into_iter().next())
                .filter(|arg| is_function_node(*arg));
            let element = match callback {
                Some(callback) => self.widen(self.return_type(file, callback)?),
                None => Type::Any,
            };
            return Ok(Type::Array(Box::new(element)));
        }
        if let Some(ty) = self.builtin_method(&object_type, method) {
            return Ok(ty);
        }
        Ok(return_of(self.member_type(file, callee)?))
    }

    fn builtin_method(&self, object: &Type, method: &str) -> Option<Type> {
        if method == "toString" {
            return Some(Type::String);
        }
        if object.is_string_like() {
            return match method {
                "toUpperCase" | "toLowerCase" | "trim" | "trimStart" | "trimEnd" | "slice"
                | "substring" | "padStart" | "padEnd" | "repeat" | "replace" | "replaceAll"
                | "charAt" | "concat" | "normalize" => Some(Type::String),
                "indexOf" | "lastIndexOf" | "charCodeAt" | "localeCompare" | "search" => {
                    Some(Type::Number)
                },
                "includes" | "startsWith" | "endsWith" => Some(Type::Boolean),
                "split" => Some(Type::Array(Box::new(Type::String))),
                _ => None,
            };
        }
        if object.is_number_like() {
            return match method {
                "toFixed" | "toPrecision" | "toExponential" | "toLocaleString" => Some(Type::String),
                _ => None,
            };
        }
        let Type::Array(element) = object else {
            return None;
        };
        match method {
            "join" => Some(Type::String),
            "indexOf" | "lastIndexOf" | "findIndex" | "push" | "unshift" => Some(Type::Number),
            "includes" | "some" | "every" => Some(Type::Boolean),
            "filter" | "slice" | "concat" | "reverse" | "sort" => Some(object.clone()),
            "forEach" => Some(Type::Void),
            "pop" | "shift" | "find" if self.options.strict_null_checks => {
                Some(Type::union_of(vec![(**element).clone(), Type::Undefined]))
            },
            "pop" | "shift" | "find" => Some((**element).clone()),
            _ => None,
        }
    }

    fn new_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let Some(constructor) = node.child_by_field_name("constructor") else {
            return Ok(Type::Any);
        };
        let name = file.node_text(constructor)?;
        if let Some(args) = node.child_by_field_name("type_arguments") {
            return Ok(Type::Named(format!("{}{}", name, file.node_text(args)?)));
        }
        Ok(match name {
            "Map" => Type::generic("Map", vec![Type::Any, Type::Any]),
            "Set" => Type::generic("Set", vec![Type::Unknown]),
            "Promise" => Type::generic("Promise", vec![Type::Unknown]),
            "Array" => Type::Array(Box::new(Type::Any)),
            _ if matches!(constructor.kind(), "identifier" | "member_expression") => {
                Type::Named(name.to_string())
            },
            _ => Type::Any,
        })
    }

    fn member_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let (Some(object), Some(property)) =
            (node.child_by_field_name("object"), node.child_by_field_name("property"))
        else {
            return Ok(Type::Any);
        };
        let name = file.node_text(property)?;

        if object.kind() == "this" {
            return match enclosing_class(node) {
                Some(class) => self.class_member_type(file, class, name),
                None => Ok(Type::Any),
            };
        }

        let object_type = self.expression_type(file, object, false)?;
        let sized = object_type.is_string_like()
            || matches!(object_type, Type::Array(_) | Type::Tuple { .. });
        if name == "length" && sized {
            return Ok(Type::Number);
        }
        match &object_type {
            Type::Object(members) => Ok(members
                .iter()
                .find(|m| m.name == name)
                .map(|m| m.ty.clone())
                .unwrap_or(Type::Any)),
            Type::Named(class) => match lookup(file, class, node)? {
                Some(Declaration::Class(class)) => self.class_member_type(file, class, name),
                _ => Ok(Type::Any),
            },
            _ => Ok(Type::Any),
        }
    }

    fn subscript_type(&self, file: &SourceFile, node: Node<'_>) -> Result<Type> {
        let Some(object) = node.child_by_field_name("object") else {
            return Ok(Type::Any);
        };
        let object_type = self.expression_type(file, object, false)?;
        let index = match node.child_by_field_name("index") {
            Some(index) => self.expression_type(file, index, false)?,
            None => Type::Any,
        };
        Ok(match (object_type, index) {
            (Type::Array(element), _) => *element,
            (Type::Tuple { elements, .. }, Type::NumberLiteral(i)) => {
                i.parse::<usize>().ok().and_then(|i| elements.get(i).cloned()).unwrap_or(Type::Any)
            },
            (Type::Tuple { elements, .. }, _) => Type::union_of(elements),
            (Type::Object(members), Type::StringLiteral(key)) => members
                .into_iter()
                .find(|m| m.name == key)
                .map(|m| m.ty)
                .unwrap_or(Type::Any),
            (ty, _) if ty.is_string_like() => Type::String,
            _ => Type::Any,
        })
    }

    /// Type of `this.name` inside `class`.
    fn class_member_type(&self, file: &SourceFile, class: Node<'_>, name: &str) -> Result<Type> {
        let Some(body) = class.child_by_field_name("body") else {
            return Ok(Type::Any);
        };
        for member in named_children(body) {
            let Some(member_name) = member.child_by_field_name("name") else {
                continue;
            };
            let member_name = file.node_text(member_name)?;
            match member.kind() {
                "public_field_definition" if member_name == name => {
                    return self.property_type(file, member);
                },
                "method_definition" if member_name == "constructor" => {
                    for param in parameter_nodes(member) {
                        let is_property = has_token(param, "readonly")
                            || named_children(param).iter().any(|c| c.kind() == "accessibility_modifier");
                        let binds = match param.child_by_field_name("pattern") {
                            Some(pattern) => file.node_text(pattern)? == name,
                            None => false,
                        };
                        if is_property && binds {
                            return self.parameter_type(file, param);
                        }
                    }
                },
                "method_definition" if member_name == name => {
                    if has_token(member, "get") {
                        return self.return_type(file, member);
                    }
                    if has_token(member, "set") {
                        continue;
                    }
                    return Ok(Type::Function(self.signature(file, member)?));
                },
                _ => {},
            }
        }
        Ok(Type::Any)
    }
}

/// Finds the declaration `name` refers to from `from`, innermost scope first.
fn lookup<'t>(file: &SourceFile, name: &str, from: Node<'t>) -> Result<Option<Declaration<'t>>> {
    let mut current = from;
    while let Some(scope) = current.parent() {
        if let Some(found) = declared_in(file, scope, name)? {
            return Ok(Some(found));
        }
        current = scope;
    }
    Ok(None)
}

fn declared_in<'t>(file: &SourceFile, scope: Node<'t>, name: &str) -> Result<Option<Declaration<'t>>> {
    match scope.kind() {
        "program" | "statement_block" | "switch_case" | "switch_default" => {
            for statement in named_children(scope) {
                if let Some(found) = declared_by(file, statement, name)? {
                    return Ok(Some(found));
                }
            }
            Ok(None)
        },
        "for_statement" => match scope.child_by_field_name("initializer") {
            Some(initializer) => declared_by(file, initializer, name),
            None => Ok(None),
        },
        _ if is_function_node(scope) => {
            for param in parameter_nodes(scope) {
                let binding = if param.kind() == "identifier" {
                    Some(param)
                } else {
                    param.child_by_field_name("pattern")
                };
                if let Some(binding) = binding.filter(|b| b.kind() == "identifier") {
                    if file.node_text(binding)? == name {
                        return Ok(Some(Declaration::Parameter(param)));
                    }
                }
            }
            // Named function expressions can refer to themselves.
            if matches!(scope.kind(), "function" | "function_expression" | "generator_function") {
                if let Some(own) = scope.child_by_field_name("name") {
                    if file.node_text(own)? == name {
                        return Ok(Some(Declaration::Function(scope)));
                    }
                }
            }
            Ok(None)
        },
        _ => Ok(None),
    }
}

fn declared_by<'t>(file: &SourceFile, statement: Node<'t>, name: &str) -> Result<Option<Declaration<'t>>> {
    let declares = |node: Node<'_>| -> Result<bool> {
        match node.child_by_field_name("name") {
            Some(id) if id.kind() == "identifier" || id.kind() == "type_identifier" => {
                Ok(file.node_text(id)? == name)
            },
            _ => Ok(false),
        }
    };

    match statement.kind() {
        "lexical_declaration" | "variable_declaration" => {
            for declarator in named_children(statement) {
                if declarator.kind() == "variable_declarator" && declares(declarator)? {
                    return Ok(Some(Declaration::Variable(declarator)));
                }
            }
            Ok(None)
        },
        "function_declaration" | "generator_function_declaration" => {
            Ok(declares(statement)?.then_some(Declaration::Function(statement)))
        },
        "class_declaration" | "abstract_class_declaration" => {
            Ok(declares(statement)?.then_some(Declaration::Class(statement)))
        },
        "export_statement" => match statement.child_by_field_name("declaration") {
            Some(declaration) => declared_by(file, declaration, name),
            None => Ok(None),
        },
        _ => Ok(None),
    }
}

fn class_name(file: &SourceFile, class: Node<'_>) -> Result<String> {
    match class.child_by_field_name("name") {
        Some(name) => Ok(file.node_text(name)?.to_string()),
        None => Ok("(Anonymous class)".to_string()),
    }
}

/// Nearest class whose `this` is visible from `node`.
fn enclosing_class(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        match ancestor.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => return Some(ancestor),
            "function_declaration" | "generator_function_declaration" | "function"
            | "function_expression" | "generator_function" => return None,
            _ => current = ancestor.parent(),
        }
    }
    None
}

/// `return` statements and `yield` expressions of a body, nested functions and classes excluded.
fn collect_exits(body: Node<'_>) -> (Vec<Node<'_>>, Vec<Node<'_>>) {
    let mut returns = Vec::new();
    let mut yields = Vec::new();
    let mut stack = vec![body];
    while let Some(node) = stack.pop() {
        match node.kind() {
            "return_statement" => returns.push(node),
            "yield_expression" => yields.push(node),
            _ => {},
        }
        for child in named_children(node).into_iter().rev() {
            let boundary = is_function_node(child)
                || matches!(child.kind(), "class" | "class_declaration" | "abstract_class_declaration");
            if !boundary {
                stack.push(child);
            }
        }
    }
    (returns, yields)
}

fn return_of(callee: Type) -> Type {
    match callee {
        Type::Function(signature) => *signature.returns,
        _ => Type::Any,
    }
}

/// Result type of a binary or compound-assignment operator.
fn binary_result(operator: &str, left: Type, right: Type) -> Type {
    match operator {
        "==" | "!=" | "===" | "!==" | "<" | ">" | "<=" | ">=" | "instanceof" | "in" => {
            Type::Boolean
        },
        "&&" | "&&=" if left.is_always_truthy() => right,
        "||" | "||=" if left.is_always_truthy() => left,
        "&&" | "&&=" | "||" | "||=" => Type::union_of(vec![left, right]),
        "??" | "??=" => Type::union_of(vec![left.without_nullish(), right]),
        "+" | "+=" => {
            if left.is_string_like() || right.is_string_like() {
                Type::String
            } else if left.is_number_like() && right.is_number_like() {
                Type::Number
            } else if left.is_bigint_like() && right.is_bigint_like() {
                Type::BigInt
            } else {
                Type::Any
            }
        },
        _ if left.is_bigint_like() && right.is_bigint_like() => Type::BigInt,
        _ => Type::Number,
    }
}

fn builtin_function(name: &str) -> Type {
    match name {
        "String" => Type::String,
        "Number" | "parseInt" | "parseFloat" => Type::Number,
        "Boolean" | "isNaN" | "isFinite" => Type::Boolean,
        "Symbol" => Type::Symbol,
        "BigInt" => Type::BigInt,
        _ => Type::Any,
    }
}

fn builtin_static(namespace: &str, method: &str) -> Option<Type> {
    match (namespace, method) {
        ("Math", _) => Some(Type::Number),
        ("JSON", "stringify") => Some(Type::String),
        ("JSON", "parse") => Some(Type::Any),
        ("Object", "keys") => Some(Type::Array(Box::new(Type::String))),
        ("Array", "isArray") | ("Number", "isInteger") | ("Number", "isFinite") => {
            Some(Type::Boolean)
        },
        ("Date", "now") | ("Number", "parseFloat") | ("Number", "parseInt") => Some(Type::Number),
        ("console", _) => Some(Type::Void),
        _ => None,
    }
}

/// Numeric literal type with the value normalized the way `tsc` prints it.
fn number_literal(text: &str) -> Type {
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    if digits.ends_with('n') {
        return Type::BigIntLiteral(digits);
    }

    let prefixed = |lower: &str, upper: &str, radix: u32| {
        digits.strip_prefix(lower).or_else(|| digits.strip_prefix(upper)).map(|rest| {
            rest.chars().try_fold(0f64, |acc, c| {
                c.to_digit(radix).map(|d| acc * f64::from(radix) + f64::from(d))
            })
        })
    };
    let value = prefixed("0x", "0X", 16)
        .or_else(|| prefixed("0o", "0O", 8))
        .or_else(|| prefixed("0b", "0B", 2))
        .unwrap_or_else(|| digits.parse::<f64>().ok());

    match value {
        Some(value) => Type::NumberLiteral(js_number(value)),
        None => Type::NumberLiteral(digits),
    }
}

/// Formats `value` like JavaScript's `Number.prototype.toString`.
fn js_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if (1e-6..1e21).contains(&value.abs()) {
        return value.to_string();
    }

    let exponential = format!("{:e}", value);
    match exponential.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        },
        _ => exponential,
    }
}

fn negate(value: &str) -> String {
    match value.strip_prefix('-') {
        Some(positive) => positive.to_string(),
        None if value == "0" => value.to_string(),
        None => format!("-{}", value),
    }
}

/// Contents of a quoted string or template, re-escaped for a double-quoted type.
fn string_literal_value(raw: &str) -> String {
    let inner = if raw.len() >= 2 { &raw[1..raw.len() - 1] } else { "" };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(quote @ ('\'' | '`')) => out.push(quote),
                Some(escaped) => {
                    out.push('\\');
                    out.push(escaped);
                },
                None => out.push('\\'),
            },
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Object member name as `tsc` prints it: quotes only when required.
fn property_name(raw: &str) -> String {
    let quoted = raw.starts_with('"') || raw.starts_with('\'');
    if !quoted || raw.len() < 2 {
        return raw.to_string();
    }
    let inner = &raw[1..raw.len() - 1];
    let is_identifier = inner
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c == '$' || c.is_alphabetic() || (i > 0 && c.is_ascii_digit()));
    if is_identifier && !inner.is_empty() {
        inner.to_string()
    } else {
        format!("\"{}\"", string_literal_value(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::path::PathBuf;

    fn source_file(source: &str) -> SourceFile {
        let mut parser = Parser::new().unwrap();
        SourceFile::parse(&mut parser, PathBuf::from("test.ts"), source.to_string()).unwrap()
    }

    fn descendants<'t>(node: Node<'t>, kind: &str, found: &mut Vec<Node<'t>>) {
        if node.kind() == kind {
            found.push(node);
        }
        for child in named_children(node) {
            descendants(child, kind, found);
        }
    }

    fn last_of_kind<'t>(file: &'t SourceFile, kind: &str) -> Node<'t> {
        let mut found = Vec::new();
        descendants(file.root(), kind, &mut found);
        found.pop().unwrap()
    }

    fn resolve(source: &str, strict: bool, target: fn(&SourceFile) -> AnnotationTarget<'_>) -> String {
        let file = source_file(source);
        let checker = Checker::new(CheckerOptions { strict_null_checks: strict });
        checker.resolve(&file, &target(&file)).unwrap().text
    }

    /// Type of the last variable declared in `source`.
    fn variable(source: &str) -> String {
        resolve(source, false, |f| AnnotationTarget::Variable(last_of_kind(f, "variable_declarator")))
    }

    fn strict_variable(source: &str) -> String {
        resolve(source, true, |f| AnnotationTarget::Variable(last_of_kind(f, "variable_declarator")))
    }

    #[rstest]
    #[case("const x = 5;", "5")]
    #[case("let x = 5;", "number")]
    #[case("const x = 0x10;", "16")]
    #[case("const x = 1_000;", "1000")]
    #[case("const x = -3;", "-3")]
    #[case("const x = 10n;", "10n")]
    #[case("const x = 'it\\'s';", "\"it's\"")]
    #[case("let x = `a${1}b`;", "string")]
    #[case("const x = true;", "true")]
    #[case("var x = false;", "boolean")]
    #[case("let x = /ab+c/;", "RegExp")]
    #[case("let x = [1, 2, 3];", "number[]")]
    #[case("let x = [1, 'a'];", "(string | number)[]")]
    #[case("let x = [];", "any[]")]
    #[case("const x = [1, 'a'] as const;", "readonly [1, \"a\"]")]
    #[case("let x = { a: 1, b: 'c' };", "{ a: number; b: string; }")]
    #[case("const x = { a: 1 } as const;", "{ readonly a: 1; }")]
    #[case("let x = { m() { return 1; } };", "{ m(): number; }")]
    #[case("const a = 1; let x = { a };", "{ a: number; }")]
    #[case("let x = 1 + 2;", "number")]
    #[case("let x = 'a' + 1;", "string")]
    #[case("let x = 1 < 2;", "boolean")]
    #[case("let x = typeof 1;", "string")]
    #[case("let x = !0;", "boolean")]
    #[case("let x = true ? 1 : 'a';", "string | number")]
    #[case("let x = null;", "any")]
    #[case("let x = new Map();", "Map<any, any>")]
    #[case("let x = new Map<string, number>();", "Map<string, number>")]
    #[case("class Foo {} let x = new Foo();", "Foo")]
    #[case("class Foo {} const x = Foo;", "typeof Foo")]
    #[case("let x = Math.max(1, 2);", "number")]
    #[case("let x = JSON.stringify({});", "string")]
    #[case("let x = 'a'.toUpperCase();", "string")]
    #[case("let x = [1, 2].map(n => String(n));", "string[]")]
    #[case("let x = [1, 2].length;", "number")]
    #[case("let x = (a: number, b = 'b') => a;", "(a: number, b?: string) => number")]
    #[case("function f(a = 0) { return a * 2; } let x = f(1);", "number")]
    #[case("let x = async () => 1;", "() => Promise<number>")]
    #[case("let x = undeclared;", "any")]
    #[case("let x = 1 as unknown as string;", "string")]
    fn test_variable_types(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(variable(source), expected);
    }

    #[rstest]
    #[case("let x = null;", "null")]
    #[case("let x = Math.random() > 0.5 ? 'a' : undefined;", "string | undefined")]
    #[case("let x = [1].pop();", "number | undefined")]
    fn test_strict_null_checks(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(strict_variable(source), expected);
    }

    fn returns(source: &str) -> String {
        resolve(source, false, |f| {
            let mut found = Vec::new();
            descendants(f.root(), "function_declaration", &mut found);
            descendants(f.root(), "generator_function_declaration", &mut found);
            AnnotationTarget::ReturnType(found[0])
        })
    }

    #[rstest]
    #[case("function f() {}", "void")]
    #[case("function f() { return; }", "void")]
    #[case("function f(a = 0) { if (a) { return 'x'; } return a; }", "string | number")]
    #[case("function f() { const g = () => 'x'; return 1; }", "number")]
    #[case("async function f() { return 1; }", "Promise<number>")]
    #[case("async function f() {}", "Promise<void>")]
    #[case("function* f() { yield 1; return 'done'; }", "Generator<number, string, unknown>")]
    #[case("function f() { return f(); }", "any")]
    #[case("function f(x): x is string { return true; }", "boolean")]
    fn test_return_types(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(returns(source), expected);
    }

    fn first_parameter(source: &str) -> String {
        resolve(source, false, |f| {
            let func = last_of_kind(f, "formal_parameters").parent().unwrap();
            AnnotationTarget::Parameter(parameter_nodes(func)[0])
        })
    }

    #[rstest]
    #[case("function f(a) {}", "any")]
    #[case("function f(a = 1) {}", "number")]
    #[case("function f(a = [] as string[]) {}", "string[]")]
    #[case("function f(...rest) {}", "any[]")]
    #[case("function f({ a, b = 1 }) {}", "{ a: any; b?: number; }")]
    #[case("function f([a, b = '']) {}", "[any, string]")]
    #[case("const f: (n: number) => void = (n) => {};", "number")]
    fn test_parameter_types(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(first_parameter(source), expected);
    }

    #[test]
    fn test_property_and_this_members() {
        let source = "class A {\n  constructor(private readonly id = 1) {}\n  readonly kind = 'a';\n  count = this.id;\n}";
        let property = |index: usize| {
            let file = source_file(source);
            let mut found = Vec::new();
            descendants(file.root(), "public_field_definition", &mut found);
            let checker = Checker::new(CheckerOptions::default());
            checker.resolve(&file, &AnnotationTarget::Property(found[index])).unwrap().text
        };

        assert_eq!(property(0), "\"a\"");
        assert_eq!(property(1), "number");
    }

    #[test]
    fn test_getter_return_type() {
        let source = "class A { get name() { return 'x'; } }";
        let text = resolve(source, false, |f| {
            AnnotationTarget::GetAccessor(last_of_kind(f, "method_definition"))
        });
        assert_eq!(text, "string");
    }

    #[rstest]
    #[case("0", "0")]
    #[case("1.50", "1.5")]
    #[case(".5", "0.5")]
    #[case("0b1010", "10")]
    #[case("0o17", "15")]
    #[case("0x10000000000000000", "18446744073709552000")]
    #[case("1e21", "1e+21")]
    #[case("123e20", "1.23e+22")]
    #[case("1e20", "100000000000000000000")]
    #[case("1e-7", "1e-7")]
    #[case("0.000001", "0.000001")]
    #[case("1e400", "Infinity")]
    fn test_number_literal_text(#[case] literal: &str, #[case] expected: &str) {
        assert_eq!(number_literal(literal), Type::NumberLiteral(expected.to_string()));
    }

    #[test]
    fn test_self_reference_is_any() {
        assert_eq!(variable("let x = x + 1;"), "any");
    }

    #[test]
    fn test_long_operator_chain_is_typed() {
        let terms: Vec<String> = (0..260).map(|i| format!("'s{}'", i)).collect();
        let source = format!("let msg = {};", terms.join(" + "));
        assert_eq!(variable(&source), "string");

        let sums: Vec<String> = (0..260).map(|i| i.to_string()).collect();
        assert_eq!(variable(&format!("let total = {};", sums.join(" - "))), "number");
    }

    #[test]
    fn test_deep_nesting_degrades_to_any() {
        let depth = MAX_DEPTH + 10;
        let source = format!("let x = {}1{};", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(variable(&source), "any");
    }
}
