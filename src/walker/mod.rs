//! Traversal of a parsed file into annotation targets.

use tree_sitter::Node;

use crate::annotator::{AnnotationTarget, Annotator};
use crate::checker::TypeResolver;
use crate::config::RunConfig;
use crate::error::Result;
use crate::project::{Rewriter, SourceFile};
use crate::utils::{
    is_constructor, is_function_like, is_getter, is_top_level, named_children, parameter_nodes,
};

/// What a walk over one file produced.
#[derive(Debug)]
pub struct FileOutcome {
    /// Annotations queued for the file.
    pub annotations: usize,
    /// The queued insertions, ready for [`SourceFile::save`].
    pub rewriter: Rewriter,
}

/// Visits every annotation target of a file once, in document order.
pub struct Walker<'a, R: TypeResolver + ?Sized> {
    annotator: Annotator<'a, R>,
}

impl<'a, R: TypeResolver + ?Sized> Walker<'a, R> {
    /// Creates a walker that resolves types with `resolver`.
    pub fn new(resolver: &'a R, config: &'a RunConfig) -> Self {
        Self { annotator: Annotator::new(resolver, config) }
    }

    /// Walks `file` depth-first and annotates everything eligible.
    pub fn walk(&self, file: &SourceFile) -> Result<FileOutcome> {
        let mut rewriter = Rewriter::new();
        let mut annotations = 0;

        let mut stack = vec![file.root()];
        while let Some(node) = stack.pop() {
            for target in targets(file, node) {
                if self.annotator.annotate_if_eligible(file, &target, &mut rewriter)? {
                    annotations += 1;
                }
            }
            stack.extend(named_children(node).into_iter().rev());
        }

        log::info!("{}: {} annotation(s)", file.path().display(), annotations);
        Ok(FileOutcome { annotations, rewriter })
    }
}

/// Annotation targets introduced by `node` itself.
fn targets<'t>(file: &SourceFile, node: Node<'t>) -> Vec<AnnotationTarget<'t>> {
    match node.kind() {
        "variable_declarator" => match node.parent() {
            Some(declaration) if is_top_level(declaration) => {
                vec![AnnotationTarget::Variable(node)]
            },
            _ => Vec::new(),
        },
        // `export default class { ... }` parses as a bare `class` node.
        "class_declaration" | "abstract_class_declaration" | "class" if is_top_level(node) => {
            class_targets(file, node)
        },
        _ if is_function_like(node, file.text()) => {
            let mut targets: Vec<_> =
                parameter_nodes(node).into_iter().map(AnnotationTarget::Parameter).collect();
            targets.push(AnnotationTarget::ReturnType(node));
            targets
        },
        _ => Vec::new(),
    }
}

/// Constructor parameters, then properties, then get accessors.
fn class_targets<'t>(file: &SourceFile, class: Node<'t>) -> Vec<AnnotationTarget<'t>> {
    let members = match class.child_by_field_name("body") {
        Some(body) => named_children(body),
        None => return Vec::new(),
    };

    let constructor = members.iter().find(|m| is_constructor(**m, file.text()));
    let mut targets: Vec<_> = constructor
        .map(|c| parameter_nodes(*c))
        .unwrap_or_default()
        .into_iter()
        .map(AnnotationTarget::ConstructorParameter)
        .collect();
    targets.extend(
        members
            .iter()
            .filter(|m| m.kind() == "public_field_definition")
            .map(|m| AnnotationTarget::Property(*m)),
    );
    targets.extend(members.iter().filter(|m| is_getter(**m)).map(|m| AnnotationTarget::GetAccessor(*m)));
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::Checker;
    use crate::config::CheckerOptions;
    use crate::parser::Parser;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::path::PathBuf;

    fn annotate_with(source: &str, config: RunConfig, strict: bool) -> (String, usize) {
        let mut parser = Parser::new().unwrap();
        let file = SourceFile::parse(&mut parser, PathBuf::from("test.ts"), source.to_string())
            .unwrap();
        let checker = Checker::new(CheckerOptions { strict_null_checks: strict });
        let outcome = Walker::new(&checker, &config).walk(&file).unwrap();
        (file.rewritten(&outcome.rewriter), outcome.annotations)
    }

    fn annotate(source: &str) -> (String, usize) {
        annotate_with(source, RunConfig::default(), false)
    }

    #[test]
    fn test_function_parameters_and_return() {
        let (text, count) = annotate("function add(a = 0, b = 0) { return a + b; }");
        assert_eq!(text, "function add(a: number = 0, b: number = 0): number { return a + b; }");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_untyped_parameters_become_any() {
        let (text, count) = annotate("function add(a, b) { return a + b; }");
        assert_eq!(text, "function add(a: any, b: any): any { return a + b; }");
        assert_eq!(count, 3);
    }

    #[rstest]
    #[case(false, "const x = 5;\nlet y = 5;\n", "const x = 5;\nlet y: number = 5;\n", 1)]
    #[case(true, "const x = 5;\nlet y = 5;\n", "const x: 5 = 5;\nlet y: number = 5;\n", 2)]
    fn test_literal_types(
        #[case] include_literal_types: bool,
        #[case] source: &str,
        #[case] expected: &str,
        #[case] count: usize,
    ) {
        let config = RunConfig { include_literal_types, ignore_any_type: false };
        assert_eq!(annotate_with(source, config, false), (expected.to_string(), count));
    }

    #[test]
    fn test_literal_rule_only_applies_to_variables() {
        let source = "class A { readonly kind = 'a'; }";
        let (text, count) = annotate(source);
        assert_eq!(text, "class A { readonly kind: \"a\" = 'a'; }");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_ignore_any_type() {
        let config = RunConfig { include_literal_types: false, ignore_any_type: true };
        let source = "function f(a, b = 1) { return a; }\nlet v = JSON.parse('{}');\nclass C { p = a(); }\n";
        let (text, count) = annotate_with(source, config, false);
        assert_eq!(
            text,
            "function f(a, b: number = 1) { return a; }\nlet v = JSON.parse('{}');\nclass C { p = a(); }\n"
        );
        assert_eq!(count, 1);
    }

    #[test]
    fn test_ignore_any_type_covers_class_members() {
        let config = RunConfig { include_literal_types: false, ignore_any_type: true };
        let source = "class C { constructor(a) {} get g() { return JSON.parse('1'); } }";
        let (text, count) = annotate_with(source, config, false);
        assert_eq!(text, source);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_second_pass_adds_nothing() {
        let source = "export function greet(name = 'x') { return `hi ${name}`; }\nexport let n = 1;\n";
        let (first, count) = annotate(source);
        assert_eq!(count, 3);
        let (second, count) = annotate(&first);
        assert_eq!(second, first);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_class_without_constructor() {
        let source = "class Box { size = 1; static unit = 'cm'; get area() { return this.size * 2; } }";
        let (text, count) = annotate(source);
        assert_eq!(
            text,
            "class Box { size: number = 1; static unit: string = 'cm'; get area(): number { return this.size * 2; } }"
        );
        assert_eq!(count, 3);
    }

    #[rstest]
    #[case(
        "export default class { size = 1; constructor(a = 2) {} get area() { return 3; } }",
        "export default class { size: number = 1; constructor(a: number = 2) {} get area(): number { return 3; } }",
        3
    )]
    #[case(
        "export default class Named { size = 1; }",
        "export default class Named { size: number = 1; }",
        1
    )]
    fn test_default_exported_classes(
        #[case] source: &str,
        #[case] expected: &str,
        #[case] count: usize,
    ) {
        assert_eq!(annotate_with(source, RunConfig::default(), false), (expected.to_string(), count));
    }

    #[test]
    fn test_constructor_parameters() {
        let source = "abstract class Repo {\n  constructor(private limit = 10, name) {}\n  set value(v) {}\n}\n";
        let (text, count) = annotate(source);
        assert_eq!(
            text,
            "abstract class Repo {\n  constructor(private limit: number = 10, name: any) {}\n  set value(v) {}\n}\n"
        );
        assert_eq!(count, 2);
    }

    #[test]
    fn test_nested_declarations_are_not_variables() {
        let source = "function f(): void { const inner = 1; let other = 2; }";
        let (text, count) = annotate(source);
        assert_eq!(text, source);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_zero_parameters_with_explicit_return() {
        let (text, count) = annotate("function f(): number { return 1; }");
        assert_eq!(text, "function f(): number { return 1; }");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_bare_arrow_parameter() {
        let (text, count) = annotate("export const id = x => x;");
        assert_eq!(text, "export const id: (x: any) => any = (x: any): any => x;");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_object_literal_methods_and_this_parameter() {
        let source = "function run(this: Window, n = 2) { return n; }\nconst api = { twice(k = 1) { return k * 2; } };\n";
        let (text, count) = annotate(source);
        assert_eq!(
            text,
            "function run(this: Window, n: number = 2): number { return n; }\nconst api: { twice(k?: number): number; } = { twice(k: number = 1): number { return k * 2; } };\n"
        );
        assert_eq!(count, 5);
    }

    #[rstest]
    #[case(false, "let x = null;", "let x: any = null;")]
    #[case(true, "let x = null;", "let x: null = null;")]
    fn test_strict_null_handling(#[case] strict: bool, #[case] source: &str, #[case] expected: &str) {
        let (text, _) = annotate_with(source, RunConfig::default(), strict);
        assert_eq!(text, expected);
    }
}
