//! Utility functions and helpers for ts-explicit.

use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use tree_sitter::Node;
use walkdir::WalkDir;

use crate::error::Result;
use crate::parser::Dialect;

/// Returns an iterator over all TypeScript files under the given directory, in path order.
pub fn find_typescript_files<P: AsRef<Path>>(path: P) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_typescript_file(entry.path()))
        .map(|entry| entry.path().to_path_buf())
}

/// Whether the path names a file the tool can parse.
pub fn is_typescript_file(path: &Path) -> bool {
    Dialect::from_path(path).is_some()
}

/// Expands `pattern` relative to `root` into the matching TypeScript files.
///
/// `*` does not cross directory separators; `**` does. A pattern without
/// wildcards names a single file.
pub fn expand_glob(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = normalize(&root.join(pattern));

    if !has_glob_meta(pattern) {
        let found = full.is_file() && is_typescript_file(&full);
        return Ok(if found { vec![full] } else { Vec::new() });
    }

    let matcher = GlobBuilder::new(&full.to_string_lossy())
        .literal_separator(true)
        .build()?
        .compile_matcher();

    let files = find_typescript_files(glob_base(&full))
        .filter(|path| matcher.is_match(path))
        .collect();
    Ok(files)
}

fn has_glob_meta(text: &str) -> bool {
    text.contains(['*', '?', '[', '{'])
}

/// The longest leading directory of `pattern` that contains no wildcard.
fn glob_base(pattern: &Path) -> PathBuf {
    let mut base = PathBuf::new();
    for component in pattern.components() {
        if has_glob_meta(&component.as_os_str().to_string_lossy()) {
            break;
        }
        base.push(component);
    }
    base
}

/// Removes `.` components and folds `..` into their parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            other => out.push(other),
        }
    }
    out
}

/// Named children of `node`, comments excluded.
pub fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}

/// Whether `node` has an anonymous `token` child, such as `async` or `get`.
pub fn has_token(node: Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|child| !child.is_named() && child.kind() == token);
    found
}

/// Node kinds that introduce a parameter list.
pub fn is_function_node(node: Node<'_>) -> bool {
    node.is_named()
        && matches!(
            node.kind(),
            "function_declaration"
                | "generator_function_declaration"
                | "function"
                | "function_expression"
                | "generator_function"
                | "arrow_function"
                | "method_definition"
        )
}

/// Functions, arrows and methods; constructors and accessors excluded.
pub fn is_function_like(node: Node<'_>, source: &str) -> bool {
    match node.kind() {
        "method_definition" => {
            !is_constructor(node, source) && !has_token(node, "get") && !has_token(node, "set")
        },
        _ => is_function_node(node),
    }
}

/// `constructor(...) { ... }` inside a class body.
pub fn is_constructor(node: Node<'_>, source: &str) -> bool {
    node.kind() == "method_definition"
        && node
            .child_by_field_name("name")
            .and_then(|name| name.utf8_text(source.as_bytes()).ok())
            .map_or(false, |name| name == "constructor")
}

/// `get name() { ... }`
pub fn is_getter(node: Node<'_>) -> bool {
    node.kind() == "method_definition" && has_token(node, "get")
}

/// Parameters of a function node, `this` parameters excluded.
///
/// For `x => ...` this is the bare identifier.
pub fn parameter_nodes(func: Node<'_>) -> Vec<Node<'_>> {
    if let Some(param) = func.child_by_field_name("parameter") {
        return vec![param];
    }
    match func.child_by_field_name("parameters") {
        Some(params) => named_children(params)
            .into_iter()
            .filter(|param| matches!(param.kind(), "required_parameter" | "optional_parameter"))
            .filter(|param| {
                param.child_by_field_name("pattern").map_or(true, |p| p.kind() != "this")
            })
            .collect(),
        None => Vec::new(),
    }
}

/// A statement directly in the file, possibly behind `export`.
pub fn is_top_level(node: Node<'_>) -> bool {
    match node.parent() {
        Some(parent) if parent.kind() == "program" => true,
        Some(parent) if parent.kind() == "export_statement" => {
            parent.parent().map_or(false, |p| p.kind() == "program")
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap();
    }

    #[test]
    fn test_find_typescript_files() {
        let temp_dir = tempdir().unwrap();
        let dir_path = temp_dir.path();

        touch(dir_path, "b.ts");
        touch(dir_path, "a.tsx");
        touch(dir_path, "not_typescript.js");

        let files: Vec<_> = find_typescript_files(dir_path).collect();
        assert_eq!(files, vec![dir_path.join("a.tsx"), dir_path.join("b.ts")]);

        temp_dir.close().unwrap();
    }

    #[test]
    fn test_single_star_stays_in_directory() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        touch(root, "src/a.ts");
        touch(root, "src/nested/b.ts");

        let files = expand_glob(root, "src/*.ts").unwrap();
        assert_eq!(files, vec![root.join("src/a.ts")]);
    }

    #[test]
    fn test_double_star_recurses() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        touch(root, "src/a.ts");
        touch(root, "src/nested/b.ts");
        touch(root, "src/nested/c.js");
        touch(root, "other/d.ts");

        let files = expand_glob(root, "./src/**/*.ts").unwrap();
        assert_eq!(files, vec![root.join("src/a.ts"), root.join("src/nested/b.ts")]);
    }

    #[test]
    fn test_plain_path_matches_single_file() {
        let temp_dir = tempdir().unwrap();
        let root = temp_dir.path();
        touch(root, "src/a.ts");

        assert_eq!(expand_glob(root, "src/a.ts").unwrap(), vec![root.join("src/a.ts")]);
        assert!(expand_glob(root, "src/missing.ts").unwrap().is_empty());
    }

    #[test]
    fn test_no_matches_is_not_an_error() {
        let temp_dir = tempdir().unwrap();
        assert!(expand_glob(temp_dir.path(), "lib/**/*.ts").unwrap().is_empty());
    }

    fn parse(source: &str) -> tree_sitter::Tree {
        crate::parser::Parser::new()
            .unwrap()
            .parse_string(source, Dialect::TypeScript)
            .unwrap()
    }

    fn collect<'t>(node: Node<'t>, found: &mut Vec<Node<'t>>) {
        found.push(node);
        for child in named_children(node) {
            collect(child, found);
        }
    }

    #[test]
    fn test_function_like_classification() {
        let source = "class A { constructor(a) {} get b() { return 1; } set b(v) {} m(this: A, x) {} }";
        let tree = parse(source);
        let mut nodes = Vec::new();
        collect(tree.root_node(), &mut nodes);
        let methods: Vec<_> = nodes.into_iter().filter(|n| n.kind() == "method_definition").collect();

        assert_eq!(methods.len(), 4);
        assert!(is_constructor(methods[0], source));
        assert!(is_getter(methods[1]));
        let like: Vec<bool> = methods.iter().map(|m| is_function_like(*m, source)).collect();
        assert_eq!(like, vec![false, false, false, true]);
        assert_eq!(parameter_nodes(methods[3]).len(), 1);
    }

    #[test]
    fn test_top_level_statements() {
        let tree = parse("export const a = 1;\nfunction f() { const b = 2; }\n");
        let mut nodes = Vec::new();
        collect(tree.root_node(), &mut nodes);
        let declarations: Vec<_> =
            nodes.into_iter().filter(|n| n.kind() == "lexical_declaration").collect();

        assert_eq!(declarations.len(), 2);
        assert!(is_top_level(declarations[0]));
        assert!(!is_top_level(declarations[1]));
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        let temp_dir = tempdir().unwrap();
        assert!(expand_glob(temp_dir.path(), "src/[*.ts").is_err());
    }
}
