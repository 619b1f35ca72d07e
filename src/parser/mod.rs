//! Parser module for converting TypeScript source code into a syntax tree.

use std::path::Path;
use tree_sitter::Parser as TSParser;
use crate::error::{Error, Result};

/// Grammar flavour, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `.ts`, `.mts`, `.cts`
    TypeScript,
    /// `.tsx`
    Tsx,
}

impl Dialect {
    /// Returns the dialect for a path, or `None` when it is not a TypeScript file.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "ts" | "mts" | "cts" => Some(Dialect::TypeScript),
            "tsx" => Some(Dialect::Tsx),
            _ => None,
        }
    }
}

/// The main parser struct that handles parsing source code.
pub struct Parser {
    /// The tree-sitter parser instance.
    parser: TSParser,
}

impl Parser {
    /// Creates a new parser for TypeScript.
    pub fn new() -> Result<Self> {
        let mut parser = Self { parser: TSParser::new() };
        parser.set_dialect(Dialect::TypeScript)?;
        Ok(parser)
    }

    fn set_dialect(&mut self, dialect: Dialect) -> Result<()> {
        let language = match dialect {
            Dialect::TypeScript => tree_sitter_typescript::language_typescript(),
            Dialect::Tsx => tree_sitter_typescript::language_tsx(),
        };

        self.parser
            .set_language(language)
            .map_err(|e| Error::parser_error(format!("Failed to load language: {}", e)))
    }

    /// Parses a source code string into a syntax tree.
    pub fn parse_string(&mut self, source: &str, dialect: Dialect) -> Result<tree_sitter::Tree> {
        self.set_dialect(dialect)?;
        self.parser
            .parse(source, None)
            .ok_or_else(|| Error::parser_error("Failed to parse source code".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_initialization() {
        assert!(Parser::new().is_ok());
    }

    #[test]
    fn test_parse_string() {
        let mut parser = Parser::new().unwrap();
        let source = r#"
        function hello(name: string) {
            console.log(`Hello, ${name}!`);
        }
        "#;

        let tree = parser.parse_string(source, Dialect::TypeScript).unwrap();
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_parse_tsx() {
        let mut parser = Parser::new().unwrap();
        let source = "const view = <div className=\"a\">{1}</div>;";

        let tree = parser.parse_string(source, Dialect::Tsx).unwrap();
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_dialect_from_path() {
        assert_eq!(Dialect::from_path(Path::new("a/b.ts")), Some(Dialect::TypeScript));
        assert_eq!(Dialect::from_path(Path::new("b.d.ts")), Some(Dialect::TypeScript));
        assert_eq!(Dialect::from_path(Path::new("view.tsx")), Some(Dialect::Tsx));
        assert_eq!(Dialect::from_path(Path::new("main.js")), None);
        assert_eq!(Dialect::from_path(Path::new("Makefile")), None);
    }
}
