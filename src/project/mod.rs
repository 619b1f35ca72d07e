//! Project loading: tsconfig, file discovery and parsed source files.

mod rewriter;

use std::fs;
use std::path::{Path, PathBuf};

use tree_sitter::{Node, Tree};

use crate::config::{self, CheckerOptions};
use crate::error::{Error, Result};
use crate::parser::{Dialect, Parser};
use crate::utils::expand_glob;

pub use rewriter::Rewriter;

/// Options for [`Project::load`].
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    /// Directory glob patterns are resolved against.
    pub root: PathBuf,
    /// tsconfig to read compiler options from. Its `include` and `files` are ignored.
    pub config_path: Option<PathBuf>,
}

/// A set of source files sharing one configuration.
pub struct Project {
    root: PathBuf,
    parser: Parser,
    checker_options: CheckerOptions,
}

impl Project {
    /// Reads the tsconfig, if any, and prepares a parser.
    pub fn load(options: ProjectOptions) -> Result<Self> {
        let checker_options = match &options.config_path {
            Some(path) => {
                log::info!("using {}", path.display());
                config::load_tsconfig(path)?.checker_options()
            },
            None => CheckerOptions::default(),
        };

        Ok(Self { root: options.root, parser: Parser::new()?, checker_options })
    }

    /// Compiler settings the checker should use.
    pub fn checker_options(&self) -> CheckerOptions {
        self.checker_options
    }

    /// TypeScript files matching `pattern`, relative to the project root, in path order.
    pub fn find_files(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let paths = expand_glob(&self.root, pattern)?;
        log::info!("{} file(s) match `{}`", paths.len(), pattern);
        Ok(paths)
    }

    /// Reads and parses one file with the project's parser.
    pub fn open(&mut self, path: PathBuf) -> Result<SourceFile> {
        SourceFile::open(&mut self.parser, path)
    }
}

/// One parsed file on disk.
pub struct SourceFile {
    path: PathBuf,
    text: String,
    tree: Tree,
}

impl SourceFile {
    /// Reads and parses `path`.
    pub fn open(parser: &mut Parser, path: PathBuf) -> Result<Self> {
        let text = fs::read_to_string(&path)?;
        Self::parse(parser, path, text)
    }

    /// Parses `text` as the contents of `path` without touching the disk.
    pub fn parse(parser: &mut Parser, path: PathBuf, text: String) -> Result<Self> {
        let dialect = Dialect::from_path(&path).unwrap_or(Dialect::TypeScript);
        let tree = parser.parse_string(&text, dialect)?;
        if tree.root_node().has_error() {
            log::warn!("{}: syntax errors, annotations may be incomplete", path.display());
        }
        Ok(Self { path, text, tree })
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Original source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Root of the syntax tree.
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text covered by `node`.
    pub fn node_text(&self, node: Node<'_>) -> Result<&str> {
        node.utf8_text(self.text.as_bytes()).map_err(|e| {
            let pos = node.start_position();
            Error::type_error(format!(
                "{}:{}:{}: cannot read node text: {}",
                self.path.display(),
                pos.row + 1,
                pos.column + 1,
                e
            ))
        })
    }

    /// Source text with the queued annotations applied.
    pub fn rewritten(&self, rewriter: &Rewriter) -> String {
        rewriter.apply(&self.text)
    }

    /// Writes the file back to disk, annotated or not.
    pub fn save(&self, rewriter: &Rewriter) -> Result<()> {
        fs::write(&self.path, self.rewritten(rewriter))?;
        Ok(())
    }
}
