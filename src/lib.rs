//! ts-explicit: adds explicit type annotations to TypeScript sources.
//!
//! Every untyped parameter, return position, top-level variable, class
//! property, constructor parameter and get accessor in the matched files is
//! given the type the checker infers for it, subject to the literal and
//! `any` filters in [`config::RunConfig`].

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod annotator;
pub mod checker;
pub mod config;
pub mod error;
pub mod parser;
pub mod project;
pub mod reporter;
pub mod types;
pub mod utils;
pub mod walker;

use std::io::Write;

use crate::checker::Checker;
use crate::config::{resolve_tsconfig, RunOptions};
use crate::error::{Error, Result};
use crate::project::{Project, ProjectOptions};
use crate::reporter::{Reporter, RunSummary};
use crate::walker::Walker;

/// Re-exports commonly used types and traits.
pub mod prelude {
    pub use crate::config::{RunConfig, RunOptions};
    pub use crate::error::{Error, Result};
    pub use crate::reporter::RunSummary;
    pub use crate::run;
}

/// Annotates every file matching `options.pattern`, writing report lines to `out`.
///
/// Each file is walked, reported and saved before the next one is read. The
/// tsconfig is resolved before any source file is touched.
pub fn run<W: Write>(options: &RunOptions, out: W) -> Result<RunSummary> {
    if options.pattern.trim().is_empty() {
        return Err(Error::argument_error("glob pattern is required."));
    }

    let config_path = resolve_tsconfig(&options.cwd, options.tsconfig.as_deref())?;
    let mut project =
        Project::load(ProjectOptions { root: options.cwd.clone(), config_path })?;
    let paths = project.find_files(&options.pattern)?;

    let checker = Checker::new(project.checker_options());
    let walker = Walker::new(&checker, &options.config);
    let mut reporter = Reporter::new(out);

    for path in paths {
        let file = project.open(path)?;
        let outcome = walker.walk(&file)?;
        reporter.file_processed(file.path(), outcome.annotations)?;
        file.save(&outcome.rewriter)?;
    }

    reporter.finish()
}
