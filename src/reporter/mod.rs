//! Per-file and end-of-run reporting.

use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// Printed once every matched file has been saved.
pub const COMPLETION_MESSAGE: &str = "All source files update completed.";

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files walked and saved.
    pub files_processed: usize,
    /// Files that received at least one annotation.
    pub files_modified: usize,
    /// Annotations added across all files.
    pub annotations: usize,
}

/// Writes report lines to `out` and keeps the running totals.
pub struct Reporter<W: Write> {
    out: W,
    summary: RunSummary,
}

impl<W: Write> Reporter<W> {
    /// Creates a reporter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out, summary: RunSummary::default() }
    }

    /// Records a processed file; files without annotations print nothing.
    pub fn file_processed(&mut self, path: &Path, annotations: usize) -> Result<()> {
        self.summary.files_processed += 1;
        if annotations == 0 {
            return Ok(());
        }

        self.summary.files_modified += 1;
        self.summary.annotations += annotations;
        writeln!(self.out, "[{}] Added {} type annotations", path.display(), annotations)?;
        Ok(())
    }

    /// Prints the completion line and returns the totals.
    pub fn finish(mut self) -> Result<RunSummary> {
        writeln!(self.out, "{}", COMPLETION_MESSAGE)?;
        self.out.flush()?;
        Ok(self.summary)
    }
}
