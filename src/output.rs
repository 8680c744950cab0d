use std::fs::{self, File};
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use camino::Utf8Path;

/// Newline-delimited record file, truncated when opened.
///
/// Every row is flushed as soon as it is written so an aborted run leaves the
/// rows of all completed iterations on disk.
pub struct RowWriter<W: Write> {
    inner: W,
    label: String,
    rows: usize,
}

impl RowWriter<BufWriter<File>> {
    pub fn create(path: &Utf8Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| format!("creating directory {}", parent))?;
        }
        let file = File::create(path).with_context(|| format!("creating {}", path))?;
        Ok(Self::new(BufWriter::new(file), path.as_str()))
    }
}

impl<W: Write> RowWriter<W> {
    pub fn new(inner: W, label: impl Into<String>) -> Self {
        Self {
            inner,
            label: label.into(),
            rows: 0,
        }
    }

    pub fn write_row(&mut self, row: &str) -> Result<()> {
        writeln!(self.inner, "{}", row)
            .and_then(|_| self.inner.flush())
            .with_context(|| format!("writing to {}", self.label))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.inner
    }
}
