use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::client::{RemoteApi, Tally};
use crate::output::RowWriter;

pub const DEFAULT_COUNT: usize = 10;

/// `f{outer}` or `f{outer}/f{inner}` below the shared space.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FolderPath {
    pub outer: usize,
    pub inner: Option<usize>,
}

impl FolderPath {
    pub fn top(outer: usize) -> Self {
        Self { outer, inner: None }
    }

    pub fn nested(outer: usize, inner: usize) -> Self {
        Self {
            outer,
            inner: Some(inner),
        }
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner {
            Some(inner) => write!(f, "f{}/f{}", self.outer, inner),
            None => write!(f, "f{}", self.outer),
        }
    }
}

/// Create `count` top-level folders with `count` children each.
pub fn seed<A, W>(api: &A, count: usize, strict: bool, out: &mut RowWriter<W>) -> Result<Tally>
where
    A: RemoteApi + ?Sized,
    W: Write,
{
    let mut tally = Tally::default();
    for outer in 0..count {
        create(api, FolderPath::top(outer), strict, &mut tally)?;
        for inner in 0..count {
            create(api, FolderPath::nested(outer, inner), strict, &mut tally)?;
            out.write_row(&format!("{},{}", outer, inner))?;
        }
    }

    info!(
        folders = tally.requests,
        failures = tally.failures,
        rows = out.rows(),
        "folder seeding finished"
    );
    Ok(tally)
}

fn create<A: RemoteApi + ?Sized>(
    api: &A,
    path: FolderPath,
    strict: bool,
    tally: &mut Tally,
) -> Result<()> {
    debug!(%path, "creating folder");
    let outcome = api
        .make_collection(&path.to_string())
        .with_context(|| format!("creating folder {}", path))?;
    tally.record(outcome, strict, &format!("creating folder {}", path))
}
