use std::fmt;

use crate::error::Result;
use crate::path::Path;

mod recursive;

pub use recursive::{RecursiveHermite, SubdivisionParams};

/// Maps a constrained path to one that stays within the error bound of the
/// constraint manifold.
pub trait PathProjector: fmt::Debug {
    /// Projects `path`, returning either the whole projected path or the
    /// longest valid prefix.
    ///
    /// # Errors
    ///
    /// Fails when the path cannot be projected at all (endpoint off the
    /// manifold, subdivision budget exceeded) with nothing salvageable.
    fn apply(&self, path: &Path) -> Result<Projected>;
}

/// Outcome of a projection run.
#[derive(Debug)]
pub enum Projected {
    /// The whole input was projected.
    Complete(Path),
    /// Only a prefix could be projected; the rest was dropped.
    Truncated(Path),
}

impl Projected {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Complete(path) | Self::Truncated(path) => path,
        }
    }

    #[must_use]
    pub fn into_path(self) -> Path {
        match self {
            Self::Complete(path) | Self::Truncated(path) => path,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}
