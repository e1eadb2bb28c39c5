use crate::error::{PathError, Result};
use crate::math::{Configuration, Interval, Vector};

use super::Path;

const CONTINUITY_TOL: f64 = 1e-8;

/// Ordered concatenation of paths over a cumulative time axis starting at
/// zero; piece `i + 1` starts where piece `i` ends.
#[derive(Debug, Clone)]
pub struct SequenceData {
    pieces: Vec<Path>,
}

impl SequenceData {
    /// # Errors
    ///
    /// Fails with [`PathError::EmptySequence`] when `pieces` is empty.
    pub(crate) fn new(pieces: Vec<Path>) -> Result<Self> {
        if pieces.is_empty() {
            return Err(PathError::EmptySequence.into());
        }
        for pair in pieces.windows(2) {
            debug_assert!(
                pair[0]
                    .space()
                    .difference(pair[1].initial(), pair[0].end())
                    .norm()
                    < CONTINUITY_TOL,
                "consecutive pieces must share their junction configuration"
            );
        }
        Ok(Self { pieces })
    }

    #[must_use]
    pub fn pieces(&self) -> &[Path] {
        &self.pieces
    }

    pub(crate) fn into_pieces(self) -> Vec<Path> {
        self.pieces
    }

    pub(crate) fn first(&self) -> &Path {
        &self.pieces[0]
    }

    pub(crate) fn last(&self) -> &Path {
        &self.pieces[self.pieces.len() - 1]
    }

    pub(crate) fn total_length(&self) -> f64 {
        self.pieces.iter().map(Path::length).sum()
    }

    /// Maps `s` on the cumulative axis to a piece index and local time.
    fn locate(&self, s: f64) -> (usize, f64) {
        let last = self.pieces.len() - 1;
        let mut offset = 0.0;
        for (i, piece) in self.pieces.iter().take(last).enumerate() {
            let len = piece.length();
            if s <= offset + len {
                return (i, piece.time_range().start + (s - offset).clamp(0.0, len));
            }
            offset += len;
        }
        let piece = &self.pieces[last];
        (
            last,
            piece.time_range().start + (s - offset).clamp(0.0, piece.length()),
        )
    }

    pub(crate) fn eval(&self, s: f64) -> Result<Configuration> {
        let (i, local) = self.locate(s);
        self.pieces[i].eval(local)
    }

    pub(crate) fn derivative(&self, s: f64, order: usize) -> Result<Vector> {
        let (i, local) = self.locate(s);
        self.pieces[i].derivative(local, order)
    }

    /// Extracts the sub-pieces covering `sub` of the cumulative axis, in
    /// traversal order (pieces are reversed for a reversed interval).
    pub(crate) fn restricted(&self, sub: Interval) -> Result<Vec<Path>> {
        let forward = !sub.is_reversed();
        let ordered = sub.ordered();
        let mut parts = Vec::new();
        let mut offset = 0.0;
        for piece in &self.pieces {
            let len = piece.length();
            let lo = ordered.start.max(offset);
            let hi = ordered.end.min(offset + len);
            if hi - lo > 0.0 {
                let local = Interval::new(
                    piece.time_range().start + (lo - offset),
                    piece.time_range().start + (hi - offset),
                );
                parts.push(piece.extract(if forward { local } else { local.swapped() })?);
            }
            offset += len;
        }
        if !forward {
            parts.reverse();
        }
        Ok(parts)
    }
}
