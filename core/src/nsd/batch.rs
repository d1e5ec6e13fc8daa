use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::DataError;
use crate::rng::seeded_rng;

/// An endless stream of fixed-size batches of shuffled rows.
///
/// Each epoch shuffles the first `floor(N / batch_size) * batch_size` row
/// indices and slices the permutation into exact `batch_size` chunks; the
/// trailing `N mod batch_size` rows sit out. That drop is the documented
/// batching policy, not an accident. When a permutation is exhausted a fresh
/// one is drawn, so the iterator never finishes and never yields a batch
/// shorter than `batch_size`.
#[derive(Debug)]
pub struct BatchIterator {
    data: Array2<f32>,
    batch_size: usize,
    rng: StdRng,
    permutation: Vec<usize>,
    cursor: usize,
}

impl BatchIterator {
    /// Fails fast with [`DataError::BatchSize`] when no full batch exists,
    /// rather than looping forever over empty slices.
    pub fn new(data: Array2<f32>, batch_size: usize, seed: u64) -> Result<Self, DataError> {
        let rows = data.nrows();
        if batch_size == 0 || batch_size > rows {
            return Err(DataError::BatchSize { batch_size, rows });
        }

        let mut iter = Self {
            data,
            batch_size,
            rng: seeded_rng(seed),
            permutation: Vec::new(),
            cursor: 0,
        };
        iter.reshuffle();
        Ok(iter)
    }

    /// Full batches per pass over the data.
    pub fn batches_per_epoch(&self) -> usize {
        self.data.nrows() / self.batch_size
    }

    /// Columns of every yielded batch.
    pub fn columns(&self) -> usize {
        self.data.ncols()
    }

    fn reshuffle(&mut self) {
        let full = self.batches_per_epoch() * self.batch_size;
        self.permutation = (0..full).collect();
        self.permutation.shuffle(&mut self.rng);
        self.cursor = 0;
    }
}

impl Iterator for BatchIterator {
    type Item = Array2<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == self.permutation.len() {
            self.reshuffle();
        }
        let chunk = &self.permutation[self.cursor..self.cursor + self.batch_size];
        let batch = self.data.select(Axis(0), chunk);
        self.cursor += self.batch_size;
        Some(batch)
    }
}
