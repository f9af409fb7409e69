use super::{batch_order, Batch, DataLoader, Sample, TestSet};
use crate::Result;
use rand::RngCore;

/// Loader over samples already in memory
///
/// Samples are batched whole (no cropping), so every training sample must
/// have the same size.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    train: Vec<Sample>,
    batch_size: usize,
    shuffle: bool,
    test_sets: Vec<TestSet>,
}

impl InMemoryLoader {
    /// Shuffling loader with no test sets
    pub fn new(train: Vec<Sample>, batch_size: usize) -> Self {
        Self {
            train,
            batch_size,
            shuffle: true,
            test_sets: Vec::new(),
        }
    }

    /// Keep the sample order fixed
    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Append a held-out dataset
    pub fn with_test_set(mut self, set: TestSet) -> Self {
        self.test_sets.push(set);
        self
    }
}

impl DataLoader for InMemoryLoader {
    fn train_batches(&mut self, rng: &mut dyn RngCore) -> Result<Vec<Batch>> {
        batch_order(self.train.len(), self.batch_size, rng, self.shuffle)
            .into_iter()
            .map(|indices| {
                let samples: Vec<Sample> = indices.iter().map(|&i| self.train[i].clone()).collect();
                Batch::stack(&samples)
            })
            .collect()
    }

    fn train_len(&self) -> usize {
        self.train.len()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn test_sets(&self) -> &[TestSet] {
        &self.test_sets
    }
}
