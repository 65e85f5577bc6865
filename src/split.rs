use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::parse::Dataset;

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition preserving the proportion of each class in both halves.
///
/// Every class with at least two members contributes at least one row to each
/// side. The same `seed` always yields the same partition.
pub fn stratified_split(labels: ArrayView1<f64>, test_fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for class in [0.0, 1.0] {
        #[allow(clippy::float_cmp)]
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == class)
            .map(|(index, _)| index)
            .collect();
        members.shuffle(&mut rng);

        #[allow(clippy::cast_possible_truncation)]
        #[allow(clippy::cast_sign_loss)]
        let mut test_size = (members.len() as f64 * test_fraction).round() as usize;
        if members.len() >= 2 {
            test_size = test_size.clamp(1, members.len() - 1);
        } else {
            test_size = 0;
        }

        test.extend_from_slice(&members[..test_size]);
        train.extend_from_slice(&members[test_size..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    Split { train, test }
}

pub fn select_rows(samples: ArrayView2<f64>, indices: &[usize]) -> Array2<f64> {
    samples.select(Axis(0), indices)
}

pub fn select_labels(labels: ArrayView1<f64>, indices: &[usize]) -> Array1<f64> {
    labels.select(Axis(0), indices)
}

impl Split {
    pub fn apply(&self, dataset: &Dataset) -> (Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>) {
        (
            select_rows(dataset.features.view(), &self.train),
            select_labels(dataset.labels.view(), &self.train),
            select_rows(dataset.features.view(), &self.test),
            select_labels(dataset.labels.view(), &self.test),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(negatives: usize, positives: usize) -> Array1<f64> {
        let mut values = vec![0.0; negatives];
        values.extend(vec![1.0; positives]);
        Array1::from(values)
    }

    #[test]
    fn preserves_class_proportions() {
        let labels = labels(60, 40);
        let split = stratified_split(labels.view(), 0.2, 2);

        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);

        let test_positives = split.test.iter().filter(|&&i| labels[i] > 0.5).count();
        assert_eq!(test_positives, 8);
    }

    #[test]
    fn partitions_every_row_exactly_once() {
        let labels = labels(37, 13);
        let split = stratified_split(labels.view(), 0.2, 7);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn same_seed_same_partition() {
        let labels = labels(30, 30);
        assert_eq!(
            stratified_split(labels.view(), 0.2, 50),
            stratified_split(labels.view(), 0.2, 50)
        );
        assert_ne!(
            stratified_split(labels.view(), 0.2, 50),
            stratified_split(labels.view(), 0.2, 51)
        );
    }

    #[test]
    fn small_classes_keep_a_training_row() {
        let labels = labels(2, 10);
        let split = stratified_split(labels.view(), 0.9, 1);
        let train_negatives = split.train.iter().filter(|&&i| labels[i] < 0.5).count();
        assert_eq!(train_negatives, 1);
    }
}
