//! Centroid-distance anomaly scoring used to discount model confidence.

use mimic_trees::TrainingSet;

use crate::sample::Score;

/// Absolute lower bound on a per-feature standard deviation.
pub const MIN_STD_DEV: f64 = 0.01;

/// Fraction of the global feature spread used as a per-class spread floor.
pub const GLOBAL_STD_FRACTION: f64 = 0.05;

/// Mean squared z-score tolerated before any discount applies.
pub const DISTANCE_ALLOWANCE: f64 = 4.0;

/// Decay scale of the discount past the allowance.
pub const DISTANCE_SCALE: f64 = 8.0;

/// Per-class mean and floored standard deviation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassCentroid {
    mean: Vec<f64>,
    std_dev: Vec<f64>,
}

impl ClassCentroid {
    /// Return the per-feature class mean.
    #[must_use]
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Return the per-feature floored standard deviation.
    #[must_use]
    pub fn std_dev(&self) -> &[f64] {
        &self.std_dev
    }

    /// Mean over features of the squared z-score of `sample`, with
    /// `extra_variance` added to every feature's variance.
    ///
    /// Only the overlapping prefix of `sample` is compared; an empty overlap
    /// has distance 0.
    #[must_use]
    pub fn distance(&self, sample: &[f64], extra_variance: f64) -> f64 {
        let extra = extra_variance.max(0.0);
        let mut total = 0.0;
        let mut n = 0usize;
        for ((&x, &mu), &sigma) in sample.iter().zip(&self.mean).zip(&self.std_dev) {
            total += (x - mu).powi(2) / (sigma * sigma + extra);
            n += 1;
        }
        if n == 0 { 0.0 } else { total / n as f64 }
    }
}

/// Scores how far a frame sits from the class the model picked.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnomalyScorer {
    centroids: Vec<ClassCentroid>,
}

impl AnomalyScorer {
    /// Compute one centroid per class of `data`, in class-index order.
    #[must_use]
    pub fn fit(data: &TrainingSet) -> Self {
        let n_features = data.n_features();
        let global_floor: Vec<f64> = (0..n_features)
            .map(|f| {
                let (_, std) = mean_and_std(data.column(f).iter().copied());
                MIN_STD_DEV.max(GLOBAL_STD_FRACTION * std)
            })
            .collect();

        let centroids = (0..data.n_classes())
            .map(|class| {
                let members: Vec<&Vec<f64>> = data
                    .rows()
                    .iter()
                    .zip(data.labels())
                    .filter(|&(_, &label)| label == class)
                    .map(|(row, _)| row)
                    .collect();
                let (mean, std_dev) = (0..n_features)
                    .map(|f| {
                        let (mean, std) = mean_and_std(members.iter().map(|row| row[f]));
                        (mean, std.max(global_floor[f]))
                    })
                    .unzip();
                ClassCentroid { mean, std_dev }
            })
            .collect();

        Self { centroids }
    }

    /// Return the centroid of `class`.
    #[must_use]
    pub fn centroid(&self, class: usize) -> Option<&ClassCentroid> {
        self.centroids.get(class)
    }

    /// Return every centroid in class-index order.
    #[must_use]
    pub fn centroids(&self) -> &[ClassCentroid] {
        &self.centroids
    }

    /// Anomaly in [0, 1]: `1 − exp(−max(0, d − 4) / 8)` with `d` the centroid
    /// distance widened by `leaf_variance`, the spread of the training
    /// samples in the leaf the frame reached. An unknown class scores 1.
    #[must_use]
    pub fn anomaly(&self, class: usize, sample: &[f64], leaf_variance: f64) -> f64 {
        match self.centroids.get(class) {
            Some(centroid) => {
                let excess =
                    (centroid.distance(sample, leaf_variance) - DISTANCE_ALLOWANCE).max(0.0);
                (1.0 - (-excess / DISTANCE_SCALE).exp()).clamp(0.0, 1.0)
            }
            None => 1.0,
        }
    }

    /// Discount the model's answer for `sample` by its anomaly against `class`.
    #[must_use]
    pub fn calibrate(
        &self,
        class: usize,
        label: String,
        raw_confidence: f64,
        sample: &[f64],
        leaf_variance: f64,
    ) -> Score {
        let anomaly = self.anomaly(class, sample, leaf_variance);
        Score {
            class,
            label,
            raw_confidence,
            confidence: raw_confidence * (1.0 - anomaly),
            anomaly,
        }
    }
}

/// Population mean and standard deviation; `(0, 0)` for an empty iterator.
fn mean_and_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (sum, n) = values.clone().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_class_set() -> TrainingSet {
        let rows = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.0],
            vec![1.0, 1.0],
            vec![1.2, 1.0],
        ];
        let labels = ["a", "a", "b", "b"].iter().map(|s| s.to_string()).collect();
        TrainingSet::new(rows, labels).unwrap()
    }

    #[test]
    fn centroids_hold_class_means() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        let a = scorer.centroid(0).unwrap();
        assert!((a.mean()[0] - 0.1).abs() < 1e-12);
        assert!((a.std_dev()[0] - 0.1).abs() < 1e-12);
        assert_eq!(scorer.centroids().len(), 2);
    }

    #[test]
    fn zero_spread_is_floored() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        // Feature 1 is constant within each class; global std is 0.5.
        let floor = MIN_STD_DEV.max(GLOBAL_STD_FRACTION * 0.5);
        assert!((scorer.centroid(0).unwrap().std_dev()[1] - floor).abs() < 1e-12);
    }

    #[test]
    fn near_centroid_is_not_discounted() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        assert_eq!(scorer.anomaly(0, &[0.1, 0.0], 0.0), 0.0);
        let score = scorer.calibrate(0, "a".into(), 0.8, &[0.1, 0.0], 0.0);
        assert!((score.confidence - 0.8).abs() < 1e-12);
        assert!((score.raw_confidence - 0.8).abs() < 1e-12);
    }

    #[test]
    fn far_sample_is_heavily_discounted() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        let anomaly = scorer.anomaly(0, &[5.0, 5.0], 0.0);
        assert!(anomaly > 0.99, "anomaly = {anomaly}");
        let score = scorer.calibrate(0, "a".into(), 1.0, &[5.0, 5.0], 0.0);
        assert!(score.confidence < 0.01);
        assert!((score.anomaly - anomaly).abs() < 1e-12);
    }

    #[test]
    fn anomaly_grows_with_distance() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        let near = scorer.anomaly(0, &[0.5, 0.05], 0.0);
        let far = scorer.anomaly(0, &[0.8, 0.1], 0.0);
        assert!(far >= near);
        assert!((0.0..=1.0).contains(&near));
    }

    #[test]
    fn wide_leaf_softens_the_discount() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        let sample = [0.6, 0.1];
        let tight = scorer.anomaly(0, &sample, 0.0);
        let wide = scorer.anomaly(0, &sample, 0.05);
        assert!(tight > 0.5, "tight = {tight}");
        assert!(wide < tight, "wide = {wide}, tight = {tight}");

        let tight = scorer.calibrate(0, "a".into(), 0.9, &sample, 0.0);
        let wide = scorer.calibrate(0, "a".into(), 0.9, &sample, 0.05);
        assert!(wide.confidence > tight.confidence);
    }

    #[test]
    fn negative_leaf_spread_is_ignored() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        let sample = [0.6, 0.1];
        assert_eq!(scorer.anomaly(0, &sample, -1.0), scorer.anomaly(0, &sample, 0.0));
    }

    #[test]
    fn unknown_class_is_fully_anomalous() {
        let scorer = AnomalyScorer::fit(&two_class_set());
        assert_eq!(scorer.anomaly(9, &[0.0, 0.0], 0.0), 1.0);
    }
}
